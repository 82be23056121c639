// ABOUTME: Live OpenAPI document synthesized from the catalog, plus Swagger UI
// ABOUTME: One path per active connection and allow-listed query
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::routes::AppState;
use crate::sql::driver::PlaceholderStyle;
use crate::sql::{pagination, parser};
use crate::utils::slugify;

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>DbBridge API Docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.11.0/swagger-ui.css" />
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://unpkg.com/swagger-ui-dist@5.11.0/swagger-ui-bundle.js" crossorigin></script>
<script>
    window.onload = () => {
        window.ui = SwaggerUIBundle({
            url: '/api/docs/openapi.json',
            dom_id: '#swagger-ui',
        });
    };
</script>
</body>
</html>"#;

/// `GET /api/docs`
pub async fn serve_swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

/// `GET /api/docs/openapi.json`
///
/// Rebuilt on every request so the document always reflects the current
/// catalog: one `post` path per active connection × allow-listed query.
pub async fn openapi_document(State(state): State<AppState>) -> Response {
    let queries = match state.queries.list().await {
        Ok(queries) => queries,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let connections = match state.connections.list().await {
        Ok(connections) => connections,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let mut paths = Map::new();

    for conn in connections.iter().filter(|c| c.is_active) {
        let conn_slug = slugify(&conn.name);

        for query in queries.iter().filter(|q| q.allows_connection(conn.id)) {
            let path_key = format!("/api/{conn_slug}/{}", query.slug);

            let parsed = parser::parse(&query.sql_text, None, PlaceholderStyle::Question);
            let mut has_pagination = pagination::contains_token(&query.sql_text);

            let mut properties = Map::new();
            let mut example = Map::new();
            for name in &parsed.param_names {
                // The pagination token is a system variable driven through
                // _page/_limit, not a bindable parameter
                if name.eq_ignore_ascii_case("pagination") {
                    has_pagination = true;
                    continue;
                }
                properties.insert(name.clone(), json!({ "type": "string" }));
                example.insert(name.clone(), Value::String("value".to_owned()));
            }
            if has_pagination {
                properties.insert("_page".to_owned(), json!({ "type": "integer", "default": 1 }));
                properties.insert(
                    "_limit".to_owned(),
                    json!({ "type": "integer", "default": 50 }),
                );
            }

            let operation = json!({
                "summary": query.slug.clone(),
                "description": query.description.clone(),
                "tags": [conn.name.clone()],
                "requestBody": {
                    "required": true,
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": properties,
                            },
                            "example": example,
                        }
                    }
                },
                "responses": {
                    "200": {
                        "description": "Successful execution",
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "rows": {
                                            "type": "array",
                                            "items": { "type": "object" }
                                        },
                                        "columns": {
                                            "type": "array",
                                            "items": { "type": "string" }
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "400": { "description": "Bad Request" },
                    "500": { "description": "Internal Server Error" }
                }
            });

            paths.insert(path_key, json!({ "post": operation }));
        }
    }

    let document = json!({
        "openapi": "3.0.0",
        "info": {
            "title": "DbBridge API",
            "version": "1.0.0",
            "description": "Dynamic API generated from Saved Queries.",
        },
        "servers": [
            { "url": format!("http://localhost:{}", state.port) }
        ],
        "paths": paths,
        "components": {
            "securitySchemes": {
                "ApiKeyAuth": {
                    "type": "apiKey",
                    "in": "header",
                    "name": "X-API-Key",
                }
            }
        },
        "security": [
            { "ApiKeyAuth": [] }
        ],
    });

    Json(document).into_response()
}
