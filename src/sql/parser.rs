// ABOUTME: Rewrites {name} / {name:default} tokens into positional placeholders
// ABOUTME: Single left-to-right scan; expansion order equals textual order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};
use crate::sql::driver::PlaceholderStyle;

/// Output of one parse pass: the rewritten SQL, the placeholder names in
/// emission order, and any `{name:default}` defaults collected along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSql {
    pub sql: String,
    pub param_names: Vec<String>,
    pub defaults: HashMap<String, String>,
}

/// Rewrites named parameter tokens to positional placeholders.
///
/// The text is scanned once, left to right. `{name}` and `{name:default}`
/// become one placeholder each; names are `[A-Za-z0-9_]+` after trimming, and
/// brace groups that do not fit the grammar are left verbatim. When a value
/// map is supplied, sequence values fan out to one placeholder per element
/// (`name:0`, `name:1`, ... in `param_names`), strings shaped like JSON
/// arrays are parsed and written back into the map so binding agrees, and an
/// empty sequence renders the literal `NULL`. The empty expansion is only
/// meant for set-membership position, as in `IN ({ids})`.
#[must_use]
pub fn parse(
    sql_text: &str,
    mut values: Option<&mut Map<String, Value>>,
    style: PlaceholderStyle,
) -> ParsedSql {
    let mut sql = String::with_capacity(sql_text.len());
    let mut param_names: Vec<String> = Vec::new();
    let mut defaults: HashMap<String, String> = HashMap::new();
    let mut next_index = 1usize;

    let mut rest = sql_text;
    while let Some(open) = rest.find('{') {
        sql.push_str(&rest[..open]);
        let body = &rest[open + 1..];

        let Some(close) = body.find('}') else {
            // Unterminated brace: emit the tail untouched.
            sql.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let content = &body[..close];
        let token = &rest[open..open + close + 2];
        rest = &rest[open + close + 2..];

        let (raw_name, raw_default) = match content.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (content, None),
        };
        let name = raw_name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            sql.push_str(token);
            continue;
        }

        if let Some(default) = raw_default {
            defaults.insert(name.to_owned(), default.trim().to_owned());
        }

        if let Some(vals) = values.as_deref_mut() {
            if let Some(elements) = sequence_value(vals, name) {
                if elements.is_empty() {
                    sql.push_str("NULL");
                } else {
                    for i in 0..elements.len() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        push_placeholder(&mut sql, style, &mut next_index);
                        param_names.push(format!("{name}:{i}"));
                    }
                }
                continue;
            }
        }

        push_placeholder(&mut sql, style, &mut next_index);
        param_names.push(name.to_owned());
    }
    sql.push_str(rest);

    ParsedSql {
        sql,
        param_names,
        defaults,
    }
}

/// Returns the sequence elements for `name`, parsing JSON-array-shaped
/// strings and writing the parsed form back so binding sees the same value.
fn sequence_value(values: &mut Map<String, Value>, name: &str) -> Option<Vec<Value>> {
    let parsed_from_string: Vec<Value> = match values.get(name) {
        Some(Value::Array(elements)) => return Some(elements.clone()),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
                return None;
            }
            serde_json::from_str(trimmed).ok()?
        }
        _ => return None,
    };
    values.insert(name.to_owned(), Value::Array(parsed_from_string.clone()));
    Some(parsed_from_string)
}

fn push_placeholder(sql: &mut String, style: PlaceholderStyle, next_index: &mut usize) {
    match style {
        PlaceholderStyle::Question => sql.push('?'),
        PlaceholderStyle::Numbered => {
            sql.push('$');
            sql.push_str(&next_index.to_string());
        }
    }
    *next_index += 1;
}

/// Builds the positional argument vector for the placeholders emitted by
/// [`parse`], in the same order.
///
/// Indexed names of the form `root:idx` resolve through the sequence value;
/// plain names resolve through the value map, then the defaults. Every
/// unresolved name is collected and reported at once.
///
/// # Errors
///
/// Returns [`AppError::MissingParameters`] listing every name that resolved
/// neither to a value nor to a default.
pub fn bind(
    param_names: &[String],
    values: &Map<String, Value>,
    defaults: &HashMap<String, String>,
) -> AppResult<Vec<Value>> {
    let mut args = Vec::with_capacity(param_names.len());
    let mut missing: Vec<String> = Vec::new();

    for name in param_names {
        if let Some((root, index)) = name.split_once(':') {
            if let Ok(index) = index.parse::<usize>() {
                match values.get(root) {
                    Some(Value::Array(elements)) if index < elements.len() => {
                        args.push(elements[index].clone());
                        continue;
                    }
                    // Parse saw a sequence here, so this only happens if the
                    // caller mutated the map between parse and bind.
                    None => {
                        missing.push(root.to_owned());
                        continue;
                    }
                    Some(_) => {}
                }
            }
        }

        match values.get(name.as_str()) {
            Some(value) => args.push(value.clone()),
            None => match defaults.get(name.as_str()) {
                Some(default) => args.push(Value::String(default.clone())),
                None => missing.push(name.clone()),
            },
        }
    }

    if !missing.is_empty() {
        return Err(AppError::MissingParameters(missing));
    }
    Ok(args)
}
