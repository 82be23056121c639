// ABOUTME: Rewrites the {pagination[:P:L]} system token into a dialect clause
// ABOUTME: Runs before the parameter parser and consumes _page/_limit values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use serde_json::{Map, Value};

use crate::sql::driver::Driver;

/// Global defaults when neither the request nor the token specifies values
const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy)]
struct PaginationToken {
    start: usize,
    end: usize,
    page_default: Option<i64>,
    limit_default: Option<i64>,
}

/// Replaces the first `{pagination}` / `{pagination:P:L}` token with the
/// dialect-specific clause for the effective page and limit.
///
/// Effective values resolve in precedence order: `_page`/`_limit` request
/// params (integer, floating numeric, or decimal string forms), then the
/// token defaults, then the global `(1, 50)`. Both are clamped to at least 1.
/// When a token is present, `_page` and `_limit` are removed from the value
/// map so they never reach parameter binding; when no token is present the
/// text and the map are returned untouched and any `_page`/`_limit` entries
/// are silently ignored downstream.
#[must_use]
pub fn rewrite(sql_text: &str, driver: Driver, params: &mut Map<String, Value>) -> String {
    let Some(token) = find_token(sql_text) else {
        return sql_text.to_owned();
    };

    let mut page = token.page_default.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let mut limit = token
        .limit_default
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT);

    if let Some(value) = params.remove("_page") {
        if let Some(n) = coerce_int(&value) {
            page = n;
        }
    }
    if let Some(value) = params.remove("_limit") {
        if let Some(n) = coerce_int(&value) {
            limit = n;
        }
    }

    page = page.max(1);
    limit = limit.max(1);
    let offset = (page - 1) * limit;

    let mut out = String::with_capacity(sql_text.len() + 16);
    out.push_str(&sql_text[..token.start]);
    out.push_str(&driver.pagination_clause(limit, offset));
    out.push_str(&sql_text[token.end..]);
    out
}

/// Whether the text contains a pagination token. Used by the OpenAPI
/// synthesizer to advertise `_page`/`_limit`.
#[must_use]
pub fn contains_token(sql_text: &str) -> bool {
    find_token(sql_text).is_some()
}

/// Accepts JSON numbers (integral or floating) and decimal strings.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Scans for the first well-formed token: `{`, optional whitespace,
/// `pagination` (any case), then either `}` or `:P:L}` where each of P and L
/// is an optionally-empty digit run with surrounding whitespace allowed.
fn find_token(text: &str) -> Option<PaginationToken> {
    const WORD: &[u8] = b"pagination";
    let bytes = text.as_bytes();
    let len = bytes.len();

    let mut pos = 0;
    while pos < len {
        if bytes[pos] != b'{' {
            pos += 1;
            continue;
        }
        let start = pos;
        let mut i = pos + 1;
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i + WORD.len() <= len && bytes[i..i + WORD.len()].eq_ignore_ascii_case(WORD) {
            let j = i + WORD.len();
            if j < len && bytes[j] == b'}' {
                return Some(PaginationToken {
                    start,
                    end: j + 1,
                    page_default: None,
                    limit_default: None,
                });
            }
            if j < len && bytes[j] == b':' {
                let (page_default, after_page) = read_digits(bytes, j + 1);
                if after_page < len && bytes[after_page] == b':' {
                    let (limit_default, after_limit) = read_digits(bytes, after_page + 1);
                    if after_limit < len && bytes[after_limit] == b'}' {
                        return Some(PaginationToken {
                            start,
                            end: after_limit + 1,
                            page_default,
                            limit_default,
                        });
                    }
                }
            }
        }
        pos = start + 1;
    }
    None
}

/// Reads an optionally-empty digit run with whitespace on either side,
/// returning the parsed value (if any digits) and the next index.
fn read_digits(bytes: &[u8], mut i: usize) -> (Option<i64>, usize) {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let value = if i > digits_start {
        std::str::from_utf8(&bytes[digits_start..i])
            .ok()
            .and_then(|s| s.parse().ok())
    } else {
        None
    };
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    (value, i)
}
