// ABOUTME: Pagination token rewrite tests across dialects and precedence rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::{json, Map, Value};

use dbbridge::sql::pagination::{contains_token, rewrite};
use dbbridge::sql::Driver;

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn sqlite_defaults_to_limit_50_offset_0() {
    let mut p = Map::new();
    let sql = rewrite("SELECT id FROM t ORDER BY id {pagination}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "SELECT id FROM t ORDER BY id LIMIT 50 OFFSET 0");
}

#[test]
fn request_params_override_defaults() {
    let mut p = params(json!({ "_page": 3, "_limit": 20 }));
    let sql = rewrite("SELECT id FROM t {pagination}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "SELECT id FROM t LIMIT 20 OFFSET 40");
}

#[test]
fn mysql_uses_offset_comma_limit() {
    let mut p = params(json!({ "_page": 3, "_limit": 20 }));
    let sql = rewrite("SELECT id FROM t {pagination}", Driver::Mysql, &mut p);
    assert_eq!(sql, "SELECT id FROM t LIMIT 40, 20");
}

#[test]
fn mssql_uses_top_start_at() {
    let mut p = params(json!({ "_page": 3, "_limit": 20 }));
    let sql = rewrite("SELECT id FROM t {pagination}", Driver::Mssql, &mut p);
    assert_eq!(sql, "SELECT id FROM t TOP 20 START AT 41");
}

#[test]
fn token_defaults_apply_without_request_params() {
    let mut p = Map::new();
    let sql = rewrite("SELECT id FROM t {pagination:2:25}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "SELECT id FROM t LIMIT 25 OFFSET 25");
}

#[test]
fn either_side_of_the_token_may_be_empty() {
    let mut p = Map::new();
    let sql = rewrite("{pagination::20}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "LIMIT 20 OFFSET 0");

    let mut p = Map::new();
    let sql = rewrite("{pagination:2:}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "LIMIT 50 OFFSET 50");
}

#[test]
fn token_is_case_insensitive_and_whitespace_tolerant() {
    let mut p = Map::new();
    let sql = rewrite("SELECT 1 {PAGINATION}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "SELECT 1 LIMIT 50 OFFSET 0");

    let mut p = Map::new();
    let sql = rewrite("SELECT 1 { pagination: 2 : 10 }", Driver::Sqlite, &mut p);
    assert_eq!(sql, "SELECT 1 LIMIT 10 OFFSET 10");
}

#[test]
fn only_the_first_occurrence_is_replaced() {
    let mut p = Map::new();
    let sql = rewrite("{pagination} -- {pagination}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "LIMIT 50 OFFSET 0 -- {pagination}");
}

#[test]
fn page_and_limit_are_clamped_to_one() {
    let mut p = params(json!({ "_page": 0, "_limit": -5 }));
    let sql = rewrite("{pagination}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "LIMIT 1 OFFSET 0");
}

#[test]
fn string_and_float_forms_are_accepted() {
    let mut p = params(json!({ "_page": "3", "_limit": 20.0 }));
    let sql = rewrite("{pagination}", Driver::Sqlite, &mut p);
    assert_eq!(sql, "LIMIT 20 OFFSET 40");
}

#[test]
fn token_consumes_page_and_limit_params() {
    let mut p = params(json!({ "_page": 2, "_limit": 5, "other": 1 }));
    let _ = rewrite("{pagination}", Driver::Sqlite, &mut p);
    assert!(!p.contains_key("_page"));
    assert!(!p.contains_key("_limit"));
    assert!(p.contains_key("other"));
}

#[test]
fn absent_token_leaves_text_and_params_untouched() {
    let mut p = params(json!({ "_page": 2, "_limit": 5 }));
    let sql = rewrite("SELECT 1", Driver::Sqlite, &mut p);
    assert_eq!(sql, "SELECT 1");
    // Reserved names are silently ignored, never bound, never missing
    assert!(p.contains_key("_page"));
    assert!(p.contains_key("_limit"));
}

#[test]
fn contains_token_detects_the_grammar_only() {
    assert!(contains_token("SELECT 1 {pagination}"));
    assert!(contains_token("{Pagination:1:10}"));
    assert!(!contains_token("SELECT 1"));
    assert!(!contains_token("{paginationX}"));
    assert!(!contains_token("{pagination:1}"));
}
