// ABOUTME: SQL translation core: parameter grammar, pagination rewrite, driver tags
// ABOUTME: Pure text transformation; no database handles in this module
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

pub mod driver;
pub mod pagination;
pub mod parser;

pub use driver::Driver;
pub use parser::{bind, parse, ParsedSql};
