// ABOUTME: Tagged driver variant shared by the pagination rewriter and executor
// ABOUTME: Each variant carries a placeholder style and a pagination clause rule
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::fmt;
use std::str::FromStr;

/// Supported SQL dialects.
///
/// Adding a dialect means extending this tag, its pagination clause, its
/// placeholder style, and the open function in [`crate::drivers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
    Postgres,
    Mysql,
    Mssql,
    Odbc,
}

/// How positional placeholders are spelled in the rewritten SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for each argument (sqlite, mysql, mssql, odbc)
    Question,
    /// `$1`, `$2`, ... (postgres)
    Numbered,
}

impl Driver {
    /// Placeholder spelling for this dialect.
    #[must_use]
    pub const fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Self::Postgres => PlaceholderStyle::Numbered,
            Self::Sqlite | Self::Mysql | Self::Mssql | Self::Odbc => PlaceholderStyle::Question,
        }
    }

    /// Dialect-specific pagination clause for the given limit and offset.
    #[must_use]
    pub fn pagination_clause(self, limit: i64, offset: i64) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("LIMIT {limit} OFFSET {offset}"),
            Self::Mysql => format!("LIMIT {offset}, {limit}"),
            // SQL Anywhere / Sybase compatible syntax
            Self::Mssql | Self::Odbc => format!("TOP {limit} START AT {}", offset + 1),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
            Self::Odbc => "odbc",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown driver tag in the catalog
#[derive(Debug, thiserror::Error)]
#[error("unsupported driver: {0}")]
pub struct UnknownDriver(pub String);

impl FromStr for Driver {
    type Err = UnknownDriver;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "odbc" => Ok(Self::Odbc),
            other => Err(UnknownDriver(other.to_owned())),
        }
    }
}
