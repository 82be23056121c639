// ABOUTME: Small shared helpers with no dependencies on the rest of the crate
// ABOUTME: Currently slug normalization for names crossing the URL boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

/// Converts a human-entered name to a URL-safe slug.
///
/// Lowercases, replaces whitespace with `-`, drops every character outside
/// `[a-z0-9-]`, collapses runs of `-`, and trims leading/trailing `-`. The
/// result is idempotent: `slugify(slugify(s)) == slugify(s)`.
#[must_use]
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = false;

    for ch in s.chars() {
        let mapped = if ch.is_whitespace() { '-' } else { ch };
        for lower in mapped.to_lowercase() {
            match lower {
                'a'..='z' | '0'..='9' => {
                    out.push(lower);
                    last_dash = false;
                }
                '-' => {
                    if !last_dash {
                        out.push('-');
                        last_dash = true;
                    }
                }
                _ => {}
            }
        }
    }

    out.trim_matches('-').to_owned()
}
