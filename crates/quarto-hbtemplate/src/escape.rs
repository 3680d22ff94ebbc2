/*
 * escape.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! HTML escaping for `{{...}}` interpolations.

/// Escape the characters that are unsafe in HTML output.
///
/// `{{expr}}` passes its rendered value through this; `{{{expr}}}` and
/// `{{&expr}}` do not.
pub fn escape_html(input: &str) -> String {
    if !input
        .chars()
        .any(|c| matches!(c, '&' | '<' | '>' | '"' | '\'' | '`'))
    {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '`' => out.push_str("&#x60;"),
            _ => out.push(c),
        }
    }
    out
}
