//! Writer for generating PHP config content.
//!
//! Output follows `var_export` layout so files written here look the same
//! as the ones the application writes itself.

use crate::value::Value;
use std::fmt::Write;

/// Render a full config document.
pub fn write_string(variable: &str, entries: &[(String, Value)]) -> String {
    let mut output = String::from("<?php\n");
    let _ = writeln!(output, "${variable} = array (");
    for (key, value) in entries {
        write_entry(&mut output, &render_key(key), value, 1);
    }
    output.push_str(");\n");
    output
}

fn write_entry(output: &mut String, key: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::List(items) => {
            let _ = writeln!(output, "{indent}{key} =>");
            let _ = writeln!(output, "{indent}array (");
            for (index, item) in items.iter().enumerate() {
                write_entry(output, &index.to_string(), item, depth + 1);
            }
            let _ = writeln!(output, "{indent}),");
        }
        Value::Map(entries) => {
            let _ = writeln!(output, "{indent}{key} =>");
            let _ = writeln!(output, "{indent}array (");
            for (k, v) in entries {
                write_entry(output, &render_key(k), v, depth + 1);
            }
            let _ = writeln!(output, "{indent}),");
        }
        scalar => {
            let _ = writeln!(output, "{indent}{key} => {},", render_scalar(scalar));
        }
    }
}

/// Integer-looking keys are written bare, everything else quoted.
fn render_key(key: &str) -> String {
    let canonical_int = key
        .parse::<i64>()
        .is_ok_and(|i| i.to_string() == key);
    if canonical_int {
        key.to_string()
    } else {
        quote(key)
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.1}"),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => quote(s),
        Value::List(_) | Value::Map(_) => render_value(value, 0),
    }
}

/// Render a value inline (used for display and nested previews).
pub fn render_value(value: &Value, depth: usize) -> String {
    match value {
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(|v| render_value(v, depth + 1)).collect();
            format!("array ({})", inner.join(", "))
        }
        Value::Map(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} => {}", render_key(k), render_value(v, depth + 1)))
                .collect();
            format!("array ({})", inner.join(", "))
        }
        scalar => render_scalar(scalar),
    }
}

/// Single-quote a string, escaping backslashes and quotes.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}
