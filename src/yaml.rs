//! Block-style YAML output with a caller-chosen indent width.
//!
//! `serde_yaml` always indents by two and never indents sequences under
//! their key, so layout is done here and `serde_yaml` only decides how a
//! single-line scalar has to be quoted.

use serde_json::Value;

/// Serializes `value` as a block-style YAML fragment indented by `indent`
/// spaces per level, with surrounding whitespace trimmed.
pub fn to_block_yaml(value: &Value, indent: usize) -> String {
    let indent = indent.max(2);
    let mut out = String::new();
    match value {
        Value::Object(map) if !map.is_empty() => write_mapping(&mut out, value, 0, indent),
        Value::Array(items) if !items.is_empty() => write_sequence(&mut out, value, 0, indent),
        _ => out.push_str(&scalar(value, indent)),
    }
    out.trim().to_string()
}

fn is_block(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn write_mapping(out: &mut String, value: &Value, col: usize, indent: usize) {
    let Value::Object(map) = value else { return };
    for (key, child) in map {
        out.push_str(&" ".repeat(col));
        out.push_str(&single_line(key));
        out.push(':');
        if is_block(child) {
            out.push('\n');
            write_node(out, child, col + indent, indent);
        } else {
            out.push(' ');
            out.push_str(&scalar(child, col + indent));
            out.push('\n');
        }
    }
}

fn write_sequence(out: &mut String, value: &Value, col: usize, indent: usize) {
    let Value::Array(items) = value else { return };
    let dash = format!("{}- ", " ".repeat(col));
    let item_col = col + 2;
    for item in items {
        if is_block(item) {
            // render the nested block at the item column, then hang its
            // first line off the dash
            let mut nested = String::new();
            write_node(&mut nested, item, item_col, indent);
            out.push_str(&dash);
            out.push_str(&nested[item_col..]);
        } else {
            out.push_str(&dash);
            out.push_str(&scalar(item, item_col));
            out.push('\n');
        }
    }
}

fn write_node(out: &mut String, value: &Value, col: usize, indent: usize) {
    match value {
        Value::Object(_) => write_mapping(out, value, col, indent),
        Value::Array(_) => write_sequence(out, value, col, indent),
        _ => {}
    }
}

/// Scalar text; multi-line strings become literal blocks whose content sits
/// at column `content_col`.
fn scalar(value: &Value, content_col: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.contains('\n') => literal_block(s, content_col),
        Value::String(s) => single_line(s),
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
    }
}

fn single_line(s: &str) -> String {
    if s.contains('\n') {
        return Value::String(s.to_string()).to_string();
    }
    match serde_yaml::to_string(s) {
        Ok(text) => text.trim_end_matches('\n').to_string(),
        Err(_) => Value::String(s.to_string()).to_string(),
    }
}

fn literal_block(s: &str, content_col: usize) -> String {
    let body = s.trim_end_matches('\n');
    let trailing = s.len() - body.len();
    let needs_quoting = body.is_empty()
        || body.starts_with([' ', '\t'])
        || body.chars().any(|c| c.is_control() && c != '\n' && c != '\t');
    if needs_quoting {
        return Value::String(s.to_string()).to_string();
    }

    let chomp = match trailing {
        0 => "-",
        1 => "",
        _ => "+",
    };
    let pad = " ".repeat(content_col);
    let mut block = format!("|{}", chomp);
    for line in body.split('\n') {
        block.push('\n');
        if !line.is_empty() {
            block.push_str(&pad);
            block.push_str(line);
        }
    }
    for _ in 1..trailing {
        block.push('\n');
    }
    block
}
