//! Human-readable rendering of values inside assertion messages.
//!
//! `inspect` renders a value the way chai's `inspect` does (`'text'`,
//! `[ 1, 2 ]`, `{ a: 1 }`), and `display` additionally collapses long
//! arrays and objects into `[ Array(n) ]` / `{ Object (a, b, ...) }` so
//! failure messages stay readable for large response bodies.

use std::rc::Rc;

use super::value::{format_number, Value};

/// Rendered length at which `display` collapses arrays and objects.
pub const TRUNCATE_THRESHOLD: usize = 40;

/// Nested depth rendered before falling back to `[Object]` / `[Array]`.
const MAX_DEPTH: usize = 2;

pub fn inspect(value: &Value) -> String {
    let mut seen = Vec::new();
    inspect_at(value, 0, &mut seen)
}

/// Rendering used for `#{this}` / `#{exp}` / `#{act}` in failure messages.
pub fn display(value: &Value) -> String {
    let rendered = inspect(value);
    if rendered.chars().count() < TRUNCATE_THRESHOLD {
        return rendered;
    }
    match value {
        Value::Array(items) => format!("[ Array({}) ]", items.borrow().len()),
        Value::Object(obj) => {
            let obj = obj.borrow();
            let keys: Vec<&str> = obj.keys().collect();
            let listed = if keys.len() > 2 {
                format!("{}, ...", keys[..2].join(", "))
            } else {
                keys.join(", ")
            };
            format!("{{ Object ({listed}) }}")
        }
        Value::Function(f) => format!("[Function: {}]", f.name),
        _ => rendered,
    }
}

/// Quote a string the way chai prints it, truncating overly long text.
pub fn quote(s: &str) -> String {
    let limit = TRUNCATE_THRESHOLD - 2;
    let mut body: String = if s.chars().count() > limit {
        let mut cut: String = s.chars().take(limit - 1).collect();
        cut.push('…');
        cut
    } else {
        s.to_string()
    };
    body = body
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    format!("'{body}'")
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn inspect_at(value: &Value, depth: usize, seen: &mut Vec<*const ()>) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if *n == 0.0 && n.is_sign_negative() => "-0".to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => quote(s),
        Value::Regex(re) => format!("/{}/{}", re.source, re.flags),
        Value::Function(f) => format!("[Function {}]", f.name),
        Value::Error(err) if err.message.is_empty() => err.kind.name().to_string(),
        Value::Error(err) => format!("{}: {}", err.kind.name(), err.message),
        Value::Assertion(_) => "{ Assertion }".to_string(),
        Value::Array(items) => {
            let id = Rc::as_ptr(items) as *const ();
            if seen.contains(&id) {
                return "[Circular]".to_string();
            }
            let items = items.borrow();
            if items.is_empty() {
                return "[]".to_string();
            }
            if depth > MAX_DEPTH {
                return "[Array]".to_string();
            }
            seen.push(id);
            let parts: Vec<String> = items.iter().map(|item| inspect_at(item, depth + 1, seen)).collect();
            seen.pop();
            format!("[ {} ]", parts.join(", "))
        }
        Value::Object(obj) => {
            let id = Rc::as_ptr(obj) as *const ();
            if seen.contains(&id) {
                return "[Circular]".to_string();
            }
            let obj = obj.borrow();
            if obj.is_empty() {
                return "{}".to_string();
            }
            if depth > MAX_DEPTH {
                return "[Object]".to_string();
            }
            seen.push(id);
            let parts: Vec<String> = obj
                .iter()
                .map(|(key, v)| {
                    let key = if is_plain_key(key) { key.to_string() } else { quote(key) };
                    format!("{key}: {}", inspect_at(v, depth + 1, seen))
                })
                .collect();
            seen.pop();
            format!("{{ {} }}", parts.join(", "))
        }
    }
}
