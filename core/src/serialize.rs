//! Cycle-safe rendering of script values as text.
//!
//! # Design
//! `serialize` is what the report goes through before it is printed: plain
//! objects become compact JSON, anything else prints the way JS `toString`
//! would. Object identity (the `Rc` pointer) is tracked during the walk and
//! every revisited object or array is left out, so self-referential graphs
//! terminate instead of recursing forever. The same writer backs the
//! script-visible `JSON.stringify`, which rejects cycles instead.

use std::collections::HashSet;

use crate::script::{Thrown, Value};

/// What to do when the walk reaches an object it has already visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycles {
    /// Drop the repeated occurrence (member removed, array slot `null`).
    Omit,
    /// Throw a `TypeError` when a value contains one of its ancestors.
    Reject,
}

/// Render a value for output. Never fails, even on cyclic graphs.
pub fn serialize(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Error(_) | Value::Regex(_) | Value::Assertion(_) => to_json(value, Cycles::Omit, "")
            .ok()
            .flatten()
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// `JSON.stringify(value, null, indent)`; `None` when the value has no JSON form.
pub fn to_json(value: &Value, cycles: Cycles, indent: &str) -> Result<Option<String>, Thrown> {
    let mut writer = JsonWriter {
        out: String::new(),
        cycles,
        indent,
        visited: HashSet::new(),
        ancestors: Vec::new(),
    };
    if writer.write(value, 0)? {
        Ok(Some(writer.out))
    } else {
        Ok(None)
    }
}

struct JsonWriter<'a> {
    out: String,
    cycles: Cycles,
    indent: &'a str,
    visited: HashSet<*const ()>,
    ancestors: Vec<*const ()>,
}

/// Values JSON has no representation for.
fn skipped(value: &Value) -> bool {
    matches!(value, Value::Undefined | Value::Function(_))
}

impl JsonWriter<'_> {
    /// Whether `value` may be written, recording it as visited if so.
    fn enter(&mut self, value: &Value) -> Result<bool, Thrown> {
        let Some(id) = value.identity() else {
            return Ok(true);
        };
        match self.cycles {
            Cycles::Omit => Ok(self.visited.insert(id)),
            Cycles::Reject => {
                if self.ancestors.contains(&id) {
                    return Err(Thrown::type_error("Converting circular structure to JSON"));
                }
                self.ancestors.push(id);
                Ok(true)
            }
        }
    }

    fn leave(&mut self) {
        if self.cycles == Cycles::Reject {
            self.ancestors.pop();
        }
    }

    fn newline(&mut self, depth: usize) {
        if !self.indent.is_empty() {
            self.out.push('\n');
            for _ in 0..depth {
                self.out.push_str(self.indent);
            }
        }
    }

    /// Write `value`; returns `false` when nothing was written.
    fn write(&mut self, value: &Value, depth: usize) -> Result<bool, Thrown> {
        match value {
            Value::Undefined | Value::Function(_) => return Ok(false),
            Value::Null => self.out.push_str("null"),
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) if n.is_finite() => self.out.push_str(&value.to_string()),
            Value::Number(_) => self.out.push_str("null"),
            Value::String(s) => self.write_string(s),
            Value::Array(items) => {
                if !self.enter(value)? {
                    return Ok(false);
                }
                let items = items.borrow().clone();
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.newline(depth + 1);
                    if !self.write(item, depth + 1)? {
                        self.out.push_str("null");
                    }
                }
                if !items.is_empty() {
                    self.newline(depth);
                }
                self.out.push(']');
                self.leave();
            }
            Value::Object(obj) => {
                if !self.enter(value)? {
                    return Ok(false);
                }
                let entries: Vec<(String, Value)> =
                    obj.borrow().iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
                self.write_members(&entries, depth)?;
                self.leave();
            }
            // errors, regexes and assertions have no enumerable own properties
            Value::Error(_) | Value::Regex(_) | Value::Assertion(_) => {
                if !self.enter(value)? {
                    return Ok(false);
                }
                self.out.push_str("{}");
                self.leave();
            }
        }
        Ok(true)
    }

    fn write_members(&mut self, entries: &[(String, Value)], depth: usize) -> Result<(), Thrown> {
        self.out.push('{');
        let mut wrote_any = false;
        for (key, member) in entries {
            if skipped(member) {
                continue;
            }
            let rollback = self.out.len();
            if wrote_any {
                self.out.push(',');
            }
            self.newline(depth + 1);
            self.write_string(key);
            self.out.push(':');
            if !self.indent.is_empty() {
                self.out.push(' ');
            }
            if self.write(member, depth + 1)? {
                wrote_any = true;
            } else {
                self.out.truncate(rollback);
            }
        }
        if wrote_any {
            self.newline(depth);
        }
        self.out.push('}');
        Ok(())
    }

    fn write_string(&mut self, s: &str) {
        // serializing a str cannot fail
        let quoted = serde_json::to_string(s).unwrap_or_default();
        self.out.push_str(&quoted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Properties;

    fn object(entries: Vec<(&str, Value)>) -> Value {
        Value::object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn insert(target: &Value, key: &str, value: Value) {
        if let Value::Object(obj) = target {
            obj.borrow_mut().insert(key, value);
        }
    }

    #[test]
    fn primitives_and_arrays_use_to_string() {
        assert_eq!(serialize(&Value::Number(3.0)), "3");
        assert_eq!(serialize(&Value::from("text")), "text");
        assert_eq!(serialize(&Value::Null), "null");
        let arr = Value::array(vec![Value::Number(1.0), Value::from("a")]);
        assert_eq!(serialize(&arr), "1,a");
    }

    #[test]
    fn objects_render_as_compact_json() {
        let value = object(vec![
            ("a", Value::Number(1.0)),
            ("b", Value::array(vec![Value::Bool(true), Value::Undefined])),
            ("skip", Value::Undefined),
            ("s", Value::from("quote\"d")),
            ("inf", Value::Number(f64::INFINITY)),
        ]);
        assert_eq!(serialize(&value), r#"{"a":1,"b":[true,null],"s":"quote\"d","inf":null}"#);
    }

    #[test]
    fn self_reference_is_omitted() {
        let root = object(vec![("name", Value::from("root"))]);
        insert(&root, "me", root.clone());
        assert_eq!(serialize(&root), r#"{"name":"root"}"#);
    }

    #[test]
    fn revisited_sibling_is_omitted_and_array_slot_nulled() {
        let shared = object(vec![("x", Value::Number(1.0))]);
        let root = object(vec![
            ("first", shared.clone()),
            ("second", shared.clone()),
            ("list", Value::array(vec![shared])),
        ]);
        assert_eq!(serialize(&root), r#"{"first":{"x":1},"list":[null]}"#);
    }

    #[test]
    fn distinct_but_equal_objects_are_both_written() {
        let root = object(vec![
            ("a", Value::object(Properties::new())),
            ("b", Value::object(Properties::new())),
        ]);
        assert_eq!(serialize(&root), r#"{"a":{},"b":{}}"#);
    }

    #[test]
    fn reject_mode_throws_on_cycles_but_allows_repeats() {
        let root = object(vec![]);
        insert(&root, "me", root.clone());
        let err = to_json(&root, Cycles::Reject, "").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Converting circular structure to JSON");

        let shared = object(vec![]);
        let root = object(vec![("a", shared.clone()), ("b", shared)]);
        assert_eq!(to_json(&root, Cycles::Reject, "").unwrap().as_deref(), Some(r#"{"a":{},"b":{}}"#));
    }

    #[test]
    fn indentation() {
        let value = object(vec![("a", Value::array(vec![Value::Number(1.0)])), ("b", object(vec![]))]);
        let rendered = to_json(&value, Cycles::Reject, "  ").unwrap().unwrap();
        assert_eq!(rendered, "{\n  \"a\": [\n    1\n  ],\n  \"b\": {}\n}");
    }

    #[test]
    fn undefined_has_no_json_form() {
        assert_eq!(to_json(&Value::Undefined, Cycles::Omit, "").unwrap(), None);
    }
}
