//! Runtime values for assertion scripts.
//!
//! # Design
//! Values follow JavaScript semantics closely enough that assertions written
//! against JSON response bodies behave the way their authors expect: arrays
//! and objects are shared by reference (`Rc<RefCell<..>>`) so identity is
//! observable, objects keep insertion order, and every conversion
//! (`truthy`, `to_number`, `Display`) mirrors the JS abstract operation of
//! the same name.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use regex::Regex;

use super::error::{ErrorKind, Thrown};
use super::expect::Assertion;
use super::inspect;

/// Signature of every native function: bound receiver plus arguments.
pub type NativeFn = fn(&Value, &[Value]) -> Result<Value, Thrown>;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<Properties>>;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Regex(Rc<RegexValue>),
    Function(Rc<Function>),
    Error(Rc<ErrorValue>),
    Assertion(Rc<Assertion>),
}

/// Insertion-ordered property list of a plain object.
#[derive(Clone, Default)]
pub struct Properties {
    entries: Vec<(String, Value)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// A compiled regular expression literal.
#[derive(Debug)]
pub struct RegexValue {
    pub source: String,
    pub flags: String,
    pub regex: Regex,
}

impl RegexValue {
    pub fn new(source: &str, flags: &str) -> Result<Self, String> {
        let mut builder = regex::RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' => {}
                other => return Err(format!("Invalid flags supplied to RegExp constructor '{other}'")),
            }
        }
        let regex = builder
            .build()
            .map_err(|err| format!("Invalid regular expression: /{source}/: {err}"))?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }
}

/// A native function, optionally bound to a receiver.
pub struct Function {
    pub name: &'static str,
    pub this: Value,
    pub call: NativeFn,
    /// Whether `new` may be applied to it.
    pub constructible: bool,
    /// Static members such as `Object.keys` or `expect.fail`.
    pub statics: Vec<(&'static str, Value)>,
}

impl Function {
    pub fn value(name: &'static str, call: NativeFn) -> Value {
        Value::Function(Rc::new(Function {
            name,
            this: Value::Undefined,
            call,
            constructible: false,
            statics: Vec::new(),
        }))
    }

    pub fn bound(name: &'static str, this: Value, call: NativeFn) -> Value {
        Value::Function(Rc::new(Function {
            name,
            this,
            call,
            constructible: false,
            statics: Vec::new(),
        }))
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, Thrown> {
        (self.call)(&self.this, args)
    }
}

/// An error object.
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Properties) -> Value {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Value {
        Value::Error(Rc::new(ErrorValue {
            kind,
            message: message.into(),
        }))
    }

    /// Convert parsed JSON into a fresh, unshared script value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Regex(_)
            | Value::Error(_)
            | Value::Assertion(_) => "object",
        }
    }

    /// Detailed type name as reported by type detection (`null`, `array`, `regexp`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Regex(_) => "regexp",
            Value::Error(_) => "error",
            Value::Assertion(_) => "object",
            other => other.type_of(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_string()),
            _ => f64::NAN,
        }
    }

    /// Primitive used by `+`, `==` and relational operators: arrays and
    /// objects collapse to their string form.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Regex(_) | Value::Error(_) | Value::Function(_) | Value::Assertion(_) => {
                Value::from(self.to_string())
            }
            other => other.clone(),
        }
    }

    /// Identity of a reference value, used for cycle tracking.
    pub fn identity(&self) -> Option<*const ()> {
        match self {
            Value::Array(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Regex(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Function(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Error(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Assertion(rc) => Some(Rc::as_ptr(rc) as *const ()),
            _ => None,
        }
    }

    /// The `===` operator.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) => match (a.identity(), b.identity()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// The `==` operator.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (a, b) if a.identity().is_some() && b.identity().is_none() => a.to_primitive().loose_equals(b),
            (a, b) if a.identity().is_none() && b.identity().is_some() => a.loose_equals(&b.to_primitive()),
            _ => self.strict_equals(other),
        }
    }

    /// Structural equality used by `eql` and the `deep` flag.
    pub fn deep_equals(&self, other: &Value) -> bool {
        deep_equals(self, other, &mut HashSet::new())
    }

    /// The `instanceof` check against a built-in constructor name.
    pub fn is_instance_of(&self, class: &str) -> bool {
        match self {
            Value::Array(_) => matches!(class, "Array" | "Object"),
            Value::Object(_) | Value::Assertion(_) => class == "Object",
            Value::Regex(_) => matches!(class, "RegExp" | "Object"),
            Value::Function(_) => matches!(class, "Function" | "Object"),
            Value::Error(err) => class == "Object" || err.kind.is_instance_of(class),
            _ => false,
        }
    }

    /// Own enumerable keys, as `Object.keys` reports them.
    pub fn own_keys(&self) -> Vec<String> {
        match self {
            Value::Object(obj) => obj.borrow().keys().map(str::to_string).collect(),
            Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    fn write_js_string(&self, out: &mut String, stack: &mut Vec<*const ()>) {
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::String(s) => out.push_str(s),
            Value::Array(items) => {
                let id = Rc::as_ptr(items) as *const ();
                if stack.contains(&id) {
                    return;
                }
                stack.push(id);
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if !item.is_nullish() {
                        item.write_js_string(out, stack);
                    }
                }
                stack.pop();
            }
            Value::Object(_) | Value::Assertion(_) => out.push_str("[object Object]"),
            Value::Regex(re) => {
                out.push('/');
                out.push_str(&re.source);
                out.push('/');
                out.push_str(&re.flags);
            }
            Value::Function(f) => {
                out.push_str("function ");
                out.push_str(f.name);
                out.push_str("() { [native code] }");
            }
            Value::Error(err) => {
                out.push_str(err.kind.name());
                if !err.message.is_empty() {
                    out.push_str(": ");
                    out.push_str(&err.message);
                }
            }
        }
    }
}

/// JS `ToString`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_js_string(&mut out, &mut Vec::new());
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&inspect::inspect(self))
    }
}

fn deep_equals(a: &Value, b: &Value, seen: &mut HashSet<(*const (), *const ())>) -> bool {
    if let (Some(x), Some(y)) = (a.identity(), b.identity()) {
        if x == y || !seen.insert((x, y)) {
            return true;
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Array(x), Value::Array(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| deep_equals(l, r, seen))
        }
        (Value::Object(x), Value::Object(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(key, l)| match y.get(key) {
                    Some(r) => deep_equals(l, r, seen),
                    None => false,
                })
        }
        (Value::Regex(x), Value::Regex(y)) => x.source == y.source && x.flags == y.flags,
        (Value::Error(x), Value::Error(y)) => x.kind == y.kind && x.message == y.message,
        _ => a.strict_equals(b),
    }
}

/// JS `StringToNumber`.
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => s.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// JS `Number::toString`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let s = format!("{n:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    format!("{n}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_js() {
        assert_eq!(format_number(200.0), "200");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn array_to_string_joins_and_blanks_nullish() {
        let arr = Value::array(vec![Value::Number(1.0), Value::Null, Value::from("x"), Value::Undefined]);
        assert_eq!(arr.to_string(), "1,,x,");
    }

    #[test]
    fn self_containing_array_to_string_terminates() {
        let arr = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(items) = &arr {
            items.borrow_mut().push(arr.clone());
        }
        assert_eq!(arr.to_string(), "1,");
    }

    #[test]
    fn strict_equality_uses_identity_for_objects() {
        let a = Value::object(Properties::new());
        let b = Value::object(Properties::new());
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
        assert!(a.deep_equals(&b));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(Value::Number(404.0).loose_equals(&Value::from("404")));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
    }

    #[test]
    fn deep_equality_treats_nan_as_equal() {
        assert!(Value::Number(f64::NAN).deep_equals(&Value::Number(f64::NAN)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn from_json_keeps_key_order() {
        let json: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.own_keys(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn string_to_number_follows_js() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert!(string_to_number("12px").is_nan());
    }
}
