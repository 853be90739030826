//! Global bindings and the members of built-in value types.

use std::rc::Rc;

use regex::Regex;

use super::error::{ErrorKind, Thrown};
use super::value::{format_number, Function, NativeFn, Properties, Value};
use crate::serialize::{self, Cycles};

/// Every global visible to a script besides the caller's own bindings.
pub fn globals() -> Vec<(&'static str, Value)> {
    vec![
        ("undefined", Value::Undefined),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("JSON", namespace(&[("stringify", json_stringify), ("parse", json_parse)])),
        ("Math", math()),
        (
            "Object",
            constructor(
                "Object",
                object_ctor,
                &[("keys", object_keys), ("values", object_values), ("entries", object_entries)],
            ),
        ),
        ("Array", constructor("Array", array_ctor, &[("isArray", array_is_array)])),
        (
            "Number",
            constructor(
                "Number",
                number_ctor,
                &[
                    ("isInteger", number_is_integer),
                    ("isFinite", number_is_finite),
                    ("isNaN", number_is_nan),
                    ("parseFloat", parse_float),
                    ("parseInt", parse_int),
                ],
            ),
        ),
        ("String", constructor("String", string_ctor, &[])),
        ("Boolean", constructor("Boolean", boolean_ctor, &[])),
        ("parseInt", Function::value("parseInt", parse_int)),
        ("parseFloat", Function::value("parseFloat", parse_float)),
        ("isNaN", Function::value("isNaN", is_nan)),
        ("isFinite", Function::value("isFinite", is_finite)),
        ("Error", error_constructor(ErrorKind::Error)),
        ("TypeError", error_constructor(ErrorKind::TypeError)),
        ("RangeError", error_constructor(ErrorKind::RangeError)),
        ("ReferenceError", error_constructor(ErrorKind::ReferenceError)),
        ("SyntaxError", error_constructor(ErrorKind::SyntaxError)),
    ]
}

fn namespace(members: &[(&'static str, NativeFn)]) -> Value {
    Value::object(
        members
            .iter()
            .map(|(name, call)| (name.to_string(), Function::value(name, *call)))
            .collect(),
    )
}

fn constructor(name: &'static str, call: NativeFn, statics: &[(&'static str, NativeFn)]) -> Value {
    Value::Function(Rc::new(Function {
        name,
        this: Value::Undefined,
        call,
        constructible: true,
        statics: statics
            .iter()
            .map(|(member, call)| (*member, Function::value(member, *call)))
            .collect(),
    }))
}

/// Constructor for an error class; `Error(msg)` and `new Error(msg)` behave the same.
pub fn error_constructor(kind: ErrorKind) -> Value {
    let call: NativeFn = match kind {
        ErrorKind::Error => error_ctor,
        ErrorKind::TypeError => type_error_ctor,
        ErrorKind::ReferenceError => reference_error_ctor,
        ErrorKind::RangeError => range_error_ctor,
        ErrorKind::SyntaxError => syntax_error_ctor,
        ErrorKind::AssertionError => assertion_error_ctor,
    };
    Value::Function(Rc::new(Function {
        name: kind.name(),
        this: Value::Undefined,
        call,
        constructible: true,
        statics: Vec::new(),
    }))
}

fn error_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(make_error(ErrorKind::Error, args))
}

fn type_error_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(make_error(ErrorKind::TypeError, args))
}

fn reference_error_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(make_error(ErrorKind::ReferenceError, args))
}

fn range_error_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(make_error(ErrorKind::RangeError, args))
}

fn syntax_error_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(make_error(ErrorKind::SyntaxError, args))
}

fn assertion_error_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(make_error(ErrorKind::AssertionError, args))
}

fn make_error(kind: ErrorKind, args: &[Value]) -> Value {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(m) => m.to_string(),
    };
    Value::error(kind, message)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

// ============================================================================
// Property access
// ============================================================================

/// `target[key]` for every kind of value.
pub fn get(target: &Value, key: &str) -> Result<Value, Thrown> {
    let method = |name: &'static str, call: NativeFn| -> Result<Value, Thrown> {
        Ok(Function::bound(name, target.clone(), call))
    };
    match target {
        Value::Undefined | Value::Null => Err(Thrown::type_error(format!(
            "Cannot read properties of {target} (reading '{key}')"
        ))),
        Value::Assertion(assertion) => assertion.get(key),
        Value::Object(obj) => {
            if let Some(value) = obj.borrow().get(key) {
                return Ok(value.clone());
            }
            match key {
                "hasOwnProperty" => method("hasOwnProperty", object_has_own_property),
                "toString" => method("toString", to_string),
                _ => Ok(Value::Undefined),
            }
        }
        Value::Array(items) => {
            if let Ok(index) = key.parse::<usize>() {
                return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
            }
            match key {
                "length" => Ok(Value::Number(items.borrow().len() as f64)),
                "includes" => method("includes", array_includes),
                "indexOf" => method("indexOf", array_index_of),
                "join" => method("join", array_join),
                "slice" => method("slice", array_slice),
                "concat" => method("concat", array_concat),
                "at" => method("at", array_at),
                "push" => method("push", array_push),
                "toString" => method("toString", to_string),
                _ => Ok(Value::Undefined),
            }
        }
        Value::String(s) => {
            if let Ok(index) = key.parse::<usize>() {
                return Ok(s.chars().nth(index).map(|c| Value::from(c.to_string())).unwrap_or(Value::Undefined));
            }
            match key {
                "length" => Ok(Value::Number(s.encode_utf16().count() as f64)),
                "includes" => method("includes", string_includes),
                "startsWith" => method("startsWith", string_starts_with),
                "endsWith" => method("endsWith", string_ends_with),
                "indexOf" => method("indexOf", string_index_of),
                "toLowerCase" => method("toLowerCase", string_to_lower_case),
                "toUpperCase" => method("toUpperCase", string_to_upper_case),
                "trim" => method("trim", string_trim),
                "split" => method("split", string_split),
                "slice" => method("slice", string_slice),
                "charAt" => method("charAt", string_char_at),
                "replace" => method("replace", string_replace),
                "toString" => method("toString", to_string),
                _ => Ok(Value::Undefined),
            }
        }
        Value::Number(_) => match key {
            "toFixed" => method("toFixed", number_to_fixed),
            "toString" => method("toString", to_string),
            _ => Ok(Value::Undefined),
        },
        Value::Bool(_) => match key {
            "toString" => method("toString", to_string),
            _ => Ok(Value::Undefined),
        },
        Value::Regex(re) => match key {
            "source" => Ok(Value::from(re.source.as_str())),
            "flags" => Ok(Value::from(re.flags.as_str())),
            "test" => method("test", regex_test),
            "toString" => method("toString", to_string),
            _ => Ok(Value::Undefined),
        },
        Value::Error(err) => match key {
            "message" => Ok(Value::from(err.message.as_str())),
            "name" => Ok(Value::from(err.kind.name())),
            "toString" => method("toString", to_string),
            _ => Ok(Value::Undefined),
        },
        Value::Function(f) => {
            if key == "name" {
                return Ok(Value::from(f.name));
            }
            Ok(f.statics
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Undefined))
        }
    }
}

/// Largest length an array may have.
const MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;
/// Largest array a script may make the interpreter allocate.
const MAX_ALLOCATED_LENGTH: usize = 1 << 24;

/// Validate a script-supplied array length before anything is allocated.
fn array_length(n: f64) -> Result<usize, Thrown> {
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > MAX_ARRAY_LENGTH {
        return Err(Thrown::error(ErrorKind::RangeError, "Invalid array length"));
    }
    let len = n as usize;
    if len > MAX_ALLOCATED_LENGTH {
        return Err(Thrown::error(
            ErrorKind::RangeError,
            format!("Array length {len} exceeds the limit of {MAX_ALLOCATED_LENGTH}"),
        ));
    }
    Ok(len)
}

/// `target[key] = value`.
pub fn set(target: &Value, key: &str, value: Value) -> Result<(), Thrown> {
    match target {
        Value::Undefined | Value::Null => Err(Thrown::type_error(format!(
            "Cannot set properties of {target} (setting '{key}')"
        ))),
        Value::Object(obj) => {
            obj.borrow_mut().insert(key, value);
            Ok(())
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = array_length(value.to_number())?;
                items.resize(len, Value::Undefined);
            } else if let Ok(index) = key.parse::<u32>() {
                // 2^32 - 1 is a plain property name, not an index
                if index == u32::MAX {
                    return Ok(());
                }
                let index = index as usize;
                if index >= items.len() {
                    let len = array_length(index as f64 + 1.0)?;
                    items.resize(len, Value::Undefined);
                }
                items[index] = value;
            }
            Ok(())
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Err(Thrown::type_error(format!(
            "Cannot create property '{key}' on {} '{target}'",
            target.type_of()
        ))),
        _ => Ok(()),
    }
}

/// The `in` operator.
pub fn has(target: &Value, key: &str) -> Result<bool, Thrown> {
    match target {
        Value::Object(obj) => Ok(obj.borrow().contains_key(key)),
        Value::Array(items) => Ok(key == "length" || key.parse::<usize>().is_ok_and(|i| i < items.borrow().len())),
        Value::Error(_) => Ok(matches!(key, "message" | "name")),
        Value::Function(f) => Ok(key == "name" || f.statics.iter().any(|(name, _)| *name == key)),
        Value::Regex(_) | Value::Assertion(_) => Ok(false),
        _ => Err(Thrown::type_error(format!(
            "Cannot use 'in' operator to search for '{key}' in {target}"
        ))),
    }
}

fn to_string(this: &Value, _args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::from(this.to_string()))
}

// ============================================================================
// Globals
// ============================================================================

fn json_stringify(_this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let indent = match arg(args, 2) {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let rendered = serialize::to_json(&arg(args, 0), Cycles::Reject, &indent)?;
    Ok(rendered.map(Value::from).unwrap_or(Value::Undefined))
}

fn json_parse(_this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let text = arg(args, 0).to_string();
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(Value::from_json(&json)),
        Err(err) => Err(Thrown::error(
            ErrorKind::SyntaxError,
            format!("Unexpected token in JSON at line {} column {}", err.line(), err.column()),
        )),
    }
}

fn math() -> Value {
    let mut props: Properties = [
        ("abs", math_abs as NativeFn),
        ("floor", math_floor),
        ("ceil", math_ceil),
        ("round", math_round),
        ("trunc", math_trunc),
        ("sqrt", math_sqrt),
        ("pow", math_pow),
        ("min", math_min),
        ("max", math_max),
    ]
    .iter()
    .map(|(name, call)| (name.to_string(), Function::value(name, *call)))
    .collect();
    props.insert("PI", Value::Number(std::f64::consts::PI));
    props.insert("E", Value::Number(std::f64::consts::E));
    Value::object(props)
}

fn unary_math(args: &[Value], op: fn(f64) -> f64) -> Result<Value, Thrown> {
    Ok(Value::Number(op(arg(args, 0).to_number())))
}

fn math_abs(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    unary_math(args, f64::abs)
}

fn math_floor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    unary_math(args, f64::floor)
}

fn math_ceil(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    unary_math(args, f64::ceil)
}

fn math_round(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    // JS rounds halves towards +Infinity
    unary_math(args, |n| (n + 0.5).floor())
}

fn math_trunc(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    unary_math(args, f64::trunc)
}

fn math_sqrt(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    unary_math(args, f64::sqrt)
}

fn math_pow(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
}

fn math_min(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.min(n)
        }
    })))
}

fn math_max(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.max(n)
        }
    })))
}

fn object_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(Value::object(Properties::new())),
        other => Ok(other),
    }
}

fn object_keys(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let target = require_object(&arg(args, 0))?;
    Ok(Value::array(target.own_keys().into_iter().map(Value::from).collect()))
}

fn object_values(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let target = require_object(&arg(args, 0))?;
    let values = target
        .own_keys()
        .iter()
        .map(|key| get(&target, key))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(values))
}

fn object_entries(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let target = require_object(&arg(args, 0))?;
    let entries = target
        .own_keys()
        .into_iter()
        .map(|key| {
            let value = get(&target, &key)?;
            Ok(Value::array(vec![Value::from(key), value]))
        })
        .collect::<Result<Vec<_>, Thrown>>()?;
    Ok(Value::array(entries))
}

fn require_object(value: &Value) -> Result<Value, Thrown> {
    if value.is_nullish() {
        return Err(Thrown::type_error("Cannot convert undefined or null to object"));
    }
    Ok(value.clone())
}

fn object_has_own_property(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let key = arg(args, 0).to_string();
    Ok(Value::Bool(this.own_keys().contains(&key)))
}

fn array_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    match args {
        [Value::Number(n)] => Ok(Value::array(vec![Value::Undefined; array_length(*n)?])),
        _ => Ok(Value::array(args.to_vec())),
    }
}

fn array_is_array(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
}

fn number_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn number_is_integer(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
}

fn number_is_finite(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
}

fn number_is_nan(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
}

fn string_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::from(args.first().map(Value::to_string).unwrap_or_default()))
}

fn boolean_ctor(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(arg(args, 0).truthy()))
}

fn is_nan(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
}

fn is_finite(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
}

fn parse_int(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let text = arg(args, 0).to_string();
    let mut rest = text.trim_start();
    let negative = rest.starts_with('-');
    rest = rest.strip_prefix(['-', '+']).unwrap_or(rest);

    let mut radix = match arg(args, 1) {
        Value::Undefined => 10,
        r => r.to_number() as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if (radix == 16 || matches!(arg(args, 1), Value::Undefined))
        && (rest.starts_with("0x") || rest.starts_with("0X"))
    {
        rest = &rest[2..];
        radix = 16;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: String = rest.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let magnitude = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    Ok(Value::Number(if negative { -magnitude } else { magnitude }))
}

fn parse_float(_: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let text = arg(args, 0).to_string();
    let rest = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if rest.starts_with(prefix) {
            return Ok(Value::Number(f64::INFINITY));
        }
    }
    if rest.starts_with("-Infinity") {
        return Ok(Value::Number(f64::NEG_INFINITY));
    }
    // longest prefix that parses as a decimal literal
    let candidate: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .collect();
    let parsed = (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok());
    Ok(Value::Number(parsed.unwrap_or(f64::NAN)))
}

// ============================================================================
// Member functions
// ============================================================================

fn this_str(this: &Value) -> Rc<str> {
    match this {
        Value::String(s) => s.clone(),
        other => Rc::from(other.to_string()),
    }
}

/// A position argument clamped to `0..=len`, in characters.
fn position(value: Value, default: usize, len: usize) -> usize {
    match value {
        Value::Undefined => default,
        v => {
            let n = v.to_number();
            if n.is_nan() || n <= 0.0 {
                0
            } else {
                (n.trunc() as usize).min(len)
            }
        }
    }
}

/// Byte offset of the character at `chars`, or the end of `s`.
fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(byte, _)| byte)
}

fn string_includes(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let s = this_str(this);
    let from = position(arg(args, 1), 0, s.chars().count());
    Ok(Value::Bool(s[byte_offset(&s, from)..].contains(&*arg(args, 0).to_string())))
}

fn string_starts_with(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let s = this_str(this);
    let from = position(arg(args, 1), 0, s.chars().count());
    Ok(Value::Bool(s[byte_offset(&s, from)..].starts_with(&*arg(args, 0).to_string())))
}

fn string_ends_with(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let s = this_str(this);
    let len = s.chars().count();
    let end = position(arg(args, 1), len, len);
    Ok(Value::Bool(s[..byte_offset(&s, end)].ends_with(&*arg(args, 0).to_string())))
}

fn string_index_of(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let s = this_str(this);
    let from = position(arg(args, 1), 0, s.chars().count());
    let start = byte_offset(&s, from);
    let index = s[start..]
        .find(&*arg(args, 0).to_string())
        .map_or(-1.0, |byte| (from + s[start..start + byte].chars().count()) as f64);
    Ok(Value::Number(index))
}

fn string_to_lower_case(this: &Value, _args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::from(this_str(this).to_lowercase()))
}

fn string_to_upper_case(this: &Value, _args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::from(this_str(this).to_uppercase()))
}

fn string_trim(this: &Value, _args: &[Value]) -> Result<Value, Thrown> {
    Ok(Value::from(this_str(this).trim()))
}

fn string_split(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let s = this_str(this);
    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::String(s.clone())],
        Value::Regex(re) => re.regex.split(&s).map(Value::from).collect(),
        sep => {
            let sep = sep.to_string();
            if sep.is_empty() {
                s.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(Value::from).collect()
            }
        }
    };
    Ok(Value::array(parts))
}

/// Resolve JS `slice` bounds (negative counts from the end) against `len`.
fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let resolve = |value: Value, default: usize| -> usize {
        match value {
            Value::Undefined => default,
            v => {
                let n = v.to_number();
                let n = if n.is_nan() { 0.0 } else { n.trunc() };
                if n < 0.0 {
                    (len as f64 + n).max(0.0) as usize
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = resolve(arg(args, 0), 0);
    let end = resolve(arg(args, 1), len);
    (start, end.max(start))
}

fn string_slice(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let chars: Vec<char> = this_str(this).chars().collect();
    let (start, end) = slice_bounds(args, chars.len());
    Ok(Value::from(chars[start..end].iter().collect::<String>()))
}

fn string_char_at(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let index = arg(args, 0).to_number();
    let index = if index.is_nan() { 0 } else { index as usize };
    Ok(Value::from(this_str(this).chars().nth(index).map(String::from).unwrap_or_default()))
}

fn string_replace(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let s = this_str(this);
    let template = arg(args, 1).to_string();
    let replaced = match arg(args, 0) {
        Value::Regex(re) => {
            let replacement = replacement_template(&template, &re.regex);
            if re.flags.contains('g') {
                re.regex.replace_all(&s, replacement.as_str()).into_owned()
            } else {
                re.regex.replace(&s, replacement.as_str()).into_owned()
            }
        }
        pattern => {
            let literal = Regex::new(&regex::escape(&pattern.to_string()))
                .map_err(|err| Thrown::error(ErrorKind::RangeError, err.to_string()))?;
            let replacement = replacement_template(&template, &literal);
            literal.replace(&s, replacement.as_str()).into_owned()
        }
    };
    Ok(Value::from(replaced))
}

/// Rewrite a `replace` template (`$&`, `$1`, `$<name>`, `$$`) into `regex`
/// replacement syntax.
fn replacement_template(template: &str, regex: &Regex) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let (expanded, used) = expand_dollar(tail, regex);
        out.push_str(&expanded);
        rest = &tail[used..];
    }
    out.push_str(rest);
    out
}

/// One `$` given the text after it: its expansion and how much of `tail` it used.
/// A `$` that names no group stays literal.
fn expand_dollar(tail: &str, regex: &Regex) -> (String, usize) {
    if tail.starts_with('&') {
        return ("${0}".to_string(), 1);
    }
    if tail.starts_with('$') {
        return ("$$".to_string(), 1);
    }
    let groups = regex.captures_len();
    let digits = tail.bytes().take(2).take_while(u8::is_ascii_digit).count();
    for len in (1..=digits).rev() {
        if let Ok(n) = tail[..len].parse::<usize>() {
            if (1..groups).contains(&n) {
                return (format!("${{{n}}}"), len);
            }
        }
    }
    if let Some((name, _)) = tail.strip_prefix('<').and_then(|t| t.split_once('>')) {
        if regex.capture_names().flatten().any(|n| n == name) {
            return (format!("${{{name}}}"), name.len() + 2);
        }
    }
    ("$$".to_string(), 0)
}

fn number_to_fixed(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let digits = arg(args, 0).to_number();
    let digits = if digits.is_nan() { 0.0 } else { digits };
    if !(0.0..=100.0).contains(&digits) {
        return Err(Thrown::error(ErrorKind::RangeError, "toFixed() digits argument must be between 0 and 100"));
    }
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Value::from(format_number(n)));
    }
    Ok(Value::from(format!("{:.*}", digits as usize, n)))
}

fn regex_test(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    match this {
        Value::Regex(re) => Ok(Value::Bool(re.regex.is_match(&arg(args, 0).to_string()))),
        _ => Err(Thrown::type_error("RegExp.prototype.test called on incompatible receiver")),
    }
}

fn with_items<T>(this: &Value, f: impl FnOnce(&[Value]) -> T) -> Result<T, Thrown> {
    match this {
        Value::Array(items) => Ok(f(&items.borrow())),
        _ => Err(Thrown::type_error("Array method called on incompatible receiver")),
    }
}

fn array_includes(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let needle = arg(args, 0);
    with_items(this, |items| {
        // SameValueZero: NaN finds NaN
        Value::Bool(items.iter().any(|item| match (item, &needle) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => item.strict_equals(&needle),
        }))
    })
}

fn array_index_of(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let needle = arg(args, 0);
    with_items(this, |items| {
        Value::Number(items.iter().position(|item| item.strict_equals(&needle)).map_or(-1.0, |i| i as f64))
    })
}

fn array_join(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let sep = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => other.to_string(),
    };
    with_items(this, |items| {
        let parts: Vec<String> = items
            .iter()
            .map(|item| if item.is_nullish() { String::new() } else { item.to_string() })
            .collect();
        Value::from(parts.join(&sep))
    })
}

fn array_slice(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    with_items(this, |items| {
        let (start, end) = slice_bounds(args, items.len());
        Value::array(items[start..end].to_vec())
    })
}

fn array_concat(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let mut joined = with_items(this, <[Value]>::to_vec)?;
    for value in args {
        match value {
            Value::Array(more) => joined.extend(more.borrow().iter().cloned()),
            other => joined.push(other.clone()),
        }
    }
    Ok(Value::array(joined))
}

fn array_at(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let index = arg(args, 0).to_number();
    let index = if index.is_nan() { 0.0 } else { index.trunc() };
    with_items(this, |items| {
        let resolved = if index < 0.0 { items.len() as f64 + index } else { index };
        if resolved < 0.0 {
            return Value::Undefined;
        }
        items.get(resolved as usize).cloned().unwrap_or(Value::Undefined)
    })
}

fn array_push(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    match this {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Ok(Value::Number(items.len() as f64))
        }
        _ => Err(Thrown::type_error("Array method called on incompatible receiver")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::value::RegexValue;

    fn call(target: &Value, name: &str, args: &[Value]) -> Value {
        match get(target, name).unwrap() {
            Value::Function(f) => f.invoke(args).unwrap(),
            other => panic!("{name} is not a function: {other:?}"),
        }
    }

    fn global(name: &str) -> Value {
        globals().into_iter().find(|(n, _)| *n == name).map(|(_, v)| v).unwrap()
    }

    #[test]
    fn reading_from_undefined_is_a_type_error() {
        let err = get(&Value::Undefined, "body").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Cannot read properties of undefined (reading 'body')");
    }

    #[test]
    fn oversized_arrays_are_range_errors() {
        let array = global("Array");
        let Value::Function(ctor) = &array else { panic!("Array is not a function") };
        let err = ctor.invoke(&[Value::Number(1e300)]).unwrap_err();
        assert_eq!(err.to_string(), "RangeError: Invalid array length");
        let err = ctor.invoke(&[Value::Number(f64::from(1u32 << 30))]).unwrap_err();
        assert_eq!(err.to_string(), "RangeError: Array length 1073741824 exceeds the limit of 16777216");
        assert_eq!(ctor.invoke(&[Value::Number(3.0)]).unwrap().to_string(), ",,");

        let items = Value::array(vec![]);
        let err = set(&items, "length", Value::Number(1e300)).unwrap_err();
        assert_eq!(err.to_string(), "RangeError: Invalid array length");
        assert!(set(&items, "4294967294", Value::Number(1.0)).is_err());
        set(&items, "4294967295", Value::Number(1.0)).unwrap();
        set(&items, "2", Value::Number(1.0)).unwrap();
        assert_eq!(items.to_string(), ",,1");
    }

    #[test]
    fn string_search_positions() {
        let s = Value::from("日本語 é");
        assert!(!call(&s, "startsWith", &[Value::from("日"), Value::Number(1.0)]).truthy());
        assert!(call(&s, "startsWith", &[Value::from("本"), Value::Number(1.0)]).truthy());
        assert!(call(&s, "endsWith", &[Value::from("本"), Value::Number(2.0)]).truthy());
        assert!(!call(&s, "includes", &[Value::from("日"), Value::Number(1.0)]).truthy());
        assert_eq!(call(&s, "indexOf", &[Value::from("語"), Value::Number(99.0)]).as_number(), Some(-1.0));
        assert_eq!(call(&s, "indexOf", &[Value::from("é"), Value::Number(2.0)]).as_number(), Some(4.0));
        assert_eq!(call(&s, "indexOf", &[Value::from("語")]).as_number(), Some(2.0));
    }

    #[test]
    fn replace_expands_js_patterns() {
        let re = |source: &str, flags: &str| Value::Regex(Rc::new(RegexValue::new(source, flags).unwrap()));
        let s = Value::from("id=42");
        assert_eq!(call(&s, "replace", &[re("\\d+", ""), Value::from("[$&]")]).to_string(), "id=[42]");
        assert_eq!(call(&s, "replace", &[re("(\\w+)=(\\d+)", ""), Value::from("$2a$1")]).to_string(), "42aid");
        assert_eq!(call(&s, "replace", &[re("(\\d)", "g"), Value::from("$$$1")]).to_string(), "id=$4$2");
        assert_eq!(
            call(&s, "replace", &[re("(?<n>\\d+)", ""), Value::from("<$<n>>")]).to_string(),
            "id=<42>"
        );
        assert_eq!(call(&s, "replace", &[Value::from("42"), Value::from("$& $1")]).to_string(), "id=42 $1");
        assert_eq!(call(&s, "replace", &[Value::from("="), Value::from("$0")]).to_string(), "id$042");
    }

    #[test]
    fn string_members() {
        let s = Value::from("Hello, World");
        assert_eq!(get(&s, "length").unwrap().as_number(), Some(12.0));
        assert!(call(&s, "includes", &[Value::from("World")]).truthy());
        assert_eq!(call(&s, "toLowerCase", &[]).to_string(), "hello, world");
        assert_eq!(call(&s, "split", &[Value::from(", ")]).to_string(), "Hello,World");
        assert_eq!(call(&s, "slice", &[Value::Number(-5.0)]).to_string(), "World");
    }

    #[test]
    fn array_members() {
        let arr = Value::array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(get(&arr, "1").unwrap().as_number(), Some(2.0));
        assert_eq!(call(&arr, "indexOf", &[Value::Number(3.0)]).as_number(), Some(2.0));
        assert_eq!(call(&arr, "join", &[Value::from("-")]).to_string(), "1-2-3");
        assert!(call(&arr, "includes", &[Value::Number(2.0)]).truthy());
        assert_eq!(call(&arr, "at", &[Value::Number(-1.0)]).as_number(), Some(3.0));
    }

    #[test]
    fn object_statics() {
        let obj = Value::from_json(&serde_json::json!({"b": 1, "a": 2}));
        let keys = match get(&global("Object"), "keys").unwrap() {
            Value::Function(f) => f.invoke(&[obj]).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(keys.to_string(), "b,a");
    }

    #[test]
    fn parse_int_and_float() {
        let parse_int = |s: &str| super::parse_int(&Value::Undefined, &[Value::from(s)]).unwrap().to_number();
        assert_eq!(parse_int("42px"), 42.0);
        assert_eq!(parse_int("  -0x1F"), -31.0);
        assert!(parse_int("px").is_nan());
        let parse_float = |s: &str| super::parse_float(&Value::Undefined, &[Value::from(s)]).unwrap().to_number();
        assert_eq!(parse_float("3.5e2ms"), 350.0);
        assert_eq!(parse_float(".5"), 0.5);
    }

    #[test]
    fn error_constructors_produce_errors() {
        let Value::Function(ctor) = global("TypeError") else { unreachable!() };
        let err = ctor.invoke(&[Value::from("bad")]).unwrap();
        assert_eq!(err.to_string(), "TypeError: bad");
        assert!(err.is_instance_of("Error"));
    }

    #[test]
    fn setting_on_primitives_is_a_type_error() {
        let err = set(&Value::from("abc"), "x", Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Cannot create property 'x' on string 'abc'");
    }

    #[test]
    fn json_parse_round_trips_objects() {
        let Value::Object(json) = global("JSON") else { unreachable!() };
        let Some(Value::Function(parse)) = json.borrow().get("parse").cloned() else { unreachable!() };
        let parsed = parse.invoke(&[Value::from(r#"{"ok":true}"#)]).unwrap();
        assert!(get(&parsed, "ok").unwrap().truthy());
        assert!(parse.invoke(&[Value::from("{")]).is_err());
    }
}
