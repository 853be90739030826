//! The `expect` matcher library available to assertion scripts.
//!
//! # Design
//! Follows chai's BDD vocabulary so that assertions written for a chai-based
//! runner keep working: `expect(x).to.not.equal(y)`,
//! `expect(body).to.have.property('id').that.is.a('number')`, and so on.
//! Failure messages use chai's wording with `#{this}`, `#{exp}` and `#{act}`
//! placeholders rendered by [`inspect::display`].
//!
//! An `Assertion` is immutable: every chain step returns a new value with
//! updated flags, so a chain never leaks flags into another chain that
//! started from the same `expect(..)` call.

use std::rc::Rc;

use super::error::{ErrorKind, Thrown};
use super::inspect::{self, display};
use super::value::{format_number, Function, NativeFn, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub negate: bool,
    pub deep: bool,
    pub own: bool,
    pub nested: bool,
    pub ordered: bool,
    pub any: bool,
    pub all: bool,
    pub contains: bool,
    pub length: bool,
}

/// Methods that are also usable as bare chain properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chainable {
    A,
    Include,
    Length,
}

#[derive(Clone)]
pub struct Assertion {
    pub subject: Value,
    pub message: Option<String>,
    pub flags: Flags,
    pub pending: Option<Chainable>,
}

const LANGUAGE_CHAINS: &[&str] = &[
    "to", "be", "been", "is", "that", "which", "and", "has", "have", "with", "at", "of", "same", "but", "does", "still",
    "also",
];

/// The `expect` binding, with `expect.fail` attached.
pub fn expect_binding() -> Value {
    Value::Function(Rc::new(Function {
        name: "expect",
        this: Value::Undefined,
        call: expect_call,
        constructible: false,
        statics: vec![("fail", Function::value("fail", expect_fail))],
    }))
}

fn expect_call(_this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let message = match args.get(1) {
        None | Some(Value::Undefined) => None,
        Some(m) => Some(m.to_string()),
    };
    Ok(Assertion::new(arg(args, 0), message).into_value())
}

fn expect_fail(_this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let message = if args.len() < 2 { arg(args, 0) } else { arg(args, 2) };
    if message.truthy() {
        Err(Thrown::assertion(message.to_string()))
    } else {
        Err(Thrown::assertion("expect.fail()"))
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn receiver(this: &Value) -> Result<Rc<Assertion>, Thrown> {
    match this {
        Value::Assertion(a) => Ok(a.clone()),
        _ => Err(Thrown::type_error("Illegal invocation")),
    }
}

fn article(ty: &str) -> &'static str {
    if ty.starts_with(['a', 'e', 'i', 'o', 'u']) {
        "an "
    } else {
        "a "
    }
}

impl Assertion {
    pub fn new(subject: Value, message: Option<String>) -> Self {
        Self {
            subject,
            message,
            flags: Flags::default(),
            pending: None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Assertion(Rc::new(self))
    }

    fn with_subject(&self, subject: Value) -> Value {
        Assertion {
            subject,
            pending: None,
            ..self.clone()
        }
        .into_value()
    }

    /// A flag-free assertion sharing this one's custom message, for preconditions.
    fn inner(&self, subject: Value) -> Assertion {
        Assertion::new(subject, self.message.clone())
    }

    fn prefix(&self) -> String {
        self.message.as_ref().map(|m| format!("{m}: ")).unwrap_or_default()
    }

    fn fail(&self, message: impl AsRef<str>) -> Thrown {
        Thrown::assertion(format!("{}{}", self.prefix(), message.as_ref()))
    }

    fn assert(&self, ok: bool, positive: &str, negative: &str, expected: &Value, actual: Option<&Value>) -> Result<(), Thrown> {
        if ok != self.flags.negate {
            return Ok(());
        }
        let template = if self.flags.negate { negative } else { positive };
        let actual = actual.unwrap_or(&self.subject);
        let text = template
            .replace("#{this}", &display(&self.subject))
            .replace("#{act}", &display(actual))
            .replace("#{exp}", &display(expected));
        Err(self.fail(text))
    }

    fn require_type(&self, ty: &str) -> Result<(), Thrown> {
        let ok = self.subject.type_name() == ty;
        self.assert(
            ok,
            &format!("expected #{{this}} to be {}{ty}", article(ty)),
            "",
            &Value::Undefined,
            None,
        )
    }

    fn has_property(&self, name: &str) -> bool {
        match &self.subject {
            Value::String(_) | Value::Array(_) if name == "length" => true,
            Value::Object(obj) => obj.borrow().contains_key(name),
            other => other.own_keys().iter().any(|k| k == name),
        }
    }

    /// The subject's `length`, or the failure chai reports when it has none.
    fn require_length(&self) -> Result<f64, Thrown> {
        let length = match &self.subject {
            Value::String(s) => Some(s.encode_utf16().count() as f64),
            Value::Array(items) => Some(items.borrow().len() as f64),
            Value::Object(obj) => obj.borrow().get("length").map(Value::to_number),
            _ => None,
        };
        length.ok_or_else(|| {
            self.fail(format!(
                "expected {} to have property 'length'",
                display(&self.subject)
            ))
        })
    }

    // ========================================================================
    // Property access
    // ========================================================================

    /// Resolve `assertion.name`.
    pub fn get(self: &Rc<Self>, name: &str) -> Result<Value, Thrown> {
        let mut next = Assertion {
            pending: None,
            ..(**self).clone()
        };
        if LANGUAGE_CHAINS.contains(&name) {
            return Ok(next.into_value());
        }
        match name {
            "not" => next.flags.negate = true,
            "deep" => next.flags.deep = true,
            "own" => next.flags.own = true,
            "nested" => next.flags.nested = true,
            "ordered" => next.flags.ordered = true,
            "any" => {
                next.flags.any = true;
                next.flags.all = false;
            }
            "all" => {
                next.flags.all = true;
                next.flags.any = false;
            }
            "a" | "an" => next.pending = Some(Chainable::A),
            "include" | "includes" | "contain" | "contains" => {
                next.flags.contains = true;
                next.pending = Some(Chainable::Include);
            }
            "length" | "lengthOf" => {
                next.flags.length = true;
                next.pending = Some(Chainable::Length);
            }
            "ok" | "true" | "false" | "null" | "undefined" | "NaN" | "exist" | "empty" => {
                next.terminal(name)?;
            }
            _ => match method(name) {
                Some((method_name, call)) => {
                    return Ok(Function::bound(method_name, next.into_value(), call));
                }
                None => {
                    return Err(Thrown::error(ErrorKind::Error, format!("Invalid Chai property: {name}")));
                }
            },
        }
        Ok(next.into_value())
    }

    /// Invoke a chainable method accessed as a property (`.include(x)`, `.a('string')`).
    pub fn call(self: &Rc<Self>, args: &[Value]) -> Option<Result<Value, Thrown>> {
        let this = Value::Assertion(self.clone());
        let call: NativeFn = match self.pending? {
            Chainable::A => a,
            Chainable::Include => include,
            Chainable::Length => length_of,
        };
        Some(call(&this, args))
    }

    fn terminal(&self, name: &str) -> Result<(), Thrown> {
        let subject = &self.subject;
        let none = &Value::Undefined;
        match name {
            "ok" => self.assert(subject.truthy(), "expected #{this} to be truthy", "expected #{this} to be falsy", none, None),
            "true" => self.assert(
                matches!(subject, Value::Bool(true)),
                "expected #{this} to be true",
                "expected #{this} to be false",
                none,
                None,
            ),
            "false" => self.assert(
                matches!(subject, Value::Bool(false)),
                "expected #{this} to be false",
                "expected #{this} to be true",
                none,
                None,
            ),
            "null" => self.assert(
                matches!(subject, Value::Null),
                "expected #{this} to be null",
                "expected #{this} not to be null",
                none,
                None,
            ),
            "undefined" => self.assert(
                matches!(subject, Value::Undefined),
                "expected #{this} to be undefined",
                "expected #{this} not to be undefined",
                none,
                None,
            ),
            "NaN" => self.assert(
                subject.as_number().is_some_and(f64::is_nan),
                "expected #{this} to be NaN",
                "expected #{this} not to be NaN",
                none,
                None,
            ),
            "exist" => self.assert(
                !subject.is_nullish(),
                "expected #{this} to exist",
                "expected #{this} to not exist",
                none,
                None,
            ),
            "empty" => {
                let count = match subject {
                    Value::String(s) => s.len(),
                    Value::Array(items) => items.borrow().len(),
                    Value::Object(obj) => obj.borrow().len(),
                    Value::Function(f) => return Err(self.fail(format!(".empty was passed a function {}", f.name))),
                    Value::Regex(_) | Value::Error(_) | Value::Assertion(_) => 0,
                    primitive => {
                        return Err(self.fail(format!(
                            ".empty was passed non-string primitive {}",
                            inspect::inspect(primitive)
                        )))
                    }
                };
                self.assert(count == 0, "expected #{this} to be empty", "expected #{this} not to be empty", none, None)
            }
            _ => Ok(()),
        }
    }
}

fn method(name: &str) -> Option<(&'static str, NativeFn)> {
    let entry: (&'static str, NativeFn) = match name {
        "equal" | "equals" | "eq" => ("equal", equal),
        "eql" | "eqls" => ("eql", eql),
        "above" | "gt" | "greaterThan" => ("above", above),
        "least" | "gte" | "greaterThanOrEqual" => ("least", least),
        "below" | "lt" | "lessThan" => ("below", below),
        "most" | "lte" | "lessThanOrEqual" => ("most", most),
        "within" => ("within", within),
        "property" => ("property", property),
        "ownProperty" | "haveOwnProperty" => ("ownProperty", own_property),
        "keys" | "key" => ("keys", keys),
        "match" | "matches" => ("match", match_regex),
        "string" => ("string", string),
        "oneOf" => ("oneOf", one_of),
        "members" => ("members", members),
        "closeTo" | "approximately" => ("closeTo", close_to),
        "instanceof" | "instanceOf" => ("instanceOf", instance_of),
        _ => return None,
    };
    Some(entry)
}

// ============================================================================
// Equality
// ============================================================================

fn equal(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    if a.flags.deep {
        return eql(this, args);
    }
    let expected = arg(args, 0);
    a.assert(
        a.subject.strict_equals(&expected),
        "expected #{this} to equal #{exp}",
        "expected #{this} to not equal #{exp}",
        &expected,
        None,
    )?;
    Ok(this.clone())
}

fn eql(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let expected = arg(args, 0);
    a.assert(
        a.subject.deep_equals(&expected),
        "expected #{this} to deeply equal #{exp}",
        "expected #{this} to not deeply equal #{exp}",
        &expected,
        None,
    )?;
    Ok(this.clone())
}

// ============================================================================
// Numeric comparisons
// ============================================================================

struct Bound {
    name: &'static str,
    holds: fn(f64, f64) -> bool,
    phrase: &'static str,
    negated: &'static str,
}

fn compare(this: &Value, args: &[Value], bound: Bound) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let n = arg(args, 0);
    let limit = match n {
        Value::Number(limit) => limit,
        _ if a.flags.length || matches!(a.subject, Value::Number(_)) => {
            return Err(a.fail(format!("the argument to {} must be a number", bound.name)));
        }
        _ => f64::NAN,
    };
    if a.flags.length {
        let count = a.require_length()?;
        a.assert(
            (bound.holds)(count, limit),
            &format!("expected #{{this}} to have a length {} #{{exp}} but got #{{act}}", bound.phrase),
            &format!("expected #{{this}} to not have a length {} #{{exp}}", bound.phrase),
            &n,
            Some(&Value::Number(count)),
        )?;
        return Ok(this.clone());
    }
    let Value::Number(actual) = a.subject else {
        return Err(a.fail(format!("expected {} to be a number or a date", plain(&a.subject))));
    };
    a.assert(
        (bound.holds)(actual, limit),
        &format!("expected #{{this}} to be {} #{{exp}}", bound.phrase),
        &format!("expected #{{this}} to be {} #{{exp}}", bound.negated),
        &n,
        None,
    )?;
    Ok(this.clone())
}

/// How chai splices a non-number subject into its type error.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

fn above(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    compare(this, args, Bound { name: "above", holds: |a, b| a > b, phrase: "above", negated: "at most" })
}

fn least(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    compare(this, args, Bound { name: "least", holds: |a, b| a >= b, phrase: "at least", negated: "below" })
}

fn below(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    compare(this, args, Bound { name: "below", holds: |a, b| a < b, phrase: "below", negated: "at least" })
}

fn most(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    compare(this, args, Bound { name: "most", holds: |a, b| a <= b, phrase: "at most", negated: "above" })
}

fn within(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let (Value::Number(start), Value::Number(finish)) = (arg(args, 0), arg(args, 1)) else {
        return Err(a.fail("the arguments to within must be numbers"));
    };
    let range = format!("{}..{}", format_number(start), format_number(finish));
    let (count, subject_phrase) = if a.flags.length {
        (a.require_length()?, "have a length within")
    } else {
        match a.subject {
            Value::Number(n) => (n, "be within"),
            _ => return Err(a.fail(format!("expected {} to be a number or a date", plain(&a.subject)))),
        }
    };
    a.assert(
        count >= start && count <= finish,
        &format!("expected #{{this}} to {subject_phrase} {range}"),
        &format!("expected #{{this}} to not {subject_phrase} {range}"),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

fn close_to(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    a.inner(a.subject.clone()).require_type("number")?;
    let (Value::Number(expected), Value::Number(delta)) = (arg(args, 0), arg(args, 1)) else {
        let hint = if args.len() < 2 { ", and a delta is required" } else { "" };
        return Err(a.fail(format!("the arguments to closeTo or approximately must be numbers{hint}")));
    };
    let actual = a.subject.to_number();
    let description = format!("{} +/- {}", format_number(expected), format_number(delta));
    a.assert(
        (actual - expected).abs() <= delta,
        &format!("expected #{{this}} to be close to {description}"),
        &format!("expected #{{this}} not to be close to {description}"),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

// ============================================================================
// Types
// ============================================================================

fn a(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let assertion = receiver(this)?;
    let ty = arg(args, 0).to_string().to_lowercase();
    let art = article(&ty);
    assertion.assert(
        assertion.subject.type_name() == ty,
        &format!("expected #{{this}} to be {art}{ty}"),
        &format!("expected #{{this}} not to be {art}{ty}"),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

fn instance_of(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let Value::Function(constructor) = arg(args, 0) else {
        return Err(a.fail(format!(
            "The instanceof assertion needs a constructor but {} was given.",
            arg(args, 0).type_name()
        )));
    };
    a.assert(
        a.subject.is_instance_of(constructor.name),
        &format!("expected #{{this}} to be an instance of {}", constructor.name),
        &format!("expected #{{this}} to not be an instance of {}", constructor.name),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

// ============================================================================
// Containment
// ============================================================================

fn include(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let expected = arg(args, 0);
    let descriptor = if a.flags.deep { "deep " } else { "" };
    let included = match &a.subject {
        Value::String(s) => s.contains(&*expected.to_string()),
        Value::Array(items) => items.borrow().iter().any(|item| {
            if a.flags.deep {
                item.deep_equals(&expected)
            } else {
                item.strict_equals(&expected)
            }
        }),
        Value::Object(_) | Value::Undefined | Value::Null if matches!(expected, Value::Object(_)) => {
            include_properties(&a, &expected)?;
            return Ok(this.clone());
        }
        subject => {
            return Err(a.fail(format!(
                "the given combination of arguments ({} and {}) is invalid for this assertion. \
                 You can use an array, a map, an object, a set, a string, or a weakset instead of a {}",
                subject.type_name(),
                expected.type_name(),
                expected.type_name()
            )));
        }
    };
    a.assert(
        included,
        &format!("expected #{{this}} to {descriptor}include #{{exp}}"),
        &format!("expected #{{this}} to not {descriptor}include #{{exp}}"),
        &expected,
        None,
    )?;
    Ok(this.clone())
}

/// Object subset inclusion: every property of `expected` must be present with the same value.
fn include_properties(a: &Rc<Assertion>, expected: &Value) -> Result<(), Thrown> {
    let Value::Object(props) = expected else {
        return Ok(());
    };
    let props: Vec<(String, Value)> = props.borrow().iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    let base = Value::Assertion(a.clone());
    if !a.flags.negate || props.len() == 1 {
        for (key, value) in props {
            property(&base, &[Value::from(key), value])?;
        }
        return Ok(());
    }
    let mut first_err = None;
    let mut failures = 0;
    for (key, value) in &props {
        if let Err(err) = property(&base, &[Value::from(key.as_str()), value.clone()]) {
            if err.assertion_message().is_none() {
                return Err(err);
            }
            first_err.get_or_insert(err);
            failures += 1;
        }
    }
    match first_err {
        Some(err) if failures == props.len() => Err(err),
        _ => Ok(()),
    }
}

fn string(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    a.inner(a.subject.clone()).require_type("string")?;
    let needle = arg(args, 0);
    let haystack = a.subject.to_string();
    a.assert(
        haystack.contains(&*needle.to_string()),
        &format!("expected #{{this}} to contain {}", inspect::inspect(&needle)),
        &format!("expected #{{this}} to not contain {}", inspect::inspect(&needle)),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

fn match_regex(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let Value::Regex(re) = arg(args, 0) else {
        return Err(Thrown::type_error("re.exec is not a function"));
    };
    let shown = format!("/{}/{}", re.source, re.flags);
    a.assert(
        re.regex.is_match(&a.subject.to_string()),
        &format!("expected #{{this}} to match {shown}"),
        &format!("expected #{{this}} not to match {shown}"),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

fn one_of(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let list = arg(args, 0);
    a.inner(list.clone()).require_type("array")?;
    let Value::Array(items) = &list else {
        return Ok(this.clone());
    };
    let items = items.borrow();
    let subject = &a.subject;
    if a.flags.contains {
        let found = items.iter().any(|candidate| match subject {
            Value::String(s) => s.contains(&*candidate.to_string()),
            Value::Array(values) => values.borrow().iter().any(|v| v.strict_equals(candidate)),
            _ => false,
        });
        a.assert(
            found,
            "expected #{this} to contain one of #{exp}",
            "expected #{this} to not contain one of #{exp}",
            &list,
            None,
        )?;
    } else if a.flags.deep {
        a.assert(
            items.iter().any(|candidate| subject.deep_equals(candidate)),
            "expected #{this} to deeply equal one of #{exp}",
            "expected #{this} to deeply equal one of #{exp}",
            &list,
            None,
        )?;
    } else {
        a.assert(
            items.iter().any(|candidate| subject.strict_equals(candidate)),
            "expected #{this} to be one of #{exp}",
            "expected #{this} to not be one of #{exp}",
            &list,
            None,
        )?;
    }
    Ok(this.clone())
}

fn members(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let subset = arg(args, 0);
    a.inner(a.subject.clone()).require_type("array")?;
    a.inner(subset.clone()).require_type("array")?;
    let (Value::Array(superset), Value::Array(expected)) = (&a.subject, &subset) else {
        return Ok(this.clone());
    };
    let (positive, negative) = match (a.flags.contains, a.flags.ordered) {
        (true, ordered) => {
            let subject = if ordered { "an ordered superset" } else { "a superset" };
            (
                format!("expected #{{this}} to be {subject} of #{{exp}}"),
                format!("expected #{{this}} to not be {subject} of #{{exp}}"),
            )
        }
        (false, ordered) => {
            let subject = if ordered { "ordered members" } else { "members" };
            (
                format!("expected #{{this}} to have the same {subject} as #{{exp}}"),
                format!("expected #{{this}} to not have the same {subject} as #{{exp}}"),
            )
        }
    };
    let ok = is_subset_of(
        &expected.borrow(),
        &superset.borrow(),
        a.flags.deep,
        a.flags.contains,
        a.flags.ordered,
    );
    a.assert(ok, &positive, &negative, &subset, None)?;
    Ok(this.clone())
}

fn is_subset_of(subset: &[Value], superset: &[Value], deep: bool, contains: bool, ordered: bool) -> bool {
    if !contains && subset.len() != superset.len() {
        return false;
    }
    let same = |x: &Value, y: &Value| if deep { x.deep_equals(y) } else { x.strict_equals(y) };
    if ordered {
        return subset
            .iter()
            .enumerate()
            .all(|(i, item)| superset.get(i).is_some_and(|other| same(item, other)));
    }
    let mut remaining: Vec<&Value> = superset.iter().collect();
    subset.iter().all(|item| match remaining.iter().position(|other| same(item, other)) {
        Some(idx) => {
            if !contains {
                remaining.remove(idx);
            }
            true
        }
        None => false,
    })
}

// ============================================================================
// Properties, keys and length
// ============================================================================

fn property(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let name = arg(args, 0);
    let flags = a.flags;
    if flags.nested {
        if !matches!(name, Value::String(_)) {
            return Err(a.fail("the argument to property must be a string when using nested syntax"));
        }
    } else if !matches!(name, Value::String(_) | Value::Number(_)) {
        return Err(a.fail("the argument to property must be a string, number, or symbol"));
    }
    if flags.nested && flags.own {
        return Err(a.fail("The \"nested\" and \"own\" flags cannot be combined."));
    }
    if a.subject.is_nullish() {
        return Err(a.fail("Target cannot be null or undefined."));
    }

    let key = name.to_string();
    let (exists, value) = if flags.nested {
        path_info(&a.subject, &key)
    } else {
        let value = lookup(&a.subject, &key);
        (a.has_property(&key), value)
    };

    let descriptor = format!(
        "{}{}{}property ",
        if flags.deep { "deep " } else { "" },
        if flags.own { "own " } else { "" },
        if flags.nested { "nested " } else { "" },
    );
    let shown = inspect::inspect(&name);

    if !flags.negate || args.len() == 1 {
        a.assert(
            exists,
            &format!("expected #{{this}} to have {descriptor}{shown}"),
            &format!("expected #{{this}} to not have {descriptor}{shown}"),
            &Value::Undefined,
            None,
        )?;
    }
    if args.len() > 1 {
        let expected = arg(args, 1);
        let matches = exists
            && if flags.deep {
                expected.deep_equals(&value)
            } else {
                expected.strict_equals(&value)
            };
        a.assert(
            matches,
            &format!("expected #{{this}} to have {descriptor}{shown} of #{{exp}}, but got #{{act}}"),
            &format!("expected #{{this}} to not have {descriptor}{shown} of #{{act}}"),
            &expected,
            Some(&value),
        )?;
    }
    Ok(a.with_subject(value))
}

fn own_property(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let mut owned = (*a).clone();
    owned.flags.own = true;
    property(&owned.into_value(), args)
}

/// Plain member lookup without prototype methods.
fn lookup(target: &Value, key: &str) -> Value {
    match target {
        Value::Object(obj) => obj.borrow().get(key).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => {
            let items = items.borrow();
            if key == "length" {
                return Value::Number(items.len() as f64);
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Undefined)
        }
        Value::String(s) => {
            if key == "length" {
                return Value::Number(s.encode_utf16().count() as f64);
            }
            key.parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::from(c.to_string()))
                .unwrap_or(Value::Undefined)
        }
        Value::Error(err) => match key {
            "message" => Value::from(err.message.as_str()),
            "name" => Value::from(err.kind.name()),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// Split `a.b[0].c` into `["a", "b", "0", "c"]`.
fn parse_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    current.push(inner);
                }
                segments.push(std::mem::take(&mut current));
                if chars.peek() == Some(&'.') {
                    chars.next();
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn path_info(target: &Value, path: &str) -> (bool, Value) {
    let segments = parse_path(path);
    let mut parent = target.clone();
    let mut exists = false;
    let mut value = Value::Undefined;
    for (i, segment) in segments.iter().enumerate() {
        if parent.is_nullish() {
            return (false, Value::Undefined);
        }
        value = lookup(&parent, segment);
        if i == segments.len() - 1 {
            exists = match &parent {
                Value::Object(obj) => obj.borrow().contains_key(segment),
                Value::Array(_) | Value::String(_) => segment == "length" || !value.strict_equals(&Value::Undefined),
                _ => false,
            };
        }
        parent = value.clone();
    }
    (exists, value)
}

fn keys(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    const MIXED: &str = "when testing keys against an object or an array you must give a single Array|Object|String argument or multiple String arguments";
    let expected: Vec<String> = match args.first() {
        Some(Value::Array(items)) => {
            if args.len() > 1 {
                return Err(a.fail(MIXED));
            }
            items.borrow().iter().map(Value::to_string).collect()
        }
        Some(obj @ Value::Object(_)) => {
            if args.len() > 1 {
                return Err(a.fail(MIXED));
            }
            obj.own_keys()
        }
        _ => args.iter().map(Value::to_string).collect(),
    };
    if expected.is_empty() {
        return Err(a.fail("keys required"));
    }
    let actual = a.subject.own_keys();
    let any = a.flags.any;
    let all = a.flags.all || !any;

    let ok = if any {
        expected.iter().any(|k| actual.contains(k))
    } else {
        let every = expected.iter().all(|k| actual.contains(k));
        every && (a.flags.contains || expected.len() == actual.len())
    };

    let mut listed: Vec<String> = expected.iter().map(|k| inspect::quote(k)).collect();
    let joined = if listed.len() > 1 {
        let last = listed.pop().unwrap_or_default();
        let joiner = if all && !any { "and" } else { "or" };
        format!("{}, {joiner} {last}", listed.join(", "))
    } else {
        listed.join("")
    };
    let noun = if expected.len() > 1 { "keys" } else { "key" };
    let verb = if a.flags.contains { "contain" } else { "have" };
    let deep = if a.flags.deep { "deep " } else { "" };
    a.assert(
        ok,
        &format!("expected #{{this}} to {deep}{verb} {noun} {joined}"),
        &format!("expected #{{this}} to not {deep}{verb} {noun} {joined}"),
        &Value::Undefined,
        None,
    )?;
    Ok(this.clone())
}

fn length_of(this: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let a = receiver(this)?;
    let n = arg(args, 0);
    let count = a.inner(a.subject.clone()).require_length()?;
    a.assert(
        Value::Number(count).loose_equals(&n),
        "expected #{this} to have a length of #{exp} but got #{act}",
        "expected #{this} to not have a length of #{act}",
        &n,
        Some(&Value::Number(count)),
    )?;
    Ok(this.clone())
}
