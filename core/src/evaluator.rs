//! Runs assertion scripts against a captured response.
//!
//! # Design
//! Every assertion is compiled and run on its own with a fresh global scope
//! and freshly built `context` values, so nothing one assertion does
//! (declaring names, mutating the body) is visible to the next. Faults are
//! turned into outcomes; `evaluate` returns exactly one outcome per input.

use serde_json::Value as Json;
use tracing::debug;

use crate::script::{self, error_constructor, expect_binding, ErrorKind, Properties, Value};
use crate::types::{AssertionOutcome, ExecutionResult};

/// What assertions see as `context`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionContext {
    /// Response body; `None` when no response was received.
    pub response: Option<Json>,
    pub status_code: Option<u16>,
    /// The captured transport error; `None` on success.
    pub error: Option<Json>,
}

impl AssertionContext {
    pub fn from_result(result: &ExecutionResult) -> Self {
        Self {
            response: result.response.data.clone(),
            status_code: result.response.status,
            error: result.error.as_ref().map(|err| err.to_json()),
        }
    }

    fn to_value(&self) -> Value {
        let mut props = Properties::new();
        props.insert(
            "response",
            self.response.as_ref().map_or(Value::Undefined, Value::from_json),
        );
        props.insert(
            "statusCode",
            self.status_code.map_or(Value::Undefined, |code| Value::Number(f64::from(code))),
        );
        props.insert("error", self.error.as_ref().map_or(Value::Null, Value::from_json));
        Value::object(props)
    }
}

/// Evaluate each assertion in order.
pub fn evaluate(assertions: &[String], context: &AssertionContext) -> Vec<AssertionOutcome> {
    assertions
        .iter()
        .map(|assertion| {
            let outcome = evaluate_one(assertion, context);
            debug!(assertion = %assertion, passed = outcome.status, message = %outcome.message, "assertion evaluated");
            outcome
        })
        .collect()
}

fn evaluate_one(assertion: &str, context: &AssertionContext) -> AssertionOutcome {
    let program = match script::compile(assertion) {
        Ok(program) => program,
        Err(err) => return AssertionOutcome::failed(assertion, err),
    };
    let bindings = [
        ("expect", expect_binding()),
        ("context", context.to_value()),
        ("AssertionError", error_constructor(ErrorKind::AssertionError)),
    ];
    match program.run(bindings) {
        Ok(()) => AssertionOutcome::passed(assertion),
        Err(thrown) => match thrown.assertion_message() {
            Some(message) => AssertionOutcome::failed(assertion, message),
            None => AssertionOutcome::failed(assertion, thrown),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> AssertionContext {
        AssertionContext {
            response: Some(json!({"id": 7, "tags": ["a", "b"]})),
            status_code: Some(404),
            error: Some(json!({"name": "TransportError", "code": "ERR_BAD_REQUEST", "status": 404})),
        }
    }

    fn run(lines: &[&str]) -> Vec<AssertionOutcome> {
        let assertions: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
        evaluate(&assertions, &context())
    }

    #[test]
    fn passing_and_failing_matchers() {
        let outcomes = run(&[
            "expect(context.statusCode).to.equal(404)",
            "expect(context.statusCode).to.equal(200)",
        ]);
        assert_eq!(outcomes[0], AssertionOutcome::passed("expect(context.statusCode).to.equal(404)"));
        assert!(!outcomes[1].status);
        assert_eq!(outcomes[1].message, "Assertion failed: expected 404 to equal 200");
    }

    #[test]
    fn one_outcome_per_assertion_even_when_faulting() {
        let outcomes = run(&[
            "expect(",
            "context.response.missing.deeper",
            "expect(context.response.tags).to.include('a')",
            "notDefined()",
        ]);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].message, "Assertion failed: Unexpected end of input");
        assert_eq!(
            outcomes[1].message,
            "Assertion failed: TypeError: Cannot read properties of undefined (reading 'deeper')"
        );
        assert!(outcomes[2].status);
        assert_eq!(outcomes[3].message, "Assertion failed: ReferenceError: notDefined is not defined");
    }

    #[test]
    fn huge_arrays_fail_only_their_own_assertion() {
        let outcomes = run(&[
            "expect(1).to.equal(1)",
            "Array(1e300)",
            "const a = []; a.length = 1e300",
            "const b = []; b[4294967294] = 1",
            "expect(context.statusCode).to.equal(404)",
        ]);
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes[0].status);
        assert_eq!(outcomes[1].message, "Assertion failed: RangeError: Invalid array length");
        assert_eq!(outcomes[2].message, "Assertion failed: RangeError: Invalid array length");
        assert_eq!(
            outcomes[3].message,
            "Assertion failed: RangeError: Array length 4294967295 exceeds the limit of 16777216"
        );
        assert!(outcomes[4].status);
    }

    #[test]
    fn custom_checks_can_throw_assertion_error() {
        let outcomes = run(&["if (context.response.id !== 8) throw new AssertionError('id mismatch')"]);
        assert_eq!(outcomes[0].message, "Assertion failed: id mismatch");
    }

    #[test]
    fn error_is_visible_to_assertions() {
        let outcomes = run(&["expect(context.error.code).to.equal('ERR_BAD_REQUEST')"]);
        assert!(outcomes[0].status);
    }

    #[test]
    fn assertions_do_not_share_state() {
        let outcomes = run(&[
            "const x = 1; context.response.id = 99",
            "const x = 2; expect(context.response.id).to.equal(7)",
        ]);
        assert!(outcomes.iter().all(|o| o.status), "{outcomes:?}");
    }

    #[test]
    fn no_ambient_bindings_beyond_builtins() {
        let outcomes = run(&["response", "process", "require('fs')"]);
        assert!(outcomes.iter().all(|o| !o.status));
        assert_eq!(outcomes[0].message, "Assertion failed: ReferenceError: response is not defined");
    }

    #[test]
    fn absent_response_is_undefined_and_error_null_on_success() {
        let ctx = AssertionContext::default();
        let outcomes = evaluate(
            &[
                "expect(context.response).to.be.undefined".to_string(),
                "expect(context.error).to.be.null".to_string(),
            ],
            &ctx,
        );
        assert!(outcomes.iter().all(|o| o.status), "{outcomes:?}");
    }
}
