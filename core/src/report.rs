//! Request, evaluation and report assembly for one invocation.

use tracing::debug;

use crate::evaluator::{evaluate, AssertionContext};
use crate::executor::Executor;
use crate::script::{Properties, Value};
use crate::serialize::serialize;
use crate::types::{AssertionOutcome, ExecutionResult, RequestDescriptor};

/// Everything printed for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub result: ExecutionResult,
    /// `None` when no assertions were supplied.
    pub assertions: Option<Vec<AssertionOutcome>>,
}

impl Report {
    /// The report as `{request, response, assertions}`.
    pub fn to_value(&self) -> Value {
        let assertions = match &self.assertions {
            None => Value::Null,
            Some(outcomes) => Value::array(
                outcomes
                    .iter()
                    .map(|outcome| {
                        let mut props = Properties::new();
                        props.insert("assertion", Value::from(outcome.assertion.as_str()));
                        props.insert("status", Value::Bool(outcome.status));
                        props.insert("message", Value::from(outcome.message.as_str()));
                        Value::object(props)
                    })
                    .collect(),
            ),
        };
        let mut props = Properties::new();
        props.insert("request", Value::from_json(self.result.request.source()));
        props.insert("response", Value::from_json(&self.result.response.to_json()));
        props.insert("assertions", assertions);
        Value::object(props)
    }

    /// Single-line text form of the report.
    pub fn render(&self) -> String {
        serialize(&self.to_value())
    }
}

/// Execute the request, evaluate assertions if any were given, and report.
pub async fn run(descriptor: RequestDescriptor, assertions: Option<&[String]>, proxy: Option<&str>) -> Report {
    let result = Executor::new(proxy).execute(descriptor).await;
    let assertions = assertions.map(|assertions| {
        let context = AssertionContext::from_result(&result);
        debug!(count = assertions.len(), "evaluating assertions");
        evaluate(assertions, &context)
    });
    Report { result, assertions }
}
