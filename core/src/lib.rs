//! Single-shot HTTP request runner with scripted assertions.
//!
//! # Overview
//! Takes one request descriptor and an optional list of assertion
//! expressions, performs the request, evaluates every assertion against the
//! outcome and renders a `{request, response, assertions}` report.
//!
//! # Design
//! - Nothing fails past input parsing: transport failures become data in
//!   `ExecutionResult`, assertion faults become failed `AssertionOutcome`s.
//! - `http` is pure (descriptor in, validated request out; raw response in,
//!   envelope out); `executor` is the only module doing I/O.
//! - Assertions run in the `script` interpreter, which only sees `expect`,
//!   `context`, `AssertionError` and the built-ins.

pub mod error;
pub mod evaluator;
pub mod executor;
pub mod http;
pub mod report;
pub mod script;
pub mod serialize;
pub mod types;

pub use error::{DescriptorError, TransportError};
pub use evaluator::{evaluate, AssertionContext};
pub use executor::{execute, Executor};
pub use report::{run, Report};
pub use serialize::serialize;
pub use types::{AssertionOutcome, ExecutionResult, Headers, RequestDescriptor, ResponseEnvelope};
