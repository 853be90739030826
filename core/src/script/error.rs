//! Fault types raised while compiling or running an assertion script.
//!
//! # Design
//! Compile failures and runtime throws are kept apart because they are
//! reported differently: a `SyntaxError` never produced a runnable unit, so
//! only its message is surfaced, while a `Thrown` carries the script value
//! that was thrown and is rendered the way that value prints.

use std::fmt;
use std::rc::Rc;

use super::value::{ErrorValue, Value};

/// Built-in error classes a script can observe or construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    RangeError,
    SyntaxError,
    AssertionError,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::AssertionError => "AssertionError",
        }
    }

    /// Whether a value of this kind is an instance of the class named `class`.
    pub fn is_instance_of(self, class: &str) -> bool {
        class == "Error" || class == self.name()
    }
}

/// The assertion text could not be compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset in the source where the problem was detected.
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// A value thrown out of a running script.
#[derive(Clone, thiserror::Error)]
#[error("{0}")]
pub struct Thrown(pub Value);

impl Thrown {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Thrown(Value::Error(Rc::new(ErrorValue {
            kind,
            message: message.into(),
        })))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::TypeError, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::ReferenceError, message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::AssertionError, message)
    }

    /// The message of a thrown `AssertionError`, if that is what was thrown.
    pub fn assertion_message(&self) -> Option<&str> {
        match &self.0 {
            Value::Error(err) if err.kind == ErrorKind::AssertionError => Some(&err.message),
            _ => None,
        }
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thrown({:?})", self.0)
    }
}
