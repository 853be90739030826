//! A small sandboxed scripting language for response assertions.
//!
//! Assertion text is JavaScript-flavoured (`expect(context.statusCode).to.equal(200)`)
//! but runs in a tree-walking interpreter with no access to the host: the
//! only names in scope are the built-ins and whatever bindings the caller
//! passes to [`Program::run`].
//!
//! ```
//! use reqcheck_core::script;
//!
//! let program = script::compile("expect(1 + 1).to.equal(2)").unwrap();
//! program.run([("expect", script::expect_binding())]).unwrap();
//! ```

mod ast;
mod builtins;
mod error;
mod expect;
mod inspect;
mod interp;
mod lexer;
mod parser;
mod value;

pub use builtins::error_constructor;
pub use error::{ErrorKind, SyntaxError, Thrown};
pub use expect::{expect_binding, Assertion};
pub use value::{Properties, Value};

use ast::Stmt;
use interp::Interpreter;
use lexer::Lexer;
use parser::Parser;

/// A compiled script, ready to run any number of times.
#[derive(Debug)]
pub struct Program {
    body: Vec<Stmt>,
}

pub fn compile(source: &str) -> Result<Program, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let body = Parser::new(source, tokens).parse_program()?;
    Ok(Program { body })
}

impl Program {
    /// Run with a fresh global scope holding the built-ins plus `bindings`.
    pub fn run<'a>(&self, bindings: impl IntoIterator<Item = (&'a str, Value)>) -> Result<(), Thrown> {
        Interpreter::new(bindings).run(&self.body)
    }

    #[cfg(test)]
    pub(crate) fn body(&self) -> &[Stmt] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with_expect(source: &str) -> Result<(), Thrown> {
        compile(source).unwrap().run([("expect", expect_binding())])
    }

    #[test]
    fn passing_expectation_runs_clean() {
        assert!(run_with_expect("expect([1, 2, 3]).to.have.lengthOf(3)").is_ok());
        assert!(run_with_expect("const body = {id: 1}\nexpect(body).to.have.property('id').that.is.a('number')").is_ok());
    }

    #[test]
    fn failing_expectation_throws_assertion_error() {
        let err = run_with_expect("expect('a').to.equal('b')").unwrap_err();
        assert_eq!(err.assertion_message(), Some("expected 'a' to equal 'b'"));
    }

    #[test]
    fn syntax_errors_surface_from_compile() {
        let err = compile("expect(").unwrap_err();
        assert_eq!(err.message, "Unexpected end of input");
    }

    #[test]
    fn run_is_repeatable_with_fresh_scope() {
        let program = compile("let counter = 1").unwrap();
        assert!(program.run(Vec::new()).is_ok());
        assert!(program.run(Vec::new()).is_ok());
    }
}
