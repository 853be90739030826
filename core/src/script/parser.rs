//! Recursive-descent parser producing the script syntax tree.
//!
//! Precedence, lowest first: assignment, conditional, `??`, `||`, `&&`,
//! equality, relational, additive, multiplicative, unary, call/member.
//! Statements end at `;`, a line break, a closing brace or end of input.

use std::rc::Rc;

use super::ast::{BinaryOp, DeclKind, Expr, Literal, LogicalOp, PropertyKey, Stmt, UnaryOp};
use super::error::SyntaxError;
use super::lexer::{Punct, Token, TokenKind};
use super::value::RegexValue;

/// Deepest expression nesting accepted before the parser gives up.
const MAX_DEPTH: usize = 64;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else", "export",
    "extends", "false", "finally", "for", "function", "if", "import", "in", "instanceof", "let", "new", "null",
    "return", "super", "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse_program(mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        while !self.at_eof() {
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn current(&self) -> &Token {
        // The stream always ends with Eof and the parser never advances past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn check(&self, punct: Punct) -> bool {
        self.current().kind == TokenKind::Punct(punct)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.check(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct) -> Result<(), SyntaxError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Ident(w) if w == word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.current();
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Number(_) => "Unexpected number".to_string(),
            TokenKind::String(_) => "Unexpected string".to_string(),
            TokenKind::Ident(word) if RESERVED.contains(&word.as_str()) => format!("Unexpected token '{word}'"),
            TokenKind::Ident(word) => format!("Unexpected identifier '{word}'"),
            TokenKind::Regex { .. } => "Unexpected regular expression".to_string(),
            TokenKind::Punct(_) => {
                format!("Unexpected token '{}'", &self.source[token.span.start..token.span.end])
            }
        };
        SyntaxError::new(message, token.span.start)
    }

    fn consume_terminator(&mut self) -> Result<(), SyntaxError> {
        if self.eat(Punct::Semicolon) {
            return Ok(());
        }
        if self.at_eof() || self.check(Punct::RBrace) || self.current().newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SyntaxError::new(
                "Maximum nesting depth exceeded",
                self.current().span.start,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.enter()?;
        let stmt = self.parse_statement_inner();
        self.leave();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, SyntaxError> {
        if self.eat(Punct::Semicolon) {
            return Ok(Stmt::Empty);
        }
        if self.eat(Punct::LBrace) {
            let mut body = Vec::new();
            while !self.eat(Punct::RBrace) {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                body.push(self.parse_statement()?);
            }
            return Ok(Stmt::Block(body));
        }
        for (word, kind) in [("let", DeclKind::Let), ("const", DeclKind::Const), ("var", DeclKind::Var)] {
            if self.eat_word(word) {
                return self.parse_declaration(kind);
            }
        }
        if self.eat_word("if") {
            self.expect(Punct::LParen)?;
            let test = self.parse_expression()?;
            self.expect(Punct::RParen)?;
            let consequent = Box::new(self.parse_statement()?);
            let alternate = if self.eat_word("else") {
                Some(Box::new(self.parse_statement()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                test,
                consequent,
                alternate,
            });
        }
        if self.eat_word("throw") {
            if self.current().newline_before || self.at_eof() {
                return Err(SyntaxError::new("Illegal newline after throw", self.current().span.start));
            }
            let value = self.parse_expression()?;
            self.consume_terminator()?;
            return Ok(Stmt::Throw(value));
        }
        let expr = self.parse_expression()?;
        self.consume_terminator()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_declaration(&mut self, kind: DeclKind) -> Result<Stmt, SyntaxError> {
        let name = self.parse_binding_name()?;
        let init = if self.eat(Punct::Assign) {
            Some(self.parse_assignment()?)
        } else {
            if kind == DeclKind::Const {
                return Err(SyntaxError::new(
                    "Missing initializer in const declaration",
                    self.current().span.start,
                ));
            }
            None
        };
        self.consume_terminator()?;
        Ok(Stmt::Declare { kind, name, init })
    }

    fn parse_binding_name(&mut self) -> Result<String, SyntaxError> {
        match &self.current().kind {
            TokenKind::Ident(word) if !RESERVED.contains(&word.as_str()) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.unexpected()),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let expr = self.parse_assignment();
        self.leave();
        expr
    }

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current().span.start;
        let target = self.parse_conditional()?;
        if self.eat(Punct::Assign) {
            if !matches!(target, Expr::Ident(_) | Expr::Member { optional: false, .. }) {
                return Err(SyntaxError::new("Invalid left-hand side in assignment", start));
            }
            let value = self.parse_assignment()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            });
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let test = self.parse_logical(0)?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(Punct::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Logical operators, loosest first: `??`, `||`, `&&`.
    fn parse_logical(&mut self, level: usize) -> Result<Expr, SyntaxError> {
        const LEVELS: [(Punct, LogicalOp); 3] = [
            (Punct::QuestionQuestion, LogicalOp::Nullish),
            (Punct::PipePipe, LogicalOp::Or),
            (Punct::AmpAmp, LogicalOp::And),
        ];
        let Some(&(punct, op)) = LEVELS.get(level) else {
            return self.parse_binary(0);
        };
        let mut left = self.parse_logical(level + 1)?;
        while self.eat(punct) {
            let right = self.parse_logical(level + 1)?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_op(&self, level: usize) -> Option<BinaryOp> {
        let kind = &self.current().kind;
        match (level, kind) {
            (0, TokenKind::Punct(Punct::EqEq)) => Some(BinaryOp::Eq),
            (0, TokenKind::Punct(Punct::BangEq)) => Some(BinaryOp::NotEq),
            (0, TokenKind::Punct(Punct::EqEqEq)) => Some(BinaryOp::StrictEq),
            (0, TokenKind::Punct(Punct::BangEqEq)) => Some(BinaryOp::StrictNotEq),
            (1, TokenKind::Punct(Punct::Lt)) => Some(BinaryOp::Lt),
            (1, TokenKind::Punct(Punct::LtEq)) => Some(BinaryOp::LtEq),
            (1, TokenKind::Punct(Punct::Gt)) => Some(BinaryOp::Gt),
            (1, TokenKind::Punct(Punct::GtEq)) => Some(BinaryOp::GtEq),
            (1, TokenKind::Ident(w)) if w == "in" => Some(BinaryOp::In),
            (1, TokenKind::Ident(w)) if w == "instanceof" => Some(BinaryOp::InstanceOf),
            (2, TokenKind::Punct(Punct::Plus)) => Some(BinaryOp::Add),
            (2, TokenKind::Punct(Punct::Minus)) => Some(BinaryOp::Sub),
            (3, TokenKind::Punct(Punct::Star)) => Some(BinaryOp::Mul),
            (3, TokenKind::Punct(Punct::Slash)) => Some(BinaryOp::Div),
            (3, TokenKind::Punct(Punct::Percent)) => Some(BinaryOp::Rem),
            _ => None,
        }
    }

    /// Left-associative binary levels: equality, relational, additive, multiplicative.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, SyntaxError> {
        if level > 3 {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.binary_op(level) {
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = if self.eat(Punct::Bang) {
            Some(UnaryOp::Not)
        } else if self.eat(Punct::Minus) {
            Some(UnaryOp::Neg)
        } else if self.eat(Punct::Plus) {
            Some(UnaryOp::Plus)
        } else if self.eat_word("typeof") {
            Some(UnaryOp::TypeOf)
        } else {
            None
        };
        match op {
            Some(op) => {
                self.enter()?;
                let operand = self.parse_unary();
                self.leave();
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand?),
                })
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        while !self.eat(Punct::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_property_name(&mut self) -> Result<String, SyntaxError> {
        match &self.current().kind {
            TokenKind::Ident(word) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = if self.eat_word("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat(Punct::Dot) {
                let name = self.parse_property_name()?;
                expr = member(expr, PropertyKey::Named(name), false);
            } else if self.eat(Punct::QuestionDot) {
                if self.eat(Punct::LParen) {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    };
                } else if self.eat(Punct::LBracket) {
                    let index = self.parse_expression()?;
                    self.expect(Punct::RBracket)?;
                    expr = member(expr, PropertyKey::Computed(Box::new(index)), true);
                } else {
                    let name = self.parse_property_name()?;
                    expr = member(expr, PropertyKey::Named(name), true);
                }
            } else if self.eat(Punct::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Punct::RBracket)?;
                expr = member(expr, PropertyKey::Computed(Box::new(index)), false);
            } else if self.eat(Punct::LParen) {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// `new Callee(args)`; the callee may be a dotted path but not a call.
    fn parse_new(&mut self) -> Result<Expr, SyntaxError> {
        let mut callee = self.parse_primary()?;
        while self.eat(Punct::Dot) {
            let name = self.parse_property_name()?;
            callee = member(callee, PropertyKey::Named(name), false);
        }
        let args = if self.eat(Punct::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Regex { pattern, flags } => {
                self.pos += 1;
                let regex =
                    RegexValue::new(&pattern, &flags).map_err(|message| SyntaxError::new(message, token.span.start))?;
                Ok(Expr::Regex(Rc::new(regex)))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => {
                    self.pos += 1;
                    Ok(Expr::Literal(Literal::Bool(true)))
                }
                "false" => {
                    self.pos += 1;
                    Ok(Expr::Literal(Literal::Bool(false)))
                }
                "null" => {
                    self.pos += 1;
                    Ok(Expr::Literal(Literal::Null))
                }
                w if RESERVED.contains(&w) => Err(self.unexpected()),
                _ => {
                    self.pos += 1;
                    Ok(Expr::Ident(word))
                }
            },
            TokenKind::Punct(Punct::LParen) => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                self.expect(Punct::RParen)?;
                Ok(expr)
            }
            TokenKind::Punct(Punct::LBracket) => {
                self.pos += 1;
                self.parse_array_literal()
            }
            TokenKind::Punct(Punct::LBrace) => {
                self.pos += 1;
                self.parse_object_literal()
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let mut items = Vec::new();
        while !self.eat(Punct::RBracket) {
            items.push(self.parse_assignment()?);
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBracket)?;
                break;
            }
        }
        self.leave();
        Ok(Expr::Array(items))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let mut props = Vec::new();
        while !self.eat(Punct::RBrace) {
            let key = match &self.current().kind {
                TokenKind::Ident(word) => word.clone(),
                TokenKind::String(s) => s.clone(),
                TokenKind::Number(n) => super::value::format_number(*n),
                _ => return Err(self.unexpected()),
            };
            self.pos += 1;
            let value = if self.eat(Punct::Colon) {
                self.parse_assignment()?
            } else {
                // shorthand `{ status }`
                Expr::Ident(key.clone())
            };
            props.push((key, value));
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBrace)?;
                break;
            }
        }
        self.leave();
        Ok(Expr::Object(props))
    }
}

fn member(object: Expr, property: PropertyKey, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property,
        optional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::Lexer;

    fn parse(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
        let tokens = Lexer::new(source).tokenize()?;
        Parser::new(source, tokens).parse_program()
    }

    fn parse_expr(source: &str) -> Expr {
        match parse(source).unwrap().into_iter().next() {
            Some(Stmt::Expr(expr)) => expr,
            _ => panic!("expected an expression statement"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        match parse_expr("1 + 2 * 3") {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. })),
            _ => panic!("expected addition at the root"),
        }
    }

    #[test]
    fn chained_matcher_call_parses_as_call_of_member() {
        match parse_expr("expect(context.statusCode).to.equal(200)") {
            Expr::Call { callee, args, .. } => {
                assert_eq!(args.len(), 1);
                assert_eq!(callee.describe(), "expect(...).to.equal");
            }
            _ => panic!("expected a call"),
        }
    }

    #[test]
    fn statements_split_on_semicolons_and_newlines() {
        assert_eq!(parse("const a = 1; let b = 2\nb = a").unwrap().len(), 3);
    }

    #[test]
    fn two_expressions_on_one_line_are_rejected() {
        let err = parse("a b").unwrap_err();
        assert_eq!(err.message, "Unexpected identifier 'b'");
    }

    #[test]
    fn unclosed_call_reports_end_of_input() {
        let err = parse("expect(context.statusCode").unwrap_err();
        assert_eq!(err.message, "Unexpected end of input");
    }

    #[test]
    fn stray_paren_is_reported_with_its_text() {
        let err = parse("expect(1))").unwrap_err();
        assert_eq!(err.message, "Unexpected token ')'");
    }

    #[test]
    fn const_requires_initializer() {
        let err = parse("const x").unwrap_err();
        assert_eq!(err.message, "Missing initializer in const declaration");
    }

    #[test]
    fn assignment_to_call_is_rejected() {
        let err = parse("f() = 1").unwrap_err();
        assert_eq!(err.message, "Invalid left-hand side in assignment");
    }

    #[test]
    fn object_literal_with_shorthand_and_quoted_keys() {
        match parse_expr("({ a: 1, 'b-c': 2, d })") {
            Expr::Object(props) => {
                let keys: Vec<&str> = props.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["a", "b-c", "d"]);
            }
            _ => panic!("expected object literal"),
        }
    }

    #[test]
    fn invalid_regex_is_a_syntax_error() {
        assert!(parse("expect('a').to.match(/(/)").is_err());
    }

    #[test]
    fn if_else_statement() {
        let stmts = parse("if (context.statusCode !== 200) throw new AssertionError('bad'); else {}").unwrap();
        assert!(matches!(stmts[0], Stmt::If { alternate: Some(_), .. }));
    }

    #[test]
    fn deep_nesting_is_rejected_instead_of_overflowing() {
        let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.message, "Maximum nesting depth exceeded");
    }
}
