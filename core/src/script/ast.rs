//! Syntax tree for assertion scripts.

use std::rc::Rc;

use super::value::RegexValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug)]
pub enum Stmt {
    Expr(Expr),
    Declare {
        kind: DeclKind,
        name: String,
        init: Option<Expr>,
    },
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Throw(Expr),
    Block(Vec<Stmt>),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug)]
pub enum PropertyKey {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Regex(Rc<RegexValue>),
    Member {
        object: Box<Expr>,
        property: PropertyKey,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

impl Expr {
    /// Short source-like rendering used in error messages (`context.body is not a function`).
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Member {
                object,
                property: PropertyKey::Named(name),
                optional,
            } => format!("{}{}{name}", object.describe(), if *optional { "?." } else { "." }),
            Expr::Member { object, .. } => format!("{}[...]", object.describe()),
            Expr::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Expr::Literal(Literal::String(s)) => format!("\"{s}\""),
            Expr::Literal(Literal::Number(n)) => super::value::format_number(*n),
            _ => "expression".to_string(),
        }
    }

    pub fn is_chain(&self) -> bool {
        matches!(self, Expr::Member { .. } | Expr::Call { .. })
    }
}
