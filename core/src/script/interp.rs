//! Tree-walking evaluator for compiled assertion scripts.

use std::collections::HashMap;

use super::ast::{BinaryOp, DeclKind, Expr, Literal, LogicalOp, PropertyKey, Stmt, UnaryOp};
use super::builtins;
use super::error::{ErrorKind, Thrown};
use super::value::{Properties, Value};

struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
}

pub struct Interpreter {
    scopes: Vec<Scope>,
}

impl Interpreter {
    /// A fresh interpreter whose global scope holds the built-ins plus `bindings`.
    pub fn new<'a>(bindings: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let mut global = Scope::default();
        let all = builtins::globals()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .chain(bindings.into_iter().map(|(name, value)| (name.to_string(), value)));
        for (name, value) in all {
            global.bindings.insert(name, Binding { value, mutable: true });
        }
        Self {
            scopes: vec![global, Scope::default()],
        }
    }

    pub fn run(&mut self, body: &[Stmt]) -> Result<(), Thrown> {
        for stmt in body {
            self.exec(stmt)?;
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec(&mut self, stmt: &Stmt) -> Result<(), Thrown> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Declare { kind, name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                self.declare(*kind, name, value)?;
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.exec(consequent)?;
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)?;
                }
            }
            Stmt::Throw(expr) => return Err(Thrown(self.eval(expr)?)),
            Stmt::Block(body) => {
                self.scopes.push(Scope::default());
                let result = body.iter().try_for_each(|stmt| self.exec(stmt));
                self.scopes.pop();
                result?;
            }
            Stmt::Empty => {}
        }
        Ok(())
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: Value) -> Result<(), Thrown> {
        // `var` is function-scoped, which for a script means the top-level scope
        let index = match kind {
            DeclKind::Var => 1,
            DeclKind::Let | DeclKind::Const => self.scopes.len() - 1,
        };
        let scope = &mut self.scopes[index];
        if let Some(existing) = scope.bindings.get_mut(name) {
            if kind == DeclKind::Var && existing.mutable {
                existing.value = value;
                return Ok(());
            }
            return Err(Thrown::error(
                ErrorKind::SyntaxError,
                format!("Identifier '{name}' has already been declared"),
            ));
        }
        scope.bindings.insert(
            name.to_string(),
            Binding {
                value,
                mutable: kind != DeclKind::Const,
            },
        );
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.bindings.get(name))
    }

    fn assign_variable(&mut self, name: &str, value: Value) -> Result<(), Thrown> {
        let binding = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.bindings.get_mut(name))
            .ok_or_else(|| Thrown::reference_error(format!("{name} is not defined")))?;
        if !binding.mutable {
            return Err(Thrown::type_error("Assignment to constant variable."));
        }
        binding.value = value;
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&mut self, expr: &Expr) -> Result<Value, Thrown> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::from(s.as_str()),
            }),
            Expr::Ident(name) => self
                .lookup(name)
                .map(|binding| binding.value.clone())
                .ok_or_else(|| Thrown::reference_error(format!("{name} is not defined"))),
            Expr::Array(items) => {
                let items = items.iter().map(|item| self.eval(item)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(items))
            }
            Expr::Object(props) => {
                let mut out = Properties::new();
                for (key, value) in props {
                    let value = self.eval(value)?;
                    out.insert(key.as_str(), value);
                }
                Ok(Value::object(out))
            }
            Expr::Regex(re) => Ok(Value::Regex(re.clone())),
            Expr::Member { .. } | Expr::Call { .. } => Ok(self.eval_chain(expr)?.unwrap_or(Value::Undefined)),
            Expr::New { callee, args } => {
                let constructor = self.eval(callee)?;
                let args = self.eval_args(args)?;
                match &constructor {
                    Value::Function(f) if f.constructible => f.invoke(&args),
                    _ => Err(Thrown::type_error(format!("{} is not a constructor", callee.describe()))),
                }
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuits = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign { target, value } => self.eval_assign(target, value),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Thrown> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn property_key(&mut self, property: &PropertyKey) -> Result<String, Thrown> {
        match property {
            PropertyKey::Named(name) => Ok(name.clone()),
            PropertyKey::Computed(expr) => Ok(self.eval(expr)?.to_string()),
        }
    }

    /// Evaluate a member/call chain; `None` means an optional link short-circuited.
    fn eval_chain(&mut self, expr: &Expr) -> Result<Option<Value>, Thrown> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_link(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.property_key(property)?;
                builtins::get(&target, &key).map(Some)
            }
            Expr::Call { callee, args, optional } => {
                let Some(function) = self.eval_link(callee)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(args)?;
                call(&function, &args, callee).map(Some)
            }
            other => self.eval(other).map(Some),
        }
    }

    fn eval_link(&mut self, expr: &Expr) -> Result<Option<Value>, Thrown> {
        if expr.is_chain() {
            self.eval_chain(expr)
        } else {
            self.eval(expr).map(Some)
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Value, Thrown> {
        if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, operand) {
            // `typeof undeclared` is not a reference error
            return Ok(Value::from(self.lookup(name).map_or("undefined", |b| b.value.type_of())));
        }
        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::from(value.type_of()),
        })
    }

    fn eval_assign(&mut self, target: &Expr, value: &Expr) -> Result<Value, Thrown> {
        match target {
            Expr::Ident(name) => {
                let value = self.eval(value)?;
                self.assign_variable(name, value.clone())?;
                Ok(value)
            }
            Expr::Member { object, property, .. } => {
                let object = self.eval(object)?;
                let key = self.property_key(property)?;
                let value = self.eval(value)?;
                builtins::set(&object, &key, value.clone())?;
                Ok(value)
            }
            _ => Err(Thrown::error(ErrorKind::SyntaxError, "Invalid left-hand side in assignment")),
        }
    }
}

fn call(function: &Value, args: &[Value], callee: &Expr) -> Result<Value, Thrown> {
    match function {
        Value::Function(f) => f.invoke(args),
        Value::Assertion(assertion) => assertion
            .call(args)
            .unwrap_or_else(|| Err(Thrown::type_error(format!("{} is not a function", callee.describe())))),
        _ => Err(Thrown::type_error(format!("{} is not a function", callee.describe()))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Thrown> {
    let number = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    Ok(match op {
        BinaryOp::Add => {
            let (l, r) = (left.to_primitive(), right.to_primitive());
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                Value::from(format!("{l}{r}"))
            } else {
                Value::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => number(|a, b| a - b),
        BinaryOp::Mul => number(|a, b| a * b),
        BinaryOp::Div => number(|a, b| a / b),
        BinaryOp::Rem => number(|a, b| a % b),
        BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
        BinaryOp::LtEq => Value::Bool(compare(left, right, |o| o.is_le())),
        BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
        BinaryOp::GtEq => Value::Bool(compare(left, right, |o| o.is_ge())),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::In => Value::Bool(builtins::has(right, &left.to_string())?),
        BinaryOp::InstanceOf => match right {
            Value::Function(class) => Value::Bool(left.is_instance_of(class.name)),
            _ => return Err(Thrown::type_error("Right-hand side of 'instanceof' is not callable")),
        },
    })
}

/// Relational comparison: strings compare lexically, everything else numerically.
fn compare(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    let (l, r) = (left.to_primitive(), right.to_primitive());
    let ordering = match (&l, &r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => l.to_number().partial_cmp(&r.to_number()),
    };
    ordering.is_some_and(accept)
}
