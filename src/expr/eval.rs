//! Tree-walking evaluator
//!
//! Names resolve only against the supplied [`Scope`] and arrow-function
//! parameters; there is no other ambient state reachable from an expression.

use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::errors::ExprError;
use super::methods;
use super::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Source of named bindings for evaluation
pub trait Scope {
    /// Look up a bound name
    fn lookup(&self, name: &str) -> Option<&serde_json::Value>;

    /// All bound names, for error suggestions
    fn names(&self) -> Vec<&str>;
}

impl Scope for HashMap<String, serde_json::Value> {
    fn lookup(&self, name: &str) -> Option<&serde_json::Value> {
        self.get(name)
    }

    fn names(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect()
    }
}

pub struct Evaluator<'a> {
    scope: &'a dyn Scope,
    /// Arrow-function parameters, innermost last
    locals: Vec<(String, Value)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(scope: &'a dyn Scope) -> Self {
        Self {
            scope,
            locals: Vec::new(),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.resolve(name),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object)?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                get_property(&target, property)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let target = self.eval(object)?;
                if *optional && target.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.eval(index)?;
                get_index(&target, &key)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Negate => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Coalesce => !left.is_nullish(),
                };
                if short_circuit {
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
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Lambda { .. } => Err(ExprError::type_error(
                "arrow functions can only be passed to methods",
            )),
        }
    }

    /// Invoke an arrow-function argument with positional arguments
    pub(crate) fn apply(&mut self, lambda: &Expr, args: &[Value]) -> Result<Value, ExprError> {
        let Expr::Lambda { params, body } = lambda else {
            return Err(ExprError::type_error("expected an arrow function argument"));
        };

        let mark = self.locals.len();
        for (idx, param) in params.iter().enumerate() {
            let arg = args.get(idx).cloned().unwrap_or(Value::Undefined);
            self.locals.push((param.clone(), arg));
        }
        let result = self.eval(body);
        self.locals.truncate(mark);
        result
    }

    fn resolve(&self, name: &str) -> Result<Value, ExprError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(value.clone());
        }
        match self.scope.lookup(name) {
            Some(json) => Ok(Value::from_json(json)),
            None => {
                let mut known = self.scope.names();
                known.extend(self.locals.iter().map(|(local, _)| local.as_str()));
                Err(ExprError::undefined_variable(name, &known))
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, ExprError> {
        let (object, method, optional) = match callee {
            Expr::Member {
                object,
                property,
                optional,
            } => (object, property.as_str(), *optional),
            Expr::Ident(name) => {
                return Err(ExprError::type_error(format!("{} is not a function", name)));
            }
            _ => return Err(ExprError::type_error("expression is not a function")),
        };

        let receiver = self.eval(object)?;
        if optional && receiver.is_nullish() {
            return Ok(Value::Undefined);
        }
        methods::call(self, receiver, method, args)
    }
}

/// Evaluate a parsed expression against a scope, returning JSON
pub fn evaluate(expr: &Expr, scope: &dyn Scope) -> Result<serde_json::Value, ExprError> {
    Evaluator::new(scope).eval(expr).map(Value::into_json)
}

pub(crate) fn get_property(target: &Value, property: &str) -> Result<Value, ExprError> {
    match target {
        Value::Undefined | Value::Null => Err(ExprError::type_error(format!(
            "cannot read properties of {} (reading '{}')",
            target.type_name(),
            property
        ))),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Undefined)),
        Value::Array(items) => Ok(match property {
            "length" => Value::Number(items.len() as f64),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx).cloned())
                .unwrap_or(Value::Undefined),
        }),
        Value::String(s) => Ok(match property {
            "length" => Value::Number(s.chars().count() as f64),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|idx| s.chars().nth(idx))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined),
        }),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

fn get_index(target: &Value, key: &Value) -> Result<Value, ExprError> {
    let property = match key {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => format!("{}", *n as u64),
        other => other.to_string(),
    };
    get_property(target, &property)
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (l, r) if concatenates(l) || concatenates(r) => {
                Value::String(format!("{}{}", l, r))
            }
            (l, r) => Value::Number(l.to_number() + r.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            Value::Bool(compare(op, left, right))
        }
    }
}

fn concatenates(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Array(_) | Value::Object(_))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }

    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}
