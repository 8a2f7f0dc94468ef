//! Transform expression language
//!
//! A small, side-effect free subset of JavaScript expression syntax used by
//! transform steps. Expressions see only the names supplied by a [`Scope`]
//! (the step's input as `data` plus other step results) and may not call
//! free functions, assign, or reach any host state.
//!
//! Supported:
//! - literals: numbers, strings, `true`, `false`, `null`, `undefined`,
//!   arrays and objects
//! - arithmetic `+ - * / %`, comparison, `==`/`===` equality, `!`,
//!   `&&`, `||`, `??` and `cond ? a : b`
//! - member access `a.b`, `a[expr]`, optional chaining `a?.b`
//! - built-in methods on arrays, strings and numbers, with arrow-function
//!   arguments (`data.filter(x => x.price > 10)`)

mod ast;
mod errors;
mod eval;
mod lexer;
mod methods;
mod parser;
mod value;

pub use errors::ExprError;
pub use eval::{Scope, evaluate};
pub use parser::parse;

/// Parse and evaluate an expression in one call
pub fn eval_str(source: &str, scope: &dyn Scope) -> Result<serde_json::Value, ExprError> {
    let expr = parse(source)?;
    evaluate(&expr, scope)
}

/// Parse and evaluate an expression, reporting only its truthiness
pub fn eval_condition(source: &str, scope: &dyn Scope) -> Result<bool, ExprError> {
    let expr = parse(source)?;
    eval::Evaluator::new(scope).eval(&expr).map(|v| v.is_truthy())
}
