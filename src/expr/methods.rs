//! Built-in methods on arrays, strings and numbers

use super::ast::Expr;
use super::errors::ExprError;
use super::eval::Evaluator;
use super::value::Value;

pub(crate) fn call(
    ev: &mut Evaluator<'_>,
    receiver: Value,
    method: &str,
    args: &[Expr],
) -> Result<Value, ExprError> {
    match receiver {
        Value::Array(items) => array_method(ev, items, method, args),
        Value::String(s) => {
            let args = eval_args(ev, args)?;
            string_method(&s, method, &args)
        }
        Value::Number(n) => {
            let args = eval_args(ev, args)?;
            number_method(n, method, &args)
        }
        Value::Undefined | Value::Null => Err(ExprError::type_error(format!(
            "cannot read properties of {} (reading '{}')",
            receiver.type_name(),
            method
        ))),
        other => Err(not_a_function(&other, method)),
    }
}

fn array_method(
    ev: &mut Evaluator<'_>,
    items: Vec<Value>,
    method: &str,
    args: &[Expr],
) -> Result<Value, ExprError> {
    match method {
        "map" => {
            let f = lambda_arg(args, method)?;
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.into_iter().enumerate() {
                out.push(ev.apply(f, &[item, Value::Number(idx as f64)])?);
            }
            Ok(Value::Array(out))
        }
        "filter" => {
            let f = lambda_arg(args, method)?;
            let mut out = Vec::new();
            for (idx, item) in items.into_iter().enumerate() {
                if ev.apply(f, &[item.clone(), Value::Number(idx as f64)])?.is_truthy() {
                    out.push(item);
                }
            }
            Ok(Value::Array(out))
        }
        "find" => {
            let f = lambda_arg(args, method)?;
            for (idx, item) in items.into_iter().enumerate() {
                if ev.apply(f, &[item.clone(), Value::Number(idx as f64)])?.is_truthy() {
                    return Ok(item);
                }
            }
            Ok(Value::Undefined)
        }
        "findIndex" => {
            let f = lambda_arg(args, method)?;
            for (idx, item) in items.into_iter().enumerate() {
                if ev.apply(f, &[item, Value::Number(idx as f64)])?.is_truthy() {
                    return Ok(Value::Number(idx as f64));
                }
            }
            Ok(Value::Number(-1.0))
        }
        "some" => {
            let f = lambda_arg(args, method)?;
            for (idx, item) in items.into_iter().enumerate() {
                if ev.apply(f, &[item, Value::Number(idx as f64)])?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "every" => {
            let f = lambda_arg(args, method)?;
            for (idx, item) in items.into_iter().enumerate() {
                if !ev.apply(f, &[item, Value::Number(idx as f64)])?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "reduce" => {
            let f = lambda_arg(args, method)?;
            let mut iter = items.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => ev.eval(init)?,
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(ExprError::type_error(
                            "reduce of empty array with no initial value",
                        ));
                    }
                },
            };
            for (idx, item) in iter {
                acc = ev.apply(f, &[acc, item, Value::Number(idx as f64)])?;
            }
            Ok(acc)
        }
        _ => {
            let args = eval_args(ev, args)?;
            plain_array_method(items, method, &args)
        }
    }
}

fn plain_array_method(items: Vec<Value>, method: &str, args: &[Value]) -> Result<Value, ExprError> {
    let arg = |idx: usize| args.get(idx).cloned().unwrap_or(Value::Undefined);

    match method {
        "includes" => {
            let needle = arg(0);
            Ok(Value::Bool(items.iter().any(|item| item.strict_equals(&needle))))
        }
        "indexOf" => {
            let needle = arg(0);
            Ok(Value::Number(
                items
                    .iter()
                    .position(|item| item.strict_equals(&needle))
                    .map(|idx| idx as f64)
                    .unwrap_or(-1.0),
            ))
        }
        "join" => {
            let separator = match arg(0) {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_string()
                    }
                })
                .collect();
            Ok(Value::String(parts.join(&separator)))
        }
        "slice" => {
            let (start, end) = slice_bounds(items.len(), &arg(0), &arg(1));
            Ok(Value::Array(items[start..end].to_vec()))
        }
        "concat" => {
            let mut out = items;
            for extra in args {
                match extra {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::Array(out))
        }
        "reverse" => {
            let mut out = items;
            out.reverse();
            Ok(Value::Array(out))
        }
        "toString" => Ok(Value::String(Value::Array(items).to_string())),
        _ => Err(not_a_function(&Value::Array(items), method)),
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, ExprError> {
    let arg = |idx: usize| args.get(idx).cloned().unwrap_or(Value::Undefined);
    let chars: Vec<char> = s.chars().collect();

    match method {
        "toLowerCase" => Ok(Value::String(s.to_lowercase())),
        "toUpperCase" => Ok(Value::String(s.to_uppercase())),
        "trim" => Ok(Value::String(s.trim().to_string())),
        "toString" => Ok(Value::String(s.to_string())),
        "includes" => Ok(Value::Bool(s.contains(arg(0).to_string().as_str()))),
        "startsWith" => Ok(Value::Bool(s.starts_with(arg(0).to_string().as_str()))),
        "endsWith" => Ok(Value::Bool(s.ends_with(arg(0).to_string().as_str()))),
        "indexOf" => {
            let needle = arg(0).to_string();
            Ok(Value::Number(
                s.find(needle.as_str())
                    .map(|byte_idx| s[..byte_idx].chars().count() as f64)
                    .unwrap_or(-1.0),
            ))
        }
        "slice" => {
            let (start, end) = slice_bounds(chars.len(), &arg(0), &arg(1));
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        "split" => {
            let parts = match arg(0) {
                Value::Undefined => vec![Value::String(s.to_string())],
                separator => {
                    let separator = separator.to_string();
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    }
                }
            };
            Ok(Value::Array(parts))
        }
        "replace" => {
            let pattern = arg(0).to_string();
            let replacement = arg(1).to_string();
            Ok(Value::String(s.replacen(pattern.as_str(), &replacement, 1)))
        }
        _ => Err(not_a_function(&Value::String(s.to_string()), method)),
    }
}

fn number_method(n: f64, method: &str, args: &[Value]) -> Result<Value, ExprError> {
    match method {
        "toFixed" => {
            let digits = match args.first() {
                None | Some(Value::Undefined) => 0.0,
                Some(value) => value.to_number(),
            };
            if !(0.0..=100.0).contains(&digits) {
                return Err(ExprError::type_error(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            Ok(Value::String(format!("{:.*}", digits as usize, n)))
        }
        "toString" => Ok(Value::String(Value::Number(n).to_string())),
        _ => Err(not_a_function(&Value::Number(n), method)),
    }
}

fn eval_args(ev: &mut Evaluator<'_>, args: &[Expr]) -> Result<Vec<Value>, ExprError> {
    args.iter().map(|arg| ev.eval(arg)).collect()
}

fn lambda_arg<'e>(args: &'e [Expr], method: &str) -> Result<&'e Expr, ExprError> {
    match args.first() {
        Some(lambda @ Expr::Lambda { .. }) => Ok(lambda),
        _ => Err(ExprError::type_error(format!(
            "{}() expects an arrow function argument",
            method
        ))),
    }
}

fn not_a_function(receiver: &Value, method: &str) -> ExprError {
    ExprError::type_error(format!("{}.{} is not a function", receiver.type_name(), method))
}

/// Resolve `slice(start, end)` arguments against a length, counting
/// negative positions from the end
fn slice_bounds(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |value: &Value, default: usize| -> usize {
        if matches!(value, Value::Undefined) {
            return default;
        }
        let n = value.to_number();
        if n.is_nan() {
            return 0;
        }
        let n = n.trunc();
        if n < 0.0 {
            (len as f64 + n).max(0.0) as usize
        } else {
            (n as usize).min(len)
        }
    };

    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use crate::expr::{evaluate, parse};
    use serde_json::json;
    use std::collections::HashMap;

    fn eval_with(source: &str, data: serde_json::Value) -> Result<serde_json::Value, String> {
        let mut scope = HashMap::new();
        scope.insert("data".to_string(), data);
        let expr = parse(source).map_err(|e| e.to_string())?;
        evaluate(&expr, &scope).map_err(|e| e.to_string())
    }

    #[test]
    fn test_array_map_and_filter() {
        let data = json!([{"name": "a", "price": 5}, {"name": "b", "price": 15}]);
        assert_eq!(
            eval_with("data.filter(x => x.price > 10).map(x => x.name)", data.clone()).unwrap(),
            json!(["b"])
        );
        assert_eq!(
            eval_with("data.map((item, i) => i)", data).unwrap(),
            json!([0, 1])
        );
    }

    #[test]
    fn test_array_search_methods() {
        let data = json!([1, 2, 3, 4]);
        assert_eq!(eval_with("data.find(n => n > 2)", data.clone()).unwrap(), json!(3));
        assert_eq!(eval_with("data.find(n => n > 9)", data.clone()).unwrap(), json!(null));
        assert_eq!(eval_with("data.findIndex(n => n === 4)", data.clone()).unwrap(), json!(3));
        assert_eq!(eval_with("data.some(n => n % 2 === 0)", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_with("data.every(n => n > 1)", data.clone()).unwrap(), json!(false));
        assert_eq!(eval_with("data.includes(2)", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_with("data.indexOf(7)", data).unwrap(), json!(-1));
    }

    #[test]
    fn test_array_reduce() {
        assert_eq!(
            eval_with("data.reduce((sum, n) => sum + n, 0)", json!([1, 2, 3])).unwrap(),
            json!(6)
        );
        assert!(eval_with("data.reduce((a, b) => a + b)", json!([])).is_err());
    }

    #[test]
    fn test_array_reshaping() {
        let data = json!(["a", "b", "c", "d"]);
        assert_eq!(eval_with("data.slice(1, 3)", data.clone()).unwrap(), json!(["b", "c"]));
        assert_eq!(eval_with("data.slice(-1)", data.clone()).unwrap(), json!(["d"]));
        assert_eq!(eval_with("data.join('-')", data.clone()).unwrap(), json!("a-b-c-d"));
        assert_eq!(eval_with("data.join()", data.clone()).unwrap(), json!("a,b,c,d"));
        assert_eq!(
            eval_with("data.reverse().concat(['z'], 'y')", data).unwrap(),
            json!(["d", "c", "b", "a", "z", "y"])
        );
    }

    #[test]
    fn test_string_methods() {
        let data = json!("  Hello World  ");
        assert_eq!(eval_with("data.trim().toLowerCase()", data.clone()).unwrap(), json!("hello world"));
        assert_eq!(eval_with("data.trim().toUpperCase()", data.clone()).unwrap(), json!("HELLO WORLD"));
        assert_eq!(eval_with("data.includes('World')", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_with("data.trim().startsWith('Hell')", data.clone()).unwrap(), json!(true));
        assert_eq!(eval_with("data.trim().endsWith('x')", data.clone()).unwrap(), json!(false));
        assert_eq!(eval_with("data.trim().split(' ')", data.clone()).unwrap(), json!(["Hello", "World"]));
        assert_eq!(eval_with("data.trim().slice(0, 5)", data.clone()).unwrap(), json!("Hello"));
        assert_eq!(eval_with("data.indexOf('W')", data.clone()).unwrap(), json!(8));
        assert_eq!(
            eval_with("data.trim().replace('o', '0')", data).unwrap(),
            json!("Hell0 World")
        );
    }

    #[test]
    fn test_number_to_fixed() {
        assert_eq!(eval_with("data.toFixed(2)", json!(3.14159)).unwrap(), json!("3.14"));
        assert_eq!(eval_with("data.toFixed()", json!(2.0)).unwrap(), json!("2"));
    }

    #[test]
    fn test_unknown_method_is_type_error() {
        let err = eval_with("data.push(1)", json!([1])).unwrap_err();
        assert_eq!(err, "type error: array.push is not a function");
    }

    #[test]
    fn test_method_on_null_is_type_error() {
        let err = eval_with("data.map(x => x)", json!(null)).unwrap_err();
        assert!(err.contains("cannot read properties of null"));
        assert_eq!(eval_with("data?.map(x => x)", json!(null)).unwrap(), json!(null));
    }

    #[test]
    fn test_method_requires_lambda() {
        let err = eval_with("data.map(1)", json!([1])).unwrap_err();
        assert!(err.contains("expects an arrow function"));
    }

    #[test]
    fn test_lambda_scope_is_popped() {
        let err = eval_with("data.map(x => x).concat([x])", json!([1])).unwrap_err();
        assert!(err.starts_with("x is not defined"));
    }
}
