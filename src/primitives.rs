use std::cmp::Ordering;

use crate::environment::Builtins;
use crate::evaluator::{Arity, EvalError, EvalResult};
use crate::source::Span;
use crate::types::Value;

/// Adds the standard builtins to `builtins`.
pub fn install(builtins: Builtins) -> Builtins {
    builtins
        .with_value("#t", Value::Boolean(true))
        .with_value("#f", Value::Boolean(false))
        .with_value("nil", Value::Nil)
        // Arithmetic
        .with_primitive("+", prim_add)
        .with_primitive("-", prim_sub)
        .with_primitive("*", prim_mul)
        .with_primitive("/", prim_div)
        // Comparison
        .with_primitive("equal?", prim_equal)
        .with_primitive("<", prim_less_than)
        .with_primitive("<=", prim_less_than_or_equals)
        .with_primitive(">", prim_greater_than)
        .with_primitive(">=", prim_greater_than_or_equals)
        .with_primitive("not", prim_not)
        // Pairs and lists
        .with_primitive("cons", prim_cons)
        .with_primitive("car", prim_car)
        .with_primitive("cdr", prim_cdr)
        .with_primitive("list", prim_list)
        .with_primitive("list?", prim_is_list)
        .with_primitive("length", prim_length)
        .with_primitive("list-ref", prim_list_ref)
        .with_primitive("append", prim_append)
}

fn check_arity(name: &str, args: &[Value], arity: Arity, span: Span) -> EvalResult<()> {
    if arity.accepts(args.len()) {
        Ok(())
    } else {
        Err(EvalError::BadArguments {
            procedure: name.to_string(),
            message: format!("expects {} arguments, got {}", arity, args.len()),
            span,
        })
    }
}

// Checks the number of arguments
macro_rules! check_arity {
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $span:expr, $name:expr) => {
        check_arity($name, $args, Arity::AtLeast($expected), $span)?
    };
    ($args:expr, $expected:expr, $span:expr, $name:expr) => {
        check_arity($name, $args, Arity::Exactly($expected), $span)?
    };
}

// --- Numbers ---

/// Integer arithmetic stays exact until it overflows; any float operand
/// makes the result a float.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(value: &Value, operator: &str, span: Span) -> EvalResult<Number> {
        match value {
            Value::Integer(n) => Ok(Number::Int(*n)),
            Value::Float(n) => Ok(Number::Float(*n)),
            other => Err(EvalError::BadArguments {
                procedure: operator.to_string(),
                message: format!("expected a number, got {}", other.type_name()),
                span,
            }),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn neg(self) -> Number {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map_or(Number::Float(-(n as f64)), Number::Int),
            Number::Float(n) => Number::Float(-n),
        }
    }

    fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        if let (Number::Int(a), Number::Int(b)) = (self, other) {
            if let Some(n) = int_op(a, b) {
                return Number::Int(n);
            }
        }
        Number::Float(float_op(self.as_f64(), other.as_f64()))
    }

    fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    fn sub(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    fn mul(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    /// Exact when both are integers and the division leaves no remainder.
    /// Callers rule out a zero divisor.
    fn div(self, other: Number) -> Number {
        self.combine(
            other,
            |a, b| match a.checked_rem(b) {
                Some(0) => a.checked_div(b),
                _ => None,
            },
            |a, b| a / b,
        )
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

fn numbers(args: &[Value], operator: &str, span: Span) -> EvalResult<Vec<Number>> {
    args.iter()
        .map(|arg| Number::from_value(arg, operator, span))
        .collect()
}

fn sum(nums: &[Number]) -> Number {
    nums.iter().fold(Number::Int(0), |acc, n| acc.add(*n))
}

fn product(nums: &[Number]) -> Number {
    nums.iter().fold(Number::Int(1), |acc, n| acc.mul(*n))
}

pub fn prim_add(args: &[Value], span: Span) -> EvalResult {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    Ok(sum(&numbers(args, "+", span)?).into_value())
}

pub fn prim_sub(args: &[Value], span: Span) -> EvalResult {
    // (- x) -> -x
    // (- x y z) -> x - (y + z)
    check_arity!(args, min 1, span, "-");
    let nums = numbers(args, "-", span)?;
    let (first, rest) = (nums[0], &nums[1..]);
    if rest.is_empty() {
        Ok(first.neg().into_value())
    } else {
        Ok(first.sub(sum(rest)).into_value())
    }
}

pub fn prim_mul(args: &[Value], span: Span) -> EvalResult {
    // (* x) -> x
    // (* 1 2 3) -> 6
    check_arity!(args, min 1, span, "*");
    Ok(product(&numbers(args, "*", span)?).into_value())
}

pub fn prim_div(args: &[Value], span: Span) -> EvalResult {
    // (/ x) -> 1/x
    // (/ x y z) -> x / (y * z)
    check_arity!(args, min 1, span, "/");
    let nums = numbers(args, "/", span)?;
    let (first, rest) = (nums[0], &nums[1..]);
    let (dividend, divisor) = if rest.is_empty() {
        (Number::Int(1), first)
    } else {
        (first, product(rest))
    };
    if divisor.is_zero() {
        return Err(EvalError::DivideByZero { span });
    }
    Ok(dividend.div(divisor).into_value())
}

fn compare_numbers(
    args: &[Value],
    span: Span,
    holds: fn(Ordering) -> bool,
    operator: &str,
) -> EvalResult {
    // (< n1 n2 ...) -> boolean, checked pairwise left to right
    check_arity!(args, min 2, span, operator);
    let nums = numbers(args, operator, span)?;
    let result = nums
        .windows(2)
        .all(|pair| pair[0].compare(pair[1]).is_some_and(holds));
    Ok(Value::Boolean(result))
}

pub fn prim_less_than(args: &[Value], span: Span) -> EvalResult {
    compare_numbers(args, span, Ordering::is_lt, "<")
}

pub fn prim_less_than_or_equals(args: &[Value], span: Span) -> EvalResult {
    compare_numbers(args, span, Ordering::is_le, "<=")
}

pub fn prim_greater_than(args: &[Value], span: Span) -> EvalResult {
    compare_numbers(args, span, Ordering::is_gt, ">")
}

pub fn prim_greater_than_or_equals(args: &[Value], span: Span) -> EvalResult {
    compare_numbers(args, span, Ordering::is_ge, ">=")
}

// --- Equality and booleans ---

// Exact: a float equals an integer only if it is integral and in range.
fn int_equals_float(n: i64, x: f64) -> bool {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    x.fract() == 0.0 && (-LIMIT..LIMIT).contains(&x) && x as i64 == n
}

/// Numbers compare by value across integer and float, pairs structurally,
/// procedures by identity.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    let (mut left, mut right) = (left, right);
    loop {
        match (left, right) {
            // Recurse into the car only; walk the cdr chain in place.
            (Value::Pair(car1, cdr1), Value::Pair(car2, cdr2)) => {
                if !values_equal(car1, car2) {
                    return false;
                }
                left = cdr1.as_ref();
                right = cdr2.as_ref();
            }
            (Value::Integer(a), Value::Integer(b)) => return a == b,
            (Value::Float(a), Value::Float(b)) => return a == b,
            (Value::Integer(n), Value::Float(x)) | (Value::Float(x), Value::Integer(n)) => {
                return int_equals_float(*n, *x);
            }
            (Value::Boolean(a), Value::Boolean(b)) => return a == b,
            (Value::Nil, Value::Nil) => return true,
            (Value::Procedure(p1), Value::Procedure(p2)) => return p1 == p2,
            _ => return false,
        }
    }
}

pub fn prim_equal(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, min 2, span, "equal?");
    let first = &args[0];
    Ok(Value::Boolean(
        args[1..].iter().all(|arg| values_equal(first, arg)),
    ))
}

pub fn prim_not(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, 1, span, "not");
    Ok(Value::Boolean(matches!(args[0], Value::Boolean(false))))
}

// --- List Primitives ---

fn type_mismatch(procedure: &str, expected: &'static str, found: &Value, span: Span) -> EvalError {
    EvalError::TypeMismatch {
        procedure: procedure.to_string(),
        expected,
        found: found.type_name(),
        span,
    }
}

fn expect_list(value: &Value, procedure: &str, span: Span) -> EvalResult<Vec<Value>> {
    value
        .list_items()
        .ok_or_else(|| type_mismatch(procedure, "a list", value, span))
}

pub fn prim_cons(args: &[Value], span: Span) -> EvalResult {
    // (cons a b) => (a . b)
    check_arity!(args, 2, span, "cons");
    Ok(Value::pair(args[0].clone(), args[1].clone()))
}

pub fn prim_car(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, 1, span, "car");
    match &args[0] {
        Value::Pair(car, _) => Ok(car.as_ref().clone()),
        other => Err(type_mismatch("car", "a pair", other, span)),
    }
}

pub fn prim_cdr(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, 1, span, "cdr");
    match &args[0] {
        Value::Pair(_, cdr) => Ok(cdr.as_ref().clone()),
        other => Err(type_mismatch("cdr", "a pair", other, span)),
    }
}

pub fn prim_list(args: &[Value], _span: Span) -> EvalResult {
    // (list item1 item2 ...) -> new list containing items
    Ok(Value::list(args.to_vec()))
}

pub fn prim_is_list(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, 1, span, "list?");
    Ok(Value::Boolean(args[0].list_items().is_some()))
}

pub fn prim_length(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, 1, span, "length");
    let items = expect_list(&args[0], "length", span)?;
    Ok(Value::Integer(items.len() as i64))
}

pub fn prim_list_ref(args: &[Value], span: Span) -> EvalResult {
    check_arity!(args, 2, span, "list-ref");
    let items = expect_list(&args[0], "list-ref", span)?;
    let index = match &args[1] {
        Value::Integer(n) => *n,
        other => return Err(type_mismatch("list-ref", "an integer index", other, span)),
    };
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or_else(|| EvalError::BadArguments {
            procedure: "list-ref".to_string(),
            message: format!("index {} out of range for list of length {}", index, items.len()),
            span,
        })
}

pub fn prim_append(args: &[Value], span: Span) -> EvalResult {
    let mut items = Vec::new();
    for arg in args {
        items.extend(expect_list(arg, "append", span)?);
    }
    Ok(Value::list(items))
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::evaluator::evaluate;
    use crate::parser::parse_str;

    // Helper to evaluate input string and check the result
    fn assert_eval(input: &str, expected: Value) {
        let env = Environment::new_global_populated();
        match parse_str(input) {
            Ok(node) => match evaluate(&node, env) {
                Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
                Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
            },
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    fn assert_printed(input: &str, expected: &str) {
        let env = Environment::new_global_populated();
        let node = parse_str(input).unwrap();
        match evaluate(&node, env) {
            Ok(result) => assert_eq!(result.to_string(), expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to assert evaluation errors by variant
    fn assert_eval_error(input: &str, expected_error_variant: &EvalError) {
        let env = Environment::new_global_populated();
        let node = parse_str(input).unwrap();
        match evaluate(&node, env) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => assert_eq!(
                std::mem::discriminant(&e),
                std::mem::discriminant(expected_error_variant),
                "Input: '{}', Expected error variant like {:?}, got: {:?}",
                input,
                expected_error_variant,
                e
            ),
        }
    }

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    fn float(n: f64) -> Value {
        Value::Float(n)
    }

    fn boolean(b: bool) -> Value {
        Value::Boolean(b)
    }

    fn bad_arguments() -> EvalError {
        EvalError::BadArguments {
            procedure: "".into(),
            message: "".into(),
            span: Span::default(),
        }
    }

    fn type_mismatch() -> EvalError {
        EvalError::TypeMismatch {
            procedure: "".into(),
            expected: "",
            found: "",
            span: Span::default(),
        }
    }

    fn divide_by_zero() -> EvalError {
        EvalError::DivideByZero {
            span: Span::default(),
        }
    }

    #[test]
    fn test_addition() {
        assert_eval("(+)", int(0));
        assert_eval("(+ 5)", int(5));
        assert_eval("(+ 1 2)", int(3));
        assert_eval("(+ 10 20 30 40)", int(100));
        assert_eval("(+ 1 2.5)", float(3.5));
    }

    #[test]
    fn test_subtraction() {
        assert_eval("(- 5)", int(-5));
        assert_eval("(- 10 3)", int(7));
        assert_eval("(- 10 3 2)", int(5));
        assert_eval("(- 3 1 1)", int(1));
        assert_eval("(- 1.5)", float(-1.5));
        assert_eval_error("(-)", &bad_arguments());
    }

    #[test]
    fn test_negation() {
        assert_eval("(- 0)", int(0));
        assert_eval("(- -9223372036854775808)", float(9223372036854775808.0));
        let env = Environment::new_global_populated();
        let node = parse_str("(- 0.0)").unwrap();
        match evaluate(&node, env) {
            Ok(Value::Float(n)) => assert!(n == 0.0 && n.is_sign_negative(), "got {}", n),
            other => panic!("Expected a float, got {:?}", other),
        }
    }

    #[test]
    fn test_multiplication() {
        assert_eval("(* 7)", int(7));
        assert_eval("(* 1 2)", int(2));
        assert_eval("(* 1 2 -3)", int(-6));
        assert_eval("(* 2 0.5)", float(1.0));
        assert_eval_error("(*)", &bad_arguments());
    }

    #[test]
    fn test_division() {
        assert_eval("(/ 10 2)", int(5));
        assert_eval("(/ 10 4)", float(2.5));
        assert_eval("(/ 20 2 5)", int(2));
        assert_eval("(/ 5)", float(0.2));
        assert_eval("(/ 1)", int(1));
        assert_eval("(/ 1.0 4)", float(0.25));
        assert_eval_error("(/)", &bad_arguments());
    }

    #[test]
    fn test_division_by_zero() {
        assert_eval_error("(/ 1 0)", &divide_by_zero());
        assert_eval_error("(/ 0)", &divide_by_zero());
        assert_eval_error("(/ 1 2 0)", &divide_by_zero());
        assert_eval_error("(/ 1 0.0)", &divide_by_zero());
    }

    #[test]
    fn test_integer_overflow_promotes_to_float() {
        assert_eval("(+ 9223372036854775807 1)", float(9223372036854775808.0));
    }

    #[test]
    fn test_arithmetic_type_errors() {
        assert_eval_error("(+ 1 #t)", &bad_arguments());
        assert_eval_error("(* 2 nil)", &bad_arguments());
        assert_eval_error("(< 1 #f)", &bad_arguments());
    }

    #[test]
    fn test_chained_comparisons() {
        assert_eval("(< 1 2 3)", boolean(true));
        assert_eval("(< 1 3 2)", boolean(false));
        assert_eval("(<= 5 5 6)", boolean(true));
        assert_eval("(> 6 5 4)", boolean(true));
        assert_eval("(> 6 5 5)", boolean(false));
        assert_eval("(>= 5 5 4 4 3)", boolean(true));
        assert_eval("(< 1 1.5 2)", boolean(true));
        assert_eval_error("(< 1)", &bad_arguments());
    }

    #[test]
    fn test_equal() {
        assert_eval("(equal? 5 5)", boolean(true));
        assert_eval("(equal? 5 5 5 5)", boolean(true));
        assert_eval("(equal? 5 5 6)", boolean(false));
        assert_eval("(equal? 2 2.0)", boolean(true));
        assert_eval("(equal? #t #t)", boolean(true));
        assert_eval("(equal? #t 1)", boolean(false));
        assert_eval("(equal? (cons 1 2) (cons 1 2))", boolean(true));
        assert_eval("(equal? (list 1 2) (list 1 3))", boolean(false));
        assert_eval("(equal? car car)", boolean(true));
        assert_eval("(equal? car cdr)", boolean(false));
        assert_eval_error("(equal? 1)", &bad_arguments());
    }

    #[test]
    fn test_equal_int_and_float_is_exact() {
        assert_eval("(equal? 9007199254740993 9007199254740992.0)", boolean(false));
        assert_eval("(equal? 9007199254740992 9007199254740992.0)", boolean(true));
        assert_eval("(equal? 3 3.5)", boolean(false));
        assert_eval("(equal? 1.0 1)", boolean(true));
        assert_eval("(equal? 9223372036854775807 9223372036854775808.0)", boolean(false));
    }

    #[test]
    fn test_equal_long_lists() {
        let long = |last: i64| {
            let mut items: Vec<Value> = (0..300_000).map(Value::Integer).collect();
            items.push(Value::Integer(last));
            Value::list(items)
        };
        assert!(values_equal(&long(1), &long(1)));
        assert!(!values_equal(&long(1), &long(2)));

        let result = prim_equal(&[long(7), long(7)], Span::default());
        assert_eq!(result, Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_length_of_long_list() {
        let items = (0..300_000).map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
        assert_eval(&format!("(length (list {}))", items), int(300_000));
    }

    #[test]
    fn test_not() {
        assert_eval("(not #f)", boolean(true));
        assert_eval("(not #t)", boolean(false));
        assert_eval("(not 0)", boolean(false));
        assert_eval_error("(not)", &bad_arguments());
        assert_eval_error("(not 1 2)", &bad_arguments());
    }

    #[test]
    fn test_pairs() {
        assert_printed("(cons 1 2)", "(1 . 2)");
        assert_eval("(car (cons 1 2))", int(1));
        assert_eval("(cdr (cons 1 2))", int(2));
        assert_printed("(cons 1 (cons 2 nil))", "(1 2)");
        assert_eval_error("(cons 1)", &bad_arguments());
        assert_eval_error("(car (cons 1 2) 3)", &bad_arguments());
    }

    #[test]
    fn test_car_cdr_type_mismatch() {
        assert_eval_error("(car 5)", &type_mismatch());
        assert_eval_error("(cdr nil)", &type_mismatch());
        assert_eval_error("(car #t)", &type_mismatch());
    }

    #[test]
    fn test_lists() {
        assert_eval("(list)", Value::Nil);
        assert_printed("(list 1 2 3)", "(1 2 3)");
        assert_eval("(list? (list 1 2))", boolean(true));
        assert_eval("(list? nil)", boolean(true));
        assert_eval("(list? (cons 1 2))", boolean(false));
        assert_eval("(list? 1)", boolean(false));
        assert_eval("(length (list 1 2 3))", int(3));
        assert_eval("(length nil)", int(0));
        assert_eval_error("(length (cons 1 2))", &type_mismatch());
    }

    #[test]
    fn test_list_ref() {
        assert_eval("(list-ref (list 10 20 30) 1)", int(20));
        assert_eval_error("(list-ref (list 10 20 30) 3)", &bad_arguments());
        assert_eval_error("(list-ref (list 10) -1)", &bad_arguments());
        assert_eval_error("(list-ref (list 10) 0.5)", &type_mismatch());
        assert_eval_error("(list-ref 5 0)", &type_mismatch());
    }

    #[test]
    fn test_append() {
        assert_eval("(append)", Value::Nil);
        assert_printed("(append (list 1 2) nil (list 3))", "(1 2 3)");
        assert_eval_error("(append (list 1) 2)", &type_mismatch());
    }
}
