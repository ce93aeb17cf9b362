//! Builtin binary functions.
//!
//! Each builtin is a process-wide singleton, so every call to e.g. [`add`]
//! returns a handle with the same identity and cached `Apply` nodes are
//! shared between callers. Arithmetic and comparisons work on scalars and
//! broadcast over arrays; arrays must agree in shape.
//!
//! Float arithmetic follows IEEE 754: dividing by zero gives an infinity or
//! NaN, and every comparison with NaN is false except `ne`.

use crate::value::NdArray;
use crate::{BinaryFn, DType, Value};
use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

macro_rules! builtin {
    ($(#[$doc:meta])* $name:ident => $body:expr) => {
        $(#[$doc])*
        pub fn $name() -> BinaryFn {
            static FUNC: LazyLock<BinaryFn> =
                LazyLock::new(|| BinaryFn::new(stringify!($name), $body));
            FUNC.clone()
        }
    };
}

builtin!(
    /// Elementwise addition.
    add => |l, r| elementwise(l, r, |a, b| arith(a, b, "add", i64::checked_add, |x, y| x + y))
);
builtin!(
    /// Elementwise subtraction.
    sub => |l, r| elementwise(l, r, |a, b| arith(a, b, "sub", i64::checked_sub, |x, y| x - y))
);
builtin!(
    /// Elementwise multiplication.
    mul => |l, r| elementwise(l, r, |a, b| arith(a, b, "mul", i64::checked_mul, |x, y| x * y))
);
builtin!(
    /// Elementwise true division; always yields float64.
    div => |l, r| elementwise(l, r, true_div)
);
builtin!(
    /// Elementwise power.
    pow => |l, r| elementwise(l, r, power)
);
builtin!(
    /// Elementwise maximum.
    max => |l, r| elementwise(l, r, |a, b| arith(a, b, "max", |x, y| Some(x.max(y)), f64::max))
);
builtin!(
    /// Elementwise minimum.
    min => |l, r| elementwise(l, r, |a, b| arith(a, b, "min", |x, y| Some(x.min(y)), f64::min))
);
builtin!(eq => |l, r| elementwise(l, r, |a, b| compare(a, b, |o| o.is_some_and(Ordering::is_eq))));
builtin!(ne => |l, r| elementwise(l, r, |a, b| compare(a, b, |o| !o.is_some_and(Ordering::is_eq))));
builtin!(lt => |l, r| elementwise(l, r, |a, b| compare(a, b, |o| o.is_some_and(Ordering::is_lt))));
builtin!(le => |l, r| elementwise(l, r, |a, b| compare(a, b, |o| o.is_some_and(Ordering::is_le))));
builtin!(gt => |l, r| elementwise(l, r, |a, b| compare(a, b, |o| o.is_some_and(Ordering::is_gt))));
builtin!(ge => |l, r| elementwise(l, r, |a, b| compare(a, b, |o| o.is_some_and(Ordering::is_ge))));
builtin!(
    /// Logical conjunction over bools.
    and => |l, r| elementwise(l, r, |a, b| logic(a, b, "and", |x, y| x && y))
);
builtin!(
    /// Logical disjunction over bools.
    or => |l, r| elementwise(l, r, |a, b| logic(a, b, "or", |x, y| x || y))
);
builtin!(
    /// Convert the left operand to bool; the right operand is ignored.
    as_bool => |l, _| l.cast(DType::Bool)
);
builtin!(
    /// Convert the left operand to int64; the right operand is ignored.
    as_int64 => |l, _| l.cast(DType::Int64)
);
builtin!(
    /// Convert the left operand to float64; the right operand is ignored.
    as_float64 => |l, _| l.cast(DType::Float64)
);

/// The conversion builtin targeting `dtype`.
pub fn cast_to(dtype: DType) -> BinaryFn {
    match dtype {
        DType::Bool => as_bool(),
        DType::Int64 => as_int64(),
        DType::Float64 => as_float64(),
    }
}

/// Find a builtin by name.
pub fn lookup(name: &str) -> Option<BinaryFn> {
    let func = match name {
        "add" => add(),
        "sub" => sub(),
        "mul" => mul(),
        "div" => div(),
        "pow" => pow(),
        "max" => max(),
        "min" => min(),
        "eq" => eq(),
        "ne" => ne(),
        "lt" => lt(),
        "le" => le(),
        "gt" => gt(),
        "ge" => ge(),
        "and" => and(),
        "or" => or(),
        "as_bool" => as_bool(),
        "as_int64" => as_int64(),
        "as_float64" => as_float64(),
        _ => return None,
    };
    Some(func)
}

/// Apply a scalar operation, broadcasting scalars over arrays.
fn elementwise(
    left: &Value,
    right: &Value,
    op: impl Fn(&Value, &Value) -> Result<Value, String>,
) -> Result<Value, String> {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => Ok(array(a.zip_with(b, op)?)),
        (Value::Array(a), scalar) => Ok(array(a.map(|item| op(item, scalar))?)),
        (scalar, Value::Array(b)) => Ok(array(b.map(|item| op(scalar, item))?)),
        (a, b) => op(a, b),
    }
}

fn array(array: NdArray) -> Value {
    Value::Array(Arc::new(array))
}

enum Num {
    Int(i64),
    Float(f64),
}

fn num(value: &Value) -> Result<Num, String> {
    match value {
        Value::Bool(b) => Ok(Num::Int(*b as i64)),
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Float(x) => Ok(Num::Float(*x)),
        Value::Array(_) => Err("expected a scalar".to_string()),
    }
}

fn float(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(x) => x,
    }
}

fn arith(
    left: &Value,
    right: &Value,
    name: &str,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, String> {
    match (num(left)?, num(right)?) {
        (Num::Int(a), Num::Int(b)) => int_op(a, b)
            .map(Value::Int)
            .ok_or_else(|| format!("integer overflow in {}", name)),
        (a, b) => Ok(Value::Float(float_op(float(a), float(b)))),
    }
}

fn true_div(left: &Value, right: &Value) -> Result<Value, String> {
    Ok(Value::Float(float(num(left)?) / float(num(right)?)))
}

fn power(left: &Value, right: &Value) -> Result<Value, String> {
    match (num(left)?, num(right)?) {
        (Num::Int(a), Num::Int(b)) => {
            let exp = u32::try_from(b).map_err(|_| format!("invalid integer exponent {}", b))?;
            a.checked_pow(exp)
                .map(Value::Int)
                .ok_or_else(|| "integer overflow in pow".to_string())
        }
        (a, b) => Ok(Value::Float(float(a).powf(float(b)))),
    }
}

/// `test` sees `None` when either side is NaN.
fn compare(
    left: &Value,
    right: &Value,
    test: impl Fn(Option<Ordering>) -> bool,
) -> Result<Value, String> {
    let ordering = match (num(left)?, num(right)?) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (a, b) => float(a).partial_cmp(&float(b)),
    };
    Ok(Value::Bool(test(ordering)))
}

fn logic(
    left: &Value,
    right: &Value,
    name: &str,
    op: impl Fn(bool, bool) -> bool,
) -> Result<Value, String> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(op(*a, *b))),
        _ => Err(format!("{} expects bool operands", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_identity() {
        assert_eq!(add(), add());
        assert_ne!(add(), mul());
        assert_eq!(lookup("mul"), Some(mul()));
        assert_eq!(lookup("nope"), None);
        assert_eq!(cast_to(DType::Float64), as_float64());
    }

    #[test]
    fn test_scalar_arithmetic() {
        assert_eq!(add().call(&Value::Int(2), &Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(
            mul().call(&Value::Int(2), &Value::Float(1.5)),
            Ok(Value::Float(3.0))
        );
        assert_eq!(div().call(&Value::Int(7), &Value::Int(2)), Ok(Value::Float(3.5)));
        assert_eq!(pow().call(&Value::Int(2), &Value::Int(10)), Ok(Value::Int(1024)));
    }

    #[test]
    fn test_failures() {
        assert!(add().call(&Value::Int(i64::MAX), &Value::Int(1)).is_err());
        assert!(pow().call(&Value::Int(2), &Value::Int(-1)).is_err());
        assert!(and().call(&Value::Int(1), &Value::Bool(true)).is_err());
    }

    #[test]
    fn test_broadcast() {
        let ones = Value::from(NdArray::ones(vec![2, 2], DType::Int64));
        let result = add().call(&ones, &Value::Int(1)).unwrap();
        assert_eq!(result, Value::from(NdArray::filled(vec![2, 2], Value::Int(2)).unwrap()));

        let row = Value::from(NdArray::ones(vec![2], DType::Int64));
        assert!(add().call(&ones, &row).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(lt().call(&Value::Int(1), &Value::Float(1.5)), Ok(Value::Bool(true)));
        assert_eq!(eq().call(&Value::Bool(true), &Value::Int(1)), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_nan_comparisons() {
        let nan = Value::Float(f64::NAN);
        for func in [eq(), lt(), le(), gt(), ge()] {
            assert_eq!(func.call(&nan, &Value::Int(1)), Ok(Value::Bool(false)));
            assert_eq!(func.call(&nan, &nan), Ok(Value::Bool(false)));
        }
        assert_eq!(ne().call(&nan, &nan), Ok(Value::Bool(true)));
        assert_eq!(ne().call(&Value::Int(1), &nan), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            div().call(&Value::Int(1), &Value::Int(0)),
            Ok(Value::Float(f64::INFINITY))
        );
        assert_eq!(
            div().call(&Value::Float(-2.0), &Value::Int(0)),
            Ok(Value::Float(f64::NEG_INFINITY))
        );
        match div().call(&Value::Int(0), &Value::Float(0.0)) {
            Ok(Value::Float(x)) => assert!(x.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_array_results_keep_dtype() {
        let empty = Value::from(NdArray::zeros(vec![0], DType::Int64));
        let sum = add().call(&empty, &Value::Int(1)).unwrap();
        assert_eq!(sum.dtype(), DType::Int64);
        assert_eq!(div().call(&empty, &Value::Int(2)).unwrap().dtype(), DType::Float64);
        assert_eq!(lt().call(&empty, &empty).unwrap().dtype(), DType::Bool);
        assert_eq!(as_bool().call(&empty, &empty).unwrap().dtype(), DType::Bool);
    }
}
