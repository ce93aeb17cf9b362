//! Runtime values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Element type of a value, ordered by widening: `bool < int64 < float64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int64,
    Float64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int64 => "int64",
            DType::Float64 => "float64",
        }
    }

    /// The smallest dtype both operands widen to.
    pub fn promote(self, other: DType) -> DType {
        self.max(other)
    }

    /// Whether converting `self` to `target` preserves every value.
    pub fn widens_to(self, target: DType) -> bool {
        self <= target
    }

    pub fn zero(self) -> Value {
        match self {
            DType::Bool => Value::Bool(false),
            DType::Int64 => Value::Int(0),
            DType::Float64 => Value::Float(0.0),
        }
    }

    pub fn one(self) -> Value {
        match self {
            DType::Bool => Value::Bool(true),
            DType::Int64 => Value::Int(1),
            DType::Float64 => Value::Float(1.0),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The static type of a value: an element type plus a shape.
/// An empty shape is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub dtype: DType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<usize>,
}

impl Type {
    pub fn scalar(dtype: DType) -> Self {
        Self {
            dtype,
            shape: Vec::new(),
        }
    }

    pub fn array(dtype: DType, shape: Vec<usize>) -> Self {
        Self { dtype, shape }
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Same shape, different element type.
    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self {
            dtype,
            shape: self.shape.clone(),
        }
    }

    /// Shape of an elementwise operation over `self` and `other`.
    /// Scalars broadcast; arrays must agree exactly.
    pub fn broadcast_shape(&self, other: &Type) -> Option<Vec<usize>> {
        if self.is_scalar() {
            Some(other.shape.clone())
        } else if other.is_scalar() || self.shape == other.shape {
            Some(self.shape.clone())
        } else {
            None
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            write!(f, "{}", self.dtype)
        } else {
            let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
            write!(f, "{}[{}]", self.dtype, dims.join(", "))
        }
    }
}

/// A runtime value held in an argument slot.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean scalar
    Bool(bool),
    /// 64-bit integer scalar
    Int(i64),
    /// 64-bit float scalar
    Float(f64),
    /// Shared n-dimensional array
    Array(Arc<NdArray>),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Bool(_) => DType::Bool,
            Value::Int(_) => DType::Int64,
            Value::Float(_) => DType::Float64,
            Value::Array(array) => array.dtype(),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Array(array) => Type::array(array.dtype(), array.shape().to_vec()),
            scalar => Type::scalar(scalar.dtype()),
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_))
    }

    /// Try to get as integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as float. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Convert to `dtype`, elementwise for arrays.
    pub fn cast(&self, dtype: DType) -> Result<Value, String> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        match (self, dtype) {
            (Value::Array(array), _) => Ok(Value::Array(Arc::new(
                array.map(|item| item.cast(dtype))?,
            ))),
            (Value::Bool(b), DType::Int64) => Ok(Value::Int(*b as i64)),
            (Value::Bool(b), DType::Float64) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Int(n), DType::Float64) => Ok(Value::Float(*n as f64)),
            (Value::Int(n), DType::Bool) => Ok(Value::Bool(*n != 0)),
            (Value::Float(x), DType::Bool) => Ok(Value::Bool(*x != 0.0)),
            (Value::Float(x), DType::Int64) => {
                if x.is_finite() && *x >= i64::MIN as f64 && *x <= i64::MAX as f64 {
                    Ok(Value::Int(x.trunc() as i64))
                } else {
                    Err(format!("cannot convert {} to int64", x))
                }
            }
            (value, dtype) => Err(format!("cannot convert {:?} to {}", value, dtype)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<NdArray> for Value {
    fn from(array: NdArray) -> Self {
        Value::Array(Arc::new(array))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Array(array) => write!(f, "{}", array),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A dense row-major array of scalar values sharing one dtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArrayRepr", into = "ArrayRepr")]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    items: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct ArrayRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dtype: Option<DType>,
    shape: Vec<usize>,
    items: Vec<Value>,
}

impl TryFrom<ArrayRepr> for NdArray {
    type Error = String;

    fn try_from(repr: ArrayRepr) -> Result<Self, Self::Error> {
        match repr.dtype {
            Some(dtype) => NdArray::typed(dtype, repr.shape, repr.items),
            None => NdArray::new(repr.shape, repr.items),
        }
    }
}

impl From<NdArray> for ArrayRepr {
    fn from(array: NdArray) -> Self {
        ArrayRepr {
            dtype: Some(array.dtype),
            shape: array.shape,
            items: array.items,
        }
    }
}

impl NdArray {
    /// Build an array from row-major scalar items.
    /// Empty arrays default to float64.
    pub fn new(shape: Vec<usize>, items: Vec<Value>) -> Result<Self, String> {
        let dtype = items.first().map(Value::dtype).unwrap_or(DType::Float64);
        NdArray::typed(dtype, shape, items)
    }

    /// Build an array of `dtype` items; holds for empty arrays too.
    pub fn typed(dtype: DType, shape: Vec<usize>, items: Vec<Value>) -> Result<Self, String> {
        let expected: usize = shape.iter().product();
        if items.len() != expected {
            return Err(format!(
                "shape {:?} needs {} items, got {}",
                shape,
                expected,
                items.len()
            ));
        }
        for item in &items {
            if !item.is_scalar() {
                return Err("array items must be scalars".to_string());
            }
            if item.dtype() != dtype {
                return Err(format!(
                    "mixed array items: {} and {}",
                    dtype,
                    item.dtype()
                ));
            }
        }
        Ok(Self {
            dtype,
            shape,
            items,
        })
    }

    /// An array with every item set to `fill`.
    pub fn filled(shape: Vec<usize>, fill: Value) -> Result<Self, String> {
        if !fill.is_scalar() {
            return Err("fill value must be a scalar".to_string());
        }
        let len: usize = shape.iter().product();
        Ok(Self {
            dtype: fill.dtype(),
            items: vec![fill; len],
            shape,
        })
    }

    pub fn zeros(shape: Vec<usize>, dtype: DType) -> Self {
        let len: usize = shape.iter().product();
        Self {
            dtype,
            items: vec![dtype.zero(); len],
            shape,
        }
    }

    pub fn ones(shape: Vec<usize>, dtype: DType) -> Self {
        let len: usize = shape.iter().product();
        Self {
            dtype,
            items: vec![dtype.one(); len],
            shape,
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply `f` to every item, keeping the shape.
    ///
    /// The result dtype is that of `f`'s results. An empty array has none,
    /// so `f` is tried on a one of the input dtype instead, keeping the
    /// input dtype if that fails.
    pub fn map(&self, f: impl Fn(&Value) -> Result<Value, String>) -> Result<NdArray, String> {
        let items = self.items.iter().map(&f).collect::<Result<Vec<_>, _>>()?;
        let dtype = match items.first() {
            Some(item) => item.dtype(),
            None => f(&self.dtype.one()).map_or(self.dtype, |sample| sample.dtype()),
        };
        NdArray::typed(dtype, self.shape.clone(), items)
    }

    /// Combine two equally shaped arrays item by item.
    pub fn zip_with(
        &self,
        other: &NdArray,
        f: impl Fn(&Value, &Value) -> Result<Value, String>,
    ) -> Result<NdArray, String> {
        if self.shape != other.shape {
            return Err(format!(
                "shape mismatch: {:?} vs {:?}",
                self.shape, other.shape
            ));
        }
        let items = self
            .items
            .iter()
            .zip(other.items.iter())
            .map(|(a, b)| f(a, b))
            .collect::<Result<Vec<_>, _>>()?;
        let dtype = match items.first() {
            Some(item) => item.dtype(),
            None => f(&self.dtype.one(), &other.dtype.one())
                .map_or(self.dtype.promote(other.dtype), |sample| sample.dtype()),
        };
        NdArray::typed(dtype, self.shape.clone(), items)
    }

    fn fmt_axis(&self, f: &mut fmt::Formatter<'_>, axis: usize, offset: usize) -> fmt::Result {
        write!(f, "[")?;
        let extent = self.shape[axis];
        let stride: usize = self.shape[axis + 1..].iter().product();
        for i in 0..extent {
            if i > 0 {
                write!(f, ", ")?;
            }
            if axis + 1 == self.shape.len() {
                write!(f, "{:?}", self.items[offset + i])?;
            } else {
                self.fmt_axis(f, axis + 1, offset + i * stride)?;
            }
        }
        write!(f, "]")
    }
}

impl fmt::Display for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shape.is_empty() {
            return match self.items.first() {
                Some(item) => write!(f, "{:?}", item),
                None => write!(f, "[]"),
            };
        }
        self.fmt_axis(f, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_and_widen() {
        assert_eq!(DType::Int64.promote(DType::Float64), DType::Float64);
        assert_eq!(DType::Bool.promote(DType::Int64), DType::Int64);
        assert!(DType::Bool.widens_to(DType::Float64));
        assert!(!DType::Float64.widens_to(DType::Int64));
    }

    #[test]
    fn test_broadcast_shape() {
        let scalar = Type::scalar(DType::Int64);
        let grid = Type::array(DType::Float64, vec![10, 10]);
        let row = Type::array(DType::Float64, vec![10]);
        assert_eq!(scalar.broadcast_shape(&grid), Some(vec![10, 10]));
        assert_eq!(grid.broadcast_shape(&scalar), Some(vec![10, 10]));
        assert_eq!(grid.broadcast_shape(&row), None);
        assert_eq!(grid.to_string(), "float64[10, 10]");
    }

    #[test]
    fn test_cast() {
        assert_eq!(Value::Int(3).cast(DType::Float64), Ok(Value::Float(3.0)));
        assert_eq!(Value::Bool(true).cast(DType::Int64), Ok(Value::Int(1)));
        assert_eq!(Value::Float(2.7).cast(DType::Int64), Ok(Value::Int(2)));
        assert!(Value::Float(f64::NAN).cast(DType::Int64).is_err());

        let ones = Value::from(NdArray::ones(vec![2], DType::Int64));
        let cast = ones.cast(DType::Float64).unwrap();
        assert_eq!(cast.ty(), Type::array(DType::Float64, vec![2]));
    }

    #[test]
    fn test_empty_arrays_keep_dtype() {
        let empty = NdArray::zeros(vec![0], DType::Int64);
        assert_eq!(empty.dtype(), DType::Int64);

        let cast = Value::from(empty.clone()).cast(DType::Bool).unwrap();
        assert_eq!(cast.ty(), Type::array(DType::Bool, vec![0]));

        let halves = empty.map(|item| item.cast(DType::Float64)).unwrap();
        assert_eq!(halves.dtype(), DType::Float64);

        let flags = NdArray::zeros(vec![2, 0], DType::Bool);
        let same = flags.zip_with(&flags, |a, _| Ok(a.clone())).unwrap();
        assert_eq!(same.dtype(), DType::Bool);
        assert_eq!(same.shape(), &[2, 0]);

        let failing = empty.map(|_| Err("no items expected".to_string())).unwrap();
        assert_eq!(failing.dtype(), DType::Int64);
    }

    #[test]
    fn test_typed_rejects_other_items() {
        assert!(NdArray::typed(DType::Int64, vec![1], vec![Value::Float(1.0)]).is_err());
        let empty = NdArray::typed(DType::Bool, vec![0], vec![]).unwrap();
        assert_eq!(empty.dtype(), DType::Bool);
    }

    #[test]
    fn test_array_validation() {
        assert!(NdArray::new(vec![2, 2], vec![Value::Int(1)]).is_err());
        assert!(NdArray::new(vec![2], vec![Value::Int(1), Value::Float(1.0)]).is_err());
        let array = NdArray::new(vec![2, 2], (1..=4).map(Value::Int).collect()).unwrap();
        assert_eq!(array.to_string(), "[[1, 2], [3, 4]]");
    }

    #[test]
    fn test_value_json() {
        let value: Value = serde_json::from_str("3").unwrap();
        assert_eq!(value, Value::Int(3));
        let value: Value = serde_json::from_str("2.5").unwrap();
        assert_eq!(value, Value::Float(2.5));
        let value: Value = serde_json::from_str(r#"{"shape": [2], "items": [true, false]}"#).unwrap();
        assert_eq!(value.ty(), Type::array(DType::Bool, vec![2]));

        let bad = serde_json::from_str::<Value>(r#"{"shape": [3], "items": [1]}"#);
        assert!(bad.is_err());
    }
}
