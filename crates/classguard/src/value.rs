//! Dynamic values and runtime type tags.
//!
//! [`Value`] is the currency of the object model: attribute values, defaults, constants,
//! function arguments and return values are all `Value`s. Classes and instances live in
//! the [`Heap`](crate::heap::Heap) and are referenced by [`HeapId`].
//!
//! # Type constraints
//!
//! A [`TypeSpec`] names an accepted type for a validated variable: either one of the
//! [`BuiltinType`]s or a class (matched against the instance's ancestor chain).
//! When a variable accepts exactly one type, a mismatched value is coerced by
//! "constructing" that type from it, mirroring `int("5")` in a dynamic language.

use std::fmt::{self, Write};

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    exception::{ExcType, Exception, RunResult},
    function::Function,
    heap::{Heap, HeapId},
};

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Self>),
    /// A host function; compared by identity.
    Function(Function),
    /// Reference to an instance in the heap.
    Instance(HeapId),
    /// Reference to a class or interface in the heap.
    Class(HeapId),
}

impl Value {
    /// Returns true if the value is a function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Returns the wrapped function, if this value is one.
    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Returns the integer payload, if this value is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string payload, if this value is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the instance id, if this value references an instance.
    #[must_use]
    pub fn as_instance(&self) -> Option<HeapId> {
        match self {
            Self::Instance(id) => Some(*id),
            _ => None,
        }
    }

    /// Truth value testing, following the usual dynamic-language rules.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Function(_) | Self::Instance(_) | Self::Class(_) => true,
        }
    }

    /// Returns the name of this value's runtime type.
    ///
    /// Instances report their class name when the heap can resolve it.
    #[must_use]
    pub fn type_name(&self, heap: &Heap) -> String {
        match self {
            Self::Instance(id) => heap
                .instance(*id)
                .and_then(|inst| heap.class(inst.class_id()))
                .map_or_else(|_| "object".to_owned(), |cls| cls.name().to_owned()),
            Self::Class(_) => "type".to_owned(),
            other => BuiltinType::of(other).map_or("object", <&'static str>::from).to_owned(),
        }
    }

    /// Writes the `repr` form of the value (strings quoted).
    pub fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            other => write!(f, "{other}"),
        }
    }

    /// Returns the `repr` form of the value.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.repr_fmt(&mut out);
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => float_fmt(*v, f),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.repr_fmt(f)?;
                }
                f.write_char(']')
            }
            Self::Function(function) => write!(f, "<function {}>", function.name()),
            Self::Instance(id) => write!(f, "<instance {id}>"),
            Self::Class(id) => write!(f, "<class {id}>"),
        }
    }
}

/// Shortest round-trip form with a signed, two-digit minimum exponent (`1e+20`, `1e-05`).
fn float_fmt(v: f64, f: &mut impl Write) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }
    let repr = format!("{v:?}");
    match repr.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = exp.strip_prefix('-').map_or(('+', exp), |digits| ('-', digits));
            write!(f, "{mantissa}e{sign}{digits:0>2}")
        }
        None => f.write_str(&repr),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// The builtin runtime types a variable can be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum BuiltinType {
    #[strum(serialize = "NoneType")]
    NoneType,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "str")]
    Str,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "function")]
    Function,
}

impl BuiltinType {
    /// Returns the exact builtin type of a value, or `None` for heap references.
    ///
    /// `Bool` is not treated as a subtype of `Int`.
    #[must_use]
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::None => Some(Self::NoneType),
            Value::Bool(_) => Some(Self::Bool),
            Value::Int(_) => Some(Self::Int),
            Value::Float(_) => Some(Self::Float),
            Value::Str(_) => Some(Self::Str),
            Value::List(_) => Some(Self::List),
            Value::Function(_) => Some(Self::Function),
            Value::Instance(_) | Value::Class(_) => None,
        }
    }

    /// Constructs a value of this type from `value`, like calling the type as a constructor.
    ///
    /// Fails with `TypeError` when the conversion is not defined for the input type and
    /// with `ValueError` when the input has the right type but an unusable content.
    pub fn construct(self, value: &Value) -> RunResult<Value> {
        match self {
            Self::NoneType => Err(ExcType::type_error("NoneType takes no arguments")),
            Self::Bool => Ok(Value::Bool(value.is_truthy())),
            Self::Int => construct_int(value),
            Self::Float => construct_float(value),
            Self::Str => Ok(Value::Str(value.to_string())),
            Self::List => match value {
                Value::List(items) => Ok(Value::List(items.clone())),
                Value::Str(s) => Ok(Value::List(s.chars().map(|c| Value::Str(c.to_string())).collect())),
                other => Err(not_iterable(other)),
            },
            Self::Function => Err(ExcType::type_error("cannot create 'function' instances")),
        }
    }
}

fn construct_int(value: &Value) -> RunResult<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(v) => {
            if v.is_nan() {
                return Err(ExcType::value_error("cannot convert float NaN to integer"));
            }
            let truncated = v.trunc();
            // i64::MAX as f64 rounds up to 2^63, which is out of range
            #[expect(clippy::cast_precision_loss, reason = "bounds are compared in float space")]
            let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
            if in_range {
                #[expect(clippy::cast_possible_truncation, reason = "range checked above")]
                let int = truncated as i64;
                Ok(Value::Int(int))
            } else {
                Err(ExcType::value_error(format!("cannot convert float {v} to integer")))
            }
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ExcType::value_error(format!("invalid literal for int() with base 10: '{s}'"))),
        other => Err(ExcType::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            kind_name(other)
        ))),
    }
}

fn construct_float(value: &Value) -> RunResult<Value> {
    match value {
        Value::Float(v) => Ok(Value::Float(*v)),
        #[expect(clippy::cast_precision_loss, reason = "int to float conversion is lossy by definition")]
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ExcType::value_error(format!("could not convert string to float: '{s}'"))),
        other => Err(ExcType::type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            kind_name(other)
        ))),
    }
}

fn not_iterable(value: &Value) -> Exception {
    ExcType::type_error(format!("'{}' object is not iterable", kind_name(value)))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Instance(_) => "object",
        Value::Class(_) => "type",
        other => BuiltinType::of(other).map_or("object", <&'static str>::from),
    }
}

/// One accepted type of a validated variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    Builtin(BuiltinType),
    /// Instances of this class or any of its subclasses.
    Class(HeapId),
}

impl TypeSpec {
    /// Returns true if `value`'s runtime type satisfies this constraint.
    #[must_use]
    pub fn matches(self, value: &Value, heap: &Heap) -> bool {
        match self {
            Self::Builtin(ty) => BuiltinType::of(value) == Some(ty),
            Self::Class(class_id) => match value {
                Value::Instance(id) => heap.is_instance_of(*id, class_id),
                _ => false,
            },
        }
    }

    /// Attempts to construct a value of this type from `value`.
    ///
    /// Classes cannot be constructed from arbitrary values, so only builtin specs coerce.
    pub fn construct(self, value: &Value, heap: &Heap) -> RunResult<Value> {
        match self {
            Self::Builtin(ty) => ty.construct(value),
            Self::Class(class_id) => {
                let name = heap.class(class_id).map_or("<unknown>", |cls| cls.name());
                Err(ExcType::type_error(format!(
                    "cannot construct '{name}' from '{}'",
                    value.type_name(heap)
                )))
            }
        }
    }

    /// Returns a display name for messages.
    #[must_use]
    pub fn display_name(self, heap: &Heap) -> String {
        match self {
            Self::Builtin(ty) => ty.to_string(),
            Self::Class(class_id) => heap
                .class(class_id)
                .map_or_else(|_| class_id.to_string(), |cls| cls.name().to_owned()),
        }
    }
}

impl From<BuiltinType> for TypeSpec {
    fn from(ty: BuiltinType) -> Self {
        Self::Builtin(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_from_numeric_string() {
        assert_eq!(BuiltinType::Int.construct(&Value::from("5")).unwrap(), Value::Int(5));
        assert_eq!(BuiltinType::Int.construct(&Value::from(" -12 ")).unwrap(), Value::Int(-12));
    }

    #[test]
    fn int_from_garbage_is_value_error() {
        let err = BuiltinType::Int.construct(&Value::from("x")).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::ValueError);
    }

    #[test]
    fn int_from_list_is_type_error() {
        let err = BuiltinType::Int.construct(&Value::List(vec![])).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
    }

    #[test]
    fn int_from_float_truncates() {
        assert_eq!(BuiltinType::Int.construct(&Value::Float(3.9)).unwrap(), Value::Int(3));
        assert_eq!(BuiltinType::Int.construct(&Value::Float(-3.9)).unwrap(), Value::Int(-3));
        let err = BuiltinType::Int.construct(&Value::Float(f64::NAN)).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::ValueError);
        let err = BuiltinType::Int.construct(&Value::Float(f64::INFINITY)).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::ValueError);
    }

    #[test]
    fn float_from_string_and_int() {
        assert_eq!(BuiltinType::Float.construct(&Value::from("1.5")).unwrap(), Value::Float(1.5));
        assert_eq!(BuiltinType::Float.construct(&Value::Int(2)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn str_and_bool_accept_anything() {
        assert_eq!(BuiltinType::Str.construct(&Value::Int(7)).unwrap(), Value::from("7"));
        assert_eq!(BuiltinType::Str.construct(&Value::Float(2.0)).unwrap(), Value::from("2.0"));
        assert_eq!(BuiltinType::Bool.construct(&Value::from("")).unwrap(), Value::Bool(false));
        assert_eq!(BuiltinType::Bool.construct(&Value::Int(3)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn list_from_string_splits_chars() {
        assert_eq!(
            BuiltinType::List.construct(&Value::from("ab")).unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        let err = BuiltinType::List.construct(&Value::Int(1)).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
    }

    #[test]
    fn bool_is_not_an_int() {
        assert_eq!(BuiltinType::of(&Value::Bool(true)), Some(BuiltinType::Bool));
        assert_ne!(BuiltinType::of(&Value::Bool(true)), Some(BuiltinType::Int));
    }

    #[test]
    fn display_and_repr() {
        let list = Value::from(vec![Value::Int(1), Value::from("a"), Value::None]);
        assert_eq!(list.to_string(), "[1, 'a', None]");
        assert_eq!(Value::from("hi").repr(), "'hi'");
        assert_eq!(Value::Float(f64::NAN).to_string(), "nan");
    }

    #[test]
    fn float_exponents_are_signed_and_padded() {
        assert_eq!(Value::Float(1e20).to_string(), "1e+20");
        assert_eq!(Value::Float(1e-5).to_string(), "1e-05");
        assert_eq!(Value::Float(-1.5e300).to_string(), "-1.5e+300");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Float(1e15).to_string(), "1000000000000000.0");
    }

    #[test]
    fn builtin_type_names_round_trip() {
        assert_eq!(BuiltinType::NoneType.to_string(), "NoneType");
        assert_eq!("int".parse::<BuiltinType>().unwrap(), BuiltinType::Int);
    }
}
