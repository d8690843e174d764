//! Runtime values flowing through conversion rules.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{NumericKind, TypeHash, well_known};

/// A dynamically typed runtime value.
///
/// Reference types are held behind `Arc`, so converting a reference to one of its
/// supertypes never copies it; [`Value::same_ref`] observes that identity.
#[derive(Clone)]
pub enum Value {
    /// The untyped null sentinel.
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Str(Arc<str>),
    /// A value type converted to `object`.
    Boxed(Arc<Value>),
    /// An instance of `Nullable<T>`.
    Nullable(NullableValue),
    /// An instance of `Extensible<T>` (or of a type deriving from one).
    Extensible(Arc<ExtensibleValue>),
    /// An instance of a user-defined type.
    Object(Arc<ObjectValue>),
    /// An enumerator produced by a get-enumerator call.
    Enumerator(Arc<EnumeratorValue>),
    /// A delegate adapter wrapping a callable value.
    Delegate(Arc<DelegateValue>),
}

/// Payload of a `Nullable<T>` value.
#[derive(Debug, Clone, PartialEq)]
pub struct NullableValue {
    /// The `T` of `Nullable<T>`.
    pub payload: TypeHash,
    /// The held value, `None` when empty.
    pub value: Option<Box<Value>>,
}

impl NullableValue {
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// A primitive value carrying extra dynamic-language identity.
#[derive(Debug)]
pub struct ExtensibleValue {
    /// Runtime type: an `Extensible<T>` instance or a subclass of one.
    pub type_hash: TypeHash,
    /// The wrapped payload.
    pub value: Value,
}

/// An instance of a registered user type.
#[derive(Debug)]
pub struct ObjectValue {
    pub type_hash: TypeHash,
    pub fields: Vec<(String, Value)>,
    /// Items yielded when the object is enumerated.
    pub elements: Vec<Value>,
}

impl ObjectValue {
    pub fn new(type_hash: TypeHash) -> Self {
        Self {
            type_hash,
            fields: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn with_elements(mut self, elements: Vec<Value>) -> Self {
        self.elements = elements;
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A forward-only cursor over an enumerable's items.
#[derive(Debug)]
pub struct EnumeratorValue {
    /// `IEnumerator` or an `IEnumerator<T>` instance.
    pub type_hash: TypeHash,
    items: Arc<[Value]>,
    cursor: AtomicUsize,
}

impl EnumeratorValue {
    pub fn new(type_hash: TypeHash, items: impl Into<Arc<[Value]>>) -> Self {
        Self {
            type_hash,
            items: items.into(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Advance and return the next item.
    pub fn next_item(&self) -> Option<Value> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A synthesized delegate that invokes `target` when called.
#[derive(Debug)]
pub struct DelegateValue {
    pub delegate_type: TypeHash,
    pub target: Value,
}

impl Value {
    /// Wrap a user object.
    pub fn object(object: ObjectValue) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Wrap a payload in an `Extensible<T>`-derived type.
    pub fn extensible(type_hash: TypeHash, value: Value) -> Self {
        Value::Extensible(Arc::new(ExtensibleValue { type_hash, value }))
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// An empty `Nullable<payload>`.
    pub fn empty_nullable(payload: TypeHash) -> Self {
        Value::Nullable(NullableValue {
            payload,
            value: None,
        })
    }

    /// A `Nullable<payload>` holding `value`.
    pub fn nullable(payload: TypeHash, value: Value) -> Self {
        Value::Nullable(NullableValue {
            payload,
            value: Some(Box::new(value)),
        })
    }

    /// The zero of a numeric kind.
    pub fn zero(kind: NumericKind) -> Self {
        match kind {
            NumericKind::Int8 => Value::Int8(0),
            NumericKind::Int16 => Value::Int16(0),
            NumericKind::Int32 => Value::Int32(0),
            NumericKind::Int64 => Value::Int64(0),
            NumericKind::UInt8 => Value::UInt8(0),
            NumericKind::UInt16 => Value::UInt16(0),
            NumericKind::UInt32 => Value::UInt32(0),
            NumericKind::UInt64 => Value::UInt64(0),
            NumericKind::Float32 => Value::Float32(0.0),
            NumericKind::Float64 => Value::Float64(0.0),
        }
    }

    /// The exact runtime type of this value.
    ///
    /// A boxed value reports the type of its contents.
    pub fn type_hash(&self) -> TypeHash {
        match self {
            Value::Null => well_known::NULL,
            Value::Bool(_) => well_known::BOOL,
            Value::Str(_) => well_known::STRING,
            Value::Boxed(inner) => inner.type_hash(),
            Value::Nullable(n) => {
                TypeHash::from_generic_instance(well_known::NULLABLE, &[n.payload])
            }
            Value::Extensible(e) => e.type_hash,
            Value::Object(o) => o.type_hash,
            Value::Enumerator(e) => e.type_hash,
            Value::Delegate(d) => d.delegate_type,
            other => match other.numeric_kind() {
                Some(kind) => kind.type_hash(),
                None => well_known::OBJECT,
            },
        }
    }

    /// The numeric kind of an unboxed numeric value.
    pub fn numeric_kind(&self) -> Option<NumericKind> {
        Some(match self {
            Value::Int8(_) => NumericKind::Int8,
            Value::Int16(_) => NumericKind::Int16,
            Value::Int32(_) => NumericKind::Int32,
            Value::Int64(_) => NumericKind::Int64,
            Value::UInt8(_) => NumericKind::UInt8,
            Value::UInt16(_) => NumericKind::UInt16,
            Value::UInt32(_) => NumericKind::UInt32,
            Value::UInt64(_) => NumericKind::UInt64,
            Value::Float32(_) => NumericKind::Float32,
            Value::Float64(_) => NumericKind::Float64,
            _ => return None,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Strip one level of boxing, if any.
    pub fn unboxed(&self) -> &Value {
        match self {
            Value::Boxed(inner) => inner,
            other => other,
        }
    }

    /// Convert a numeric value to another numeric kind.
    ///
    /// Integers go through `i128` and floats through `f64`, so every widening in the
    /// conversion lattice is exact. Returns `None` for non-numeric values.
    pub fn cast_numeric(&self, to: NumericKind) -> Option<Value> {
        let from = self.numeric_kind()?;
        if from.is_float() {
            let v = match self {
                Value::Float32(v) => f64::from(*v),
                Value::Float64(v) => *v,
                _ => return None,
            };
            return Some(Self::from_f64(v, to));
        }
        let v: i128 = match self {
            Value::Int8(v) => i128::from(*v),
            Value::Int16(v) => i128::from(*v),
            Value::Int32(v) => i128::from(*v),
            Value::Int64(v) => i128::from(*v),
            Value::UInt8(v) => i128::from(*v),
            Value::UInt16(v) => i128::from(*v),
            Value::UInt32(v) => i128::from(*v),
            Value::UInt64(v) => i128::from(*v),
            _ => return None,
        };
        Some(match to {
            NumericKind::Int8 => Value::Int8(v as i8),
            NumericKind::Int16 => Value::Int16(v as i16),
            NumericKind::Int32 => Value::Int32(v as i32),
            NumericKind::Int64 => Value::Int64(v as i64),
            NumericKind::UInt8 => Value::UInt8(v as u8),
            NumericKind::UInt16 => Value::UInt16(v as u16),
            NumericKind::UInt32 => Value::UInt32(v as u32),
            NumericKind::UInt64 => Value::UInt64(v as u64),
            NumericKind::Float32 => Value::Float32(v as f32),
            NumericKind::Float64 => Value::Float64(v as f64),
        })
    }

    fn from_f64(v: f64, to: NumericKind) -> Value {
        match to {
            NumericKind::Int8 => Value::Int8(v as i8),
            NumericKind::Int16 => Value::Int16(v as i16),
            NumericKind::Int32 => Value::Int32(v as i32),
            NumericKind::Int64 => Value::Int64(v as i64),
            NumericKind::UInt8 => Value::UInt8(v as u8),
            NumericKind::UInt16 => Value::UInt16(v as u16),
            NumericKind::UInt32 => Value::UInt32(v as u32),
            NumericKind::UInt64 => Value::UInt64(v as u64),
            NumericKind::Float32 => Value::Float32(v as f32),
            NumericKind::Float64 => Value::Float64(v),
        }
    }

    /// True if both values are the same heap reference.
    ///
    /// Always false for values that are not reference-backed.
    pub fn same_ref(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Str(x), Value::Str(y)) => Arc::ptr_eq(x, y),
            (Value::Boxed(x), Value::Boxed(y)) => Arc::ptr_eq(x, y),
            (Value::Extensible(x), Value::Extensible(y)) => Arc::ptr_eq(x, y),
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
            (Value::Enumerator(x), Value::Enumerator(y)) => Arc::ptr_eq(x, y),
            (Value::Delegate(x), Value::Delegate(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int8(v) => write!(f, "Int8({v})"),
            Value::Int16(v) => write!(f, "Int16({v})"),
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::Int64(v) => write!(f, "Int64({v})"),
            Value::UInt8(v) => write!(f, "UInt8({v})"),
            Value::UInt16(v) => write!(f, "UInt16({v})"),
            Value::UInt32(v) => write!(f, "UInt32({v})"),
            Value::UInt64(v) => write!(f, "UInt64({v})"),
            Value::Float32(v) => write!(f, "Float32({v})"),
            Value::Float64(v) => write!(f, "Float64({v})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Boxed(inner) => write!(f, "Boxed({inner:?})"),
            Value::Nullable(n) => match &n.value {
                Some(v) => write!(f, "Nullable({v:?})"),
                None => write!(f, "Nullable(<empty>)"),
            },
            Value::Extensible(e) => write!(f, "Extensible({:?})", e.value),
            Value::Object(o) => write!(f, "Object({:?})", o.type_hash),
            Value::Enumerator(e) => write!(f, "Enumerator({} items)", e.len()),
            Value::Delegate(d) => write!(f, "Delegate({:?})", d.delegate_type),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt8(a), Value::UInt8(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Boxed(a), Value::Boxed(b)) => a == b,
            (Value::Nullable(a), Value::Nullable(b)) => a == b,
            (Value::Extensible(a), Value::Extensible(b)) => {
                a.type_hash == b.type_hash && a.value == b.value
            }
            // Objects, enumerators and delegates compare by identity
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Enumerator(a), Value::Enumerator(b)) => Arc::ptr_eq(a, b),
            (Value::Delegate(a), Value::Delegate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
