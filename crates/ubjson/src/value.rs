//! [`Value`] — the value graph encoded to and decoded from UBJSON.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::error::EncodeError;
use crate::options::DEFAULT_MAX_DEPTH;
use crate::HighPrecision;

/// Object key. Keys are shared so that interned keys can be reused across
/// objects without copying.
pub type Key = Arc<str>;

/// Insertion-ordered mapping.
pub type Object = IndexMap<Key, Value>;

/// Universal value type covering everything UBJSON can carry.
///
/// The decoder produces every variant except [`Value::BigInt`],
/// [`Value::UInteger`], [`Value::Shared`] and [`Value::Extension`], which
/// exist for building values to encode.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    /// Integer that fits in i64
    Integer(i64),
    /// Unsigned integer, written as high-precision above `i64::MAX`
    UInteger(u64),
    /// Wide integer, written as high-precision outside the i64 range
    BigInt(i128),
    /// Single precision float, written as `d` regardless of magnitude
    Float32(f32),
    Float(f64),
    HighPrecision(HighPrecision),
    Char(char),
    Str(String),
    /// Binary data, written as a uint8-typed counted array
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(Object),
    /// Reference to a value which may be reachable from several places,
    /// including from inside itself.
    Shared(Shared),
    /// Application value without a UBJSON representation. Encoding one
    /// requires a fallback function.
    Extension(Box<Extension>),
}

/// A tagged application value, see [`Value::Extension`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub tag: u64,
    pub value: Value,
}

impl Extension {
    pub fn new(tag: u64, value: Value) -> Self {
        Self { tag, value }
    }
}

/// A shared, mutable cell in the value graph.
///
/// Clones point at the same cell. Equality is identity: two `Shared`
/// values are equal only if they are the same cell.
#[derive(Clone, Default)]
pub struct Shared(Arc<RwLock<Value>>);

impl Shared {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Locks the cell for reading. A poisoned lock still yields the value.
    pub fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the cell for writing. A poisoned lock still yields the value.
    pub fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the cell contents, returning the previous value.
    pub fn replace(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.write(), value)
    }

    /// Address of the cell, stable for its lifetime.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Shared) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents are not printed, they may contain the cell itself.
        write!(f, "Shared({:#x})", self.identity())
    }
}

impl PartialEq for Shared {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Value {
    /// Short name of the variant, used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) | Value::UInteger(_) | Value::BigInt(_) => "integer",
            Value::Float32(_) | Value::Float(_) => "float",
            Value::HighPrecision(_) => "high-precision",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Shared(_) => "shared",
            Value::Extension(_) => "extension",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, for any integer variant within the i64 range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::UInteger(u) => i64::try_from(*u).ok(),
            Value::BigInt(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Numeric value as f64, for every numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::UInteger(u) => Some(*u as f64),
            Value::BigInt(i) => Some(*i as f64),
            Value::Float32(f) => Some(*f as f64),
            Value::Float(f) => Some(*f),
            Value::HighPrecision(num) => Some(num.to_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Builds an object from `(key, value)` pairs, keeping the first
    /// position and the last value of duplicate keys.
    pub fn object<K, I>(pairs: I) -> Value
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wraps the value into a new [`Shared`] cell.
    pub fn into_shared(self) -> Shared {
        Shared::new(self)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    i64 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Integer,
    u64 => UInteger,
    i128 => BigInt,
    f32 => Float32,
    f64 => Float,
    char => Char,
    String => Str,
    &str => Str,
    HighPrecision => HighPrecision,
    Vec<Value> => Array,
    Object => Object,
    Shared => Shared,
}

impl From<Extension> for Value {
    fn from(ext: Extension) -> Self {
        Value::Extension(Box::new(ext))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInteger(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (Key::from(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Converts to JSON.
///
/// Bytes become arrays of integers, non-finite numbers become `null`, and
/// integers outside the JSON number range become strings. High-precision
/// numbers become integers when integral, floats otherwise. Extensions
/// cannot be represented.
impl TryFrom<&Value> for serde_json::Value {
    type Error = EncodeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let mut open = Vec::new();
        to_json(value, 0, &mut open)
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn wide_int_to_json(i: i128) -> serde_json::Value {
    if let Ok(i) = i64::try_from(i) {
        serde_json::Value::from(i)
    } else if let Ok(u) = u64::try_from(i) {
        serde_json::Value::from(u)
    } else {
        serde_json::Value::String(i.to_string())
    }
}

fn to_json(
    value: &Value,
    depth: usize,
    open: &mut Vec<usize>,
) -> Result<serde_json::Value, EncodeError> {
    if depth > DEFAULT_MAX_DEPTH {
        return Err(EncodeError::DepthLimitExceeded(DEFAULT_MAX_DEPTH));
    }
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::UInteger(u) => serde_json::Value::from(*u),
        Value::BigInt(i) => wide_int_to_json(*i),
        Value::Float32(f) => float_to_json(*f as f64),
        Value::Float(f) => float_to_json(*f),
        Value::HighPrecision(num) => match num.to_i128() {
            Some(i) => wide_int_to_json(i),
            None => float_to_json(num.to_f64()),
        },
        Value::Char(c) => serde_json::Value::String(c.to_string()),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(
            b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
        ),
        Value::Array(arr) => serde_json::Value::Array(
            arr.iter()
                .map(|item| to_json(item, depth + 1, open))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(obj) => {
            let mut map = serde_json::Map::with_capacity(obj.len());
            for (key, val) in obj {
                map.insert(key.to_string(), to_json(val, depth + 1, open)?);
            }
            serde_json::Value::Object(map)
        }
        Value::Shared(cell) => {
            let identity = cell.identity();
            if open.contains(&identity) {
                return Err(EncodeError::CircularReference);
            }
            open.push(identity);
            let result = to_json(&cell.read(), depth + 1, open);
            open.pop();
            result?
        }
        Value::Extension(_) => return Err(EncodeError::Unencodable("extension")),
    })
}
