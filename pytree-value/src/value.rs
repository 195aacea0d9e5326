//! The dynamic `Value` type and its type tags.

use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{ExtensionType, RecordType};

/// An insertion-ordered mapping from values to values.
pub type ValueMap = IndexMap<Value, Value>;

/// A dynamic value: a scalar, one of the standard containers, a named
/// record, or a user-defined extension container.
///
/// Containers own their children by value; sharing happens at the type
/// descriptor level (`Arc<RecordType>` / `Arc<ExtensionType>`), never
/// between values, so dropping a value releases its whole subtree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    /// The host null value.
    None,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A double-precision float. Equality and hashing use the bit pattern,
    /// so `NaN == NaN` and `-0.0 != 0.0` here.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// An ordered, heterogeneous, fixed-arity sequence.
    Tuple(Vec<Value>),
    /// An ordered sequence.
    List(Vec<Value>),
    /// A plain mapping. Iteration follows insertion order; equality is
    /// order-insensitive, like the host's plain mapping.
    Dict(ValueMap),
    /// An insertion-ordered mapping; equality is order-sensitive.
    OrderedDict(ValueMap),
    /// A mapping with a default factory. The factory is an opaque value
    /// that participates in equality and hashing but is never invoked here.
    DefaultDict {
        /// The factory paired with the mapping.
        default_factory: Box<Value>,
        /// The mapping itself; same semantics as [`Value::Dict`].
        map: ValueMap,
    },
    /// A double-ended queue with an optional maximum length.
    Deque {
        /// The queue contents, front to back.
        items: Vec<Value>,
        /// The bound, if any.
        maxlen: Option<usize>,
    },
    /// A named tuple: a record backed by a tuple type.
    NamedTuple {
        /// The record's type descriptor.
        ty: Arc<RecordType>,
        /// Field values in declaration order; must match the descriptor's
        /// field count.
        items: Vec<Value>,
    },
    /// A native struct-sequence record.
    StructSequence {
        /// The record's type descriptor.
        ty: Arc<RecordType>,
        /// Field values in declaration order; must match the descriptor's
        /// field count.
        items: Vec<Value>,
    },
    /// A user-defined container. The payload layout is private to the
    /// flatten/unflatten callbacks registered for `ty`.
    Extension {
        /// The container's type handle.
        ty: Arc<ExtensionType>,
        /// The opaque payload.
        data: Box<Value>,
    },
}

/// The type tag of a [`Value`]: the `kind_of` half of the value adapter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// The null type.
    None,
    /// Booleans.
    Bool,
    /// Integers.
    Int,
    /// Floats.
    Float,
    /// Strings.
    Str,
    /// Tuples.
    Tuple,
    /// Lists.
    List,
    /// Plain mappings.
    Dict,
    /// Insertion-ordered mappings.
    OrderedDict,
    /// Defaulting mappings.
    DefaultDict,
    /// Deques.
    Deque,
    /// A specific named-tuple type.
    NamedTuple(Arc<RecordType>),
    /// A specific struct-sequence type.
    StructSequence(Arc<RecordType>),
    /// A specific user-defined container type.
    Extension(Arc<ExtensionType>),
}

impl ValueType {
    /// The unqualified display name of the type.
    pub fn name(&self) -> &str {
        match self {
            ValueType::None => "NoneType",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::Tuple => "tuple",
            ValueType::List => "list",
            ValueType::Dict => "dict",
            ValueType::OrderedDict => "OrderedDict",
            ValueType::DefaultDict => "defaultdict",
            ValueType::Deque => "deque",
            ValueType::NamedTuple(ty) | ValueType::StructSequence(ty) => ty.name(),
            ValueType::Extension(ty) => ty.short_name(),
        }
    }

    /// The fully qualified name, when `self` is one of the built-in
    /// scalar or container types.
    pub fn builtin_qualified_name(&self) -> Option<&'static str> {
        Some(match self {
            ValueType::None => "builtins.NoneType",
            ValueType::Bool => "builtins.bool",
            ValueType::Int => "builtins.int",
            ValueType::Float => "builtins.float",
            ValueType::Str => "builtins.str",
            ValueType::Tuple => "builtins.tuple",
            ValueType::List => "builtins.list",
            ValueType::Dict => "builtins.dict",
            ValueType::OrderedDict => "collections.OrderedDict",
            ValueType::DefaultDict => "collections.defaultdict",
            ValueType::Deque => "collections.deque",
            ValueType::NamedTuple(_) | ValueType::StructSequence(_) | ValueType::Extension(_) => {
                return None;
            }
        })
    }

    /// The fully qualified type name, used by the key-sort fallback chain
    /// to order keys of incomparable types.
    pub fn qualified_name(&self) -> &str {
        match self {
            ValueType::NamedTuple(ty) | ValueType::StructSequence(ty) => ty.name(),
            ValueType::Extension(ty) => ty.name(),
            // Total for every remaining variant.
            other => other.builtin_qualified_name().unwrap_or("builtins.object"),
        }
    }
}

impl core::fmt::Display for ValueType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// The type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Tuple(_) => ValueType::Tuple,
            Value::List(_) => ValueType::List,
            Value::Dict(_) => ValueType::Dict,
            Value::OrderedDict(_) => ValueType::OrderedDict,
            Value::DefaultDict { .. } => ValueType::DefaultDict,
            Value::Deque { .. } => ValueType::Deque,
            Value::NamedTuple { ty, .. } => ValueType::NamedTuple(Arc::clone(ty)),
            Value::StructSequence { ty, .. } => ValueType::StructSequence(Arc::clone(ty)),
            Value::Extension { ty, .. } => ValueType::Extension(Arc::clone(ty)),
        }
    }

    /// Number of immediate children for containers, `None` for scalars and
    /// extension values (whose arity is known only to their callbacks).
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Tuple(items) | Value::List(items) => Some(items.len()),
            Value::Deque { items, .. } => Some(items.len()),
            Value::NamedTuple { items, .. } | Value::StructSequence { items, .. } => {
                Some(items.len())
            }
            Value::Dict(map) | Value::OrderedDict(map) => Some(map.len()),
            Value::DefaultDict { map, .. } => Some(map.len()),
            _ => None,
        }
    }

    /// Whether this is an empty container. Scalars and extension values are
    /// never empty.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Build a plain mapping from key/value pairs, keeping insertion order.
    pub fn dict(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Dict(pairs.into_iter().collect())
    }

    /// Build an insertion-ordered mapping from key/value pairs.
    pub fn ordered_dict(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::OrderedDict(pairs.into_iter().collect())
    }

    /// Build a defaulting mapping from a factory and key/value pairs.
    pub fn default_dict(
        default_factory: Value,
        pairs: impl IntoIterator<Item = (Value, Value)>,
    ) -> Self {
        Value::DefaultDict {
            default_factory: Box::new(default_factory),
            map: pairs.into_iter().collect(),
        }
    }

    /// Build a deque from items and an optional bound.
    pub fn deque(items: impl IntoIterator<Item = Value>, maxlen: Option<usize>) -> Self {
        Value::Deque {
            items: items.into_iter().collect(),
            maxlen,
        }
    }

    /// Build a named tuple. The item count must match the descriptor's
    /// field count.
    pub fn named_tuple(ty: &Arc<RecordType>, items: impl IntoIterator<Item = Value>) -> Self {
        Value::NamedTuple {
            ty: Arc::clone(ty),
            items: items.into_iter().collect(),
        }
    }

    /// Build a struct sequence. The item count must match the descriptor's
    /// field count.
    pub fn struct_sequence(ty: &Arc<RecordType>, items: impl IntoIterator<Item = Value>) -> Self {
        Value::StructSequence {
            ty: Arc::clone(ty),
            items: items.into_iter().collect(),
        }
    }

    /// Build an extension value from a type handle and its payload.
    pub fn extension(ty: &Arc<ExtensionType>, data: Value) -> Self {
        Value::Extension {
            ty: Arc::clone(ty),
            data: Box::new(data),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

// Plain and defaulting mappings compare order-insensitively (IndexMap's map
// equality); ordered mappings compare pairwise in order.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::OrderedDict(a), Value::OrderedDict(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (
                Value::DefaultDict {
                    default_factory: fa,
                    map: ma,
                },
                Value::DefaultDict {
                    default_factory: fb,
                    map: mb,
                },
            ) => fa == fb && ma == mb,
            (
                Value::Deque {
                    items: a,
                    maxlen: la,
                },
                Value::Deque {
                    items: b,
                    maxlen: lb,
                },
            ) => a == b && la == lb,
            (
                Value::NamedTuple { ty: ta, items: a },
                Value::NamedTuple { ty: tb, items: b },
            )
            | (
                Value::StructSequence { ty: ta, items: a },
                Value::StructSequence { ty: tb, items: b },
            ) => ta == tb && a == b,
            (Value::Extension { ty: ta, data: a }, Value::Extension { ty: tb, data: b }) => {
                ta == tb && a == b
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Commutative combination of per-entry hashes, so that order-insensitive
/// map equality stays hash-consistent.
fn hash_map_entries<H: Hasher>(map: &ValueMap, state: &mut H) {
    let mut acc = 0u64;
    for (key, child) in map {
        let mut entry = DefaultHasher::new();
        key.hash(&mut entry);
        child.hash(&mut entry);
        acc = acc.wrapping_add(entry.finish());
    }
    state.write_u64(acc);
    state.write_usize(map.len());
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::None => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
            Value::Tuple(items) | Value::List(items) => items.hash(state),
            Value::Dict(map) => hash_map_entries(map, state),
            Value::OrderedDict(map) => {
                for (key, child) in map {
                    key.hash(state);
                    child.hash(state);
                }
                state.write_usize(map.len());
            }
            Value::DefaultDict {
                default_factory,
                map,
            } => {
                default_factory.hash(state);
                hash_map_entries(map, state);
            }
            Value::Deque { items, maxlen } => {
                items.hash(state);
                maxlen.hash(state);
            }
            Value::NamedTuple { ty, items } | Value::StructSequence { ty, items } => {
                ty.hash(state);
                items.hash(state);
            }
            Value::Extension { ty, data } => {
                ty.hash(state);
                data.hash(state);
            }
        }
    }
}
