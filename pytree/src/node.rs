//! The tagged node representation stored inside a [`crate::PyTreeSpec`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pytree_value::{RecordType, Value};

use crate::registry::Registration;

/// The closed set of node kinds a tree structure can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PyTreeKind {
    /// A user-registered container.
    Custom,
    /// An opaque payload.
    Leaf,
    /// A container-level null (only when `none_is_leaf` is false).
    None,
    /// An ordered, heterogeneous sequence.
    Tuple,
    /// An ordered sequence.
    List,
    /// A mapping with canonically ordered keys.
    Dict,
    /// A named record backed by a tuple type.
    NamedTuple,
    /// An insertion-ordered mapping.
    OrderedDict,
    /// A mapping with a default factory.
    DefaultDict,
    /// An ordered sequence with an optional bound.
    Deque,
    /// A native struct-sequence record.
    StructSequence,
}

impl PyTreeKind {
    /// The stable ordinal used by the encoded form.
    pub fn ordinal(self) -> u8 {
        match self {
            PyTreeKind::Custom => 0,
            PyTreeKind::Leaf => 1,
            PyTreeKind::None => 2,
            PyTreeKind::Tuple => 3,
            PyTreeKind::List => 4,
            PyTreeKind::Dict => 5,
            PyTreeKind::NamedTuple => 6,
            PyTreeKind::OrderedDict => 7,
            PyTreeKind::DefaultDict => 8,
            PyTreeKind::Deque => 9,
            PyTreeKind::StructSequence => 10,
        }
    }

    /// The inverse of [`PyTreeKind::ordinal`].
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Some(match ordinal {
            0 => PyTreeKind::Custom,
            1 => PyTreeKind::Leaf,
            2 => PyTreeKind::None,
            3 => PyTreeKind::Tuple,
            4 => PyTreeKind::List,
            5 => PyTreeKind::Dict,
            6 => PyTreeKind::NamedTuple,
            7 => PyTreeKind::OrderedDict,
            8 => PyTreeKind::DefaultDict,
            9 => PyTreeKind::Deque,
            10 => PyTreeKind::StructSequence,
            _ => return None,
        })
    }
}

impl core::fmt::Display for PyTreeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PyTreeKind::Custom => "custom",
            PyTreeKind::Leaf => "leaf",
            PyTreeKind::None => "None",
            PyTreeKind::Tuple => "tuple",
            PyTreeKind::List => "list",
            PyTreeKind::Dict => "dict",
            PyTreeKind::NamedTuple => "namedtuple",
            PyTreeKind::OrderedDict => "OrderedDict",
            PyTreeKind::DefaultDict => "defaultdict",
            PyTreeKind::Deque => "deque",
            PyTreeKind::StructSequence => "structseq",
        })
    }
}

/// Kind-specific auxiliary data carried by a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeData {
    /// Mapping keys: canonically sorted for plain mappings, insertion
    /// order for ordered ones.
    Keys(Vec<Value>),
    /// Default factory plus sorted keys of a defaulting mapping.
    DefaultDict {
        /// The mapping's default factory.
        default_factory: Value,
        /// The sorted keys.
        keys: Vec<Value>,
    },
    /// The record type of a named tuple or struct sequence.
    Record(Arc<RecordType>),
    /// The bound of a deque, if any.
    MaxLen(Option<usize>),
    /// Auxiliary data returned by a custom type's `to_iterable` (absent
    /// when the callback returned none).
    Custom(Option<Value>),
}

/// One node of the post-order traversal.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) kind: PyTreeKind,
    /// Number of immediate children; 0 for `Leaf` and `None`.
    pub(crate) arity: usize,
    pub(crate) node_data: Option<NodeData>,
    /// Explicit path entries for custom nodes; when absent, the implicit
    /// entries are `0..arity`.
    pub(crate) node_entries: Option<Vec<Value>>,
    /// Custom type registration; present exactly for `Custom` nodes.
    pub(crate) custom: Option<Arc<Registration>>,
    /// Leaf count of the subtree rooted here.
    pub(crate) num_leaves: usize,
    /// Node count of the subtree rooted here (a leaf counts as 1).
    pub(crate) num_nodes: usize,
}

impl Node {
    pub(crate) fn leaf() -> Self {
        Node {
            kind: PyTreeKind::Leaf,
            arity: 0,
            node_data: None,
            node_entries: None,
            custom: None,
            num_leaves: 1,
            num_nodes: 1,
        }
    }

    pub(crate) fn none() -> Self {
        Node {
            kind: PyTreeKind::None,
            arity: 0,
            node_data: None,
            node_entries: None,
            custom: None,
            num_leaves: 0,
            num_nodes: 1,
        }
    }
}
