#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod error;
pub use error::PyTreeError;

mod node;
pub use node::{NodeData, PyTreeKind};

mod registry;
pub use registry::{register_node, FlattenFn, FlattenedNode, Registration, UnflattenFn};

mod flatten;
pub use flatten::{all_leaves, flatten, flatten_with_path, LeafPredicate};

mod treespec;
pub use treespec::PyTreeSpec;

mod display;

mod codec;
pub use codec::{PicklableNode, PicklableTreeSpec};

pub use pytree_value::{
    ExtensionType, RecordType, Value, ValueMap, ValueType,
};

/// The maximum nesting depth the flatten engine will descend.
#[cfg(windows)]
pub const MAX_RECURSION_DEPTH: usize = 2500;
/// The maximum nesting depth the flatten engine will descend.
#[cfg(not(windows))]
pub const MAX_RECURSION_DEPTH: usize = 5000;

/// A spec holding a single leaf. See [`PyTreeSpec::leaf`].
pub fn leaf(none_is_leaf: bool) -> PyTreeSpec {
    PyTreeSpec::leaf(none_is_leaf)
}

/// A spec holding a single null node. See [`PyTreeSpec::none`].
pub fn none(none_is_leaf: bool) -> PyTreeSpec {
    PyTreeSpec::none(none_is_leaf)
}

/// A tuple spec built from child specs. See [`PyTreeSpec::tuple`].
pub fn tuple(specs: Vec<PyTreeSpec>, none_is_leaf: bool) -> Result<PyTreeSpec, PyTreeError> {
    PyTreeSpec::tuple(specs, none_is_leaf)
}

/// Whether `ty` names a named-tuple type: a record backed by a tuple with
/// string field names.
pub fn is_named_tuple_class(ty: &ValueType) -> bool {
    matches!(ty, ValueType::NamedTuple(_))
}

/// Whether `ty` names a native struct-sequence type.
pub fn is_struct_sequence_class(ty: &ValueType) -> bool {
    matches!(ty, ValueType::StructSequence(_))
}

/// The field names of a struct-sequence type, in declaration order;
/// `None` for any other type.
pub fn struct_sequence_fields(ty: &ValueType) -> Option<Vec<String>> {
    match ty {
        ValueType::StructSequence(record) => Some(record.fields().to_vec()),
        _ => None,
    }
}
