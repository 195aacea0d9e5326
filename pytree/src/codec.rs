//! The persistable form of a tree structure.
//!
//! A spec encodes to a [`PicklableTreeSpec`]: the node records (with the
//! stable kind ordinal), the `none_is_leaf` mode, and the namespace. The
//! form derives `serde` traits so it can be written through any format;
//! it is stable across processes of the same build provided the registry
//! is populated identically before decoding.
//!
//! Decoding re-validates everything: kind ordinals, the per-kind shape of
//! auxiliary data and path entries, subtree counts, and custom-type
//! resolution against the registry in the stored namespace and mode.

use serde::{Deserialize, Serialize};

use pytree_value::Value;

use crate::error::PyTreeError;
use crate::node::{Node, NodeData, PyTreeKind};
use crate::registry::PyTreeTypeRegistry;
use crate::treespec::PyTreeSpec;

/// One encoded node: the seven persisted fields of a traversal entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PicklableNode {
    /// The kind ordinal (see [`PyTreeKind::ordinal`]).
    pub kind: u8,
    /// Number of immediate children.
    pub arity: usize,
    /// Kind-specific auxiliary data, if any.
    pub node_data: Option<NodeData>,
    /// Explicit path entries (custom nodes only).
    pub node_entries: Option<Vec<Value>>,
    /// The registered type name (custom nodes only).
    pub custom_type: Option<String>,
    /// Leaf count of the subtree.
    pub num_leaves: usize,
    /// Node count of the subtree.
    pub num_nodes: usize,
}

/// An encoded tree structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PicklableTreeSpec {
    /// The node records, in post-order.
    pub nodes: Vec<PicklableNode>,
    /// Whether the structure treats the host null as a leaf.
    pub none_is_leaf: bool,
    /// The registry namespace for custom-type resolution.
    pub namespace: String,
}

impl PyTreeSpec {
    /// Encode this structure into its persistable form.
    pub fn to_picklable(&self) -> PicklableTreeSpec {
        let nodes = self
            .traversal
            .iter()
            .map(|node| PicklableNode {
                kind: node.kind.ordinal(),
                arity: node.arity,
                node_data: node.node_data.clone(),
                node_entries: node.node_entries.clone(),
                custom_type: node
                    .custom
                    .as_ref()
                    .map(|registration| registration.node_type().qualified_name().to_owned()),
                num_leaves: node.num_leaves,
                num_nodes: node.num_nodes,
            })
            .collect();
        PicklableTreeSpec {
            nodes,
            none_is_leaf: self.none_is_leaf,
            namespace: self.namespace.clone(),
        }
    }

    /// Decode a structure from its persistable form, validating it
    /// completely.
    pub fn from_picklable(picklable: &PicklableTreeSpec) -> Result<Self, PyTreeError> {
        if picklable.nodes.is_empty() {
            return Err(PyTreeError::malformed("encoded traversal is empty"));
        }
        let mut traversal = Vec::with_capacity(picklable.nodes.len());
        for encoded in &picklable.nodes {
            traversal.push(decode_node(
                encoded,
                &picklable.namespace,
                picklable.none_is_leaf,
            )?);
        }
        validate_counts(&traversal)?;
        Ok(PyTreeSpec::from_parts(
            traversal,
            picklable.none_is_leaf,
            picklable.namespace.clone(),
        ))
    }
}

fn decode_node(
    encoded: &PicklableNode,
    namespace: &str,
    none_is_leaf: bool,
) -> Result<Node, PyTreeError> {
    let kind = PyTreeKind::from_ordinal(encoded.kind)
        .ok_or_else(|| PyTreeError::malformed(format!("unknown node kind {}", encoded.kind)))?;

    let data_mismatch =
        || PyTreeError::malformed(format!("node data does not fit a {kind} node"));
    match (kind, &encoded.node_data) {
        (PyTreeKind::Leaf | PyTreeKind::None, None) => {
            if encoded.arity != 0 {
                return Err(PyTreeError::malformed(format!(
                    "{kind} node with nonzero arity"
                )));
            }
        }
        (PyTreeKind::Tuple | PyTreeKind::List, None) => {}
        (PyTreeKind::Dict | PyTreeKind::OrderedDict, Some(NodeData::Keys(keys)))
            if keys.len() == encoded.arity => {}
        (PyTreeKind::DefaultDict, Some(NodeData::DefaultDict { keys, .. }))
            if keys.len() == encoded.arity => {}
        (PyTreeKind::NamedTuple | PyTreeKind::StructSequence, Some(NodeData::Record(ty)))
            if ty.num_fields() == encoded.arity => {}
        (PyTreeKind::Deque, Some(NodeData::MaxLen(_))) => {}
        (PyTreeKind::Custom, Some(NodeData::Custom(_))) => {}
        _ => return Err(data_mismatch()),
    }

    let custom = if kind == PyTreeKind::Custom {
        let type_name = encoded.custom_type.as_deref().unwrap_or("None");
        let registration =
            PyTreeTypeRegistry::lookup_custom_by_name(type_name, namespace, none_is_leaf)
                .ok_or_else(|| PyTreeError::UnknownCustomType {
                    type_name: type_name.to_owned(),
                    namespace: namespace.to_owned(),
                })?;
        if let Some(entries) = &encoded.node_entries {
            if entries.len() != encoded.arity {
                return Err(PyTreeError::malformed(
                    "custom node entries disagree with its arity",
                ));
            }
        }
        Some(registration)
    } else {
        if encoded.node_entries.is_some() || encoded.custom_type.is_some() {
            return Err(PyTreeError::malformed(
                "path entries and custom types belong to custom nodes only",
            ));
        }
        None
    };

    Ok(Node {
        kind,
        arity: encoded.arity,
        node_data: encoded.node_data.clone(),
        node_entries: encoded.node_entries.clone(),
        custom,
        num_leaves: encoded.num_leaves,
        num_nodes: encoded.num_nodes,
    })
}

/// Re-derive the subtree counts bottom-up and require the stored ones to
/// agree, so a decoded spec upholds the same invariants a flattened one
/// does.
fn validate_counts(traversal: &[Node]) -> Result<(), PyTreeError> {
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for node in traversal {
        if stack.len() < node.arity {
            return Err(PyTreeError::malformed(
                "node arity exceeds the available subtrees",
            ));
        }
        let children = stack.split_off(stack.len() - node.arity);
        let (mut num_leaves, mut num_nodes) = (0usize, 1usize);
        for (child_leaves, child_nodes) in children {
            num_leaves += child_leaves;
            num_nodes += child_nodes;
        }
        if node.kind == PyTreeKind::Leaf {
            num_leaves = 1;
        }
        if node.num_leaves != num_leaves || node.num_nodes != num_nodes {
            return Err(PyTreeError::malformed(
                "stored subtree counts disagree with the traversal",
            ));
        }
        stack.push((num_leaves, num_nodes));
    }
    if stack.len() != 1 {
        return Err(PyTreeError::malformed(
            "traversal does not form a single tree",
        ));
    }
    Ok(())
}
