//! `PyTreeSpec`: the immutable, post-order record of a tree's structure.

use core::hash::{Hash, Hasher};
use std::sync::Arc;

use pytree_value::{sorted_keys, Value, ValueType};

use crate::error::PyTreeError;
use crate::flatten::node_kind;
use crate::node::{Node, NodeData, PyTreeKind};

/// The structure of a tree, separated from its payload.
///
/// A spec stores its nodes in post-order (children before parents, root
/// last), which makes leaf and node counts cheap, cloning a plain vector
/// copy, and reconstruction a single forward pass. A finished spec is
/// immutable and may be shared freely across threads.
#[derive(Clone)]
pub struct PyTreeSpec {
    pub(crate) traversal: Vec<Node>,
    pub(crate) none_is_leaf: bool,
    pub(crate) namespace: String,
}

impl PyTreeSpec {
    pub(crate) fn from_parts(traversal: Vec<Node>, none_is_leaf: bool, namespace: String) -> Self {
        PyTreeSpec {
            traversal,
            none_is_leaf,
            namespace,
        }
    }

    // Every constructor produces at least one node.
    fn root(&self) -> &Node {
        self.traversal.last().expect("traversal is never empty")
    }

    /// Number of leaves in the tree.
    pub fn num_leaves(&self) -> usize {
        self.root().num_leaves
    }

    /// Number of nodes in the tree; a leaf is a node with no children.
    pub fn num_nodes(&self) -> usize {
        self.traversal.len()
    }

    /// Number of children of the root node.
    pub fn num_children(&self) -> usize {
        self.root().arity
    }

    /// Whether the host null value is treated as a leaf. When false, null
    /// is recorded as a zero-arity structural node instead of a payload.
    pub fn none_is_leaf(&self) -> bool {
        self.none_is_leaf
    }

    /// The registry namespace custom types are resolved in (empty for the
    /// default namespace).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The host type of the root node; `None` when the root is a leaf.
    pub fn node_type(&self) -> Option<ValueType> {
        let root = self.root();
        match root.kind {
            PyTreeKind::Leaf => None,
            PyTreeKind::None => Some(ValueType::None),
            PyTreeKind::Tuple => Some(ValueType::Tuple),
            PyTreeKind::List => Some(ValueType::List),
            PyTreeKind::Dict => Some(ValueType::Dict),
            PyTreeKind::OrderedDict => Some(ValueType::OrderedDict),
            PyTreeKind::DefaultDict => Some(ValueType::DefaultDict),
            PyTreeKind::Deque => Some(ValueType::Deque),
            PyTreeKind::NamedTuple => match &root.node_data {
                Some(NodeData::Record(ty)) => Some(ValueType::NamedTuple(Arc::clone(ty))),
                _ => None,
            },
            PyTreeKind::StructSequence => match &root.node_data {
                Some(NodeData::Record(ty)) => Some(ValueType::StructSequence(Arc::clone(ty))),
                _ => None,
            },
            PyTreeKind::Custom => root
                .custom
                .as_ref()
                .map(|registration| registration.node_type().clone()),
        }
    }

    /// Whether this spec is a single node. With `strict`, the node must be
    /// a leaf; without, a lone structural null qualifies too.
    pub fn is_leaf(&self, strict: bool) -> bool {
        if strict {
            self.num_nodes() == 1 && self.num_leaves() == 1
        } else {
            self.num_nodes() == 1
        }
    }

    /// A spec holding a single leaf.
    pub fn leaf(none_is_leaf: bool) -> Self {
        PyTreeSpec {
            traversal: vec![Node::leaf()],
            none_is_leaf,
            namespace: String::new(),
        }
    }

    /// A spec holding a single null node: a leaf when `none_is_leaf`, a
    /// zero-arity structural node otherwise.
    pub fn none(none_is_leaf: bool) -> Self {
        if none_is_leaf {
            return Self::leaf(none_is_leaf);
        }
        PyTreeSpec {
            traversal: vec![Node::none()],
            none_is_leaf,
            namespace: String::new(),
        }
    }

    /// A tuple spec with the given children.
    ///
    /// All children must agree on `none_is_leaf` and on their non-empty
    /// namespaces; the result adopts the first non-empty namespace.
    pub fn tuple(specs: Vec<PyTreeSpec>, none_is_leaf: bool) -> Result<Self, PyTreeError> {
        let mut namespace = String::new();
        for spec in &specs {
            if spec.none_is_leaf != none_is_leaf {
                return Err(PyTreeError::NoneIsLeafMismatch {
                    left: none_is_leaf,
                    right: spec.none_is_leaf,
                });
            }
            if spec.namespace.is_empty() {
                continue;
            }
            if namespace.is_empty() {
                namespace = spec.namespace.clone();
            } else if namespace != spec.namespace {
                return Err(PyTreeError::NamespaceMismatch {
                    left: namespace,
                    right: spec.namespace.clone(),
                });
            }
        }

        let mut traversal = Vec::new();
        let mut num_leaves = 0;
        for spec in &specs {
            traversal.extend(spec.traversal.iter().cloned());
            num_leaves += spec.num_leaves();
        }
        let num_nodes = traversal.len() + 1;
        traversal.push(Node {
            kind: PyTreeKind::Tuple,
            arity: specs.len(),
            node_data: None,
            node_entries: None,
            custom: None,
            num_leaves,
            num_nodes,
        });
        Ok(PyTreeSpec {
            traversal,
            none_is_leaf,
            namespace,
        })
    }

    /// Reconstruct a tree from this structure and an iterator of leaves.
    ///
    /// The iterator must yield exactly [`PyTreeSpec::num_leaves`] values.
    pub fn unflatten(&self, leaves: impl IntoIterator<Item = Value>) -> Result<Value, PyTreeError> {
        let leaves: Vec<Value> = leaves.into_iter().collect();
        if leaves.len() != self.num_leaves() {
            return Err(PyTreeError::ArityMismatch {
                what: "leaves",
                expected: self.num_leaves(),
                actual: leaves.len(),
            });
        }
        let mut leaves = leaves.into_iter();
        let mut agenda: Vec<Value> = Vec::with_capacity(self.num_children().max(1));
        for node in &self.traversal {
            match node.kind {
                PyTreeKind::Leaf => {
                    let leaf = leaves
                        .next()
                        .ok_or_else(|| PyTreeError::malformed("leaf count disagrees with nodes"))?;
                    agenda.push(leaf);
                }
                _ => {
                    if agenda.len() < node.arity {
                        return Err(PyTreeError::malformed(
                            "node arity exceeds the reconstruction stack",
                        ));
                    }
                    let children = agenda.split_off(agenda.len() - node.arity);
                    agenda.push(make_node(node, children)?);
                }
            }
        }
        match (agenda.pop(), agenda.is_empty()) {
            (Some(root), true) => Ok(root),
            _ => Err(PyTreeError::malformed(
                "reconstruction did not yield a single root",
            )),
        }
    }

    /// Flatten `full_tree` down to this structure, returning one sub-value
    /// per leaf of `self`.
    ///
    /// `self` must be a prefix of `full_tree`'s structure: at every
    /// internal node the value's kind, arity, and auxiliary data must
    /// match exactly.
    pub fn flatten_up_to(&self, full_tree: &Value) -> Result<Vec<Value>, PyTreeError> {
        let mut agenda = vec![full_tree.clone()];
        let mut subtrees = Vec::with_capacity(self.num_leaves());
        // Reverse post-order visits each node before its children, last
        // child subtree first; collected leaves are reversed at the end.
        for (index, node) in self.traversal.iter().enumerate().rev() {
            let value = agenda
                .pop()
                .ok_or_else(|| PyTreeError::malformed("traversal walked off the value agenda"))?;
            match node.kind {
                PyTreeKind::Leaf => subtrees.push(value),
                _ => self.match_node(index, node, value, &mut agenda)?,
            }
        }
        if !agenda.is_empty() {
            return Err(PyTreeError::malformed(
                "value agenda not exhausted by the traversal",
            ));
        }
        subtrees.reverse();
        Ok(subtrees)
    }

    /// Render the subtree rooted at traversal index `index` for error
    /// messages.
    fn render_subtree(&self, index: usize) -> String {
        let node = &self.traversal[index];
        let start = index + 1 - node.num_nodes;
        let sub = PyTreeSpec {
            traversal: self.traversal[start..=index].to_vec(),
            none_is_leaf: self.none_is_leaf,
            namespace: self.namespace.clone(),
        };
        sub.to_string()
    }

    fn structure_mismatch(&self, index: usize, actual: &Value) -> PyTreeError {
        PyTreeError::StructureMismatch {
            expected: self.render_subtree(index),
            actual: actual.repr(),
        }
    }

    // One lockstep step of `flatten_up_to` at an internal node: verify the
    // value against the node and push its children onto the agenda (in
    // order, so the last child is popped first).
    fn match_node(
        &self,
        index: usize,
        node: &Node,
        value: Value,
        agenda: &mut Vec<Value>,
    ) -> Result<(), PyTreeError> {
        let (kind, custom) = node_kind(&value, &self.namespace, self.none_is_leaf);
        if kind != node.kind {
            return Err(self.structure_mismatch(index, &value));
        }
        if let Some(len) = value.len() {
            if len != node.arity {
                return Err(PyTreeError::ArityMismatch {
                    what: "children",
                    expected: node.arity,
                    actual: len,
                });
            }
        }
        match (&value, &node.node_data) {
            (Value::Tuple(items), None) | (Value::List(items), None) => {
                agenda.extend(items.iter().cloned());
            }
            (Value::Deque { items, maxlen }, Some(NodeData::MaxLen(spec_maxlen))) => {
                if maxlen != spec_maxlen {
                    return Err(self.structure_mismatch(index, &value));
                }
                agenda.extend(items.iter().cloned());
            }
            (Value::Dict(map), Some(NodeData::Keys(keys))) => {
                let value_keys = sorted_keys(&map.keys().cloned().collect::<Vec<_>>());
                if &value_keys != keys {
                    return Err(self.structure_mismatch(index, &value));
                }
                agenda.extend(keys.iter().map(|key| map[key].clone()));
            }
            (Value::OrderedDict(map), Some(NodeData::Keys(keys))) => {
                let value_keys: Vec<Value> = map.keys().cloned().collect();
                if &value_keys != keys {
                    return Err(self.structure_mismatch(index, &value));
                }
                agenda.extend(map.values().cloned());
            }
            (
                Value::DefaultDict {
                    default_factory,
                    map,
                },
                Some(NodeData::DefaultDict {
                    default_factory: spec_factory,
                    keys,
                }),
            ) => {
                if default_factory.as_ref() != spec_factory {
                    return Err(self.structure_mismatch(index, &value));
                }
                let value_keys = sorted_keys(&map.keys().cloned().collect::<Vec<_>>());
                if &value_keys != keys {
                    return Err(self.structure_mismatch(index, &value));
                }
                agenda.extend(keys.iter().map(|key| map[key].clone()));
            }
            (Value::NamedTuple { ty, items }, Some(NodeData::Record(spec_ty)))
            | (Value::StructSequence { ty, items }, Some(NodeData::Record(spec_ty))) => {
                if ty != spec_ty {
                    return Err(self.structure_mismatch(index, &value));
                }
                agenda.extend(items.iter().cloned());
            }
            (_, Some(NodeData::Custom(metadata))) => {
                let registration =
                    custom.ok_or_else(|| self.structure_mismatch(index, &value))?;
                let matches = node
                    .custom
                    .as_ref()
                    .is_some_and(|expected| Arc::ptr_eq(expected, &registration));
                if !matches {
                    return Err(self.structure_mismatch(index, &value));
                }
                let to_iterable = registration.to_iterable.as_ref().ok_or_else(|| {
                    PyTreeError::malformed("custom registration without a to_iterable callback")
                })?;
                let flattened = to_iterable(&value)?;
                if flattened.children.len() != node.arity {
                    return Err(PyTreeError::ArityMismatch {
                        what: "children",
                        expected: node.arity,
                        actual: flattened.children.len(),
                    });
                }
                if &flattened.metadata != metadata {
                    return Err(self.structure_mismatch(index, &value));
                }
                agenda.extend(flattened.children);
            }
            _ => return Err(self.structure_mismatch(index, &value)),
        }
        Ok(())
    }

    /// Compose two specs, substituting `inner` for every leaf of `self`.
    ///
    /// Both must share `none_is_leaf`; non-empty namespaces must agree and
    /// the result adopts the non-empty one.
    pub fn compose(&self, inner: &PyTreeSpec) -> Result<PyTreeSpec, PyTreeError> {
        if self.none_is_leaf != inner.none_is_leaf {
            return Err(PyTreeError::NoneIsLeafMismatch {
                left: self.none_is_leaf,
                right: inner.none_is_leaf,
            });
        }
        if !self.namespace.is_empty()
            && !inner.namespace.is_empty()
            && self.namespace != inner.namespace
        {
            return Err(PyTreeError::NamespaceMismatch {
                left: self.namespace.clone(),
                right: inner.namespace.clone(),
            });
        }
        let namespace = if inner.namespace.is_empty() {
            self.namespace.clone()
        } else {
            inner.namespace.clone()
        };

        let num_inner_leaves = inner.num_leaves();
        let num_inner_nodes = inner.num_nodes();
        let mut traversal = Vec::with_capacity(
            (self.num_nodes() - self.num_leaves()) + self.num_leaves() * num_inner_nodes,
        );
        for node in &self.traversal {
            if node.kind == PyTreeKind::Leaf {
                traversal.extend(inner.traversal.iter().cloned());
            } else {
                let mut node = node.clone();
                node.num_nodes =
                    (node.num_nodes - node.num_leaves) + node.num_leaves * num_inner_nodes;
                node.num_leaves *= num_inner_leaves;
                traversal.push(node);
            }
        }

        let composed = PyTreeSpec {
            traversal,
            none_is_leaf: self.none_is_leaf,
            namespace,
        };
        debug_assert_eq!(
            composed.num_leaves(),
            self.num_leaves() * num_inner_leaves,
            "composed leaf count mismatch"
        );
        debug_assert_eq!(
            composed.num_nodes(),
            (self.num_nodes() - self.num_leaves()) + self.num_leaves() * num_inner_nodes,
            "composed node count mismatch"
        );
        Ok(composed)
    }

    /// The specs of the root's immediate children, left to right.
    pub fn children(&self) -> Vec<PyTreeSpec> {
        let root = self.root();
        let mut children: Vec<PyTreeSpec> = Vec::with_capacity(root.arity);
        let mut pos = self.traversal.len() - 1;
        for _ in 0..root.arity {
            let child_root = &self.traversal[pos - 1];
            assert!(
                pos >= child_root.num_nodes,
                "child subtree walked off the start of the traversal"
            );
            children.push(PyTreeSpec {
                traversal: self.traversal[pos - child_root.num_nodes..pos].to_vec(),
                none_is_leaf: self.none_is_leaf,
                namespace: self.namespace.clone(),
            });
            pos -= child_root.num_nodes;
        }
        assert_eq!(pos, 0, "child subtrees do not cover the traversal");
        children.reverse();
        children
    }

    /// Fold over the structure: `f_leaf` consumes the next leaf at every
    /// leaf node, `f_node` combines children results (with the node's
    /// auxiliary data) at every internal node.
    pub fn walk<T>(
        &self,
        mut f_node: impl FnMut(Vec<T>, Option<&NodeData>) -> Result<T, PyTreeError>,
        mut f_leaf: impl FnMut(Value) -> Result<T, PyTreeError>,
        leaves: impl IntoIterator<Item = Value>,
    ) -> Result<T, PyTreeError> {
        let mut leaves = leaves.into_iter();
        let mut agenda: Vec<T> = Vec::new();
        let mut consumed = 0usize;
        for node in &self.traversal {
            match node.kind {
                PyTreeKind::Leaf => {
                    let leaf = leaves.next().ok_or(PyTreeError::ArityMismatch {
                        what: "leaves",
                        expected: self.num_leaves(),
                        actual: consumed,
                    })?;
                    consumed += 1;
                    agenda.push(f_leaf(leaf)?);
                }
                _ => {
                    if agenda.len() < node.arity {
                        return Err(PyTreeError::malformed(
                            "node arity exceeds the walk stack",
                        ));
                    }
                    let children = agenda.split_off(agenda.len() - node.arity);
                    agenda.push(f_node(children, node.node_data.as_ref())?);
                }
            }
        }
        if leaves.next().is_some() {
            return Err(PyTreeError::ArityMismatch {
                what: "leaves",
                expected: self.num_leaves(),
                actual: consumed + 1,
            });
        }
        match (agenda.pop(), agenda.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(PyTreeError::malformed(
                "walk did not yield a single root result",
            )),
        }
    }
}

/// Manufacture a container from a node and its already-built children.
fn make_node(node: &Node, children: Vec<Value>) -> Result<Value, PyTreeError> {
    if children.len() != node.arity {
        return Err(PyTreeError::ArityMismatch {
            what: "children",
            expected: node.arity,
            actual: children.len(),
        });
    }
    let data_mismatch =
        || PyTreeError::malformed(format!("node data does not fit a {} node", node.kind));
    match node.kind {
        PyTreeKind::Leaf => Err(PyTreeError::malformed("cannot make a node out of a leaf")),
        PyTreeKind::None => Ok(Value::None),
        PyTreeKind::Tuple => Ok(Value::Tuple(children)),
        PyTreeKind::List => Ok(Value::List(children)),
        PyTreeKind::Dict => match &node.node_data {
            Some(NodeData::Keys(keys)) if keys.len() == node.arity => {
                Ok(Value::dict(keys.iter().cloned().zip(children)))
            }
            _ => Err(data_mismatch()),
        },
        PyTreeKind::OrderedDict => match &node.node_data {
            Some(NodeData::Keys(keys)) if keys.len() == node.arity => {
                Ok(Value::ordered_dict(keys.iter().cloned().zip(children)))
            }
            _ => Err(data_mismatch()),
        },
        PyTreeKind::DefaultDict => match &node.node_data {
            Some(NodeData::DefaultDict {
                default_factory,
                keys,
            }) if keys.len() == node.arity => Ok(Value::default_dict(
                default_factory.clone(),
                keys.iter().cloned().zip(children),
            )),
            _ => Err(data_mismatch()),
        },
        PyTreeKind::Deque => match &node.node_data {
            Some(NodeData::MaxLen(maxlen)) => Ok(Value::deque(children, *maxlen)),
            _ => Err(data_mismatch()),
        },
        PyTreeKind::NamedTuple => match &node.node_data {
            Some(NodeData::Record(ty)) if ty.num_fields() == node.arity => {
                Ok(Value::named_tuple(ty, children))
            }
            _ => Err(data_mismatch()),
        },
        PyTreeKind::StructSequence => match &node.node_data {
            Some(NodeData::Record(ty)) if ty.num_fields() == node.arity => {
                Ok(Value::struct_sequence(ty, children))
            }
            _ => Err(data_mismatch()),
        },
        PyTreeKind::Custom => {
            let registration = node
                .custom
                .as_ref()
                .ok_or_else(|| PyTreeError::malformed("custom node without a registration"))?;
            let from_iterable = registration.from_iterable.as_ref().ok_or_else(|| {
                PyTreeError::malformed("custom registration without a from_iterable callback")
            })?;
            let metadata = match &node.node_data {
                Some(NodeData::Custom(metadata)) => metadata.as_ref(),
                _ => return Err(data_mismatch()),
            };
            from_iterable(metadata, children)
        }
    }
}

impl core::fmt::Debug for PyTreeSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

impl PartialEq for PyTreeSpec {
    /// Structural equality: same length and mode, compatible namespaces
    /// (equal, or at least one empty), and pairwise agreement of kind,
    /// arity, registration identity, and auxiliary data.
    fn eq(&self, other: &Self) -> bool {
        if self.traversal.len() != other.traversal.len()
            || self.none_is_leaf != other.none_is_leaf
        {
            return false;
        }
        if !self.namespace.is_empty()
            && !other.namespace.is_empty()
            && self.namespace != other.namespace
        {
            return false;
        }
        for (a, b) in self.traversal.iter().zip(&other.traversal) {
            if a.kind != b.kind || a.arity != b.arity {
                return false;
            }
            let custom_matches = match (&a.custom, &b.custom) {
                (None, None) => true,
                (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                _ => false,
            };
            if !custom_matches || a.node_data != b.node_data {
                return false;
            }
            debug_assert_eq!(a.num_leaves, b.num_leaves, "equal nodes with unequal counts");
            debug_assert_eq!(a.num_nodes, b.num_nodes, "equal nodes with unequal counts");
        }
        true
    }
}

impl Eq for PyTreeSpec {}

impl Hash for PyTreeSpec {
    /// Combines the per-node hashes with the mode and namespace. Custom
    /// nodes deliberately leave their auxiliary data out of the hash
    /// (user metadata need not be hashable in the host); equality still
    /// compares it by value.
    fn hash<H: Hasher>(&self, state: &mut H) {
        for node in &self.traversal {
            hash_node(node, state);
        }
        self.none_is_leaf.hash(state);
        self.namespace.hash(state);
    }
}

fn hash_node<H: Hasher>(node: &Node, state: &mut H) {
    node.kind.ordinal().hash(state);
    node.arity.hash(state);
    match &node.custom {
        Some(registration) => (Arc::as_ptr(registration) as usize).hash(state),
        None => 0usize.hash(state),
    }
    node.num_leaves.hash(state);
    node.num_nodes.hash(state);
    match &node.node_data {
        None | Some(NodeData::Custom(_)) => {}
        Some(NodeData::Keys(keys)) => keys.hash(state),
        Some(NodeData::DefaultDict {
            default_factory,
            keys,
        }) => {
            default_factory.hash(state);
            keys.hash(state);
        }
        Some(NodeData::Record(ty)) => ty.hash(state),
        Some(NodeData::MaxLen(maxlen)) => maxlen.hash(state),
    }
}
