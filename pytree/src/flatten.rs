//! The flatten engine: recursive descent over a value producing leaves
//! (and optionally paths) and a post-order traversal.

use std::sync::Arc;

use log::trace;

use pytree_value::{total_order_sort, Value, ValueType};

use crate::error::PyTreeError;
use crate::node::{Node, NodeData, PyTreeKind};
use crate::registry::{PyTreeTypeRegistry, Registration};
use crate::treespec::PyTreeSpec;
use crate::MAX_RECURSION_DEPTH;

/// Overrides container classification: a value for which the predicate
/// returns `true` is treated as a leaf, whatever its type. A predicate
/// error aborts the flatten with that error.
pub type LeafPredicate = dyn Fn(&Value) -> Result<bool, PyTreeError>;

/// Classify `tree` the way the flatten engine would: registry first, then
/// the named-record recognizers, else a leaf.
pub(crate) fn node_kind(
    tree: &Value,
    namespace: &str,
    none_is_leaf: bool,
) -> (PyTreeKind, Option<Arc<Registration>>) {
    let ty = tree.value_type();
    if let Some(registration) = PyTreeTypeRegistry::lookup(&ty, namespace, none_is_leaf) {
        let kind = registration.kind;
        let custom = (kind == PyTreeKind::Custom).then_some(registration);
        return (kind, custom);
    }
    match ty {
        ValueType::NamedTuple(_) => (PyTreeKind::NamedTuple, None),
        ValueType::StructSequence(_) => (PyTreeKind::StructSequence, None),
        _ => (PyTreeKind::Leaf, None),
    }
}

struct Flattener<'a> {
    leaf_predicate: Option<&'a LeafPredicate>,
    none_is_leaf: bool,
    namespace: &'a str,
    traversal: Vec<Node>,
    leaves: Vec<Value>,
    /// Present when paths are being recorded.
    paths: Option<Vec<Vec<Value>>>,
    entry_stack: Vec<Value>,
    /// Whether any custom node was expanded. The namespace is recorded on
    /// the finished spec only in that case.
    found_custom: bool,
}

impl<'a> Flattener<'a> {
    fn new(
        leaf_predicate: Option<&'a LeafPredicate>,
        none_is_leaf: bool,
        namespace: &'a str,
        with_paths: bool,
    ) -> Self {
        Flattener {
            leaf_predicate,
            none_is_leaf,
            namespace,
            traversal: Vec::new(),
            leaves: Vec::new(),
            paths: with_paths.then(Vec::new),
            entry_stack: Vec::new(),
            found_custom: false,
        }
    }

    fn emit_leaf(&mut self, tree: &Value) {
        self.leaves.push(tree.clone());
        if let Some(paths) = &mut self.paths {
            paths.push(self.entry_stack.clone());
        }
        self.traversal.push(Node::leaf());
    }

    fn descend(
        &mut self,
        entry: impl FnOnce() -> Value,
        child: &Value,
        depth: usize,
    ) -> Result<(), PyTreeError> {
        let tracking = self.paths.is_some();
        if tracking {
            self.entry_stack.push(entry());
        }
        let result = self.flatten_into(child, depth + 1);
        if tracking {
            self.entry_stack.pop();
        }
        result
    }

    fn flatten_into(&mut self, tree: &Value, depth: usize) -> Result<(), PyTreeError> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(PyTreeError::RecursionLimit {
                limit: MAX_RECURSION_DEPTH,
            });
        }
        if let Some(predicate) = self.leaf_predicate {
            if predicate(tree)? {
                self.emit_leaf(tree);
                return Ok(());
            }
        }

        let (kind, custom) = node_kind(tree, self.namespace, self.none_is_leaf);
        match kind {
            PyTreeKind::Leaf => {
                self.emit_leaf(tree);
                return Ok(());
            }
            PyTreeKind::None => {
                self.traversal.push(Node::none());
                return Ok(());
            }
            _ => {}
        }
        trace!("flattening {kind} node at depth {depth}");

        let start_nodes = self.traversal.len();
        let start_leaves = self.leaves.len();
        let (arity, node_data, node_entries) = match (kind, tree) {
            (PyTreeKind::Tuple, Value::Tuple(items)) | (PyTreeKind::List, Value::List(items)) => {
                for (index, child) in items.iter().enumerate() {
                    self.descend(|| Value::Int(index as i64), child, depth)?;
                }
                (items.len(), None, None)
            }
            (PyTreeKind::Deque, Value::Deque { items, maxlen }) => {
                for (index, child) in items.iter().enumerate() {
                    self.descend(|| Value::Int(index as i64), child, depth)?;
                }
                (items.len(), Some(NodeData::MaxLen(*maxlen)), None)
            }
            (PyTreeKind::Dict, Value::Dict(map)) => {
                let mut keys: Vec<Value> = map.keys().cloned().collect();
                total_order_sort(&mut keys);
                for key in &keys {
                    self.descend(|| key.clone(), &map[key], depth)?;
                }
                (keys.len(), Some(NodeData::Keys(keys)), None)
            }
            (PyTreeKind::OrderedDict, Value::OrderedDict(map)) => {
                for (key, child) in map {
                    self.descend(|| key.clone(), child, depth)?;
                }
                let keys = map.keys().cloned().collect::<Vec<_>>();
                (keys.len(), Some(NodeData::Keys(keys)), None)
            }
            (
                PyTreeKind::DefaultDict,
                Value::DefaultDict {
                    default_factory,
                    map,
                },
            ) => {
                let mut keys: Vec<Value> = map.keys().cloned().collect();
                total_order_sort(&mut keys);
                for key in &keys {
                    self.descend(|| key.clone(), &map[key], depth)?;
                }
                let arity = keys.len();
                (
                    arity,
                    Some(NodeData::DefaultDict {
                        default_factory: (**default_factory).clone(),
                        keys,
                    }),
                    None,
                )
            }
            (PyTreeKind::NamedTuple, Value::NamedTuple { ty, items })
            | (PyTreeKind::StructSequence, Value::StructSequence { ty, items }) => {
                for (field, child) in ty.fields().iter().zip(items) {
                    self.descend(|| Value::Str(field.clone()), child, depth)?;
                }
                (items.len(), Some(NodeData::Record(Arc::clone(ty))), None)
            }
            (PyTreeKind::Custom, _) => {
                self.found_custom = true;
                let registration = custom.ok_or_else(|| {
                    PyTreeError::malformed("custom node kind without a registration")
                })?;
                let to_iterable = registration.to_iterable.as_ref().ok_or_else(|| {
                    PyTreeError::malformed("custom registration without a to_iterable callback")
                })?;
                let flattened = to_iterable(tree)?;
                if let Some(entries) = &flattened.entries {
                    if entries.len() != flattened.children.len() {
                        return Err(PyTreeError::ArityMismatch {
                            what: "path entries",
                            expected: flattened.children.len(),
                            actual: entries.len(),
                        });
                    }
                }
                for (index, child) in flattened.children.iter().enumerate() {
                    self.descend(
                        || match &flattened.entries {
                            Some(entries) => entries[index].clone(),
                            None => Value::Int(index as i64),
                        },
                        child,
                        depth,
                    )?;
                }
                let arity = flattened.children.len();
                self.traversal.push(Node {
                    kind,
                    arity,
                    node_data: Some(NodeData::Custom(flattened.metadata)),
                    node_entries: flattened.entries,
                    custom: Some(registration),
                    num_leaves: self.leaves.len() - start_leaves,
                    num_nodes: self.traversal.len() - start_nodes + 1,
                });
                return Ok(());
            }
            _ => {
                // The classification above is derived from the value's own
                // type; the pairs can never disagree.
                return Err(PyTreeError::malformed(
                    "node kind does not match the value it classifies",
                ));
            }
        };
        self.traversal.push(Node {
            kind,
            arity,
            node_data,
            node_entries,
            custom: None,
            num_leaves: self.leaves.len() - start_leaves,
            num_nodes: self.traversal.len() - start_nodes + 1,
        });
        Ok(())
    }

    fn finish(self) -> (Vec<Value>, PyTreeSpec) {
        // A spec without custom nodes is namespace-independent; keep it
        // compatible with specs from every namespace.
        let namespace = if self.found_custom {
            self.namespace.to_owned()
        } else {
            String::new()
        };
        let spec = PyTreeSpec::from_parts(self.traversal, self.none_is_leaf, namespace);
        (self.leaves, spec)
    }
}

/// Flatten a tree into a list of leaves and its structure.
///
/// For a fixed `(tree, leaf_predicate, none_is_leaf, namespace)` the
/// result is deterministic: plain and defaulting mappings contribute
/// their children in canonical key order, every other container in its
/// own iteration order.
pub fn flatten(
    tree: &Value,
    leaf_predicate: Option<&LeafPredicate>,
    none_is_leaf: bool,
    namespace: &str,
) -> Result<(Vec<Value>, PyTreeSpec), PyTreeError> {
    let mut flattener = Flattener::new(leaf_predicate, none_is_leaf, namespace, false);
    flattener.flatten_into(tree, 0)?;
    Ok(flattener.finish())
}

/// Flatten a tree, additionally recording the root-to-leaf path of every
/// leaf: indices for sequences, keys for mappings, field names for named
/// records, `to_iterable`-supplied entries for custom containers.
///
/// Returns `(paths, leaves, spec)` with `paths.len() == leaves.len()`.
pub fn flatten_with_path(
    tree: &Value,
    leaf_predicate: Option<&LeafPredicate>,
    none_is_leaf: bool,
    namespace: &str,
) -> Result<(Vec<Vec<Value>>, Vec<Value>, PyTreeSpec), PyTreeError> {
    let mut flattener = Flattener::new(leaf_predicate, none_is_leaf, namespace, true);
    flattener.flatten_into(tree, 0)?;
    let paths = flattener.paths.take().unwrap_or_default();
    let (leaves, spec) = flattener.finish();
    Ok((paths, leaves, spec))
}

/// Whether every element of `values` would flatten to a single leaf.
pub fn all_leaves<'a>(
    values: impl IntoIterator<Item = &'a Value>,
    none_is_leaf: bool,
    namespace: &str,
) -> bool {
    values
        .into_iter()
        .all(|value| node_kind(value, namespace, none_is_leaf).0 == PyTreeKind::Leaf)
}
