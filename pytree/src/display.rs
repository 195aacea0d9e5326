//! Human-readable rendering of tree structures.

use core::fmt::Write;

use pytree_value::Value;

use crate::node::{NodeData, PyTreeKind};
use crate::treespec::PyTreeSpec;

impl core::fmt::Display for PyTreeSpec {
    /// Linear replay of the traversal with a stack of child renderings.
    ///
    /// Leaves render as `*`; containers use the host's literal notation
    /// with `*` in leaf positions, e.g. `PyTreeSpec([*, (*, *)])`.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut agenda: Vec<String> = Vec::new();
        for node in &self.traversal {
            if node.kind == PyTreeKind::Leaf {
                agenda.push("*".to_owned());
                continue;
            }
            let children_start = agenda.len().saturating_sub(node.arity);
            let children = &agenda[children_start..];
            let mut out = String::new();
            match (node.kind, &node.node_data) {
                (PyTreeKind::None, _) => out.push_str("None"),
                (PyTreeKind::Tuple, _) => {
                    out.push('(');
                    push_joined(&mut out, children);
                    // One-element tuples keep their trailing comma.
                    if node.arity == 1 {
                        out.push(',');
                    }
                    out.push(')');
                }
                (PyTreeKind::List, _) => {
                    out.push('[');
                    push_joined(&mut out, children);
                    out.push(']');
                }
                (PyTreeKind::Deque, Some(NodeData::MaxLen(maxlen))) => {
                    out.push_str("deque([");
                    push_joined(&mut out, children);
                    out.push(']');
                    if let Some(maxlen) = maxlen {
                        let _ = write!(out, ", maxlen={maxlen}");
                    }
                    out.push(')');
                }
                (PyTreeKind::Dict, Some(NodeData::Keys(keys))) => {
                    out.push('{');
                    push_entries(&mut out, keys, children);
                    out.push('}');
                }
                (PyTreeKind::OrderedDict, Some(NodeData::Keys(keys))) => {
                    out.push_str("OrderedDict([");
                    for (index, (key, child)) in keys.iter().zip(children).enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "({}, {child})", key.repr());
                    }
                    out.push_str("])");
                }
                (
                    PyTreeKind::DefaultDict,
                    Some(NodeData::DefaultDict {
                        default_factory,
                        keys,
                    }),
                ) => {
                    let _ = write!(out, "defaultdict({}, {{", default_factory.repr());
                    push_entries(&mut out, keys, children);
                    out.push_str("})");
                }
                (PyTreeKind::NamedTuple, Some(NodeData::Record(ty)))
                | (PyTreeKind::StructSequence, Some(NodeData::Record(ty))) => {
                    out.push_str(ty.name());
                    out.push('(');
                    for (index, (field, child)) in ty.fields().iter().zip(children).enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "{field}={child}");
                    }
                    out.push(')');
                }
                (PyTreeKind::Custom, Some(NodeData::Custom(metadata))) => {
                    let name = node
                        .custom
                        .as_ref()
                        .map_or("?", |registration| registration.node_type().name());
                    out.push_str("CustomTreeNode(");
                    out.push_str(name);
                    if let Some(metadata) = metadata {
                        let _ = write!(out, "[{}]", metadata.repr());
                    }
                    out.push_str(", [");
                    push_joined(&mut out, children);
                    out.push_str("])");
                }
                _ => out.push_str("<malformed>"),
            }
            agenda.truncate(children_start);
            agenda.push(out);
        }

        f.write_str("PyTreeSpec(")?;
        match agenda.pop() {
            Some(root) if agenda.is_empty() => f.write_str(&root)?,
            _ => f.write_str("<malformed>")?,
        }
        if self.none_is_leaf {
            f.write_str(", NoneIsLeaf")?;
        }
        if !self.namespace.is_empty() {
            write!(f, ", namespace={}", Value::from(self.namespace.as_str()).repr())?;
        }
        f.write_str(")")
    }
}

fn push_joined(out: &mut String, children: &[String]) {
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        out.push_str(child);
    }
}

fn push_entries(out: &mut String, keys: &[Value], children: &[String]) {
    for (index, (key, child)) in keys.iter().zip(children).enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}: {child}", key.repr());
    }
}
