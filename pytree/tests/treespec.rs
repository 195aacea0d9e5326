//! Tests for the `PyTreeSpec` algebra: round-trips, composition,
//! children, walking, equality, and hashing.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use pytree::{flatten, leaf, none, tuple, PyTreeError, PyTreeSpec, RecordType, Value, ValueType};

fn hash_of(spec: &PyTreeSpec) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    spec.hash(&mut hasher);
    hasher.finish()
}

fn sample_trees() -> Vec<Value> {
    let point = Arc::new(RecordType::new("Point", ["x", "y"]));
    vec![
        Value::from(42),
        Value::None,
        Value::List(vec![]),
        Value::Tuple(vec![Value::from(1)]),
        Value::List(vec![
            Value::from(1),
            Value::Tuple(vec![Value::from(2), Value::from(3)]),
            Value::dict([
                (Value::from("b"), Value::from(4)),
                (Value::from("a"), Value::from(5)),
            ]),
        ]),
        Value::ordered_dict([
            (Value::from("y"), Value::None),
            (Value::from("x"), Value::deque([Value::from(7)], Some(3))),
        ]),
        Value::default_dict(
            Value::from("list"),
            [(Value::from("k"), Value::List(vec![Value::from(9)]))],
        ),
        Value::named_tuple(&point, [Value::from(1), Value::dict([])]),
    ]
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn flatten_unflatten_round_trips() {
    pytree_testhelpers::setup();

    for none_is_leaf in [false, true] {
        for tree in sample_trees() {
            let (leaves, spec) = flatten(&tree, None, none_is_leaf, "").unwrap();
            assert_eq!(spec.num_leaves(), leaves.len());
            let rebuilt = spec.unflatten(leaves).unwrap();
            assert_eq!(rebuilt, tree, "round trip failed for {}", tree.repr());
        }
    }
}

#[test]
fn unflatten_rejects_wrong_leaf_counts() {
    pytree_testhelpers::setup();

    let (_, spec) = flatten(
        &Value::Tuple(vec![Value::from(1), Value::from(2)]),
        None,
        false,
        "",
    )
    .unwrap();
    let err = spec.unflatten(vec![Value::from(1)]).unwrap_err();
    assert_eq!(
        err,
        PyTreeError::ArityMismatch {
            what: "leaves",
            expected: 2,
            actual: 1,
        }
    );
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[test]
fn compose_substitutes_the_inner_spec_at_every_leaf() {
    pytree_testhelpers::setup();

    let (_, outer) = flatten(
        &Value::List(vec![Value::from(0), Value::from(0)]),
        None,
        false,
        "",
    )
    .unwrap();
    let (_, inner) = flatten(
        &Value::Tuple(vec![Value::from(0), Value::from(0)]),
        None,
        false,
        "",
    )
    .unwrap();
    let composed = outer.compose(&inner).unwrap();
    assert_eq!(composed.num_leaves(), 4);
    assert_eq!(
        composed.num_nodes(),
        (outer.num_nodes() - outer.num_leaves()) + outer.num_leaves() * inner.num_nodes()
    );
    assert_eq!(composed.to_string(), "PyTreeSpec([(*, *), (*, *)])");

    let rebuilt = composed.unflatten(
        (1..=4).map(Value::from).collect::<Vec<_>>(),
    );
    assert_eq!(
        rebuilt.unwrap(),
        Value::List(vec![
            Value::Tuple(vec![Value::from(1), Value::from(2)]),
            Value::Tuple(vec![Value::from(3), Value::from(4)]),
        ])
    );
}

/// Register a pair-like custom container so a flatten actually records
/// its namespace (namespaces stick only when a custom node is expanded).
fn namespaced_spec(type_name: &str, namespace: &str) -> pytree::PyTreeSpec {
    let ty = Arc::new(pytree::ExtensionType::new(type_name));
    let rebuild = Arc::clone(&ty);
    pytree::register_node(
        &ty,
        |value| match value {
            Value::Extension { data, .. } => match data.as_ref() {
                Value::List(items) => Ok(pytree::FlattenedNode {
                    children: items.clone(),
                    metadata: None,
                    entries: None,
                }),
                other => Err(PyTreeError::callback(format!(
                    "expected a list payload, got {}",
                    other.repr()
                ))),
            },
            other => Err(PyTreeError::callback(format!(
                "expected an extension value, got {}",
                other.repr()
            ))),
        },
        move |_, children| Ok(Value::extension(&rebuild, Value::List(children))),
        namespace,
    )
    .unwrap();
    let tree = Value::extension(&ty, Value::List(vec![Value::from(0), Value::from(0)]));
    let (_, spec) = flatten(&tree, None, false, namespace).unwrap();
    spec
}

#[test]
fn compose_requires_matching_modes_and_namespaces() {
    pytree_testhelpers::setup();

    let tree = Value::List(vec![Value::from(0)]);
    let (_, plain) = flatten(&tree, None, false, "").unwrap();
    let (_, as_leaf) = flatten(&tree, None, true, "").unwrap();
    assert!(matches!(
        plain.compose(&as_leaf),
        Err(PyTreeError::NoneIsLeafMismatch { .. })
    ));

    let in_a = namespaced_spec("treespec.ComposeA", "cmp-ns-a");
    let in_b = namespaced_spec("treespec.ComposeB", "cmp-ns-b");
    assert_eq!(in_a.namespace(), "cmp-ns-a");
    assert!(matches!(
        in_a.compose(&in_b),
        Err(PyTreeError::NamespaceMismatch { .. })
    ));

    // A single non-empty namespace wins.
    let composed = in_a.compose(&plain).unwrap();
    assert_eq!(composed.namespace(), "cmp-ns-a");
    let composed = plain.compose(&in_b).unwrap();
    assert_eq!(composed.namespace(), "cmp-ns-b");
}

// ---------------------------------------------------------------------------
// Children and constructors
// ---------------------------------------------------------------------------

#[test]
fn children_cover_the_top_level_branches() {
    pytree_testhelpers::setup();

    let tree = Value::Tuple(vec![
        Value::from(1),
        Value::Tuple(vec![Value::from(2), Value::from(3)]),
        Value::dict([(Value::from("a"), Value::from(4))]),
    ]);
    let (_, spec) = flatten(&tree, None, false, "").unwrap();
    let children = spec.children();
    assert_eq!(children.len(), 3);
    assert_eq!(children[0].to_string(), "PyTreeSpec(*)");
    assert_eq!(children[1].to_string(), "PyTreeSpec((*, *))");
    assert_eq!(children[2].to_string(), "PyTreeSpec({'a': *})");

    // Reassembling the children under a tuple root restores the spec.
    let rebuilt = tuple(children, false).unwrap();
    assert_eq!(rebuilt, spec);
    assert_eq!(hash_of(&rebuilt), hash_of(&spec));
}

#[test]
fn leaf_and_none_constructors() {
    pytree_testhelpers::setup();

    assert!(leaf(false).is_leaf(true));
    assert_eq!(leaf(false).num_leaves(), 1);

    let none_spec = none(false);
    assert_eq!(none_spec.num_leaves(), 0);
    assert!(none_spec.is_leaf(false));
    assert!(!none_spec.is_leaf(true));
    assert_eq!(none_spec.node_type(), Some(ValueType::None));

    // With none-as-leaf the two constructors coincide.
    assert_eq!(none(true), leaf(true));
}

#[test]
fn tuple_constructor_checks_modes() {
    pytree_testhelpers::setup();

    let err = tuple(vec![leaf(true)], false).unwrap_err();
    assert!(matches!(err, PyTreeError::NoneIsLeafMismatch { .. }));

    let spec = tuple(vec![leaf(false), none(false)], false).unwrap();
    assert_eq!(spec.to_string(), "PyTreeSpec((*, None))");
    assert_eq!(spec.num_leaves(), 1);
    assert_eq!(spec.num_children(), 2);
}

#[test]
fn node_type_reports_the_root_container() {
    pytree_testhelpers::setup();

    let (_, spec) = flatten(&Value::List(vec![]), None, false, "").unwrap();
    assert_eq!(spec.node_type(), Some(ValueType::List));

    let (_, spec) = flatten(&Value::from(1), None, false, "").unwrap();
    assert_eq!(spec.node_type(), None);

    let point = Arc::new(RecordType::new("Point", ["x", "y"]));
    let tree = Value::named_tuple(&point, [Value::from(1), Value::from(2)]);
    let (_, spec) = flatten(&tree, None, false, "").unwrap();
    assert_eq!(spec.node_type(), Some(ValueType::NamedTuple(point)));
}

// ---------------------------------------------------------------------------
// flatten_up_to
// ---------------------------------------------------------------------------

#[test]
fn flatten_up_to_returns_opaque_subtrees() {
    pytree_testhelpers::setup();

    // Spec [*, *] against [(1, (2, 3)), {"foo": 4}].
    let (_, prefix) = flatten(
        &Value::List(vec![Value::from(0), Value::from(0)]),
        None,
        false,
        "",
    )
    .unwrap();
    let first = Value::Tuple(vec![
        Value::from(1),
        Value::Tuple(vec![Value::from(2), Value::from(3)]),
    ]);
    let second = Value::dict([(Value::from("foo"), Value::from(4))]);
    let full = Value::List(vec![first.clone(), second.clone()]);
    let subtrees = prefix.flatten_up_to(&full).unwrap();
    assert_eq!(subtrees, vec![first, second]);

    // Unflattening the subtrees re-yields the full tree.
    assert_eq!(prefix.unflatten(subtrees).unwrap(), full);
}

#[test]
fn flatten_up_to_checks_structure() {
    pytree_testhelpers::setup();

    let (_, prefix) = flatten(
        &Value::Tuple(vec![Value::from(0), Value::from(0)]),
        None,
        false,
        "",
    )
    .unwrap();

    // Kind mismatch: a list is not a tuple.
    let err = prefix
        .flatten_up_to(&Value::List(vec![Value::from(1), Value::from(2)]))
        .unwrap_err();
    match err {
        PyTreeError::StructureMismatch { expected, actual } => {
            assert!(expected.contains("(*, *)"), "expected rendering: {expected}");
            assert!(actual.contains("[1, 2]"), "actual rendering: {actual}");
        }
        other => panic!("expected a structure mismatch, got {other}"),
    }

    // Arity mismatch.
    let err = prefix
        .flatten_up_to(&Value::Tuple(vec![Value::from(1)]))
        .unwrap_err();
    assert_eq!(
        err,
        PyTreeError::ArityMismatch {
            what: "children",
            expected: 2,
            actual: 1,
        }
    );

    // Key mismatch inside a mapping.
    let (_, dict_prefix) = flatten(
        &Value::dict([(Value::from("a"), Value::from(0))]),
        None,
        false,
        "",
    )
    .unwrap();
    let err = dict_prefix
        .flatten_up_to(&Value::dict([(Value::from("b"), Value::from(0))]))
        .unwrap_err();
    assert!(matches!(err, PyTreeError::StructureMismatch { .. }));
}

#[test]
fn flatten_up_to_distinguishes_deque_bounds() {
    pytree_testhelpers::setup();

    let (_, prefix) = flatten(&Value::deque([Value::from(0)], Some(2)), None, false, "").unwrap();
    assert!(prefix
        .flatten_up_to(&Value::deque([Value::from(1)], Some(2)))
        .is_ok());
    assert!(matches!(
        prefix.flatten_up_to(&Value::deque([Value::from(1)], None)),
        Err(PyTreeError::StructureMismatch { .. })
    ));
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

#[test]
fn walk_folds_over_the_structure() {
    pytree_testhelpers::setup();

    let tree = Value::List(vec![
        Value::from(1),
        Value::Tuple(vec![Value::from(2), Value::from(3)]),
    ]);
    let (leaves, spec) = flatten(&tree, None, false, "").unwrap();
    let total = spec
        .walk(
            |children, _| Ok(children.into_iter().sum::<i64>()),
            |leaf| match leaf {
                Value::Int(v) => Ok(v),
                other => Err(PyTreeError::callback(format!(
                    "expected an integer leaf, got {}",
                    other.repr()
                ))),
            },
            leaves,
        )
        .unwrap();
    assert_eq!(total, 6);
}

#[test]
fn walk_requires_exactly_the_right_leaf_count() {
    pytree_testhelpers::setup();

    let (_, spec) = flatten(
        &Value::List(vec![Value::from(1), Value::from(2)]),
        None,
        false,
        "",
    )
    .unwrap();
    let too_few = spec.walk(
        |children: Vec<i64>, _| Ok(children.into_iter().sum()),
        |_| Ok(0i64),
        vec![Value::from(1)],
    );
    assert!(matches!(too_few, Err(PyTreeError::ArityMismatch { .. })));

    let too_many = spec.walk(
        |children: Vec<i64>, _| Ok(children.into_iter().sum()),
        |_| Ok(0i64),
        (0..3).map(Value::from).collect::<Vec<_>>(),
    );
    assert!(matches!(too_many, Err(PyTreeError::ArityMismatch { .. })));
}

// ---------------------------------------------------------------------------
// Equality and hashing
// ---------------------------------------------------------------------------

#[test]
fn equal_specs_hash_equally() {
    pytree_testhelpers::setup();

    for tree in sample_trees() {
        let (_, a) = flatten(&tree, None, false, "").unwrap();
        let (_, b) = flatten(&tree, None, false, "").unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}

#[test]
fn specs_with_different_modes_are_unequal() {
    pytree_testhelpers::setup();

    let tree = Value::List(vec![Value::from(1)]);
    let (_, plain) = flatten(&tree, None, false, "").unwrap();
    let (_, as_leaf) = flatten(&tree, None, true, "").unwrap();
    assert_ne!(plain, as_leaf);
}

#[test]
fn namespaces_stick_only_when_a_custom_node_is_seen() {
    pytree_testhelpers::setup();

    // No custom node expanded: the spec stays namespace-free and equal to
    // a bare flatten.
    let tree = Value::List(vec![Value::from(1)]);
    let (_, in_ns) = flatten(&tree, None, false, "some-unused-ns").unwrap();
    let (_, bare) = flatten(&tree, None, false, "").unwrap();
    assert_eq!(in_ns.namespace(), "");
    assert_eq!(in_ns, bare);

    // A custom node pins the namespace the flatten ran in.
    let spec = namespaced_spec("treespec.Pinned", "pinned-ns");
    assert_eq!(spec.namespace(), "pinned-ns");
}
