//! Tests for the stable string rendering of tree structures.

use std::sync::Arc;

use pytree::{flatten, register_node, ExtensionType, FlattenedNode, RecordType, Value};

fn render(tree: &Value, none_is_leaf: bool, namespace: &str) -> String {
    let (_, spec) = flatten(tree, None, none_is_leaf, namespace).unwrap();
    spec.to_string()
}

#[test]
fn leaves_and_sequences() {
    pytree_testhelpers::setup();

    assert_eq!(render(&Value::from(1), false, ""), "PyTreeSpec(*)");
    assert_eq!(
        render(&Value::Tuple(vec![Value::from(1)]), false, ""),
        "PyTreeSpec((*,))"
    );
    assert_eq!(
        render(&Value::Tuple(vec![]), false, ""),
        "PyTreeSpec(())"
    );
    assert_eq!(
        render(
            &Value::List(vec![Value::from(1), Value::List(vec![])]),
            false,
            ""
        ),
        "PyTreeSpec([*, []])"
    );
}

#[test]
fn deques_show_their_bound() {
    pytree_testhelpers::setup();

    assert_eq!(
        render(&Value::deque([Value::from(1)], None), false, ""),
        "PyTreeSpec(deque([*]))"
    );
    assert_eq!(
        render(
            &Value::deque([Value::from(1), Value::from(2)], Some(5)),
            false,
            ""
        ),
        "PyTreeSpec(deque([*, *], maxlen=5))"
    );
}

#[test]
fn mappings_render_in_traversal_order() {
    pytree_testhelpers::setup();

    let dict = Value::dict([
        (Value::from("b"), Value::from(1)),
        (Value::from("a"), Value::from(2)),
    ]);
    assert_eq!(render(&dict, false, ""), "PyTreeSpec({'a': *, 'b': *})");

    let ordered = Value::ordered_dict([
        (Value::from("b"), Value::from(1)),
        (Value::from("a"), Value::from(2)),
    ]);
    assert_eq!(
        render(&ordered, false, ""),
        "PyTreeSpec(OrderedDict([('b', *), ('a', *)]))"
    );

    let defaulting = Value::default_dict(
        Value::from("list"),
        [
            (Value::from("b"), Value::from(1)),
            (Value::from("a"), Value::from(2)),
        ],
    );
    assert_eq!(
        render(&defaulting, false, ""),
        "PyTreeSpec(defaultdict('list', {'a': *, 'b': *}))"
    );
}

#[test]
fn records_render_with_field_names() {
    pytree_testhelpers::setup();

    let point = Arc::new(RecordType::new("Point", ["x", "y"]));
    let tree = Value::named_tuple(&point, [Value::from(1), Value::from(2)]);
    assert_eq!(render(&tree, false, ""), "PyTreeSpec(Point(x=*, y=*))");

    let tree = Value::struct_sequence(&point, [Value::from(1), Value::from(2)]);
    assert_eq!(render(&tree, false, ""), "PyTreeSpec(Point(x=*, y=*))");
}

#[test]
fn mode_suffix_and_namespace_suppression() {
    pytree_testhelpers::setup();

    let tree = Value::List(vec![Value::from(1)]);
    assert_eq!(render(&tree, true, ""), "PyTreeSpec([*], NoneIsLeaf)");
    // The namespace is not recorded (and thus not rendered) when no
    // custom node was expanded.
    assert_eq!(render(&tree, false, "my-ns"), "PyTreeSpec([*])");
    assert_eq!(
        render(&tree, true, "my-ns"),
        "PyTreeSpec([*], NoneIsLeaf)"
    );
}

#[test]
fn custom_nodes_render_their_type_and_metadata() {
    pytree_testhelpers::setup();

    let ty = Arc::new(ExtensionType::new("display.Pair"));
    let rebuild = Arc::clone(&ty);
    register_node(
        &ty,
        |value| match value {
            Value::Extension { data, .. } => match data.as_ref() {
                Value::Tuple(items) => Ok(FlattenedNode {
                    children: items.clone(),
                    metadata: Some(Value::from("pair")),
                    entries: None,
                }),
                other => Err(pytree::PyTreeError::callback(format!(
                    "expected a tuple payload, got {}",
                    other.repr()
                ))),
            },
            other => Err(pytree::PyTreeError::callback(format!(
                "expected an extension value, got {}",
                other.repr()
            ))),
        },
        move |_, children| Ok(Value::extension(&rebuild, Value::Tuple(children))),
        "display-ns",
    )
    .unwrap();

    let tree = Value::extension(&ty, Value::Tuple(vec![Value::from(1), Value::from(2)]));
    assert_eq!(
        render(&tree, false, "display-ns"),
        "PyTreeSpec(CustomTreeNode(Pair['pair'], [*, *]), namespace='display-ns')"
    );
}
