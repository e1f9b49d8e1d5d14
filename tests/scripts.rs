use std::io::Write;

use opgraph::{
    Argument, CallRecord, ElementType, GraphBuilder, GraphError, Shape, TranslatorRegistry,
    convert_script, graph_to_dot, load_script_from_path,
};

fn write_script(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn converts_script_from_disk() {
    let file = write_script(
        r#"{
            "inputs": [
                {"name": "x", "element_type": "uint8", "shape": [2, 3]},
                {"name": "y", "element_type": "float32", "shape": [3]}
            ],
            "calls": [
                {"op": "aten::max", "args": [{"ref": "x"}, {"ref": "y"}], "outputs": ["m"]},
                {"op": "Pad", "args": [{"ref": "m"}, [1, 0], [1, 0], "edge"], "outputs": ["p"]},
                {"op": "aten::min", "args": [{"ref": "p"}], "outputs": ["lowest"]}
            ],
            "outputs": ["p", "lowest"]
        }"#,
    );
    let script = load_script_from_path(file.path()).unwrap();
    let graph = convert_script(&script, TranslatorRegistry::global()).unwrap();

    let padded = graph
        .descriptor(&graph.output_named("p").unwrap().value)
        .unwrap();
    assert_eq!(padded.element_type, ElementType::Float32);
    assert_eq!(padded.shape, Shape::from([4, 3]));

    let lowest = graph
        .descriptor(&graph.output_named("lowest").unwrap().value)
        .unwrap();
    assert_eq!(lowest.shape, Shape::scalar());

    let dot = graph_to_dot(&graph);
    assert!(dot.contains("Pad"));
    assert!(dot.contains("ReduceMin"));
}

#[test]
fn graph_json_round_trips() {
    let file = write_script(
        r#"{
            "inputs": [{"name": "a", "element_type": "int64", "shape": []}],
            "calls": [{"op": "prim::min", "args": [{"ref": "a"}, 2.5], "outputs": ["r"]}],
            "outputs": ["r"]
        }"#,
    );
    let script = load_script_from_path(file.path()).unwrap();
    let graph = convert_script(&script, TranslatorRegistry::global()).unwrap();
    let json = serde_json::to_string(&graph).unwrap();
    let parsed: opgraph::Graph = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, graph);
}

#[test]
fn invalid_pad_mode_aborts_conversion() {
    let file = write_script(
        r#"{
            "inputs": [{"name": "x", "element_type": "float32", "shape": [3, 4]}],
            "calls": [{"op": "Pad", "args": [{"ref": "x"}, [0, 1], [2, 3], "wrap"], "outputs": ["y"]}],
            "outputs": ["y"]
        }"#,
    );
    let script = load_script_from_path(file.path()).unwrap();
    let err = convert_script(&script, TranslatorRegistry::global()).unwrap_err();
    assert!(matches!(err, GraphError::InvalidAttribute { .. }));
}

#[test]
fn unknown_operator_in_script() {
    let file = write_script(r#"{"calls": [{"op": "aten::softmax"}], "outputs": []}"#);
    let script = load_script_from_path(file.path()).unwrap();
    let err = convert_script(&script, TranslatorRegistry::global()).unwrap_err();
    assert!(matches!(err, GraphError::UnknownOperator { ref op_type } if op_type == "aten::softmax"));
}

#[test]
fn malformed_script_is_a_parse_error() {
    let file = write_script(r#"{"inputs": 3}"#);
    assert!(matches!(
        load_script_from_path(file.path()),
        Err(GraphError::Parse { .. })
    ));
}

#[test]
fn prim_max_over_literals() {
    let registry = TranslatorRegistry::global();
    for (args, expected) in [
        (vec![Argument::Float(0.0), Argument::Float(1.0)], 1.0),
        (vec![Argument::Int(1), Argument::Int(1)], 1.0),
        (vec![Argument::Int(2), Argument::Int(1)], 2.0),
        (vec![Argument::Bool(false), Argument::Bool(true)], 1.0),
    ] {
        let mut builder = GraphBuilder::new();
        let results = registry
            .translate(&CallRecord::new("prim::max", args), &mut builder)
            .unwrap();
        let constant = builder.graph().constant_value(&results[0]).unwrap();
        assert_eq!(constant.to_f64s(), vec![expected]);
    }
}

#[test]
fn translation_on_fresh_graphs_is_identical() {
    let build = || {
        let mut builder = GraphBuilder::new();
        let x = builder
            .parameter("x", ElementType::Float32, [1, 3, 10, 10])
            .unwrap();
        let call = CallRecord::new("aten::min", vec![Argument::tensor(x), Argument::Int(-1)])
            .with_kwarg("keepdim", Argument::Bool(true));
        TranslatorRegistry::global()
            .translate(&call, &mut builder)
            .unwrap();
        builder.graph().clone()
    };
    let (first, second) = (build(), build());
    assert_eq!(first, second);
    assert_eq!(first.nodes()[1].op_type, "ReduceMin");
    assert_eq!(first.nodes()[2].op_type, "ArgMin");
}
