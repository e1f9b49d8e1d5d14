use crate::error::GraphError;
use crate::graph::{
    AttributeValue, Attributes, ConstantId, ConstantValue, Dim, ElementType, Graph, GraphOutput,
    Node, NodeHandle, OperandDescriptor, Shape, Value,
};
use crate::ops::{InferenceInput, OpRegistry, PARAMETER};
use crate::validator::GraphValidator;

/// Incrementally builds a [`Graph`]. Every node's outputs are inferred when it is added.
pub struct GraphBuilder<'r> {
    registry: &'r OpRegistry,
    graph: Graph,
}

impl Default for GraphBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder<'static> {
    pub fn new() -> Self {
        Self::with_registry(OpRegistry::global())
    }
}

impl<'r> GraphBuilder<'r> {
    pub fn with_registry(registry: &'r OpRegistry) -> Self {
        Self {
            registry,
            graph: Graph::default(),
        }
    }

    pub fn registry(&self) -> &'r OpRegistry {
        self.registry
    }

    /// Read-only view of everything added so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Create a graph input.
    ///
    /// Dynamic dimensions are recorded as `-1` in the `shape` attribute.
    pub fn parameter(
        &mut self,
        name: &str,
        element_type: ElementType,
        shape: impl Into<Shape>,
    ) -> Result<NodeHandle, GraphError> {
        let shape = shape.into();
        let dims = shape
            .dims()
            .iter()
            .map(|dim| match dim {
                Dim::Static(size) => *size as i64,
                Dim::Dynamic => -1,
            })
            .collect();
        let mut attributes = Attributes::new();
        attributes.insert(
            "element_type".to_string(),
            AttributeValue::ElementType(element_type),
        );
        attributes.insert("shape".to_string(), AttributeValue::Ints(dims));
        self.add_named_node(Some(name.to_string()), PARAMETER, Vec::new(), attributes)
    }

    pub fn constant(&mut self, constant: ConstantValue) -> Value {
        let id = ConstantId(self.graph.constants.len() as u32);
        log::debug!(
            "constant {}: {} {}",
            id.0,
            constant.element_type(),
            constant.shape()
        );
        self.graph.constants.push(constant);
        Value::Constant(id)
    }

    pub fn add_node(
        &mut self,
        op_type: &str,
        inputs: Vec<Value>,
        attributes: Attributes,
    ) -> Result<NodeHandle, GraphError> {
        self.add_named_node(None, op_type, inputs, attributes)
    }

    /// Validate arity, infer outputs and append the node.
    ///
    /// Inputs may only reference existing nodes or constants, so the graph stays acyclic.
    pub fn add_named_node(
        &mut self,
        name: Option<String>,
        op_type: &str,
        inputs: Vec<Value>,
        attributes: Attributes,
    ) -> Result<NodeHandle, GraphError> {
        let schema = self.registry.get(op_type)?;
        schema.check_arity(inputs.len())?;

        let mut inference_inputs = Vec::with_capacity(inputs.len());
        for value in &inputs {
            inference_inputs.push(InferenceInput {
                descriptor: self.graph.descriptor(value)?,
                constant: self.graph.constant_value(value),
            });
        }
        let outputs =
            (schema.infer)(&inference_inputs, &attributes).map_err(|err| err.for_op(op_type))?;

        let handle = NodeHandle(self.graph.nodes.len() as u32);
        log::debug!(
            "{} = {}({}) -> {}",
            handle,
            op_type,
            inputs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            outputs
                .iter()
                .map(|output| format!("{} {}", output.element_type, output.shape))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.graph.nodes.push(Node {
            op_type: schema.op_type.to_string(),
            name,
            inputs,
            attributes,
            outputs,
        });
        Ok(handle)
    }

    pub fn descriptor(&self, value: &Value) -> Result<OperandDescriptor, GraphError> {
        self.graph.descriptor(value)
    }

    /// Freeze the graph with the given named outputs.
    pub fn build(mut self, outputs: Vec<(String, Value)>) -> Result<Graph, GraphError> {
        self.graph.outputs = outputs
            .into_iter()
            .map(|(name, value)| GraphOutput { name, value })
            .collect();
        GraphValidator::new(&self.graph).validate()?;
        Ok(self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{CONVERT, MAXIMUM, PAD, REDUCE_MIN};

    fn pad_attributes(mode: &str) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("mode".to_string(), AttributeValue::String(mode.to_string()));
        attributes
    }

    fn add_pad(
        builder: &mut GraphBuilder<'_>,
        input: NodeHandle,
        begin: &[i64],
        end: &[i64],
        mode: &str,
    ) -> Result<NodeHandle, GraphError> {
        let begin = builder.constant(ConstantValue::i64_vector(begin));
        let end = builder.constant(ConstantValue::i64_vector(end));
        builder.add_node(PAD, vec![input.into(), begin, end], pad_attributes(mode))
    }

    #[test]
    fn test_pad_node_for_every_mode() {
        for mode in ["constant", "edge", "reflect", "symmetric"] {
            let mut builder = GraphBuilder::new();
            let input = builder
                .parameter("input", ElementType::Int32, [3, 4])
                .unwrap();
            let pad = add_pad(&mut builder, input, &[0, 1], &[2, 3], mode).unwrap();

            let graph = builder.graph();
            assert_eq!(graph.type_name(pad).unwrap(), "Pad");
            assert_eq!(graph.output_count(pad).unwrap(), 1);
            let output = graph.output(pad, 0).unwrap();
            assert_eq!(output.shape.to_static(), Some(vec![5, 8]));
            assert_eq!(output.element_type, ElementType::Int32);
        }
    }

    #[test]
    fn test_pad_begin_and_end() {
        for (begin, end, expected) in [
            ([-1, -1], [-1, -1], vec![1, 2]),
            ([2, -1], [-1, 3], vec![4, 6]),
        ] {
            let mut builder = GraphBuilder::new();
            let input = builder
                .parameter("input", ElementType::Int32, [3, 4])
                .unwrap();
            let pad = add_pad(&mut builder, input, &begin, &end, "constant").unwrap();
            let output = builder.graph().output(pad, 0).unwrap();
            assert_eq!(output.shape.to_static(), Some(expected));
            assert_eq!(output.element_type, ElementType::Int32);
        }
    }

    #[test]
    fn test_pad_invalid_mode() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let err = add_pad(&mut builder, input, &[0, 1], &[2, 3], "wrap").unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidAttribute { ref op_type, ref attribute, .. }
                if op_type == "Pad" && attribute == "mode"
        ));
        // The failed node is not added.
        assert_eq!(builder.graph().nodes().len(), 1);
    }

    #[test]
    fn test_pad_value_requires_matching_type() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let begin = builder.constant(ConstantValue::i64_vector(&[1, 1]));
        let end = builder.constant(ConstantValue::i64_vector(&[1, 1]));
        let value = builder.constant(ConstantValue::scalar_f64(ElementType::Float32, 0.5));
        let err = builder
            .add_node(
                PAD,
                vec![input.into(), begin, end, value],
                pad_attributes("constant"),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));

        let value = builder.constant(ConstantValue::scalar_i64(ElementType::Int32, 7));
        let err = builder
            .add_node(PAD, vec![input.into(), begin, end, value], pad_attributes("edge"))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_unknown_operator_and_arity() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("x", ElementType::Float32, [2])
            .unwrap();
        let err = builder
            .add_node("Softmax", vec![input.into()], Attributes::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownOperator { .. }));
        let err = builder
            .add_node(MAXIMUM, vec![input.into()], Attributes::new())
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidArity { actual: 1, .. }));
    }

    #[test]
    fn test_dangling_reference_is_out_of_range() {
        let mut builder = GraphBuilder::new();
        let err = builder
            .add_node(
                CONVERT,
                vec![Value::output(NodeHandle(4), 0)],
                Attributes::new(),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::OutOfRange { what: "node", .. }));

        let input = builder
            .parameter("x", ElementType::Float32, [2])
            .unwrap();
        let err = builder.graph().output(input, 1).unwrap_err();
        assert!(matches!(
            err,
            GraphError::OutOfRange {
                what: "output port",
                index: 1,
                count: 1
            }
        ));
    }

    #[test]
    fn test_reduce_min_keep_dims() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("x", ElementType::Float32, [1, 3, 10, 10])
            .unwrap();
        let axes = builder.constant(ConstantValue::i64_vector(&[-1]));
        let mut attributes = Attributes::new();
        attributes.insert("keep_dims".to_string(), AttributeValue::Bool(true));
        let reduce = builder
            .add_node(REDUCE_MIN, vec![input.into(), axes], attributes)
            .unwrap();
        assert_eq!(
            builder.graph().output(reduce, 0).unwrap().shape,
            Shape::from([1, 3, 10, 1])
        );
    }

    #[test]
    fn test_maximum_type_mismatch() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .parameter("a", ElementType::Float32, [2, 3])
            .unwrap();
        let b = builder.parameter("b", ElementType::Int32, [2, 3]).unwrap();
        let err = builder
            .add_node(MAXIMUM, vec![a.into(), b.into()], Attributes::new())
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::TypeMismatch { ref op_type, .. } if op_type == "Maximum"
        ));
    }

    #[test]
    fn test_build_freezes_outputs() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .parameter("a", ElementType::Float32, [2, 3])
            .unwrap();
        let b = builder
            .parameter("b", ElementType::Float32, [1, 3])
            .unwrap();
        let max = builder
            .add_node(MAXIMUM, vec![a.into(), b.into()], Attributes::new())
            .unwrap();
        let graph = builder.build(vec![("max".to_string(), max.into())]).unwrap();
        let output = graph.output_named("max").unwrap();
        assert_eq!(
            graph.descriptor(&output.value).unwrap(),
            OperandDescriptor::new(ElementType::Float32, [2, 3])
        );
        assert_eq!(graph.parameters().count(), 2);
    }

    #[test]
    fn test_build_rejects_duplicate_output_names() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .parameter("a", ElementType::Float32, [2])
            .unwrap();
        let err = builder
            .build(vec![
                ("out".to_string(), a.into()),
                ("out".to_string(), a.into()),
            ])
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateOutputName { .. }));
    }
}
