use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::graph::{Graph, NodeHandle, OperandDescriptor, Value};
use crate::ops::PARAMETER;

#[derive(Debug)]
pub struct ValidationArtifacts {
    pub parameter_names_to_descriptors: HashMap<String, OperandDescriptor>,
    pub output_names_to_descriptors: HashMap<String, OperandDescriptor>,
    pub node_to_consumers: HashMap<NodeHandle, Vec<String>>,
    /// Nodes whose outputs feed neither another node nor a graph output.
    pub unused_nodes: Vec<NodeHandle>,
}

/// Re-checks the structural invariants of a frozen graph.
pub struct GraphValidator<'a> {
    graph: &'a Graph,
    node_to_consumers: HashMap<NodeHandle, Vec<String>>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            node_to_consumers: HashMap::new(),
        }
    }

    pub fn validate(mut self) -> Result<ValidationArtifacts, GraphError> {
        if self.graph.outputs().is_empty() {
            return Err(GraphError::NoOutputs);
        }

        let mut parameters = HashMap::new();
        for (handle, node) in self.graph.parameters() {
            let name = node.name.clone().unwrap_or_else(|| handle.to_string());
            let descriptor = self.graph.output(handle, 0)?.clone();
            if parameters.insert(name.clone(), descriptor).is_some() {
                return Err(GraphError::DuplicateParameterName { name });
            }
        }

        self.validate_nodes()?;

        let mut outputs = HashMap::new();
        let mut used_by_outputs = HashSet::new();
        for (idx, output) in self.graph.outputs().iter().enumerate() {
            if output.name.is_empty() {
                return Err(GraphError::MissingOutputName { index: idx });
            }
            let descriptor = self.graph.descriptor(&output.value)?;
            if outputs.insert(output.name.clone(), descriptor).is_some() {
                return Err(GraphError::DuplicateOutputName {
                    name: output.name.clone(),
                });
            }
            if let Some(node) = output.value.node() {
                used_by_outputs.insert(node);
            }
        }

        let unused_nodes = (0..self.graph.nodes().len() as u32)
            .map(NodeHandle)
            .filter(|handle| {
                !self.node_to_consumers.contains_key(handle) && !used_by_outputs.contains(handle)
            })
            .collect::<Vec<_>>();
        if !unused_nodes.is_empty() {
            log::warn!("{} node(s) never feed an output", unused_nodes.len());
        }

        Ok(ValidationArtifacts {
            parameter_names_to_descriptors: parameters,
            output_names_to_descriptors: outputs,
            node_to_consumers: self.node_to_consumers,
            unused_nodes,
        })
    }

    fn validate_nodes(&mut self) -> Result<(), GraphError> {
        for (idx, node) in self.graph.nodes().iter().enumerate() {
            let node_name = node.display_name();
            if node.op_type == PARAMETER && !node.inputs.is_empty() {
                return Err(GraphError::InvalidArity {
                    op_type: PARAMETER.to_string(),
                    expected: "0".to_string(),
                    actual: node.inputs.len(),
                });
            }
            for input in &node.inputs {
                match input {
                    Value::Output { node: producer, port } => {
                        if producer.0 as usize >= idx {
                            return Err(GraphError::InputNotReady {
                                node: idx as u32,
                                input: input.to_string(),
                            });
                        }
                        self.graph.output(*producer, *port as usize)?;
                        self.node_to_consumers
                            .entry(*producer)
                            .or_default()
                            .push(node_name.clone());
                    }
                    Value::Constant(id) => {
                        self.graph.constant(*id)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        Attributes, ConstantId, ElementType, GraphOutput, Node, Shape,
    };

    fn parameter(name: &str) -> Node {
        Node {
            op_type: PARAMETER.to_string(),
            name: Some(name.to_string()),
            inputs: vec![],
            attributes: Attributes::new(),
            outputs: vec![OperandDescriptor::new(ElementType::Float32, [2])],
        }
    }

    fn maximum(inputs: Vec<Value>) -> Node {
        Node {
            op_type: "Maximum".to_string(),
            name: None,
            inputs,
            attributes: Attributes::new(),
            outputs: vec![OperandDescriptor::new(ElementType::Float32, [2])],
        }
    }

    fn output(name: &str, node: u32) -> GraphOutput {
        GraphOutput {
            name: name.to_string(),
            value: Value::output(NodeHandle(node), 0),
        }
    }

    #[test]
    fn test_empty_graph_fails() {
        let graph = Graph::default();
        assert!(matches!(
            GraphValidator::new(&graph).validate(),
            Err(GraphError::NoOutputs)
        ));
    }

    #[test]
    fn test_forward_reference_fails() {
        let graph = Graph {
            nodes: vec![
                maximum(vec![
                    Value::output(NodeHandle(1), 0),
                    Value::output(NodeHandle(1), 0),
                ]),
                parameter("x"),
            ],
            constants: vec![],
            outputs: vec![output("out", 0)],
        };
        assert!(matches!(
            GraphValidator::new(&graph).validate(),
            Err(GraphError::InputNotReady { node: 0, .. })
        ));
    }

    #[test]
    fn test_missing_constant_fails() {
        let graph = Graph {
            nodes: vec![
                parameter("x"),
                maximum(vec![
                    Value::output(NodeHandle(0), 0),
                    Value::Constant(ConstantId(3)),
                ]),
            ],
            constants: vec![],
            outputs: vec![output("out", 1)],
        };
        assert!(matches!(
            GraphValidator::new(&graph).validate(),
            Err(GraphError::OutOfRange {
                what: "constant",
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_parameter_name_fails() {
        let graph = Graph {
            nodes: vec![parameter("x"), parameter("x")],
            constants: vec![],
            outputs: vec![output("out", 0)],
        };
        assert!(matches!(
            GraphValidator::new(&graph).validate(),
            Err(GraphError::DuplicateParameterName { .. })
        ));
    }

    #[test]
    fn test_empty_output_name_fails() {
        let graph = Graph {
            nodes: vec![parameter("x")],
            constants: vec![],
            outputs: vec![output("", 0)],
        };
        assert!(matches!(
            GraphValidator::new(&graph).validate(),
            Err(GraphError::MissingOutputName { index: 0 })
        ));
    }

    #[test]
    fn test_validation_artifacts_created() {
        let graph = Graph {
            nodes: vec![
                parameter("x"),
                parameter("y"),
                maximum(vec![
                    Value::output(NodeHandle(0), 0),
                    Value::output(NodeHandle(0), 0),
                ]),
            ],
            constants: vec![],
            outputs: vec![output("out", 2)],
        };
        let artifacts = GraphValidator::new(&graph).validate().unwrap();
        assert_eq!(artifacts.parameter_names_to_descriptors.len(), 2);
        assert_eq!(
            artifacts.output_names_to_descriptors["out"].shape,
            Shape::from([2])
        );
        assert_eq!(artifacts.node_to_consumers[&NodeHandle(0)].len(), 2);
        assert_eq!(artifacts.unused_nodes, vec![NodeHandle(1)]);
    }
}
