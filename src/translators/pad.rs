use super::{Argument, CallRecord, OpTranslator, cast, expect_int, value_of};
use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::graph::{AttributeValue, Attributes, ConstantValue, ElementType, Value};
use crate::ops::{PAD, PadMode};

/// `Pad(input, pads_begin, pads_end, mode[, pad_value])`.
///
/// Pads given as integer lists become int64 constants; tensor pads are passed
/// through and leave the output shape dynamic.
pub struct PadTranslator;

impl OpTranslator for PadTranslator {
    fn op_name(&self) -> &'static str {
        PAD
    }

    fn translate(
        &self,
        call: &CallRecord,
        builder: &mut GraphBuilder<'_>,
    ) -> Result<Vec<Value>, GraphError> {
        let data = match call.arg(0, "input") {
            Some(arg @ Argument::Tensor { .. }) => value_of(builder, arg, PAD)?,
            _ => return Err(GraphError::call_shape(PAD, call.signature())),
        };
        let mode = match call.arg(3, "mode") {
            None => PadMode::Constant.as_str().to_string(),
            Some(Argument::Str(mode)) => {
                if PadMode::parse(mode).is_none() {
                    return Err(GraphError::attribute(
                        PAD,
                        "mode",
                        format!(
                            "`{}` is not one of constant, edge, reflect, symmetric",
                            mode
                        ),
                    ));
                }
                mode.clone()
            }
            Some(other) => {
                return Err(GraphError::attribute(
                    PAD,
                    "mode",
                    format!("expected a str, got {}", other.kind()),
                ));
            }
        };

        let pads_begin = pads(builder, call, 1, "pads_begin")?;
        let pads_end = pads(builder, call, 2, "pads_end")?;
        let mut inputs = vec![data, pads_begin, pads_end];
        if let Some(pad_value) = call.arg(4, "pad_value") {
            let value = value_of(builder, pad_value, PAD)?;
            let element_type = builder.descriptor(&data)?.element_type;
            let converted = cast(builder, value, element_type)?;
            if element_type.is_integer() {
                check_pad_value_range(builder, &value, &converted, element_type)?;
            }
            inputs.push(converted);
        }

        let mut attributes = Attributes::new();
        attributes.insert("mode".to_string(), AttributeValue::String(mode));
        let node = builder.add_node(PAD, inputs, attributes)?;
        Ok(vec![node.into()])
    }
}

/// Reject literal pad values that would wrap when narrowed to the data type.
fn check_pad_value_range(
    builder: &GraphBuilder<'_>,
    original: &Value,
    converted: &Value,
    element_type: ElementType,
) -> Result<(), GraphError> {
    let graph = builder.graph();
    let (Some(original), Some(converted)) =
        (graph.constant_value(original), graph.constant_value(converted))
    else {
        return Ok(());
    };
    let expected = original.to_f64s().into_iter().map(f64::trunc);
    let actual = converted.to_f64s();
    if let Some((value, _)) = expected.zip(actual).find(|(want, got)| want != got) {
        return Err(GraphError::attribute(
            PAD,
            "pad_value",
            format!("{} does not fit in {}", value, element_type),
        ));
    }
    Ok(())
}

fn pads(
    builder: &mut GraphBuilder<'_>,
    call: &CallRecord,
    index: usize,
    name: &str,
) -> Result<Value, GraphError> {
    match call.arg(index, name) {
        Some(Argument::List(items)) => {
            let values = items
                .iter()
                .map(|item| expect_int(item, PAD, name))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(builder.constant(ConstantValue::i64_vector(&values)))
        }
        Some(arg @ Argument::Tensor { .. }) => value_of(builder, arg, PAD),
        Some(other) => Err(GraphError::attribute(
            PAD,
            name,
            format!("expected a list of ints, got {}", other.kind()),
        )),
        None => Err(GraphError::call_shape(
            PAD,
            format!("{} without {}", call.signature(), name),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeHandle, Shape};

    fn pad_call(input: NodeHandle, begin: &[i64], end: &[i64], mode: &str) -> CallRecord {
        CallRecord::new(
            "Pad",
            vec![
                Argument::tensor(input),
                Argument::ints(begin),
                Argument::ints(end),
                Argument::Str(mode.to_string()),
            ],
        )
    }

    #[test]
    fn test_pad_shapes_for_all_modes() {
        let cases = [
            ([0, 1], [2, 3], [5, 8]),
            ([-1, -1], [-1, -1], [1, 2]),
            ([2, -1], [-1, 3], [4, 6]),
        ];
        for mode in ["constant", "edge", "reflect", "symmetric"] {
            for (begin, end, expected) in cases {
                let mut builder = GraphBuilder::new();
                let input = builder
                    .parameter("input", ElementType::Int32, [3, 4])
                    .unwrap();
                let outputs = PadTranslator
                    .translate(&pad_call(input, &begin, &end, mode), &mut builder)
                    .unwrap();
                assert_eq!(outputs.len(), 1);

                let node = outputs[0].node().unwrap();
                let graph = builder.graph();
                assert_eq!(graph.type_name(node).unwrap(), "Pad");
                assert_eq!(graph.output_count(node).unwrap(), 1);
                let output = graph.output(node, 0).unwrap();
                assert_eq!(output.shape, Shape::from(expected), "{} {:?}", mode, begin);
                assert_eq!(output.element_type, ElementType::Int32);
                assert_eq!(
                    graph.node(node).unwrap().attributes["mode"],
                    AttributeValue::String(mode.to_string())
                );
            }
        }
    }

    #[test]
    fn test_mode_as_keyword() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Float32, [3, 4])
            .unwrap();
        let call = CallRecord::new(
            "Pad",
            vec![
                Argument::tensor(input),
                Argument::ints(&[1, 1]),
                Argument::ints(&[1, 1]),
            ],
        )
        .with_kwarg("mode", Argument::Str("reflect".to_string()));
        let outputs = PadTranslator.translate(&call, &mut builder).unwrap();
        let node = builder.graph().node(outputs[0].node().unwrap()).unwrap();
        assert_eq!(
            node.attributes["mode"],
            AttributeValue::String("reflect".to_string())
        );
    }

    #[test]
    fn test_invalid_mode() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let err = PadTranslator
            .translate(&pad_call(input, &[0, 1], &[2, 3], "circular"), &mut builder)
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidAttribute { ref attribute, .. } if attribute == "mode"
        ));
        assert_eq!(builder.graph().nodes().len(), 1);
        assert!(builder.graph().constants().is_empty());
    }

    #[test]
    fn test_pad_value_literal_is_cast_to_input_type() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let mut call = pad_call(input, &[1, 1], &[1, 1], "constant");
        call.args.push(Argument::Float(2.0));
        let outputs = PadTranslator.translate(&call, &mut builder).unwrap();

        let graph = builder.graph();
        let node = graph.node(outputs[0].node().unwrap()).unwrap();
        assert_eq!(node.inputs.len(), 4);
        let pad_value = graph.constant_value(&node.inputs[3]).unwrap();
        assert_eq!(pad_value.element_type(), ElementType::Int32);
        assert_eq!(pad_value.to_i64s(), vec![2]);
        // The cast folded, so only the parameter and the pad exist.
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn test_pad_value_out_of_range_for_input_type() {
        for literal in [-1, 256, 300] {
            let mut builder = GraphBuilder::new();
            let input = builder
                .parameter("input", ElementType::Uint8, [3, 4])
                .unwrap();
            let mut call = pad_call(input, &[1, 1], &[1, 1], "constant");
            call.args.push(Argument::Int(literal));
            let err = PadTranslator.translate(&call, &mut builder).unwrap_err();
            assert!(
                matches!(
                    err,
                    GraphError::InvalidAttribute { ref attribute, .. } if attribute == "pad_value"
                ),
                "{}",
                literal
            );
        }

        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Uint8, [3, 4])
            .unwrap();
        let mut call = pad_call(input, &[1, 1], &[1, 1], "constant");
        call.args.push(Argument::Int(255));
        let outputs = PadTranslator.translate(&call, &mut builder).unwrap();
        let graph = builder.graph();
        let node = graph.node(outputs[0].node().unwrap()).unwrap();
        assert_eq!(graph.constant_value(&node.inputs[3]).unwrap().to_i64s(), vec![255]);
    }

    #[test]
    fn test_huge_pads_are_rejected() {
        let mut builder = GraphBuilder::new();
        let input = builder.parameter("input", ElementType::Int32, [3]).unwrap();
        let err = PadTranslator
            .translate(
                &pad_call(input, &[i64::MAX], &[i64::MAX], "constant"),
                &mut builder,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidAttribute { ref op_type, ref attribute, .. }
                if op_type == "Pad" && attribute == "pads"
        ));
    }

    #[test]
    fn test_pad_value_outside_constant_mode() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let mut call = pad_call(input, &[1, 1], &[1, 1], "edge");
        call.args.push(Argument::Int(0));
        let err = PadTranslator.translate(&call, &mut builder).unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidAttribute { ref attribute, .. } if attribute == "pad_value"
        ));
    }

    #[test]
    fn test_pads_rank_mismatch() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let err = PadTranslator
            .translate(&pad_call(input, &[1], &[1, 1], "constant"), &mut builder)
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::ShapeMismatch { ref op_type, .. } if op_type == "Pad"
        ));
    }

    #[test]
    fn test_missing_pads() {
        let mut builder = GraphBuilder::new();
        let input = builder
            .parameter("input", ElementType::Int32, [3, 4])
            .unwrap();
        let call = CallRecord::new("Pad", vec![Argument::tensor(input)]);
        let err = PadTranslator.translate(&call, &mut builder).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedCallShape { .. }));
    }

    #[test]
    fn test_translation_is_repeatable() {
        let build = || {
            let mut builder = GraphBuilder::new();
            let input = builder
                .parameter("input", ElementType::Int32, [3, 4])
                .unwrap();
            PadTranslator
                .translate(&pad_call(input, &[0, 1], &[2, 3], "symmetric"), &mut builder)
                .unwrap();
            builder.graph().clone()
        };
        assert_eq!(build(), build());
    }
}
