use super::{Argument, CallRecord, OpTranslator, expect_bool, expect_int, reconcile, value_of};
use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::folding::MinMax;
use crate::graph::{AttributeValue, Attributes, ConstantValue, ElementType, Value};

/// The overloads of `aten::min` / `aten::max`.
#[derive(Debug, Clone, PartialEq)]
pub enum MinMaxCall<'a> {
    /// `min(input)`: reduce over every axis to a scalar.
    Reduce { input: &'a Argument },
    /// `min(input, dim, keepdim=False)`: values and indices along one axis.
    ReduceDim {
        input: &'a Argument,
        axis: i64,
        keep_dims: bool,
    },
    /// `min(input, other)`.
    Elementwise {
        lhs: &'a Argument,
        rhs: &'a Argument,
    },
}

impl<'a> MinMaxCall<'a> {
    /// Pick the overload from argument count and kinds alone.
    pub fn resolve(call: &'a CallRecord) -> Result<Self, GraphError> {
        let op = call.op.as_str();
        let unsupported = || GraphError::call_shape(op, call.signature());

        let input = match call.arg(0, "input") {
            Some(arg @ Argument::Tensor { .. }) => arg,
            _ => return Err(unsupported()),
        };
        if call.args.len() > 3 {
            return Err(unsupported());
        }
        let keepdim = call.arg(2, "keepdim");

        match (call.arg(1, "dim"), call.arg(1, "other")) {
            (Some(dim @ Argument::Int(_)), _) => {
                let axis = expect_int(dim, op, "dim")?;
                let keep_dims = keepdim
                    .map(|arg| expect_bool(arg, op, "keepdim"))
                    .transpose()?
                    .unwrap_or(false);
                Ok(MinMaxCall::ReduceDim {
                    input,
                    axis,
                    keep_dims,
                })
            }
            (_, Some(other @ Argument::Tensor { .. })) if keepdim.is_none() => {
                Ok(MinMaxCall::Elementwise { lhs: input, rhs: other })
            }
            (None, None) if keepdim.is_none() => Ok(MinMaxCall::Reduce { input }),
            _ => Err(unsupported()),
        }
    }
}

/// Translator for `aten::min` or `aten::max`, depending on `kind`.
pub struct MinMaxTranslator {
    kind: MinMax,
}

impl MinMaxTranslator {
    pub fn new(kind: MinMax) -> Self {
        Self { kind }
    }
}

impl OpTranslator for MinMaxTranslator {
    fn op_name(&self) -> &'static str {
        match self.kind {
            MinMax::Min => "aten::min",
            MinMax::Max => "aten::max",
        }
    }

    fn translate(
        &self,
        call: &CallRecord,
        builder: &mut GraphBuilder<'_>,
    ) -> Result<Vec<Value>, GraphError> {
        let op = self.op_name();
        match MinMaxCall::resolve(call)? {
            MinMaxCall::Reduce { input } => {
                let input = value_of(builder, input, op)?;
                let rank = builder.descriptor(&input)?.shape.rank() as i64;
                let axes: Vec<i64> = (0..rank).collect();
                let axes = builder.constant(ConstantValue::i64_vector(&axes));
                let node = builder.add_node(
                    self.kind.reduce_op(),
                    vec![input, axes],
                    keep_dims_attributes(false),
                )?;
                Ok(vec![node.into()])
            }
            MinMaxCall::ReduceDim {
                input,
                axis,
                keep_dims,
            } => {
                let input = value_of(builder, input, op)?;
                let axes = builder.constant(ConstantValue::i64_vector(&[axis]));
                let values = builder.add_node(
                    self.kind.reduce_op(),
                    vec![input, axes],
                    keep_dims_attributes(keep_dims),
                )?;

                let mut attributes = keep_dims_attributes(keep_dims);
                attributes.insert("axis".to_string(), AttributeValue::Int(axis));
                attributes.insert(
                    "output_type".to_string(),
                    AttributeValue::ElementType(ElementType::Int64),
                );
                let indices = builder.add_node(self.kind.arg_op(), vec![input], attributes)?;
                Ok(vec![values.into(), indices.into()])
            }
            MinMaxCall::Elementwise { lhs, rhs } => {
                let lhs = value_of(builder, lhs, op)?;
                let rhs = value_of(builder, rhs, op)?;
                let (lhs, rhs, _) = reconcile(builder, lhs, rhs)?;
                let node =
                    builder.add_node(self.kind.elementwise_op(), vec![lhs, rhs], Attributes::new())?;
                Ok(vec![node.into()])
            }
        }
    }
}

fn keep_dims_attributes(keep_dims: bool) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("keep_dims".to_string(), AttributeValue::Bool(keep_dims));
    attributes
}
