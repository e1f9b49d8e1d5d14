use super::{Argument, CallRecord, OpTranslator, cast, promote_types, reconcile, value_of};
use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::folding::{MinMax, fold_min_max, fold_reduce};
use crate::graph::{AttributeValue, Attributes, ConstantValue, Shape, Value};
use crate::ops::{CONCAT, UNSQUEEZE};

/// The call shapes accepted by `prim::min` / `prim::max`.
#[derive(Debug, Clone, PartialEq)]
pub enum VariadicCall<'a> {
    /// `max(a, b)`
    Pair(&'a Argument, &'a Argument),
    /// `max([a0, a1], [b0, b1])`, compared index by index.
    PairOfLists(&'a [Argument], &'a [Argument]),
    /// `max([a, b, c])`
    List(&'a [Argument]),
    /// `max(a)`
    Single(&'a Argument),
}

impl<'a> VariadicCall<'a> {
    pub fn resolve(call: &'a CallRecord) -> Result<Self, GraphError> {
        let unsupported = || GraphError::call_shape(&call.op, call.signature());
        if !call.kwargs.is_empty() {
            return Err(unsupported());
        }
        match call.args.as_slice() {
            [Argument::List(items)] if !items.is_empty() => Ok(VariadicCall::List(items)),
            [single] if is_scalar_kind(single) => Ok(VariadicCall::Single(single)),
            [Argument::List(lhs), Argument::List(rhs)] => Ok(VariadicCall::PairOfLists(lhs, rhs)),
            [lhs, rhs] if is_scalar_kind(lhs) && is_scalar_kind(rhs) => {
                Ok(VariadicCall::Pair(lhs, rhs))
            }
            _ => Err(unsupported()),
        }
    }
}

fn is_scalar_kind(argument: &Argument) -> bool {
    matches!(
        argument,
        Argument::Tensor { .. } | Argument::Int(_) | Argument::Float(_) | Argument::Bool(_)
    )
}

/// Translator for `prim::min` or `prim::max`.
///
/// Operands are scalars. When every operand is a constant the result is
/// folded and no node is emitted.
pub struct VariadicMinMaxTranslator {
    kind: MinMax,
}

impl VariadicMinMaxTranslator {
    pub fn new(kind: MinMax) -> Self {
        Self { kind }
    }

    fn combine(
        &self,
        builder: &mut GraphBuilder<'_>,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, GraphError> {
        let (lhs, rhs, _) = reconcile(builder, lhs, rhs)?;
        let graph = builder.graph();
        if let (Some(a), Some(b)) = (graph.constant_value(&lhs), graph.constant_value(&rhs)) {
            let folded = fold_min_max(self.kind, a, b)?;
            log::debug!("{} folded to a constant", self.op_name());
            return Ok(builder.constant(folded));
        }
        let node = builder.add_node(self.kind.elementwise_op(), vec![lhs, rhs], Attributes::new())?;
        Ok(node.into())
    }

    fn reduce(&self, builder: &mut GraphBuilder<'_>, packed: Value) -> Result<Value, GraphError> {
        if let Some(constant) = builder.graph().constant_value(&packed) {
            let folded = fold_reduce(self.kind, constant)?;
            log::debug!("{} folded to a constant", self.op_name());
            return Ok(builder.constant(folded));
        }
        let axes = builder.constant(ConstantValue::i64_vector(&[0]));
        let mut attributes = Attributes::new();
        attributes.insert("keep_dims".to_string(), AttributeValue::Bool(false));
        Ok(builder
            .add_node(self.kind.reduce_op(), vec![packed, axes], attributes)?
            .into())
    }
}

impl OpTranslator for VariadicMinMaxTranslator {
    fn op_name(&self) -> &'static str {
        match self.kind {
            MinMax::Min => "prim::min",
            MinMax::Max => "prim::max",
        }
    }

    fn translate(
        &self,
        call: &CallRecord,
        builder: &mut GraphBuilder<'_>,
    ) -> Result<Vec<Value>, GraphError> {
        let op = self.op_name();
        let result = match VariadicCall::resolve(call)? {
            VariadicCall::Single(value) => scalar_operand(builder, value, op)?,
            VariadicCall::Pair(lhs, rhs) => {
                let lhs = scalar_operand(builder, lhs, op)?;
                let rhs = scalar_operand(builder, rhs, op)?;
                self.combine(builder, lhs, rhs)?
            }
            VariadicCall::PairOfLists(lhs, rhs) => {
                if lhs.len() != rhs.len() {
                    return Err(GraphError::shape(
                        op,
                        format!("lists have {} and {} items", lhs.len(), rhs.len()),
                    ));
                }
                if lhs.is_empty() {
                    return Err(GraphError::call_shape(op, call.signature()));
                }
                let lhs = pack(builder, lhs, op)?;
                let rhs = pack(builder, rhs, op)?;
                self.combine(builder, lhs, rhs)?
            }
            VariadicCall::List(items) => {
                let packed = pack(builder, items, op)?;
                self.reduce(builder, packed)?
            }
        };
        Ok(vec![result])
    }
}

/// Materialize `argument` and require it to be rank 0.
fn scalar_operand(
    builder: &mut GraphBuilder<'_>,
    argument: &Argument,
    op: &str,
) -> Result<Value, GraphError> {
    if !is_scalar_kind(argument) {
        return Err(GraphError::call_shape(
            op,
            format!("a {} where a scalar is expected", argument.kind()),
        ));
    }
    let value = value_of(builder, argument, op)?;
    let shape = builder.descriptor(&value)?.shape;
    if shape.rank() != 0 {
        return Err(GraphError::call_shape(
            op,
            format!("a tensor of shape {} where a scalar is expected", shape),
        ));
    }
    Ok(value)
}

/// Pack scalars into a 1-D tensor of their promoted type.
///
/// All-constant lists become a single constant; otherwise each item is
/// unsqueezed to `[1]` and the pieces are concatenated on axis 0.
fn pack(builder: &mut GraphBuilder<'_>, items: &[Argument], op: &str) -> Result<Value, GraphError> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        values.push(scalar_operand(builder, item, op)?);
    }
    let mut element_type = builder.descriptor(&values[0])?.element_type;
    for value in &values[1..] {
        element_type = promote_types(element_type, builder.descriptor(value)?.element_type);
    }
    let mut promoted = Vec::with_capacity(values.len());
    for value in values {
        promoted.push(cast(builder, value, element_type)?);
    }

    let folded = {
        let graph = builder.graph();
        let constants: Option<Vec<&ConstantValue>> = promoted
            .iter()
            .map(|value| graph.constant_value(value))
            .collect();
        match constants {
            Some(constants) => {
                let data: Vec<u8> = constants
                    .iter()
                    .flat_map(|constant| constant.data().iter().copied())
                    .collect();
                Some(ConstantValue::new(
                    element_type,
                    Shape::from_static(&[constants.len() as u32]),
                    data,
                )?)
            }
            None => None,
        }
    };
    if let Some(packed) = folded {
        return Ok(builder.constant(packed));
    }

    let mut pieces = Vec::with_capacity(promoted.len());
    for value in promoted {
        let piece = match builder.graph().constant_value(&value) {
            Some(constant) => {
                let reshaped =
                    ConstantValue::new(element_type, Shape::from([1]), constant.data().to_vec())?;
                builder.constant(reshaped)
            }
            None => {
                let axes = builder.constant(ConstantValue::i64_vector(&[0]));
                builder
                    .add_node(UNSQUEEZE, vec![value, axes], Attributes::new())?
                    .into()
            }
        };
        pieces.push(piece);
    }
    let mut attributes = Attributes::new();
    attributes.insert("axis".to_string(), AttributeValue::Int(0));
    Ok(builder.add_node(CONCAT, pieces, attributes)?.into())
}
