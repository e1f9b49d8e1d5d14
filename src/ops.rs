use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::GraphError;
use crate::graph::{
    AttributeValue, Attributes, ConstantValue, Dim, ElementType, OperandDescriptor, Shape,
};
use crate::shape_inference::{
    ReduceOptions, broadcast_shapes, infer_arg_reduce_shape, infer_concat_shape,
    infer_elementwise_type, infer_pad_shape, infer_reduce_shape, infer_unsqueeze_shape,
};

pub const PARAMETER: &str = "Parameter";
pub const PAD: &str = "Pad";
pub const REDUCE_MIN: &str = "ReduceMin";
pub const REDUCE_MAX: &str = "ReduceMax";
pub const ARG_MIN: &str = "ArgMin";
pub const ARG_MAX: &str = "ArgMax";
pub const MINIMUM: &str = "Minimum";
pub const MAXIMUM: &str = "Maximum";
pub const CONVERT: &str = "Convert";
pub const CONCAT: &str = "Concat";
pub const UNSQUEEZE: &str = "Unsqueeze";

/// What an inference function sees of one input.
#[derive(Debug, Clone)]
pub struct InferenceInput<'a> {
    pub descriptor: OperandDescriptor,
    /// Set when the input is a constant, so pads and axes can be read.
    pub constant: Option<&'a ConstantValue>,
}

pub type InferFn =
    fn(&[InferenceInput<'_>], &Attributes) -> Result<Vec<OperandDescriptor>, GraphError>;

#[derive(Clone, Copy)]
pub struct OpSchema {
    pub op_type: &'static str,
    pub min_inputs: usize,
    pub max_inputs: usize,
    pub infer: InferFn,
}

impl OpSchema {
    pub fn check_arity(&self, actual: usize) -> Result<(), GraphError> {
        if actual < self.min_inputs || actual > self.max_inputs {
            let expected = if self.max_inputs == usize::MAX {
                format!("at least {}", self.min_inputs)
            } else if self.min_inputs == self.max_inputs {
                self.min_inputs.to_string()
            } else {
                format!("{} to {}", self.min_inputs, self.max_inputs)
            };
            return Err(GraphError::InvalidArity {
                op_type: self.op_type.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for OpSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpSchema")
            .field("op_type", &self.op_type)
            .field("min_inputs", &self.min_inputs)
            .field("max_inputs", &self.max_inputs)
            .finish()
    }
}

pub struct OpRegistry {
    schemas: HashMap<&'static str, OpSchema>,
}

impl OpRegistry {
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(OpSchema {
            op_type: PARAMETER,
            min_inputs: 0,
            max_inputs: 0,
            infer: infer_parameter,
        });
        registry.register(OpSchema {
            op_type: PAD,
            min_inputs: 3,
            max_inputs: 4,
            infer: infer_pad,
        });
        for op_type in [REDUCE_MIN, REDUCE_MAX] {
            registry.register(OpSchema {
                op_type,
                min_inputs: 2,
                max_inputs: 2,
                infer: infer_reduce,
            });
        }
        for op_type in [ARG_MIN, ARG_MAX] {
            registry.register(OpSchema {
                op_type,
                min_inputs: 1,
                max_inputs: 1,
                infer: infer_arg_reduce,
            });
        }
        for op_type in [MINIMUM, MAXIMUM] {
            registry.register(OpSchema {
                op_type,
                min_inputs: 2,
                max_inputs: 2,
                infer: infer_binary_elementwise,
            });
        }
        registry.register(OpSchema {
            op_type: CONVERT,
            min_inputs: 1,
            max_inputs: 1,
            infer: infer_convert,
        });
        registry.register(OpSchema {
            op_type: CONCAT,
            min_inputs: 1,
            max_inputs: usize::MAX,
            infer: infer_concat,
        });
        registry.register(OpSchema {
            op_type: UNSQUEEZE,
            min_inputs: 2,
            max_inputs: 2,
            infer: infer_unsqueeze,
        });
        registry
    }

    /// Process-wide registry with the default operator set.
    pub fn global() -> &'static OpRegistry {
        static REGISTRY: OnceLock<OpRegistry> = OnceLock::new();
        REGISTRY.get_or_init(OpRegistry::with_defaults)
    }

    pub fn register(&mut self, schema: OpSchema) {
        self.schemas.insert(schema.op_type, schema);
    }

    pub fn available_ops(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.schemas.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn get(&self, op_type: &str) -> Result<&OpSchema, GraphError> {
        self.schemas
            .get(op_type)
            .ok_or_else(|| GraphError::UnknownOperator {
                op_type: op_type.to_string(),
            })
    }
}

/// Padding modes accepted by `Pad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    Constant,
    Edge,
    Reflect,
    Symmetric,
}

impl PadMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "constant" => Some(PadMode::Constant),
            "edge" => Some(PadMode::Edge),
            "reflect" => Some(PadMode::Reflect),
            "symmetric" => Some(PadMode::Symmetric),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PadMode::Constant => "constant",
            PadMode::Edge => "edge",
            PadMode::Reflect => "reflect",
            PadMode::Symmetric => "symmetric",
        }
    }
}

pub(crate) fn attr_bool(
    attributes: &Attributes,
    op_type: &str,
    name: &str,
    default: bool,
) -> Result<bool, GraphError> {
    match attributes.get(name) {
        None => Ok(default),
        Some(AttributeValue::Bool(value)) => Ok(*value),
        Some(AttributeValue::Int(value)) => Ok(*value != 0),
        Some(other) => Err(GraphError::attribute(
            op_type,
            name,
            format!("expected a boolean, got {:?}", other),
        )),
    }
}

pub(crate) fn attr_int(
    attributes: &Attributes,
    op_type: &str,
    name: &str,
) -> Result<Option<i64>, GraphError> {
    match attributes.get(name) {
        None => Ok(None),
        Some(AttributeValue::Int(value)) => Ok(Some(*value)),
        Some(other) => Err(GraphError::attribute(
            op_type,
            name,
            format!("expected an integer, got {:?}", other),
        )),
    }
}

fn attr_element_type(
    attributes: &Attributes,
    op_type: &str,
    name: &str,
) -> Result<Option<ElementType>, GraphError> {
    match attributes.get(name) {
        None => Ok(None),
        Some(AttributeValue::ElementType(element_type)) => Ok(Some(*element_type)),
        Some(AttributeValue::String(text)) => ElementType::from_name(text).map(Some).ok_or_else(
            || GraphError::attribute(op_type, name, format!("unknown element type `{}`", text)),
        ),
        Some(other) => Err(GraphError::attribute(
            op_type,
            name,
            format!("expected an element type, got {:?}", other),
        )),
    }
}

/// Read an integer scalar or 1-D constant input.
fn constant_ints(
    input: &InferenceInput<'_>,
    op_type: &str,
    name: &str,
) -> Result<Option<Vec<i64>>, GraphError> {
    if !input.descriptor.element_type.is_integer() {
        return Err(GraphError::attribute(
            op_type,
            name,
            format!(
                "must be an integer tensor, got {}",
                input.descriptor.element_type
            ),
        ));
    }
    if input.descriptor.shape.rank() > 1 {
        return Err(GraphError::shape(
            op_type,
            format!("{} must be a scalar or 1-D, got {}", name, input.descriptor.shape),
        ));
    }
    Ok(input.constant.map(ConstantValue::to_i64s))
}

fn infer_parameter(
    _inputs: &[InferenceInput<'_>],
    attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let element_type = attr_element_type(attributes, PARAMETER, "element_type")?
        .ok_or_else(|| GraphError::attribute(PARAMETER, "element_type", "missing"))?;
    let dims = match attributes.get("shape") {
        None => Vec::new(),
        Some(AttributeValue::Ints(dims)) => dims
            .iter()
            .map(|&dim| match dim {
                -1 => Ok(Dim::Dynamic),
                dim if (0..=u32::MAX as i64).contains(&dim) => Ok(Dim::Static(dim as u32)),
                _ => Err(GraphError::attribute(
                    PARAMETER,
                    "shape",
                    format!("dimension {} is neither a size nor -1", dim),
                )),
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(GraphError::attribute(
                PARAMETER,
                "shape",
                format!("expected a list of integers, got {:?}", other),
            ));
        }
    };
    Ok(vec![OperandDescriptor::new(element_type, Shape::new(dims))])
}

fn infer_pad(
    inputs: &[InferenceInput<'_>],
    attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let data = &inputs[0].descriptor;
    let mode = match attributes.get("mode") {
        None => PadMode::Constant,
        Some(AttributeValue::String(mode)) => PadMode::parse(mode).ok_or_else(|| {
            GraphError::attribute(
                PAD,
                "mode",
                format!(
                    "`{}` is not one of constant, edge, reflect, symmetric",
                    mode
                ),
            )
        })?,
        Some(other) => {
            return Err(GraphError::attribute(
                PAD,
                "mode",
                format!("expected a string, got {:?}", other),
            ));
        }
    };

    let pads_begin = constant_ints(&inputs[1], PAD, "pads_begin")?;
    let pads_end = constant_ints(&inputs[2], PAD, "pads_end")?;

    if let Some(pad_value) = inputs.get(3) {
        if mode != PadMode::Constant {
            return Err(GraphError::attribute(
                PAD,
                "pad_value",
                format!("only allowed in constant mode, mode is {}", mode.as_str()),
            ));
        }
        if pad_value.descriptor.element_type != data.element_type {
            return Err(GraphError::TypeMismatch {
                op_type: PAD.to_string(),
                lhs: data.element_type,
                rhs: pad_value.descriptor.element_type,
            });
        }
        if pad_value.descriptor.shape.rank() != 0 {
            return Err(GraphError::shape(
                PAD,
                format!("pad_value must be a scalar, got {}", pad_value.descriptor.shape),
            ));
        }
    }

    let shape = match (pads_begin, pads_end) {
        (Some(begin), Some(end)) => infer_pad_shape(&data.shape, &begin, &end)?,
        _ => {
            // Pads only known at run time: rank is still checked where possible.
            let rank = data.shape.rank();
            for (name, input) in [("pads_begin", &inputs[1]), ("pads_end", &inputs[2])] {
                if let Some(&Dim::Static(len)) = input.descriptor.shape.dims().first()
                    && len as usize != rank
                {
                    return Err(GraphError::shape(
                        PAD,
                        format!("{} has {} entries but input rank is {}", name, len, rank),
                    ));
                }
            }
            Shape::dynamic(rank)
        }
    };
    Ok(vec![OperandDescriptor::new(data.element_type, shape)])
}

fn infer_reduce(
    inputs: &[InferenceInput<'_>],
    attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let data = &inputs[0].descriptor;
    let keep_dimensions = attr_bool(attributes, "reduce", "keep_dims", false)?;
    let axes = constant_ints(&inputs[1], "reduce", "axes")?
        .ok_or_else(|| GraphError::attribute("reduce", "axes", "must be a constant"))?;
    let shape = infer_reduce_shape(
        &data.shape,
        &ReduceOptions {
            axes,
            keep_dimensions,
        },
    )?;
    Ok(vec![OperandDescriptor::new(data.element_type, shape)])
}

fn infer_arg_reduce(
    inputs: &[InferenceInput<'_>],
    attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let data = &inputs[0].descriptor;
    let axis = attr_int(attributes, "arg_reduce", "axis")?
        .ok_or_else(|| GraphError::attribute("arg_reduce", "axis", "missing"))?;
    let keep_dimensions = attr_bool(attributes, "arg_reduce", "keep_dims", false)?;
    let output_type =
        attr_element_type(attributes, "arg_reduce", "output_type")?.unwrap_or(ElementType::Int64);
    if !matches!(output_type, ElementType::Int32 | ElementType::Int64) {
        return Err(GraphError::attribute(
            "arg_reduce",
            "output_type",
            format!("indices must be i32 or i64, got {}", output_type),
        ));
    }
    let shape = infer_arg_reduce_shape(&data.shape, axis, keep_dimensions)?;
    Ok(vec![OperandDescriptor::new(output_type, shape)])
}

fn infer_binary_elementwise(
    inputs: &[InferenceInput<'_>],
    _attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let (lhs, rhs) = (&inputs[0].descriptor, &inputs[1].descriptor);
    let element_type = infer_elementwise_type(lhs.element_type, rhs.element_type)?;
    let shape = broadcast_shapes(&lhs.shape, &rhs.shape)?;
    Ok(vec![OperandDescriptor::new(element_type, shape)])
}

fn infer_convert(
    inputs: &[InferenceInput<'_>],
    attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let destination = attr_element_type(attributes, CONVERT, "destination_type")?
        .ok_or_else(|| GraphError::attribute(CONVERT, "destination_type", "missing"))?;
    // Cast is element-wise: output shape = input shape
    Ok(vec![OperandDescriptor::new(
        destination,
        inputs[0].descriptor.shape.clone(),
    )])
}

fn infer_concat(
    inputs: &[InferenceInput<'_>],
    attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let axis = attr_int(attributes, CONCAT, "axis")?.unwrap_or(0);
    let element_type = inputs[0].descriptor.element_type;
    for input in &inputs[1..] {
        infer_elementwise_type(element_type, input.descriptor.element_type)?;
    }
    let shapes: Vec<&Shape> = inputs.iter().map(|input| &input.descriptor.shape).collect();
    let shape = infer_concat_shape(&shapes, axis)?;
    Ok(vec![OperandDescriptor::new(element_type, shape)])
}

fn infer_unsqueeze(
    inputs: &[InferenceInput<'_>],
    _attributes: &Attributes,
) -> Result<Vec<OperandDescriptor>, GraphError> {
    let data = &inputs[0].descriptor;
    let axes = constant_ints(&inputs[1], UNSQUEEZE, "axes")?
        .ok_or_else(|| GraphError::attribute(UNSQUEEZE, "axes", "must be a constant"))?;
    let shape = infer_unsqueeze_shape(&data.shape, &axes)?;
    Ok(vec![OperandDescriptor::new(data.element_type, shape)])
}
