//! Compile-time evaluation of min/max over constants.
//!
//! Integer and boolean elements compare as `i64`, floats as `f64`. When two
//! elements are equal the first operand's element is kept.

use crate::error::GraphError;
use crate::graph::{ConstantValue, Dim, ElementType, Shape};
use crate::shape_inference::{broadcast_shapes, infer_elementwise_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMax {
    Min,
    Max,
}

impl MinMax {
    pub fn elementwise_op(self) -> &'static str {
        match self {
            MinMax::Min => crate::ops::MINIMUM,
            MinMax::Max => crate::ops::MAXIMUM,
        }
    }

    pub fn reduce_op(self) -> &'static str {
        match self {
            MinMax::Min => crate::ops::REDUCE_MIN,
            MinMax::Max => crate::ops::REDUCE_MAX,
        }
    }

    pub fn arg_op(self) -> &'static str {
        match self {
            MinMax::Min => crate::ops::ARG_MIN,
            MinMax::Max => crate::ops::ARG_MAX,
        }
    }

    /// True when `candidate` should replace `current`.
    fn prefers<T: PartialOrd>(self, candidate: T, current: T) -> bool {
        match self {
            MinMax::Min => candidate < current,
            MinMax::Max => candidate > current,
        }
    }
}

/// Element-wise min/max of two constants of the same element type, with broadcasting.
pub fn fold_min_max(
    kind: MinMax,
    lhs: &ConstantValue,
    rhs: &ConstantValue,
) -> Result<ConstantValue, GraphError> {
    let op_type = kind.elementwise_op();
    let element_type = infer_elementwise_type(lhs.element_type(), rhs.element_type())
        .map_err(|err| err.for_op(op_type))?;
    let shape = broadcast_shapes(lhs.shape(), rhs.shape()).map_err(|err| err.for_op(op_type))?;
    let out_dims = static_dims(&shape);
    let lhs_index = broadcast_indices(lhs.shape(), &out_dims);
    let rhs_index = broadcast_indices(rhs.shape(), &out_dims);

    if element_type.is_float() {
        let (a, b) = (lhs.to_f64s(), rhs.to_f64s());
        let values: Vec<f64> = lhs_index
            .iter()
            .zip(&rhs_index)
            .map(|(&i, &j)| pick(kind, a[i], b[j]))
            .collect();
        ConstantValue::from_f64s(element_type, shape, &values)
    } else {
        let (a, b) = (lhs.to_i64s(), rhs.to_i64s());
        let values: Vec<i64> = lhs_index
            .iter()
            .zip(&rhs_index)
            .map(|(&i, &j)| pick(kind, a[i], b[j]))
            .collect();
        ConstantValue::from_i64s(element_type, shape, &values)
    }
}

/// Min/max over every element of a constant, producing a scalar.
pub fn fold_reduce(kind: MinMax, values: &ConstantValue) -> Result<ConstantValue, GraphError> {
    if values.is_empty() {
        return Err(GraphError::shape(
            kind.reduce_op(),
            "cannot reduce an empty constant",
        ));
    }
    let element_type = values.element_type();
    if element_type.is_float() {
        let folded = values
            .to_f64s()
            .into_iter()
            .reduce(|acc, value| pick(kind, acc, value))
            .unwrap_or_default();
        Ok(ConstantValue::scalar_f64(element_type, folded))
    } else {
        let folded = values
            .to_i64s()
            .into_iter()
            .reduce(|acc, value| pick(kind, acc, value))
            .unwrap_or_default();
        Ok(ConstantValue::scalar_i64(element_type, folded))
    }
}

/// Convert a constant to another element type. Floats truncate toward zero when
/// converted to integers; any non-zero value becomes `true`. Integers outside
/// the destination range wrap like an `as` cast, so callers that need range
/// checks must compare the result against the input.
pub fn fold_convert(value: &ConstantValue, to: ElementType) -> Result<ConstantValue, GraphError> {
    let shape = value.shape().clone();
    if to.is_float() {
        ConstantValue::from_f64s(to, shape, &value.to_f64s())
    } else if to == ElementType::Boolean {
        let flags: Vec<i64> = value
            .to_f64s()
            .into_iter()
            .map(|v| (v != 0.0) as i64)
            .collect();
        ConstantValue::from_i64s(to, shape, &flags)
    } else {
        ConstantValue::from_i64s(to, shape, &value.to_i64s())
    }
}

fn pick<T: PartialOrd>(kind: MinMax, first: T, second: T) -> T {
    if kind.prefers(&second, &first) {
        second
    } else {
        first
    }
}

// Constants always carry static shapes.
fn static_dims(shape: &Shape) -> Vec<usize> {
    shape
        .dims()
        .iter()
        .map(|dim| match dim {
            Dim::Static(size) => *size as usize,
            Dim::Dynamic => 0,
        })
        .collect()
}

/// For each flat output index, the flat index of the broadcast operand element.
fn broadcast_indices(operand: &Shape, out_dims: &[usize]) -> Vec<usize> {
    let dims = static_dims(operand);
    let offset = out_dims.len() - dims.len();
    let count = out_dims.iter().product::<usize>();
    (0..count)
        .map(|flat| {
            let mut remaining = flat;
            let mut index = 0;
            let mut stride = 1;
            for axis in (0..out_dims.len()).rev() {
                let coord = remaining % out_dims[axis];
                remaining /= out_dims[axis];
                if axis >= offset {
                    let size = dims[axis - offset];
                    if size != 1 {
                        index += coord * stride;
                    }
                    stride *= size;
                }
            }
            index
        })
        .collect()
}
