//! Shape and element type inference rules shared by the operator schemas.
//!
//! Errors raised here are tagged with the rule name (`"pad"`, `"reduce"`);
//! the builder re-tags them with the operator being added.

use crate::error::GraphError;
use crate::graph::{Dim, ElementType, Shape};

/// Compute the broadcasted shape for two operands following NumPy broadcasting rules
///
/// Broadcasting rules:
/// 1. If shapes have different ranks, prepend 1s to the smaller rank
/// 2. Two dimensions are compatible if they are equal or one of them is 1
/// 3. Output dimension is the non-1 one
///
/// A dynamic dimension paired with a static `n > 1` is assumed to be `n`.
pub fn broadcast_shapes(shape_a: &Shape, shape_b: &Shape) -> Result<Shape, GraphError> {
    let (a, b) = (shape_a.dims(), shape_b.dims());
    let max_rank = a.len().max(b.len());
    let mut result = Vec::with_capacity(max_rank);

    // Iterate from right to left (least significant dimension first)
    for i in 0..max_rank {
        let dim_a = if i < a.len() {
            a[a.len() - 1 - i]
        } else {
            Dim::Static(1)
        };
        let dim_b = if i < b.len() {
            b[b.len() - 1 - i]
        } else {
            Dim::Static(1)
        };

        let merged = match (dim_a, dim_b) {
            (Dim::Static(x), Dim::Static(y)) if x == y || y == 1 => Dim::Static(x),
            (Dim::Static(1), Dim::Static(y)) => Dim::Static(y),
            (Dim::Static(x), Dim::Static(y)) => {
                return Err(GraphError::shape(
                    "broadcast",
                    format!(
                        "incompatible shapes for broadcasting: {} and {} (dimension {} incompatible: {} vs {})",
                        shape_a, shape_b, i, x, y
                    ),
                ));
            }
            (Dim::Dynamic, Dim::Static(n)) | (Dim::Static(n), Dim::Dynamic) if n > 1 => {
                Dim::Static(n)
            }
            _ => Dim::Dynamic,
        };
        result.push(merged);
    }

    // Reverse to get back to original order
    result.reverse();
    Ok(Shape::new(result))
}

/// Resolve a possibly negative axis against `rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> Result<usize, GraphError> {
    let rank_i = rank as i64;
    let normalized = if axis < 0 { axis + rank_i } else { axis };
    if normalized < 0 || normalized >= rank_i {
        return Err(GraphError::attribute(
            "axis",
            "axes",
            format!("axis {} out of range for rank {}", axis, rank),
        ));
    }
    Ok(normalized as usize)
}

fn normalize_axes(axes: &[i64], rank: usize) -> Result<Vec<usize>, GraphError> {
    let mut normalized = Vec::with_capacity(axes.len());
    for &axis in axes {
        let axis = normalize_axis(axis, rank)?;
        if normalized.contains(&axis) {
            return Err(GraphError::attribute(
                "axis",
                "axes",
                format!("duplicate axis {} in {:?}", axis, axes),
            ));
        }
        normalized.push(axis);
    }
    Ok(normalized)
}

/// Infer output shape for pad operation
///
/// `out[i] = in[i] + pads_begin[i] + pads_end[i]`. Negative pads crop.
pub fn infer_pad_shape(
    input_shape: &Shape,
    pads_begin: &[i64],
    pads_end: &[i64],
) -> Result<Shape, GraphError> {
    let rank = input_shape.rank();
    if pads_begin.len() != rank || pads_end.len() != rank {
        return Err(GraphError::shape(
            "pad",
            format!(
                "pads_begin {:?} and pads_end {:?} must both have input rank {}, input shape: {}",
                pads_begin, pads_end, rank, input_shape
            ),
        ));
    }

    let mut output = Vec::with_capacity(rank);
    for (axis, dim) in input_shape.dims().iter().enumerate() {
        let Dim::Static(size) = *dim else {
            output.push(Dim::Dynamic);
            continue;
        };
        let padded = (size as i64)
            .checked_add(pads_begin[axis])
            .and_then(|v| v.checked_add(pads_end[axis]))
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                GraphError::attribute(
                    "pad",
                    "pads",
                    format!(
                        "axis {} of size {} padded by ({}, {}) is out of range",
                        axis, size, pads_begin[axis], pads_end[axis]
                    ),
                )
            })?;
        output.push(Dim::Static(padded));
    }

    Ok(Shape::new(output))
}

/// Options for reduction operations
#[derive(Debug, Clone)]
pub struct ReduceOptions {
    /// Axes to reduce, negative values count from the end. Empty means all axes.
    pub axes: Vec<i64>,
    pub keep_dimensions: bool,
}

/// Infer the output shape for reduction operations
///
/// Each reduced axis is removed, or kept with size 1 when `keep_dimensions` is set.
pub fn infer_reduce_shape(input_shape: &Shape, options: &ReduceOptions) -> Result<Shape, GraphError> {
    let rank = input_shape.rank();
    let axes_to_reduce = if options.axes.is_empty() {
        (0..rank).collect()
    } else {
        normalize_axes(&options.axes, rank).map_err(|err| err.for_op("reduce"))?
    };

    let mut output = Vec::with_capacity(rank);
    for (idx, &dim) in input_shape.dims().iter().enumerate() {
        if axes_to_reduce.contains(&idx) {
            if options.keep_dimensions {
                output.push(Dim::Static(1));
            }
        } else {
            output.push(dim);
        }
    }

    Ok(Shape::new(output))
}

/// Infer output shape for argMax/argMin operations
pub fn infer_arg_reduce_shape(
    input_shape: &Shape,
    axis: i64,
    keep_dimensions: bool,
) -> Result<Shape, GraphError> {
    infer_reduce_shape(
        input_shape,
        &ReduceOptions {
            axes: vec![axis],
            keep_dimensions,
        },
    )
}

/// Both operands of an element-wise min/max must already share a type.
pub fn infer_elementwise_type(lhs: ElementType, rhs: ElementType) -> Result<ElementType, GraphError> {
    if lhs != rhs {
        return Err(GraphError::TypeMismatch {
            op_type: "elementwise".to_string(),
            lhs,
            rhs,
        });
    }
    Ok(lhs)
}

/// Infer output shape for unsqueeze operation (add dimensions of size 1)
///
/// Axes refer to positions in the output and may be negative.
pub fn infer_unsqueeze_shape(input_shape: &Shape, axes: &[i64]) -> Result<Shape, GraphError> {
    let output_rank = input_shape.rank() + axes.len();
    let inserted = normalize_axes(axes, output_rank).map_err(|err| err.for_op("unsqueeze"))?;

    let mut input_dims = input_shape.dims().iter();
    let mut output = Vec::with_capacity(output_rank);
    for out_idx in 0..output_rank {
        if inserted.contains(&out_idx) {
            output.push(Dim::Static(1));
        } else if let Some(&dim) = input_dims.next() {
            output.push(dim);
        }
    }

    Ok(Shape::new(output))
}

/// Infer output shape for concat operation
///
/// Concatenates multiple tensors along a specified axis.
pub fn infer_concat_shape(input_shapes: &[&Shape], axis: i64) -> Result<Shape, GraphError> {
    let Some(first_shape) = input_shapes.first() else {
        return Err(GraphError::shape("concat", "concat requires at least one input"));
    };
    let rank = first_shape.rank();
    let axis = normalize_axis(axis, rank).map_err(|err| err.for_op("concat"))?;

    for (idx, shape) in input_shapes.iter().enumerate() {
        if shape.rank() != rank {
            return Err(GraphError::shape(
                "concat",
                format!(
                    "input {} has rank {} but expected rank {}",
                    idx,
                    shape.rank(),
                    rank
                ),
            ));
        }
    }

    let mut output = first_shape.dims().to_vec();
    for (dim_idx, slot) in output.iter_mut().enumerate() {
        if dim_idx == axis {
            let mut total = Some(0u32);
            for shape in input_shapes {
                total = match (total, shape.dims()[dim_idx]) {
                    (Some(acc), Dim::Static(size)) => acc.checked_add(size),
                    _ => None,
                };
            }
            *slot = total.map_or(Dim::Dynamic, Dim::Static);
            continue;
        }
        for (input_idx, shape) in input_shapes.iter().enumerate() {
            match (*slot, shape.dims()[dim_idx]) {
                (Dim::Static(expected), Dim::Static(actual)) if expected != actual => {
                    return Err(GraphError::shape(
                        "concat",
                        format!(
                            "input {} dimension {} is {} but expected {} (all non-concat dimensions must match)",
                            input_idx, dim_idx, actual, expected
                        ),
                    ));
                }
                (Dim::Dynamic, Dim::Static(actual)) => *slot = Dim::Static(actual),
                _ => {}
            }
        }
    }

    Ok(Shape::new(output))
}
