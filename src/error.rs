use std::path::PathBuf;

use serde_json::Error as JsonError;
use thiserror::Error;

use crate::graph::{ElementType, Shape};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("model script {path} could not be read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model script JSON could not be parsed: {source}")]
    Parse {
        #[from]
        source: JsonError,
    },
    #[error("operator `{op_type}` is not registered")]
    UnknownOperator { op_type: String },
    #[error("operator `{op_type}` expects {expected} inputs, got {actual}")]
    InvalidArity {
        op_type: String,
        expected: String,
        actual: usize,
    },
    #[error("`{op_type}`: {reason}")]
    ShapeMismatch { op_type: String, reason: String },
    #[error("`{op_type}`: invalid attribute `{attribute}`: {reason}")]
    InvalidAttribute {
        op_type: String,
        attribute: String,
        reason: String,
    },
    #[error("`{op_type}`: element types {lhs:?} and {rhs:?} do not match")]
    TypeMismatch {
        op_type: String,
        lhs: ElementType,
        rhs: ElementType,
    },
    #[error("{what} {index} is out of range (count {count})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },
    #[error("`{op_type}` cannot be called with {call_shape}")]
    UnsupportedCallShape { op_type: String, call_shape: String },
    #[error("value `{name}` is not bound in the model script")]
    UnknownValue { name: String },
    #[error("parameter name `{name}` is duplicated")]
    DuplicateParameterName { name: String },
    #[error("graph output name `{name}` is duplicated")]
    DuplicateOutputName { name: String },
    #[error("graph output {index} is missing a name")]
    MissingOutputName { index: usize },
    #[error("graph must declare at least one output")]
    NoOutputs,
    #[error("constant {element_type:?} {shape} byte mismatch (expected {expected}, got {actual})")]
    InvalidConstant {
        element_type: ElementType,
        shape: Shape,
        expected: usize,
        actual: usize,
    },
    #[error("node {node} consumes {input} before it is produced")]
    InputNotReady { node: u32, input: String },
    #[error("graph could not be exported to {path}: {source}")]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GraphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraphError::ExportIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shape(op_type: &str, reason: impl Into<String>) -> Self {
        GraphError::ShapeMismatch {
            op_type: op_type.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn attribute(op_type: &str, attribute: &str, reason: impl Into<String>) -> Self {
        GraphError::InvalidAttribute {
            op_type: op_type.to_string(),
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    /// Re-tag an inference error with the operator that triggered it.
    pub(crate) fn for_op(self, op: &str) -> Self {
        match self {
            GraphError::ShapeMismatch { reason, .. } => GraphError::ShapeMismatch {
                op_type: op.to_string(),
                reason,
            },
            GraphError::InvalidAttribute {
                attribute, reason, ..
            } => GraphError::InvalidAttribute {
                op_type: op.to_string(),
                attribute,
                reason,
            },
            GraphError::TypeMismatch { lhs, rhs, .. } => GraphError::TypeMismatch {
                op_type: op.to_string(),
                lhs,
                rhs,
            },
            other => other,
        }
    }

    pub(crate) fn call_shape(op_type: &str, call_shape: impl Into<String>) -> Self {
        GraphError::UnsupportedCallShape {
            op_type: op_type.to_string(),
            call_shape: call_shape.into(),
        }
    }
}
