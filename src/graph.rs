use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    #[serde(alias = "bool")]
    Boolean,
    Uint8,
    Int8,
    Int16,
    Int32,
    Uint32,
    Int64,
    Float32,
    Float64,
}

impl ElementType {
    pub fn bytes_per_element(self) -> usize {
        match self {
            ElementType::Boolean => 1,
            ElementType::Uint8 => 1,
            ElementType::Int8 => 1,
            ElementType::Int16 => 2,
            ElementType::Int32 => 4,
            ElementType::Uint32 => 4,
            ElementType::Int64 => 8,
            ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::Float64)
    }

    pub fn is_integer(self) -> bool {
        !self.is_float() && self != ElementType::Boolean
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ElementType::Int8
                | ElementType::Int16
                | ElementType::Int32
                | ElementType::Int64
                | ElementType::Float32
                | ElementType::Float64
        )
    }

    /// Parse a dtype name as written in model scripts.
    ///
    /// Bare `float` and `int` follow numpy and mean the 64-bit types.
    pub fn from_name(name: &str) -> Option<Self> {
        let element_type = match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => ElementType::Boolean,
            "uint8" | "u8" => ElementType::Uint8,
            "int8" | "i8" => ElementType::Int8,
            "int16" | "i16" | "short" => ElementType::Int16,
            "int32" | "i32" => ElementType::Int32,
            "uint32" | "u32" => ElementType::Uint32,
            "int64" | "i64" | "int" | "long" => ElementType::Int64,
            "float32" | "f32" => ElementType::Float32,
            "float64" | "f64" | "float" | "double" => ElementType::Float64,
            _ => return None,
        };
        Some(element_type)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Boolean => "boolean",
            ElementType::Uint8 => "u8",
            ElementType::Int8 => "i8",
            ElementType::Int16 => "i16",
            ElementType::Int32 => "i32",
            ElementType::Uint32 => "u32",
            ElementType::Int64 => "i64",
            ElementType::Float32 => "f32",
            ElementType::Float64 => "f64",
        };
        f.write_str(name)
    }
}

/// One dimension of a shape. `Dynamic` serializes as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Static(u32),
    Dynamic,
}

impl Dim {
    pub fn as_static(self) -> Option<u32> {
        match self {
            Dim::Static(size) => Some(size),
            Dim::Dynamic => None,
        }
    }
}

impl From<u32> for Dim {
    fn from(size: u32) -> Self {
        Dim::Static(size)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Static(size) => write!(f, "{}", size),
            Dim::Dynamic => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<Dim>);

impl Shape {
    pub fn new(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }

    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn from_static(dims: &[u32]) -> Self {
        Shape(dims.iter().copied().map(Dim::Static).collect())
    }

    /// Shape of the given rank with every dimension unknown.
    pub fn dynamic(rank: usize) -> Self {
        Shape(vec![Dim::Dynamic; rank])
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn is_static(&self) -> bool {
        self.0.iter().all(|dim| matches!(dim, Dim::Static(_)))
    }

    pub fn to_static(&self) -> Option<Vec<u32>> {
        self.0.iter().map(|dim| dim.as_static()).collect()
    }

    pub fn element_count(&self) -> Option<usize> {
        let mut count = 1usize;
        for dim in &self.0 {
            count = count.checked_mul(dim.as_static()? as usize)?;
        }
        Some(count)
    }
}

impl<const N: usize> From<[u32; N]> for Shape {
    fn from(dims: [u32; N]) -> Self {
        Shape::from_static(&dims)
    }
}

impl From<Vec<u32>> for Shape {
    fn from(dims: Vec<u32>) -> Self {
        Shape::from_static(&dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, dim) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", dim)?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandDescriptor {
    pub element_type: ElementType,
    #[serde(default)]
    pub shape: Shape,
}

impl OperandDescriptor {
    pub fn new(element_type: ElementType, shape: impl Into<Shape>) -> Self {
        Self {
            element_type,
            shape: shape.into(),
        }
    }
}

/// An immutable literal tensor stored as little-endian bytes.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantValue {
    element_type: ElementType,
    shape: Shape,
    #[serde_as(as = "Base64")]
    data: Vec<u8>,
}

impl ConstantValue {
    pub fn new(element_type: ElementType, shape: Shape, data: Vec<u8>) -> Result<Self, GraphError> {
        let expected = shape
            .element_count()
            .and_then(|count| count.checked_mul(element_type.bytes_per_element()));
        if expected != Some(data.len()) {
            return Err(GraphError::InvalidConstant {
                element_type,
                shape,
                expected: expected.unwrap_or(0),
                actual: data.len(),
            });
        }
        Ok(Self {
            element_type,
            shape,
            data,
        })
    }

    pub fn from_i64s(
        element_type: ElementType,
        shape: impl Into<Shape>,
        values: &[i64],
    ) -> Result<Self, GraphError> {
        let mut data = Vec::with_capacity(values.len() * element_type.bytes_per_element());
        for &value in values {
            encode_element(element_type, value as f64, value, &mut data);
        }
        Self::new(element_type, shape.into(), data)
    }

    pub fn from_f64s(
        element_type: ElementType,
        shape: impl Into<Shape>,
        values: &[f64],
    ) -> Result<Self, GraphError> {
        let mut data = Vec::with_capacity(values.len() * element_type.bytes_per_element());
        for &value in values {
            encode_element(element_type, value, value as i64, &mut data);
        }
        Self::new(element_type, shape.into(), data)
    }

    pub fn scalar_i64(element_type: ElementType, value: i64) -> Self {
        let mut data = Vec::with_capacity(element_type.bytes_per_element());
        encode_element(element_type, value as f64, value, &mut data);
        Self {
            element_type,
            shape: Shape::scalar(),
            data,
        }
    }

    pub fn scalar_f64(element_type: ElementType, value: f64) -> Self {
        let mut data = Vec::with_capacity(element_type.bytes_per_element());
        encode_element(element_type, value, value as i64, &mut data);
        Self {
            element_type,
            shape: Shape::scalar(),
            data,
        }
    }

    pub fn scalar_bool(value: bool) -> Self {
        Self::scalar_i64(ElementType::Boolean, value as i64)
    }

    /// 1-D int64 tensor, the usual encoding of pads and axes.
    pub fn i64_vector(values: &[i64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for &value in values {
            data.extend_from_slice(&value.to_le_bytes());
        }
        Self {
            element_type: ElementType::Int64,
            shape: Shape::from_static(&[values.len() as u32]),
            data,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn descriptor(&self) -> OperandDescriptor {
        OperandDescriptor::new(self.element_type, self.shape.clone())
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.element_type.bytes_per_element()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_i64s(&self) -> Vec<i64> {
        self.elements()
            .map(|bytes| decode_element(self.element_type, bytes).1)
            .collect()
    }

    pub fn to_f64s(&self) -> Vec<f64> {
        self.elements()
            .map(|bytes| decode_element(self.element_type, bytes).0)
            .collect()
    }

    fn elements(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.element_type.bytes_per_element())
    }
}

fn encode_element(element_type: ElementType, float: f64, int: i64, out: &mut Vec<u8>) {
    match element_type {
        ElementType::Boolean => out.push((int != 0 || float != 0.0) as u8),
        ElementType::Uint8 => out.push(int as u8),
        ElementType::Int8 => out.extend_from_slice(&(int as i8).to_le_bytes()),
        ElementType::Int16 => out.extend_from_slice(&(int as i16).to_le_bytes()),
        ElementType::Int32 => out.extend_from_slice(&(int as i32).to_le_bytes()),
        ElementType::Uint32 => out.extend_from_slice(&(int as u32).to_le_bytes()),
        ElementType::Int64 => out.extend_from_slice(&int.to_le_bytes()),
        ElementType::Float32 => out.extend_from_slice(&(float as f32).to_le_bytes()),
        ElementType::Float64 => out.extend_from_slice(&float.to_le_bytes()),
    }
}

// `bytes` always has exactly `bytes_per_element` entries (chunks_exact).
fn decode_element(element_type: ElementType, bytes: &[u8]) -> (f64, i64) {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    match element_type {
        ElementType::Boolean | ElementType::Uint8 => (buf[0] as f64, buf[0] as i64),
        ElementType::Int8 => {
            let value = buf[0] as i8;
            (value as f64, value as i64)
        }
        ElementType::Int16 => {
            let value = i16::from_le_bytes([buf[0], buf[1]]);
            (value as f64, value as i64)
        }
        ElementType::Int32 => {
            let value = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            (value as f64, value as i64)
        }
        ElementType::Uint32 => {
            let value = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            (value as f64, value as i64)
        }
        ElementType::Int64 => {
            let value = i64::from_le_bytes(buf);
            (value as f64, value)
        }
        ElementType::Float32 => {
            let value = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            (value as f64, value as i64)
        }
        ElementType::Float64 => {
            let value = f64::from_le_bytes(buf);
            (value, value as i64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeHandle(pub u32);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstantId(pub u32);

/// An input edge: an output port of a node, or a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Output { node: NodeHandle, port: u32 },
    Constant(ConstantId),
}

impl Value {
    pub fn output(node: NodeHandle, port: u32) -> Self {
        Value::Output { node, port }
    }

    pub fn node(&self) -> Option<NodeHandle> {
        match self {
            Value::Output { node, .. } => Some(*node),
            Value::Constant(_) => None,
        }
    }
}

impl From<NodeHandle> for Value {
    fn from(node: NodeHandle) -> Self {
        Value::Output { node, port: 0 }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Output { node, port } => write!(f, "{}:{}", node, port),
            Value::Constant(id) => write!(f, "constant {}", id.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Bool(bool),
    String(String),
    ElementType(ElementType),
}

pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Value>,
    #[serde(default)]
    pub attributes: Attributes,
    pub outputs: Vec<OperandDescriptor>,
}

impl Node {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.op_type.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOutput {
    pub name: String,
    pub value: Value,
}

/// A frozen graph. Produced by [`crate::builder::GraphBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub(crate) nodes: Vec<Node>,
    #[serde(default)]
    pub(crate) constants: Vec<ConstantValue>,
    #[serde(default)]
    pub(crate) outputs: Vec<GraphOutput>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn constants(&self) -> &[ConstantValue] {
        &self.constants
    }

    pub fn outputs(&self) -> &[GraphOutput] {
        &self.outputs
    }

    pub fn node(&self, handle: NodeHandle) -> Result<&Node, GraphError> {
        self.nodes
            .get(handle.0 as usize)
            .ok_or(GraphError::OutOfRange {
                what: "node",
                index: handle.0 as usize,
                count: self.nodes.len(),
            })
    }

    pub fn constant(&self, id: ConstantId) -> Result<&ConstantValue, GraphError> {
        self.constants
            .get(id.0 as usize)
            .ok_or(GraphError::OutOfRange {
                what: "constant",
                index: id.0 as usize,
                count: self.constants.len(),
            })
    }

    pub fn type_name(&self, handle: NodeHandle) -> Result<&str, GraphError> {
        Ok(&self.node(handle)?.op_type)
    }

    pub fn output_count(&self, handle: NodeHandle) -> Result<usize, GraphError> {
        Ok(self.node(handle)?.outputs.len())
    }

    pub fn output(&self, handle: NodeHandle, port: usize) -> Result<&OperandDescriptor, GraphError> {
        let node = self.node(handle)?;
        node.outputs.get(port).ok_or(GraphError::OutOfRange {
            what: "output port",
            index: port,
            count: node.outputs.len(),
        })
    }

    pub fn descriptor(&self, value: &Value) -> Result<OperandDescriptor, GraphError> {
        match value {
            Value::Output { node, port } => self.output(*node, *port as usize).cloned(),
            Value::Constant(id) => Ok(self.constant(*id)?.descriptor()),
        }
    }

    /// The constant behind `value`, if it is one.
    pub fn constant_value(&self, value: &Value) -> Option<&ConstantValue> {
        match value {
            Value::Constant(id) => self.constants.get(id.0 as usize),
            Value::Output { .. } => None,
        }
    }

    pub fn output_named(&self, name: &str) -> Option<&GraphOutput> {
        self.outputs.iter().find(|output| output.name == name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.op_type == crate::ops::PARAMETER)
            .map(|(idx, node)| (NodeHandle(idx as u32), node))
    }
}
