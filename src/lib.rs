pub mod builder;
pub mod debug;
pub mod error;
pub mod folding;
pub mod graph;
pub mod graphviz;
pub mod loader;
pub mod ops;
pub mod script;
pub mod shape_inference;
pub mod translators;
pub mod validator;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use folding::MinMax;
pub use graph::{
    AttributeValue, Attributes, ConstantValue, Dim, ElementType, Graph, Node, NodeHandle,
    OperandDescriptor, Shape, Value,
};
pub use graphviz::graph_to_dot;
pub use loader::load_script_from_path;
pub use ops::{OpRegistry, OpSchema};
pub use script::{ModelScript, convert_script};
pub use translators::{Argument, CallRecord, OpTranslator, TranslatorRegistry};
pub use validator::{GraphValidator, ValidationArtifacts};
