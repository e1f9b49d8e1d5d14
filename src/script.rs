//! JSON model scripts.
//!
//! A script lists the model inputs, the operator calls in program order and
//! the names to expose as graph outputs:
//!
//! ```json
//! {
//!   "inputs": [{"name": "x", "element_type": "float32", "shape": [3, 4]}],
//!   "calls": [
//!     {"op": "Pad", "args": [{"ref": "x"}, [0, 1], [2, 3], "reflect"], "outputs": ["y"]}
//!   ],
//!   "outputs": ["y"]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::graph::{ElementType, Graph, Shape, Value};
use crate::translators::{Argument, CallRecord, TranslatorRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScript {
    #[serde(default)]
    pub inputs: Vec<ScriptInput>,
    #[serde(default)]
    pub calls: Vec<ScriptCall>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptInput {
    pub name: String,
    pub element_type: ElementType,
    #[serde(default)]
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptCall {
    pub op: String,
    #[serde(default)]
    pub args: Vec<ScriptArgument>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, ScriptArgument>,
    /// Names bound to the call's results, in order.
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptArgument {
    Ref {
        #[serde(rename = "ref")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dtype: Option<ElementType>,
    },
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ScriptArgument>),
    Null,
}

impl ModelScript {
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Translate every call of `script` in order and freeze the resulting graph.
pub fn convert_script(
    script: &ModelScript,
    registry: &TranslatorRegistry,
) -> Result<Graph, GraphError> {
    let mut builder = GraphBuilder::new();
    let mut scope: HashMap<String, Value> = HashMap::new();

    for input in &script.inputs {
        let handle = builder.parameter(&input.name, input.element_type, input.shape.clone())?;
        scope.insert(input.name.clone(), handle.into());
    }

    for call in &script.calls {
        let record = CallRecord {
            op: call.op.clone(),
            args: call
                .args
                .iter()
                .map(|arg| bind(arg, &scope))
                .collect::<Result<_, _>>()?,
            kwargs: call
                .kwargs
                .iter()
                .map(|(name, arg)| Ok((name.clone(), bind(arg, &scope)?)))
                .collect::<Result<_, GraphError>>()?,
        };
        let results = registry.translate(&record, &mut builder)?;
        if call.outputs.len() > results.len() {
            return Err(GraphError::OutOfRange {
                what: "call result",
                index: call.outputs.len() - 1,
                count: results.len(),
            });
        }
        for (name, value) in call.outputs.iter().zip(results) {
            log::debug!("{} = {}", name, value);
            scope.insert(name.clone(), value);
        }
    }

    let outputs = script
        .outputs
        .iter()
        .map(|name| Ok((name.clone(), lookup(&scope, name)?)))
        .collect::<Result<Vec<_>, GraphError>>()?;
    builder.build(outputs)
}

fn lookup(scope: &HashMap<String, Value>, name: &str) -> Result<Value, GraphError> {
    scope
        .get(name)
        .copied()
        .ok_or_else(|| GraphError::UnknownValue {
            name: name.to_string(),
        })
}

fn bind(argument: &ScriptArgument, scope: &HashMap<String, Value>) -> Result<Argument, GraphError> {
    let bound = match argument {
        ScriptArgument::Ref { name, dtype } => Argument::Tensor {
            value: lookup(scope, name)?,
            dtype: *dtype,
        },
        ScriptArgument::Bool(value) => Argument::Bool(*value),
        ScriptArgument::Int(value) => Argument::Int(*value),
        ScriptArgument::Float(value) => Argument::Float(*value),
        ScriptArgument::Str(value) => Argument::Str(value.clone()),
        ScriptArgument::List(items) => Argument::List(
            items
                .iter()
                .map(|item| bind(item, scope))
                .collect::<Result<_, _>>()?,
        ),
        ScriptArgument::Null => Argument::None,
    };
    Ok(bound)
}
