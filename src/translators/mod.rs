use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::builder::GraphBuilder;
use crate::error::GraphError;
use crate::folding::{MinMax, fold_convert};
use crate::graph::{AttributeValue, Attributes, ConstantValue, ElementType, Value};
use crate::ops::CONVERT;

mod min_max;
mod pad;
mod variadic;

pub use min_max::{MinMaxCall, MinMaxTranslator};
pub use pad::PadTranslator;
pub use variadic::{VariadicCall, VariadicMinMaxTranslator};

/// One argument at a source-framework call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A graph value. `dtype` is an explicit cast written in the source model.
    Tensor {
        value: Value,
        dtype: Option<ElementType>,
    },
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Argument>),
    None,
}

impl Argument {
    pub fn tensor(value: impl Into<Value>) -> Self {
        Argument::Tensor {
            value: value.into(),
            dtype: None,
        }
    }

    pub fn cast_tensor(value: impl Into<Value>, dtype: ElementType) -> Self {
        Argument::Tensor {
            value: value.into(),
            dtype: Some(dtype),
        }
    }

    pub fn ints(values: &[i64]) -> Self {
        Argument::List(values.iter().copied().map(Argument::Int).collect())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Argument::Tensor { .. } => "tensor",
            Argument::Int(_) => "int",
            Argument::Float(_) => "float",
            Argument::Bool(_) => "bool",
            Argument::Str(_) => "str",
            Argument::List(_) => "list",
            Argument::None => "None",
        }
    }
}

/// An operator invocation as seen in the source model.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub op: String,
    pub args: Vec<Argument>,
    pub kwargs: BTreeMap<String, Argument>,
}

impl CallRecord {
    pub fn new(op: impl Into<String>, args: Vec<Argument>) -> Self {
        Self {
            op: op.into(),
            args,
            kwargs: BTreeMap::new(),
        }
    }

    pub fn with_kwarg(mut self, name: &str, value: Argument) -> Self {
        self.kwargs.insert(name.to_string(), value);
        self
    }

    /// Positional argument `index`, falling back to keyword `name`. `None` literals count as absent.
    pub fn arg(&self, index: usize, name: &str) -> Option<&Argument> {
        self.args
            .get(index)
            .or_else(|| self.kwargs.get(name))
            .filter(|arg| **arg != Argument::None)
    }

    /// Summary of argument kinds, used in error messages.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = self.args.iter().map(|arg| arg.kind().to_string()).collect();
        parts.extend(
            self.kwargs
                .iter()
                .map(|(name, arg)| format!("{}={}", name, arg.kind())),
        );
        format!("({})", parts.join(", "))
    }
}

pub trait OpTranslator {
    fn op_name(&self) -> &'static str;
    fn translate(
        &self,
        call: &CallRecord,
        builder: &mut GraphBuilder<'_>,
    ) -> Result<Vec<Value>, GraphError>;
}

pub struct TranslatorRegistry {
    translators: HashMap<&'static str, Box<dyn OpTranslator + Send + Sync>>,
}

impl TranslatorRegistry {
    pub fn empty() -> Self {
        Self {
            translators: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PadTranslator));
        registry.register(Box::new(MinMaxTranslator::new(MinMax::Min)));
        registry.register(Box::new(MinMaxTranslator::new(MinMax::Max)));
        registry.register(Box::new(VariadicMinMaxTranslator::new(MinMax::Min)));
        registry.register(Box::new(VariadicMinMaxTranslator::new(MinMax::Max)));
        registry
    }

    /// Process-wide registry, populated on first use and read-only afterwards.
    pub fn global() -> &'static TranslatorRegistry {
        static REGISTRY: OnceLock<TranslatorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(TranslatorRegistry::with_defaults)
    }

    pub fn register(&mut self, translator: Box<dyn OpTranslator + Send + Sync>) {
        self.translators.insert(translator.op_name(), translator);
    }

    pub fn available_ops(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.translators.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn translate(
        &self,
        call: &CallRecord,
        builder: &mut GraphBuilder<'_>,
    ) -> Result<Vec<Value>, GraphError> {
        let Some(translator) = self.translators.get(call.op.as_str()) else {
            return Err(GraphError::UnknownOperator {
                op_type: call.op.clone(),
            });
        };
        log::debug!("translating {}{}", call.op, call.signature());
        translator.translate(call, builder)
    }
}

/// Common element type for a min/max over `a` and `b`.
///
/// Booleans lose to everything, floats beat integers, and the wider type wins
/// within a category. Mixed-sign integers widen to the next signed type that
/// holds both.
pub fn promote_types(a: ElementType, b: ElementType) -> ElementType {
    use ElementType::*;

    if a == b {
        return a;
    }
    match (a, b) {
        (Boolean, other) | (other, Boolean) => other,
        (Float64, _) | (_, Float64) => Float64,
        (Float32, _) | (_, Float32) => Float32,
        _ => {
            let signed_bits = |t: ElementType| match t {
                Int8 => 8,
                Int16 => 16,
                Int32 => 32,
                Int64 => 64,
                _ => 0,
            };
            let unsigned_bits = |t: ElementType| match t {
                Uint8 => 8,
                Uint32 => 32,
                _ => 0,
            };
            let signed = signed_bits(a).max(signed_bits(b));
            let unsigned = unsigned_bits(a).max(unsigned_bits(b));
            if signed == 0 {
                return if unsigned == 32 { Uint32 } else { Uint8 };
            }
            let bits = if unsigned >= signed {
                unsigned * 2
            } else {
                signed
            };
            match bits {
                0..=8 => Int8,
                9..=16 => Int16,
                17..=32 => Int32,
                _ => Int64,
            }
        }
    }
}

/// Materialize an argument as a graph value, applying any declared dtype.
pub(crate) fn value_of(
    builder: &mut GraphBuilder<'_>,
    argument: &Argument,
    op: &str,
) -> Result<Value, GraphError> {
    match argument {
        Argument::Tensor { value, dtype } => match dtype {
            Some(dtype) => cast(builder, *value, *dtype),
            None => Ok(*value),
        },
        Argument::Int(value) => Ok(builder.constant(ConstantValue::scalar_i64(
            ElementType::Int64,
            *value,
        ))),
        Argument::Float(value) => Ok(builder.constant(ConstantValue::scalar_f64(
            ElementType::Float64,
            *value,
        ))),
        Argument::Bool(value) => Ok(builder.constant(ConstantValue::scalar_bool(*value))),
        other => Err(GraphError::call_shape(
            op,
            format!("a {} where a value is expected", other.kind()),
        )),
    }
}

/// Cast `value` to `to`. Constants are converted in place, other values get a `Convert` node.
pub(crate) fn cast(
    builder: &mut GraphBuilder<'_>,
    value: Value,
    to: ElementType,
) -> Result<Value, GraphError> {
    if builder.descriptor(&value)?.element_type == to {
        return Ok(value);
    }
    if let Some(constant) = builder.graph().constant_value(&value) {
        let converted = fold_convert(constant, to)?;
        return Ok(builder.constant(converted));
    }
    let mut attributes = Attributes::new();
    attributes.insert(
        "destination_type".to_string(),
        AttributeValue::ElementType(to),
    );
    Ok(builder.add_node(CONVERT, vec![value], attributes)?.into())
}

/// Bring both operands to their promoted common type.
pub(crate) fn reconcile(
    builder: &mut GraphBuilder<'_>,
    lhs: Value,
    rhs: Value,
) -> Result<(Value, Value, ElementType), GraphError> {
    let lhs_type = builder.descriptor(&lhs)?.element_type;
    let rhs_type = builder.descriptor(&rhs)?.element_type;
    let common = promote_types(lhs_type, rhs_type);
    Ok((cast(builder, lhs, common)?, cast(builder, rhs, common)?, common))
}

pub(crate) fn expect_int(argument: &Argument, op: &str, name: &str) -> Result<i64, GraphError> {
    match argument {
        Argument::Int(value) => Ok(*value),
        other => Err(GraphError::attribute(
            op,
            name,
            format!("expected an int, got {}", other.kind()),
        )),
    }
}

pub(crate) fn expect_bool(argument: &Argument, op: &str, name: &str) -> Result<bool, GraphError> {
    match argument {
        Argument::Bool(value) => Ok(*value),
        Argument::Int(value) => Ok(*value != 0),
        other => Err(GraphError::attribute(
            op,
            name,
            format!("expected a bool, got {}", other.kind()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ElementType::*;

    #[test]
    fn test_promotion_table() {
        assert_eq!(promote_types(Float32, Int32), Float32);
        assert_eq!(promote_types(Int32, Float64), Float64);
        assert_eq!(promote_types(Float32, Float64), Float64);
        assert_eq!(promote_types(Int32, Int64), Int64);
        assert_eq!(promote_types(Uint8, Int32), Int32);
        assert_eq!(promote_types(Uint8, Int8), Int16);
        assert_eq!(promote_types(Uint32, Int32), Int64);
        assert_eq!(promote_types(Uint8, Uint32), Uint32);
        assert_eq!(promote_types(Boolean, Uint8), Uint8);
        assert_eq!(promote_types(Uint8, Float32), Float32);
    }

    #[test]
    fn test_promotion_is_symmetric() {
        let all = [
            Boolean, Uint8, Int8, Int16, Int32, Uint32, Int64, Float32, Float64,
        ];
        for a in all {
            for b in all {
                assert_eq!(promote_types(a, b), promote_types(b, a), "{:?} {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_unknown_translator() {
        let mut builder = GraphBuilder::new();
        let call = CallRecord::new("aten::softmax", vec![]);
        let err = TranslatorRegistry::global()
            .translate(&call, &mut builder)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownOperator { .. }));
    }

    #[test]
    fn test_registry_names() {
        assert_eq!(
            TranslatorRegistry::with_defaults().available_ops(),
            vec!["Pad", "aten::max", "aten::min", "prim::max", "prim::min"]
        );
    }

    #[test]
    fn test_call_signature_and_lookup() {
        let call = CallRecord::new("aten::max", vec![Argument::Int(1), Argument::None])
            .with_kwarg("keepdim", Argument::Bool(true));
        assert_eq!(call.signature(), "(int, None, keepdim=bool)");
        assert_eq!(call.arg(0, "input"), Some(&Argument::Int(1)));
        assert_eq!(call.arg(1, "dim"), None);
        assert_eq!(call.arg(2, "keepdim"), Some(&Argument::Bool(true)));
    }

    #[test]
    fn test_cast_constant_folds() {
        let mut builder = GraphBuilder::new();
        let value = builder.constant(ConstantValue::scalar_i64(Int64, 3));
        let cast_value = cast(&mut builder, value, Float32).unwrap();
        assert!(builder.graph().nodes().is_empty());
        let constant = builder.graph().constant_value(&cast_value).unwrap();
        assert_eq!(constant.element_type(), Float32);
        assert_eq!(constant.to_f64s(), vec![3.0]);
    }
}
