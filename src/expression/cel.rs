//! CEL expression backend.

use super::{CompiledExpression, ExpressionLanguage};
use crate::{Bindings, Error, Result};

use cel_interpreter::{Context, Program, Value as CelValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Expressions written in the Common Expression Language.
#[derive(Debug, Clone, Copy, Default)]
pub struct CelLanguage;

impl ExpressionLanguage for CelLanguage {
    fn name(&self) -> &'static str {
        "cel"
    }

    fn compile(&self, text: &str) -> Result<Arc<dyn CompiledExpression>> {
        let program = Program::compile(text).map_err(|e| Error::compile(text, e.to_string()))?;
        Ok(Arc::new(CelProgram {
            text: text.to_string(),
            program,
        }))
    }
}

/// A compiled CEL program.
struct CelProgram {
    text: String,
    program: Program,
}

impl CompiledExpression for CelProgram {
    fn execute(&self, bindings: &Bindings) -> Result<Value> {
        let mut context = Context::default();
        for (name, value) in bindings {
            context.add_variable_from_value(name.as_str(), to_cel(value));
        }

        let result = self
            .program
            .execute(&context)
            .map_err(|e| Error::evaluation(&self.text, e.to_string()))?;
        from_cel(&result).ok_or_else(|| {
            Error::evaluation(&self.text, format!("unsupported result type: {:?}", result))
        })
    }
}

/// Integral JSON numbers become CEL ints so literals like `value > 50` compare
/// without signedness mismatches.
fn to_cel(value: &Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else {
                CelValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => CelValue::String(Arc::new(s.clone())),
        Value::Array(items) => CelValue::List(Arc::new(items.iter().map(to_cel).collect())),
        Value::Object(map) => {
            let entries: HashMap<String, CelValue> =
                map.iter().map(|(k, v)| (k.clone(), to_cel(v))).collect();
            CelValue::from(entries)
        }
    }
}

fn from_cel(value: &CelValue) -> Option<Value> {
    Some(match value {
        CelValue::Null => Value::Null,
        CelValue::Bool(b) => Value::Bool(*b),
        CelValue::Int(i) => Value::from(*i),
        CelValue::UInt(u) => Value::from(*u),
        CelValue::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number)?,
        CelValue::String(s) => Value::String(s.as_ref().clone()),
        CelValue::List(items) => Value::Array(
            items
                .iter()
                .map(from_cel)
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => return None,
    })
}
