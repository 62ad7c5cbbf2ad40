use std::future::ready;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use toolgate_model::ToolCallRequest;
use tracing::Instrument;

use super::{Error, Tool, ToolOutput, ToolSpec};

type ToolFuture = Pin<Box<dyn Future<Output = ToolOutput> + Send>>;

/// An in-process tool with its input type erased.
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn spec(&self) -> ToolSpec;

    fn invoke(&self, call: &ToolCallRequest) -> ToolFuture;
}

pub(crate) fn erase<T: Tool>(tool: T) -> Box<dyn ToolObject> {
    Box::new(Erased(tool))
}

struct Erased<T>(T);

impl<T: Tool> ToolObject for Erased<T> {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.0.name().to_owned(),
            description: self.0.description().to_owned(),
            parameters: self.0.parameter_schema().clone(),
            requires_authorization: false,
        }
    }

    fn invoke(&self, call: &ToolCallRequest) -> ToolFuture {
        let input = match decode_arguments::<T::Input>(&call.arguments) {
            Ok(input) => input,
            Err(err) => {
                debug!("rejected the arguments of {}: {err}", call.id);
                return Box::pin(ready(Err(err)));
            }
        };
        let span = debug_span!("tool", name = %call.name, call_id = %call.id);
        Box::pin(self.0.execute(input).instrument(span))
    }
}

/// Decodes the arguments of a tool call. Missing arguments count as an
/// empty object, and arguments the model failed to encode (kept as a raw
/// string) are reported back to it.
fn decode_arguments<I: DeserializeOwned>(arguments: &Value) -> Result<I, Error> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        Value::String(raw) => serde_json::from_str(raw).map_err(|err| {
            Error::invalid_input()
                .with_reason(format!("the arguments are not valid JSON: {err}"))
        })?,
        arguments => arguments.clone(),
    };
    serde_json::from_value(arguments)
        .map_err(|err| Error::invalid_input().with_reason(err.to_string()))
}
