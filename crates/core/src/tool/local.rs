use std::collections::BTreeMap;

use async_trait::async_trait;
use toolgate_model::ToolCallRequest;

use super::object::{ToolObject, erase};
use super::{Error, Tool, ToolCatalog, ToolOutput, ToolSpec};
use crate::BackendError;

/// A catalog of in-process tools. These tools act on behalf of the host
/// itself, so none of them requires an authorization.
#[derive(Default)]
pub struct LocalTools {
    tools: BTreeMap<String, Box<dyn ToolObject>>,
}

impl LocalTools {
    /// Registers a tool, replacing any tool with the same name.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        if self
            .tools
            .insert(name.clone(), erase(tool))
            .is_some()
        {
            warn!("tool {name} is registered twice, keeping the last one");
        }
    }

    /// Returns `true` if no tools are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolCatalog for LocalTools {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, BackendError> {
        Ok(self.tools.values().map(|tool| tool.spec()).collect())
    }

    async fn invoke(
        &self,
        call: &ToolCallRequest,
        _user_id: &str,
    ) -> ToolOutput {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("tool not found: {}", call.name);
            return Err(Error::not_found()
                .with_reason(format!("no tool named `{}`", call.name)));
        };
        trace!("executing a tool ({}) with args: {:?}", call.id, call.arguments);
        tool.invoke(call).await
    }
}
