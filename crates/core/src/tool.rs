//! Tool catalogs and in-process tools.

mod error;
mod local;
mod object;
mod toolbox;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolgate_model::{ModelTool, ToolCallRequest};

use crate::BackendError;
pub use error::{Error, ErrorKind};
pub use local::LocalTools;
pub use toolbox::Toolbox;

/// The output of a tool call.
pub type ToolOutput = Result<String, Error>;

/// Describes a tool offered by a catalog.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name of the tool, unique across all catalogs of a driver.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
    /// Whether invoking the tool requires a per-user authorization.
    pub requires_authorization: bool,
}

impl ToolSpec {
    /// Returns the definition of this tool for a model request.
    #[inline]
    pub fn definition(&self) -> ModelTool {
        ModelTool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// A source of tools, either in-process or backed by a remote service.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Lists the tools this catalog offers.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, BackendError>;

    /// Invokes a tool on behalf of `user_id`.
    ///
    /// Failures of the tool itself are reported in the output rather than
    /// as a backend error, so that the model can react to them.
    async fn invoke(&self, call: &ToolCallRequest, user_id: &str) -> ToolOutput;
}

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the working directory or the
/// current user. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolOutput> + Send + 'static;
}
