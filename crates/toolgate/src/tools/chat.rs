use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use toolgate_core::tool::{Error as ToolError, Tool, ToolOutput};
use toolgate_core::{Error, ModelClient};
use toolgate_model::{ModelMessage, ModelRequest};

const CHIT_CHAT_PROMPT: &str = "You are a friendly AI. Respond casually to: ";
const SUMMARIZE_PROMPT: &str = "Summarize this for a user: ";

#[allow(missing_docs)]
#[derive(Deserialize, JsonSchema)]
pub struct ChitChatInput {
    #[schemars(description = "What the user said.")]
    query: String,
}

#[allow(missing_docs)]
#[derive(Deserialize, JsonSchema)]
pub struct SummarizeInput {
    #[schemars(description = "The text to summarize.")]
    context: String,
}

/// Casual conversation, answered by the model in a lighter tone.
pub struct ChitChatTool {
    model_client: ModelClient,
    parameter_schema: Value,
}

impl ChitChatTool {
    /// Creates a new chit-chat tool backed by the given model client.
    #[inline]
    pub fn new(model_client: ModelClient) -> Self {
        Self {
            model_client,
            parameter_schema: schema_for!(ChitChatInput).to_value(),
        }
    }
}

impl Tool for ChitChatTool {
    type Input = ChitChatInput;

    fn name(&self) -> &str {
        "chit_chat"
    }

    fn description(&self) -> &str {
        "Casual conversation."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: ChitChatInput,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ask(self.model_client.clone(), CHIT_CHAT_PROMPT, input.query)
    }
}

/// Summarizes a given text for the user.
pub struct SummarizeTool {
    model_client: ModelClient,
    parameter_schema: Value,
}

impl SummarizeTool {
    /// Creates a new summarize tool backed by the given model client.
    #[inline]
    pub fn new(model_client: ModelClient) -> Self {
        Self {
            model_client,
            parameter_schema: schema_for!(SummarizeInput).to_value(),
        }
    }
}

impl Tool for SummarizeTool {
    type Input = SummarizeInput;

    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> &str {
        "Summarize a given context for the user."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: SummarizeInput,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ask(self.model_client.clone(), SUMMARIZE_PROMPT, input.context)
    }
}

/// Sends `prompt` followed by `text` as a fresh, tool-less conversation.
async fn ask(
    model_client: ModelClient,
    prompt: &'static str,
    text: String,
) -> ToolOutput {
    let text = text.trim();
    if text.is_empty() {
        return Err(ToolError::invalid_input().with_reason("the text must not be empty"));
    }

    let req = ModelRequest {
        messages: vec![ModelMessage::user(format!("{prompt}{text}"))],
        tools: vec![],
    };
    match model_client.complete(req, None).await {
        Ok(turn) => Ok(turn.text),
        Err(Error::BackendUnavailable { reason, .. }) => {
            Err(ToolError::backend_unavailable().with_reason(reason))
        }
        Err(err) => Err(ToolError::execution_error().with_reason(err.to_string())),
    }
}
