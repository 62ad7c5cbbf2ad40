use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolgate_model::{ModelMessage, ModelRequest, ModelTool, ToolCallRequest};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    stream: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

// -----------
// Conversions
// -----------

/// Translates between tool names and the function names sent to the server.
///
/// Function names may only contain ASCII letters, digits, `_` and `-`, while
/// tool names are often qualified (`Gmail.SendEmail`). Tools whose names
/// sanitize to the same function name get a numeric suffix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionNames {
    to_tool: HashMap<String, String>,
    to_function: HashMap<String, String>,
}

impl FunctionNames {
    fn from_tools(tools: &[ModelTool]) -> Self {
        let mut names = Self::default();
        for tool in tools {
            if names.to_function.contains_key(&tool.name) {
                continue;
            }
            let base = function_name(&tool.name);
            let mut candidate = base.clone();
            let mut suffix = 2;
            while names.to_tool.contains_key(&candidate) {
                candidate = format!("{base}_{suffix}");
                suffix += 1;
            }
            if candidate != base {
                warn!(
                    "{} clashes with another tool as `{base}`, sent as `{candidate}`",
                    tool.name
                );
            }
            names.to_tool.insert(candidate.clone(), tool.name.clone());
            names.to_function.insert(tool.name.clone(), candidate);
        }
        names
    }

    /// Returns the tool name of a function name received from the server.
    pub fn tool_name(&self, function_name: &str) -> String {
        match self.to_tool.get(function_name) {
            Some(name) => name.clone(),
            None => function_name.to_owned(),
        }
    }

    /// Returns the function name to send for a tool.
    fn function_name(&self, tool_name: &str) -> String {
        match self.to_function.get(tool_name) {
            Some(name) => name.clone(),
            None => function_name(tool_name),
        }
    }
}

pub fn function_name(tool_name: &str) -> String {
    tool_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> (ChatCompletionRequest, FunctionNames) {
    let names = FunctionNames::from_tools(&req.tools);
    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages: req
            .messages
            .iter()
            .map(|msg| create_message(msg, &names))
            .collect(),
        tools: req.tools.iter().map(|tool| create_tool(tool, &names)).collect(),
        stream_options: Some(StreamOptions {
            include_usage: true,
        }),
        stream: true,
    };
    (request, names)
}

#[inline]
fn create_message(msg: &ModelMessage, names: &FunctionNames) -> Message {
    match msg {
        ModelMessage::System { content } => Message::System {
            content: content.clone(),
        },
        ModelMessage::User { content } => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant {
            content,
            tool_calls,
        } => Message::Assistant {
            content: if content.is_empty() && !tool_calls.is_empty() {
                None
            } else {
                Some(content.clone())
            },
            tool_calls: tool_calls
                .iter()
                .map(|call| create_tool_call(call, names))
                .collect(),
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.call_id.clone(),
            content: result.content.clone(),
        },
    }
}

fn create_tool_call(call: &ToolCallRequest, names: &FunctionNames) -> ToolCall {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        arguments => arguments.to_string(),
    };
    ToolCall {
        index: None,
        id: Some(call.id.clone()),
        r#type: Some("function".to_owned()),
        function: Some(FunctionToolCall {
            name: Some(names.function_name(&call.name)),
            arguments: Some(arguments),
        }),
    }
}

#[inline]
fn create_tool(tool: &ModelTool, names: &FunctionNames) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: names.function_name(&tool.name),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
