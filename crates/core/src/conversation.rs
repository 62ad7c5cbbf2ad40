//! Conversation-related types.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use toolgate_model::{ModelMessage, ToolCallRequest, ToolResult};

/// Who a [`Turn`] is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human operator.
    User,
    /// The language model.
    Assistant,
    /// A tool invocation result.
    Tool,
}

/// One message in the conversation. Turns can't be changed once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Turn {
    msg: ModelMessage,
}

impl Turn {
    /// Creates a user turn.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            msg: ModelMessage::user(content),
        }
    }

    /// Creates an assistant turn with the tool calls it requested.
    #[inline]
    pub fn assistant<S: Into<String>>(
        content: S,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            msg: ModelMessage::Assistant {
                content: content.into(),
                tool_calls,
            },
        }
    }

    /// Creates a tool turn carrying one result.
    #[inline]
    pub fn tool(result: ToolResult) -> Self {
        Self {
            msg: ModelMessage::Tool(result),
        }
    }

    /// Returns the role of this turn.
    pub fn role(&self) -> Role {
        match &self.msg {
            ModelMessage::User { .. } => Role::User,
            ModelMessage::Assistant { .. } => Role::Assistant,
            ModelMessage::Tool(_) => Role::Tool,
            // Turns are never built from system messages, but a deserialized
            // log may contain one. Treat it as operator-provided input.
            ModelMessage::System { .. } => Role::User,
        }
    }

    /// Returns the text content of this turn.
    pub fn content(&self) -> &str {
        match &self.msg {
            ModelMessage::System { content }
            | ModelMessage::User { content }
            | ModelMessage::Assistant { content, .. } => content,
            ModelMessage::Tool(result) => &result.content,
        }
    }

    /// Returns the tool calls requested by this turn. Always empty for
    /// turns not from the assistant.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.msg {
            ModelMessage::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Returns the tool result carried by this turn, if any.
    pub fn tool_result(&self) -> Option<&ToolResult> {
        match &self.msg {
            ModelMessage::Tool(result) => Some(result),
            _ => None,
        }
    }

    /// Returns the underlying model message.
    #[inline]
    pub fn as_message(&self) -> &ModelMessage {
        &self.msg
    }
}

/// An append-only log of turns. The order of turns is the order in which
/// they happened.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    turns: Vec<Turn>,
}

impl MessageLog {
    /// Creates an empty log.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Returns all turns.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if there are no turns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the most recent turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the most recent assistant turn.
    pub fn last_assistant(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role() == Role::Assistant)
    }

    /// Returns the content of the most recent assistant turn.
    #[inline]
    pub fn answer(&self) -> Option<&str> {
        self.last_assistant().map(Turn::content)
    }

    /// Returns the tool calls of the most recent assistant turn that have
    /// not been answered by a tool result yet, in request order.
    pub fn pending_tool_calls(&self) -> Vec<ToolCallRequest> {
        let Some(idx) = self
            .turns
            .iter()
            .rposition(|turn| turn.role() == Role::Assistant)
        else {
            return vec![];
        };

        let answered: HashSet<&str> = self.turns[idx + 1..]
            .iter()
            .filter_map(Turn::tool_result)
            .map(|result| result.call_id.as_str())
            .collect();
        self.turns[idx]
            .tool_calls()
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .cloned()
            .collect()
    }

    /// Converts the log into messages for a model request.
    pub fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.turns.iter().map(|turn| turn.msg.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments: json!({}),
        }
    }

    fn result(call_id: &str) -> Turn {
        Turn::tool(ToolResult {
            call_id: call_id.to_owned(),
            content: "ok".to_owned(),
        })
    }

    #[test]
    fn test_roles_and_content() {
        let turn = Turn::user("search wikipedia for otters");
        assert_eq!(turn.role(), Role::User);
        assert_eq!(turn.content(), "search wikipedia for otters");
        assert!(turn.tool_calls().is_empty());

        let turn = Turn::assistant("", vec![call("1", "wiki_search")]);
        assert_eq!(turn.role(), Role::Assistant);
        assert_eq!(turn.tool_calls().len(), 1);

        let turn = result("1");
        assert_eq!(turn.role(), Role::Tool);
        assert_eq!(turn.tool_result().unwrap().call_id, "1");
    }

    #[test]
    fn test_pending_tool_calls() {
        let mut log = MessageLog::new();
        assert!(log.pending_tool_calls().is_empty());

        log.push(Turn::user("Hi"));
        log.push(Turn::assistant(
            "",
            vec![call("1", "wiki_search"), call("2", "Gmail.ListEmails")],
        ));
        let pending: Vec<_> =
            log.pending_tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(pending, ["1", "2"]);

        log.push(result("1"));
        let pending: Vec<_> =
            log.pending_tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(pending, ["2"]);

        log.push(result("2"));
        assert!(log.pending_tool_calls().is_empty());

        log.push(Turn::assistant("Done.", vec![]));
        assert!(log.pending_tool_calls().is_empty());
        assert_eq!(log.answer(), Some("Done."));
    }

    #[test]
    fn test_results_of_older_turns_are_ignored() {
        let mut log = MessageLog::new();
        log.push(Turn::assistant("", vec![call("1", "wiki_search")]));
        log.push(result("1"));
        log.push(Turn::assistant("", vec![call("1", "wiki_search")]));

        assert_eq!(log.pending_tool_calls().len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let mut log = MessageLog::new();
        log.push(Turn::user("Hi"));
        log.push(Turn::assistant("Hello!", vec![]));

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(
            value,
            json!([
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "Hello!" },
            ])
        );
        let back: MessageLog = serde_json::from_value(value).unwrap();
        assert_eq!(back, log);
    }
}
