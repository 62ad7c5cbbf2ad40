use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use toolgate_model::ToolResult;

use crate::conversation::{MessageLog, Turn};

/// A state of the workflow state machine.
///
/// ```text
/// START ──> AGENT ─────────────────> END
///             ^   │
///             │   v
///           TOOLS <── CHECK_AUTH
///             ^           │
///             │           v
///             └─────── AUTHORIZE (suspends while pending)
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No input has been given yet.
    #[default]
    Start,
    /// The model produces the next assistant turn.
    Agent,
    /// The requested tools are checked against the authorization gate.
    CheckAuth,
    /// Waiting for the user to authorize a tool.
    Authorize,
    /// The requested tools are executed.
    Tools,
    /// The assistant has answered.
    End,
}

impl Stage {
    /// Returns `true` if a new user input can be accepted at this stage.
    #[inline]
    pub fn is_idle(self) -> bool {
        matches!(self, Stage::Start | Stage::End)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "START",
            Stage::Agent => "AGENT",
            Stage::CheckAuth => "CHECK_AUTH",
            Stage::Authorize => "AUTHORIZE",
            Stage::Tools => "TOOLS",
            Stage::End => "END",
        };
        f.write_str(name)
    }
}

/// Everything a workflow run reads and writes. Each run owns its state;
/// states must not be shared between concurrent runs.
///
/// `stage` is the next step to execute, so after a failure or a suspension
/// the same state can be handed back to [`crate::Driver::resume`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The user the tools act on behalf of.
    pub user_id: String,
    /// The conversation so far.
    pub log: MessageLog,
    /// The URL the user was last asked to visit, while an authorization is
    /// pending.
    pub last_auth_url: Option<String>,
    /// The next step to execute.
    pub stage: Stage,
}

impl WorkflowState {
    /// Creates an empty state for `user_id`.
    #[inline]
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            log: MessageLog::new(),
            last_auth_url: None,
            stage: Stage::Start,
        }
    }

    /// Gives up the current run, e.g. when the user declines to authorize a
    /// tool. Every pending tool call is answered with a cancellation notice,
    /// so the conversation can go on with a new input.
    pub fn abandon(&mut self) {
        if self.stage.is_idle() {
            return;
        }
        for call in self.log.pending_tool_calls() {
            self.log.push(Turn::tool(ToolResult {
                call_id: call.id,
                content: format!(
                    "Error: the call to {} was cancelled by the user",
                    call.name
                ),
            }));
        }
        info!("abandoned the run at stage {}", self.stage);
        self.last_auth_url = None;
        self.stage = Stage::End;
    }
}

/// How a run stopped without an error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The assistant answered without requesting more tools.
    Finished {
        /// The content of the last assistant turn.
        answer: String,
    },
    /// The run is waiting for the user to authorize a tool. Resume the
    /// same state once it's done.
    Suspended {
        /// The tool that needs authorization.
        tool_name: String,
        /// Where the user can authorize it.
        auth_url: String,
    },
}
