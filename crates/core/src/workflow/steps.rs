use toolgate_model::{ModelMessage, ModelRequest, ToolResult};
use tracing::Instrument;

use super::{Driver, WorkflowState};
use crate::auth::GateDecision;
use crate::conversation::{MessageLog, Turn};
use crate::error::{Backend, Error};
use crate::BackendError;
use crate::tool::Error as ToolError;

impl Driver {
    /// Produces exactly one assistant turn from the log.
    pub(super) async fn agent_step(&self, log: &MessageLog) -> Result<Turn, Error> {
        let request = self.build_model_request(log);
        let turn = self
            .model_client
            .complete(request, self.on_transcript.as_ref())
            .await?;
        if turn.tool_calls.is_empty() && turn.text.is_empty() {
            warn!("the model returned an empty turn");
        }
        Ok(Turn::assistant(turn.text, turn.tool_calls))
    }

    /// Checks the pending tool calls of the latest assistant turn. This
    /// never touches the log.
    pub(super) async fn check_auth(
        &self,
        state: &WorkflowState,
    ) -> Result<GateDecision, Error> {
        let calls = state.log.pending_tool_calls();
        self.retry_policy
            .run("authorization check", BackendError::is_transient, || {
                self.gate.check_calls(&calls, &state.user_id)
            })
            .await
            .map_err(|err| {
                error!("authorization check failed: {err}");
                Error::from_backend(Backend::Authorization, err)
            })
    }

    /// Executes the pending tool calls in request order, appending one
    /// result per call as soon as it's available.
    ///
    /// A tool that fails is reported to the model through its result. A
    /// tool backend that stays unreachable stops the step instead, leaving
    /// the calls that didn't run pending for the next attempt.
    pub(super) async fn execute_tools(
        &self,
        state: &mut WorkflowState,
    ) -> Result<(), Error> {
        let calls = state.log.pending_tool_calls();
        let span = debug_span!("tools", count = calls.len());
        async {
            for call in calls {
                trace!("invoking {} ({})", call.name, call.id);
                let output = self
                    .retry_policy
                    .run("tool call", ToolError::is_transient, || {
                        self.toolbox.invoke(&call, &state.user_id)
                    })
                    .await;
                let content = match output {
                    Ok(output) => output,
                    Err(err) if err.is_transient() => {
                        error!("tool {} is unreachable: {err}", call.name);
                        return Err(Error::BackendUnavailable {
                            backend: Backend::Tools,
                            reason: err.reason().into_owned(),
                        });
                    }
                    Err(err) => {
                        warn!("tool {} failed: {err}", call.name);
                        format!("Error: {}", err.reason())
                    }
                };
                state.log.push(Turn::tool(ToolResult {
                    call_id: call.id,
                    content,
                }));
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn build_model_request(&self, log: &MessageLog) -> ModelRequest {
        let mut messages = Vec::with_capacity(log.len() + 1);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(ModelMessage::system(system_prompt.clone()));
        }
        messages.extend(log.to_model_messages());
        ModelRequest {
            messages,
            tools: self.toolbox.definitions(),
        }
    }
}
