//! The authorization-gated tool-call workflow.

mod builder;
mod state;
mod steps;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::Instrument;

use crate::auth::{AuthorizationGate, GateDecision};
use crate::conversation::Turn;
use crate::error::Error;
use crate::model_client::{ModelClient, TranscriptFn};
use crate::retry::RetryPolicy;
use crate::tool::Toolbox;
pub use builder::DriverBuilder;
pub use state::{Outcome, Stage, WorkflowState};

type TransitionFn = Box<dyn Fn(Stage, Stage) + Send + Sync>;

/// Drives a [`WorkflowState`] through the agent, authorization, and tool
/// steps until the assistant answers or a tool waits for authorization.
///
/// The driver holds no per-run data, so one driver can serve any number of
/// states, including concurrently.
pub struct Driver {
    model_client: ModelClient,
    toolbox: Arc<Toolbox>,
    gate: AuthorizationGate,
    system_prompt: Option<String>,
    retry_policy: RetryPolicy,
    max_agent_turns: usize,
    on_transcript: Option<TranscriptFn>,
    on_transition: Option<TransitionFn>,
}

impl Driver {
    /// Returns the tools available to the model.
    #[inline]
    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    /// Appends a user input to an idle state and runs the workflow.
    pub async fn start<S: Into<String>>(
        &self,
        state: &mut WorkflowState,
        input: S,
    ) -> Result<Outcome, Error> {
        if !state.stage.is_idle() {
            return Err(Error::RunInProgress(state.stage));
        }
        state.stage = Stage::Start;
        state.last_auth_url = None;
        state.log.push(Turn::user(input));
        self.transition(state, Stage::Agent);
        self.run(state).await
    }

    /// Continues a run from where it stopped: after a suspension (the
    /// authorization is checked again) or after a failed step (the step is
    /// retried).
    pub async fn resume(
        &self,
        state: &mut WorkflowState,
    ) -> Result<Outcome, Error> {
        if state.stage == Stage::Start {
            return Err(Error::NothingToRun);
        }
        self.run(state).await
    }

    async fn run(&self, state: &mut WorkflowState) -> Result<Outcome, Error> {
        let span = debug_span!("workflow", user_id = %state.user_id);
        self.run_steps(state).instrument(span).await
    }

    async fn run_steps(
        &self,
        state: &mut WorkflowState,
    ) -> Result<Outcome, Error> {
        let mut agent_turns = 0;
        // A denial observed by CHECK_AUTH in this run, so that AUTHORIZE
        // doesn't query the backend a second time.
        let mut denial = None;

        loop {
            match state.stage {
                Stage::Start => return Err(Error::NothingToRun),
                Stage::Agent => {
                    if agent_turns == self.max_agent_turns {
                        return Err(Error::TurnLimitExceeded(
                            self.max_agent_turns,
                        ));
                    }
                    agent_turns += 1;

                    let turn = self.agent_step(&state.log).await?;
                    let next = if turn.tool_calls().is_empty() {
                        Stage::End
                    } else {
                        Stage::CheckAuth
                    };
                    state.log.push(turn);
                    self.transition(state, next);
                }
                Stage::CheckAuth => {
                    let next = match self.check_auth(state).await? {
                        GateDecision::Granted => {
                            state.last_auth_url = None;
                            Stage::Tools
                        }
                        decision @ GateDecision::Denied { .. } => {
                            denial = Some(decision);
                            Stage::Authorize
                        }
                    };
                    self.transition(state, next);
                }
                Stage::Authorize => {
                    let decision = match denial.take() {
                        Some(decision) => decision,
                        None => self.check_auth(state).await?,
                    };
                    match decision {
                        GateDecision::Granted => {
                            state.last_auth_url = None;
                            self.transition(state, Stage::Tools);
                        }
                        GateDecision::Denied {
                            tool_name,
                            resource_locator,
                        } => {
                            info!(
                                "waiting for {} to authorize {tool_name}",
                                state.user_id
                            );
                            state.last_auth_url = Some(resource_locator.clone());
                            return Ok(Outcome::Suspended {
                                tool_name,
                                auth_url: resource_locator,
                            });
                        }
                    }
                }
                Stage::Tools => {
                    self.execute_tools(state).await?;
                    self.transition(state, Stage::Agent);
                }
                Stage::End => {
                    let answer = state.log.answer().unwrap_or_default();
                    return Ok(Outcome::Finished {
                        answer: answer.to_owned(),
                    });
                }
            }
        }
    }

    fn transition(&self, state: &mut WorkflowState, next: Stage) {
        debug!("{} -> {next}", state.stage);
        if let Some(on_transition) = &self.on_transition {
            on_transition(state.stage, next);
        }
        state.stage = next;
    }
}
