use std::collections::HashMap;
use std::future::ready;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use toolgate_model::{ModelMessage, ToolCallRequest};
use toolgate_test_model::{PresetEvent, PresetResponse, TestModelProvider};

use super::*;
use crate::{Backend, BackendError};
use crate::auth::{AuthorizationStatus, Authorizer};
use crate::conversation::Role;
use crate::tool::{
    Error as ToolError, Tool, ToolCatalog, ToolOutput, ToolSpec,
};

const CONSENT_URL: &str = "https://auth.example/consent/123";

static EMPTY_SCHEMA: &Value = &Value::Null;

#[derive(Deserialize)]
struct SearchInput {
    query: String,
}

struct FakeWikiSearch;

impl Tool for FakeWikiSearch {
    type Input = SearchInput;

    fn name(&self) -> &str {
        "wiki_search"
    }

    fn description(&self) -> &str {
        "Searches Wikipedia"
    }

    fn parameter_schema(&self) -> &Value {
        EMPTY_SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolOutput> + Send + 'static {
        ready(if input.query == "fail" {
            Err(ToolError::execution_error()
                .with_reason("search backend is down"))
        } else {
            Ok(format!("Page: {0}\nSummary: All about {0}.", input.query))
        })
    }
}

/// A remote tool service that is both a catalog and an authorizer.
#[derive(Default)]
struct FakeRemote {
    statuses: Mutex<HashMap<String, AuthorizationStatus>>,
    auth_queries: Mutex<Vec<String>>,
    invocations: Mutex<Vec<String>>,
    /// How many invocations fail before the service is reachable again.
    outages: Mutex<usize>,
}

impl FakeRemote {
    fn set_status(&self, tool_name: &str, status: AuthorizationStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(tool_name.to_owned(), status);
    }

    fn pending() -> AuthorizationStatus {
        AuthorizationStatus::Pending {
            url: Some(CONSENT_URL.to_owned()),
        }
    }

    fn set_outages(&self, outages: usize) {
        *self.outages.lock().unwrap() = outages;
    }

    fn auth_queries(&self) -> usize {
        self.auth_queries.lock().unwrap().len()
    }

    fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCatalog for FakeRemote {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, BackendError> {
        Ok(vec![ToolSpec {
            name: "Gmail.SendEmail".to_owned(),
            description: "Sends an email".to_owned(),
            parameters: json!({ "type": "object" }),
            requires_authorization: true,
        }])
    }

    async fn invoke(&self, call: &ToolCallRequest, user_id: &str) -> ToolOutput {
        {
            let mut outages = self.outages.lock().unwrap();
            if *outages > 0 {
                *outages -= 1;
                return Err(ToolError::backend_unavailable()
                    .with_reason("connection refused"));
            }
        }
        self.invocations
            .lock()
            .unwrap()
            .push(format!("{}@{user_id}", call.name));
        Ok(format!("email sent to {}", call.arguments["recipient"]))
    }
}

#[async_trait]
impl Authorizer for FakeRemote {
    async fn authorize(
        &self,
        tool_name: &str,
        _user_id: &str,
    ) -> Result<AuthorizationStatus, BackendError> {
        self.auth_queries.lock().unwrap().push(tool_name.to_owned());
        self.statuses
            .lock()
            .unwrap()
            .get(tool_name)
            .cloned()
            .ok_or_else(|| BackendError::unavailable("connection reset"))
    }
}

fn tool_call(id: &str, name: &str, arguments: Value) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest {
        id: id.to_owned(),
        name: name.to_owned(),
        arguments,
    })
}

fn send_email(id: &str) -> PresetEvent {
    tool_call(
        id,
        "Gmail.SendEmail",
        json!({ "recipient": "bob@x.com", "subject": "Hello" }),
    )
}

struct Harness {
    driver: Driver,
    remote: Arc<FakeRemote>,
    model: TestModelProvider,
    transitions: Arc<Mutex<Vec<(Stage, Stage)>>>,
}

impl Harness {
    async fn new(model: TestModelProvider) -> Self {
        Self::with_builder(model, |builder| builder).await
    }

    async fn with_builder(
        model: TestModelProvider,
        customize: impl FnOnce(DriverBuilder) -> DriverBuilder,
    ) -> Self {
        let remote = Arc::new(FakeRemote::default());
        let transitions = Arc::new(Mutex::new(vec![]));
        let builder = DriverBuilder::with_model_provider(model.clone())
            .with_system_prompt("You are a helpful assistant.")
            .with_tool(FakeWikiSearch)
            .with_shared_catalog(Arc::clone(&remote) as Arc<dyn ToolCatalog>)
            .with_shared_authorizer(Arc::clone(&remote) as Arc<dyn Authorizer>)
            .on_transition({
                let transitions = Arc::clone(&transitions);
                move |from, to| transitions.lock().unwrap().push((from, to))
            });
        let driver = customize(builder).build().await.unwrap();
        Self {
            driver,
            remote,
            model,
            transitions,
        }
    }

    /// Returns the stages entered since the last call.
    fn take_path(&self) -> Vec<Stage> {
        self.transitions
            .lock()
            .unwrap()
            .drain(..)
            .map(|(_, to)| to)
            .collect()
    }
}

fn roles(state: &WorkflowState) -> Vec<Role> {
    state.log.turns().iter().map(|turn| turn.role()).collect()
}

#[tokio::test]
async fn test_answer_without_tools() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_text("Hello! How can I help?"));
    let harness = Harness::new(model).await;

    let mut state = WorkflowState::new("alice");
    let outcome = harness.driver.start(&mut state, "Hi").await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "Hello! How can I help?".to_owned()
        }
    );
    assert_eq!(harness.take_path(), [Stage::Agent, Stage::End]);
    assert_eq!(roles(&state), [Role::User, Role::Assistant]);
    assert_eq!(harness.model.recorded_requests().len(), 1);
    assert_eq!(harness.remote.auth_queries(), 0);
}

#[tokio::test]
async fn test_system_prompt_and_tools_in_request() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_text("Hi"));
    let harness = Harness::new(model).await;

    let mut state = WorkflowState::new("alice");
    harness.driver.start(&mut state, "Hi").await.unwrap();

    let requests = harness.model.recorded_requests();
    assert_eq!(
        requests[0].messages,
        [
            ModelMessage::system("You are a helpful assistant."),
            ModelMessage::user("Hi"),
        ]
    );
    let tool_names: Vec<_> =
        requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tool_names, ["wiki_search", "Gmail.SendEmail"]);
    // The system prompt never enters the log.
    assert_eq!(state.log.len(), 2);
}

#[tokio::test]
async fn test_tool_without_authorization() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([tool_call(
        "call_1",
        "wiki_search",
        json!({ "query": "otters" }),
    )]));
    model.add_assistant_turn(PresetResponse::with_text(
        "Otters are semiaquatic mammals.",
    ));
    let harness = Harness::new(model).await;

    let mut state = WorkflowState::new("alice");
    let outcome = harness
        .driver
        .start(&mut state, "Search Wikipedia for otters")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "Otters are semiaquatic mammals.".to_owned()
        }
    );
    assert_eq!(
        harness.take_path(),
        [
            Stage::Agent,
            Stage::CheckAuth,
            Stage::Tools,
            Stage::Agent,
            Stage::End
        ]
    );
    assert_eq!(
        roles(&state),
        [Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    let result = state.log.turns()[2].tool_result().unwrap();
    assert_eq!(result.call_id, "call_1");
    assert!(result.content.starts_with("Page: otters"));
    assert_eq!(harness.remote.auth_queries(), 0);
}

#[tokio::test]
async fn test_suspend_until_authorized() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    model.add_assistant_turn(PresetResponse::with_text("The email was sent."));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", FakeRemote::pending());

    let mut state = WorkflowState::new("alice");
    let outcome = harness
        .driver
        .start(&mut state, "Email bob@x.com saying hello")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Suspended {
            tool_name: "Gmail.SendEmail".to_owned(),
            auth_url: CONSENT_URL.to_owned(),
        }
    );
    assert_eq!(state.stage, Stage::Authorize);
    assert_eq!(state.last_auth_url.as_deref(), Some(CONSENT_URL));
    assert_eq!(roles(&state), [Role::User, Role::Assistant]);
    assert!(harness.remote.invocations().is_empty());
    assert_eq!(
        harness.take_path(),
        [Stage::Agent, Stage::CheckAuth, Stage::Authorize]
    );
    // CHECK_AUTH's answer is reused by AUTHORIZE.
    assert_eq!(harness.remote.auth_queries(), 1);

    // Still pending: suspends again without touching the log.
    let outcome = harness.driver.resume(&mut state).await.unwrap();
    assert!(matches!(outcome, Outcome::Suspended { .. }));
    assert_eq!(state.log.len(), 2);
    assert!(harness.take_path().is_empty());

    harness
        .remote
        .set_status("Gmail.SendEmail", AuthorizationStatus::Completed);
    let outcome = harness.driver.resume(&mut state).await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "The email was sent.".to_owned()
        }
    );
    assert_eq!(
        harness.take_path(),
        [Stage::Tools, Stage::Agent, Stage::End]
    );
    assert_eq!(state.last_auth_url, None);
    assert_eq!(harness.remote.invocations(), ["Gmail.SendEmail@alice"]);
    assert_eq!(harness.remote.auth_queries(), 3);
    let result = state.log.turns()[2].tool_result().unwrap();
    assert_eq!(result.content, "email sent to \"bob@x.com\"");
}

#[tokio::test]
async fn test_authorized_tool_never_suspends() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    model.add_assistant_turn(PresetResponse::with_text("Done."));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", AuthorizationStatus::Completed);

    let mut state = WorkflowState::new("alice");
    let outcome = harness.driver.start(&mut state, "Email Bob").await.unwrap();

    assert!(matches!(outcome, Outcome::Finished { .. }));
    assert!(!harness.take_path().contains(&Stage::Authorize));
    assert_eq!(state.last_auth_url, None);
}

#[tokio::test]
async fn test_check_auth_is_idempotent() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", FakeRemote::pending());

    let mut state = WorkflowState::new("alice");
    harness.driver.start(&mut state, "Email Bob").await.unwrap();
    let log = state.log.clone();

    let first = harness.driver.check_auth(&state).await.unwrap();
    let second = harness.driver.check_auth(&state).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        GateDecision::Denied {
            tool_name: "Gmail.SendEmail".to_owned(),
            resource_locator: CONSENT_URL.to_owned(),
        }
    );
    assert_eq!(state.log, log);
}

#[tokio::test]
async fn test_check_auth_after_completion_is_idempotent() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", FakeRemote::pending());

    let mut state = WorkflowState::new("alice");
    harness.driver.start(&mut state, "Email Bob").await.unwrap();
    harness
        .remote
        .set_status("Gmail.SendEmail", AuthorizationStatus::Completed);
    let log = state.log.clone();

    for _ in 0..2 {
        let decision = harness.driver.check_auth(&state).await.unwrap();
        assert_eq!(decision, GateDecision::Granted);
        assert_eq!(state.log, log);
    }
    assert_eq!(state.stage, Stage::Authorize);
    assert!(harness.remote.invocations().is_empty());
}

#[tokio::test]
async fn test_tool_backend_unavailable_is_resumable() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([
        tool_call("call_1", "wiki_search", json!({ "query": "otters" })),
        send_email("call_2"),
    ]));
    model.add_assistant_turn(PresetResponse::with_text("Sent."));
    let harness = Harness::with_builder(model, |builder| {
        builder.with_retry_policy(RetryPolicy::none())
    })
    .await;
    harness
        .remote
        .set_status("Gmail.SendEmail", AuthorizationStatus::Completed);
    harness.remote.set_outages(1);

    let mut state = WorkflowState::new("alice");
    let err = harness.driver.start(&mut state, "Email Bob").await.unwrap_err();
    assert!(matches!(
        err,
        Error::BackendUnavailable {
            backend: Backend::Tools,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(state.stage, Stage::Tools);
    // The search went through; only the email is still pending.
    assert_eq!(
        roles(&state),
        [Role::User, Role::Assistant, Role::Tool]
    );
    let pending: Vec<_> = state
        .log
        .pending_tool_calls()
        .into_iter()
        .map(|call| call.id)
        .collect();
    assert_eq!(pending, ["call_2"]);
    assert_eq!(harness.model.recorded_requests().len(), 1);

    let outcome = harness.driver.resume(&mut state).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "Sent.".to_owned()
        }
    );
    assert_eq!(harness.remote.invocations(), ["Gmail.SendEmail@alice"]);
    let call_ids: Vec<_> = state
        .log
        .turns()
        .iter()
        .filter_map(|turn| turn.tool_result())
        .map(|result| result.call_id.as_str())
        .collect();
    assert_eq!(call_ids, ["call_1", "call_2"]);
}

#[tokio::test(start_paused = true)]
async fn test_tool_backend_outage_is_retried() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    model.add_assistant_turn(PresetResponse::with_text("Sent."));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", AuthorizationStatus::Completed);
    harness.remote.set_outages(2);

    let mut state = WorkflowState::new("alice");
    let outcome = harness.driver.start(&mut state, "Email Bob").await.unwrap();

    assert!(matches!(outcome, Outcome::Finished { .. }));
    assert_eq!(harness.remote.invocations(), ["Gmail.SendEmail@alice"]);
    let result = state.log.turns()[2].tool_result().unwrap();
    assert_eq!(result.content, "email sent to \"bob@x.com\"");
}

#[tokio::test]
async fn test_all_results_precede_next_agent_step() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([
        tool_call("call_1", "wiki_search", json!({ "query": "otters" })),
        send_email("call_2"),
        tool_call("call_3", "wiki_search", json!({ "query": "beavers" })),
    ]));
    model.add_assistant_turn(PresetResponse::with_text("Done."));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", AuthorizationStatus::Completed);

    let mut state = WorkflowState::new("alice");
    harness.driver.start(&mut state, "Do it all").await.unwrap();

    let requests = harness.model.recorded_requests();
    assert_eq!(requests.len(), 2);
    let call_ids: Vec<_> = requests[1]
        .messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Tool(result) => Some(result.call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(call_ids, ["call_1", "call_2", "call_3"]);
    assert!(matches!(
        requests[1].messages.last(),
        Some(ModelMessage::Tool(_))
    ));
}

#[tokio::test]
async fn test_tool_failures_become_results() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([
        tool_call("call_1", "wiki_search", json!({ "query": "fail" })),
        tool_call("call_2", "Nope.Unknown", json!({})),
        tool_call("call_3", "wiki_search", json!({ "q": "missing field" })),
    ]));
    model.add_assistant_turn(PresetResponse::with_text("Sorry."));
    let harness = Harness::new(model).await;

    let mut state = WorkflowState::new("alice");
    let outcome = harness.driver.start(&mut state, "Try").await.unwrap();
    assert!(matches!(outcome, Outcome::Finished { .. }));

    let contents: Vec<_> = state
        .log
        .turns()
        .iter()
        .filter_map(|turn| turn.tool_result())
        .map(|result| result.content.as_str())
        .collect();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0], "Error: search backend is down");
    assert_eq!(contents[1], "Error: no tool named `Nope.Unknown`");
    assert!(contents[2].starts_with("Error: "));
}

#[tokio::test(start_paused = true)]
async fn test_model_retries_transient_failures() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(
        PresetResponse::with_text("Finally.").with_failures(2),
    );
    let harness = Harness::new(model).await;

    let mut state = WorkflowState::new("alice");
    let outcome = harness.driver.start(&mut state, "Hi").await.unwrap();

    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "Finally.".to_owned()
        }
    );
    assert_eq!(harness.model.recorded_requests().len(), 3);
}

#[tokio::test]
async fn test_model_unavailable_is_resumable() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_text("Back.").with_failures(1));
    let harness = Harness::with_builder(model, |builder| {
        builder.with_retry_policy(RetryPolicy::none())
    })
    .await;

    let mut state = WorkflowState::new("alice");
    let err = harness.driver.start(&mut state, "Hi").await.unwrap_err();
    assert!(matches!(
        err,
        Error::BackendUnavailable {
            backend: Backend::Model,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(state.stage, Stage::Agent);
    assert_eq!(roles(&state), [Role::User]);

    let outcome = harness.driver.resume(&mut state).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "Back.".to_owned()
        }
    );
}

#[tokio::test]
async fn test_authorization_backend_unavailable() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    let harness = Harness::with_builder(model, |builder| {
        builder.with_retry_policy(RetryPolicy::none())
    })
    .await;

    let mut state = WorkflowState::new("alice");
    let err = harness.driver.start(&mut state, "Email Bob").await.unwrap_err();
    assert!(matches!(
        err,
        Error::BackendUnavailable {
            backend: Backend::Authorization,
            ..
        }
    ));
    assert_eq!(state.stage, Stage::CheckAuth);
    assert!(harness.remote.invocations().is_empty());
}

#[tokio::test]
async fn test_run_in_progress() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", FakeRemote::pending());

    let mut state = WorkflowState::new("alice");
    let err = harness.driver.resume(&mut state).await.unwrap_err();
    assert!(matches!(err, Error::NothingToRun));

    harness.driver.start(&mut state, "Email Bob").await.unwrap();
    let err = harness.driver.start(&mut state, "Hello?").await.unwrap_err();
    assert!(matches!(err, Error::RunInProgress(Stage::Authorize)));
    assert_eq!(state.log.len(), 2);
}

#[tokio::test]
async fn test_abandon_then_continue() {
    let mut model = TestModelProvider::default();
    model.add_assistant_turn(PresetResponse::with_events([send_email("call_1")]));
    model.add_assistant_turn(PresetResponse::with_text("Okay, I won't."));
    let harness = Harness::new(model).await;
    harness
        .remote
        .set_status("Gmail.SendEmail", FakeRemote::pending());

    let mut state = WorkflowState::new("alice");
    harness.driver.start(&mut state, "Email Bob").await.unwrap();
    state.abandon();
    assert_eq!(state.stage, Stage::End);

    let outcome = harness
        .driver
        .start(&mut state, "Never mind")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Finished {
            answer: "Okay, I won't.".to_owned()
        }
    );
    assert_eq!(
        roles(&state),
        [
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::User,
            Role::Assistant
        ]
    );
    assert!(harness.remote.invocations().is_empty());
}

#[tokio::test]
async fn test_turn_limit() {
    let mut model = TestModelProvider::default();
    for i in 0..3 {
        model.add_assistant_turn(PresetResponse::with_events([tool_call(
            &format!("call_{i}"),
            "wiki_search",
            json!({ "query": "recursion" }),
        )]));
    }
    let harness = Harness::with_builder(model, |builder| {
        builder.with_max_agent_turns(2)
    })
    .await;

    let mut state = WorkflowState::new("alice");
    let err = harness.driver.start(&mut state, "Loop").await.unwrap_err();
    assert!(matches!(err, Error::TurnLimitExceeded(2)));
    assert_eq!(state.stage, Stage::Agent);
    assert_eq!(harness.model.recorded_requests().len(), 2);
}

#[tokio::test]
async fn test_authorizer_is_required() {
    let model = TestModelProvider::default();
    let result = DriverBuilder::with_model_provider(model)
        .with_catalog(FakeRemote::default())
        .build()
        .await;
    assert!(matches!(result, Err(Error::Configuration(_))));

    let result = DriverBuilder::with_model_provider(TestModelProvider::default())
        .with_tool(FakeWikiSearch)
        .build()
        .await;
    assert!(result.is_ok());
}
