use std::sync::Arc;

use toolgate_core::auth::Authorizer;
use toolgate_core::tool::ToolCatalog;
use toolgate_core::{
    Driver, DriverBuilder, Error, ModelClient, Outcome, RetryPolicy, Stage,
    WorkflowState,
};
use toolgate_model::ModelProvider;

use crate::tools::{ChitChatTool, SummarizeTool, WikiSearchTool};

const FAREWELLS: [&str; 5] = ["no", "bye", "exit", "quit", "thanks"];

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    driver_builder: DriverBuilder,
    model_client: ModelClient,
    user_id: String,
    with_builtin_tools: bool,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let model_client = ModelClient::new(provider);
        Self {
            driver_builder: DriverBuilder::with_model_client(model_client.clone()),
            model_client,
            user_id: "default-user".to_owned(),
            with_builtin_tools: true,
        }
    }

    /// Sets the system prompt for the assistant.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.driver_builder = self.driver_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the user that remote tools act on behalf of.
    #[inline]
    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Leaves out the built-in `wiki_search`, `chit_chat` and `summarize`
    /// tools.
    #[inline]
    pub fn without_builtin_tools(mut self) -> Self {
        self.with_builtin_tools = false;
        self
    }

    /// Adds a remote tool catalog.
    #[inline]
    pub fn with_shared_catalog(mut self, catalog: Arc<dyn ToolCatalog>) -> Self {
        self.driver_builder = self.driver_builder.with_shared_catalog(catalog);
        self
    }

    /// Sets the authorization backend of the remote tools.
    #[inline]
    pub fn with_shared_authorizer(
        mut self,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        self.driver_builder =
            self.driver_builder.with_shared_authorizer(authorizer);
        self
    }

    /// Sets how transient backend failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.driver_builder = self.driver_builder.with_retry_policy(retry_policy);
        self
    }

    /// Attaches a callback to be invoked when a transcript is generated.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.driver_builder = self.driver_builder.on_transcript(on_transcript);
        self
    }

    /// Attaches a callback to be invoked when the workflow moves to another
    /// stage.
    #[inline]
    pub fn on_transition(
        mut self,
        on_transition: impl Fn(Stage, Stage) + Send + Sync + 'static,
    ) -> Self {
        self.driver_builder = self.driver_builder.on_transition(on_transition);
        self
    }

    /// Builds a new session. This lists the tools of every catalog.
    pub async fn build(self) -> Result<Session, Error> {
        let mut driver_builder = self.driver_builder;
        if self.with_builtin_tools {
            let wiki_search = WikiSearchTool::new().map_err(|err| {
                Error::Configuration(format!("cannot create wiki_search: {err}"))
            })?;
            driver_builder = driver_builder
                .with_tool(wiki_search)
                .with_tool(ChitChatTool::new(self.model_client.clone()))
                .with_tool(SummarizeTool::new(self.model_client));
        }
        let driver = driver_builder.build().await?;
        Ok(Session {
            driver,
            state: WorkflowState::new(self.user_id),
        })
    }
}

/// What the session has to say after an input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reply {
    /// The operator ended the conversation.
    Goodbye,
    /// The assistant's answer.
    Answer(String),
    /// The operator must authorize a tool in the browser, then
    /// [`Session::resume`] (or [`Session::abandon`]) the conversation.
    AuthorizationRequired {
        /// The tool waiting for authorization.
        tool_name: String,
        /// Where to authorize it.
        url: String,
    },
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Finished { answer } => Reply::Answer(answer),
            Outcome::Suspended {
                tool_name,
                auth_url,
            } => Reply::AuthorizationRequired {
                tool_name,
                url: auth_url,
            },
        }
    }
}

/// A chat session with one operator.
///
/// The session owns the conversation state and a fully configured workflow
/// driver, and is basically a wrapper around [`Driver`].
pub struct Session {
    driver: Driver,
    state: WorkflowState,
}

impl Session {
    /// Returns `true` if `input` ends the conversation.
    pub fn is_farewell(input: &str) -> bool {
        let input = input.trim();
        input.is_empty()
            || FAREWELLS
                .iter()
                .any(|farewell| input.eq_ignore_ascii_case(farewell))
    }

    /// Handles an operator input. Farewells end the conversation without
    /// reaching the model.
    pub async fn handle_input(&mut self, input: &str) -> Result<Reply, Error> {
        if Self::is_farewell(input) {
            info!("the operator said goodbye");
            return Ok(Reply::Goodbye);
        }
        let outcome = self.driver.start(&mut self.state, input.trim()).await?;
        Ok(outcome.into())
    }

    /// Continues after an authorization was granted, or retries the step
    /// that failed.
    pub async fn resume(&mut self) -> Result<Reply, Error> {
        let outcome = self.driver.resume(&mut self.state).await?;
        Ok(outcome.into())
    }

    /// Gives up the pending run. The conversation can go on with a new
    /// input.
    #[inline]
    pub fn abandon(&mut self) {
        self.state.abandon();
    }

    /// Returns the conversation state.
    #[inline]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }
}
