use std::sync::Arc;

use toolgate_model::ModelProvider;

use super::{Driver, Stage, TransitionFn};
use crate::auth::{AllowAll, AuthorizationGate, Authorizer};
use crate::error::{Backend, Error};
use crate::model_client::{ModelClient, TranscriptFn};
use crate::retry::RetryPolicy;
use crate::tool::{LocalTools, Tool, ToolCatalog, Toolbox};

const DEFAULT_MAX_AGENT_TURNS: usize = 25;

/// [`Driver`] builder.
pub struct DriverBuilder {
    model_client: ModelClient,
    system_prompt: Option<String>,
    local_tools: LocalTools,
    catalogs: Vec<Arc<dyn ToolCatalog>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    retry_policy: RetryPolicy,
    max_agent_turns: usize,
    on_transcript: Option<TranscriptFn>,
    on_transition: Option<TransitionFn>,
}

impl DriverBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_model_client(ModelClient::new(provider))
    }

    /// Creates a new builder around a client that may be shared with tools.
    /// The driver retries with its own policy, whatever the client's is.
    #[inline]
    pub fn with_model_client(model_client: ModelClient) -> Self {
        Self {
            model_client,
            system_prompt: None,
            local_tools: LocalTools::default(),
            catalogs: vec![],
            authorizer: None,
            retry_policy: RetryPolicy::default(),
            max_agent_turns: DEFAULT_MAX_AGENT_TURNS,
            on_transcript: None,
            on_transition: None,
        }
    }

    /// Sets the system prompt sent ahead of the conversation. It's never
    /// stored in the message log.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers an in-process tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.local_tools.add_tool(tool);
        self
    }

    /// Registers a tool catalog. In-process tools take precedence over
    /// catalogs, and catalogs over those registered after them.
    #[inline]
    pub fn with_catalog<C: ToolCatalog + 'static>(self, catalog: C) -> Self {
        self.with_shared_catalog(Arc::new(catalog))
    }

    /// Like [`Self::with_catalog`], for a catalog shared with something
    /// else (e.g. a backend that's also the authorizer).
    #[inline]
    pub fn with_shared_catalog(mut self, catalog: Arc<dyn ToolCatalog>) -> Self {
        self.catalogs.push(catalog);
        self
    }

    /// Sets the authorization backend. Without one, only tools that need no
    /// authorization can be registered.
    #[inline]
    pub fn with_authorizer<A: Authorizer + 'static>(self, authorizer: A) -> Self {
        self.with_shared_authorizer(Arc::new(authorizer))
    }

    /// Like [`Self::with_authorizer`], for a shared authorizer.
    #[inline]
    pub fn with_shared_authorizer(
        mut self,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Sets how transient backend failures are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets how many agent steps one run may take before giving up.
    #[inline]
    pub fn with_max_agent_turns(mut self, max_agent_turns: usize) -> Self {
        self.max_agent_turns = max_agent_turns.max(1);
        self
    }

    /// Attaches a callback receiving the text of every assistant turn once
    /// the turn is complete.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Attaches a callback invoked on every stage transition, with the
    /// stage left and the stage entered.
    #[inline]
    pub fn on_transition(
        mut self,
        on_transition: impl Fn(Stage, Stage) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition = Some(Box::new(on_transition));
        self
    }

    /// Lists the tools of every catalog and builds the driver.
    pub async fn build(self) -> Result<Driver, Error> {
        let mut catalogs = Vec::with_capacity(self.catalogs.len() + 1);
        if !self.local_tools.is_empty() {
            catalogs.push(Arc::new(self.local_tools) as Arc<dyn ToolCatalog>);
        }
        catalogs.extend(self.catalogs);

        let toolbox = Toolbox::load(catalogs)
            .await
            .map_err(|err| Error::from_backend(Backend::Tools, err))?;
        let toolbox = Arc::new(toolbox);

        let authorizer: Arc<dyn Authorizer> = match self.authorizer {
            Some(authorizer) => authorizer,
            None => {
                if let Some(spec) = toolbox
                    .specs()
                    .iter()
                    .find(|spec| spec.requires_authorization)
                {
                    return Err(Error::Configuration(format!(
                        "{} requires authorization, but no authorizer is set",
                        spec.name
                    )));
                }
                Arc::new(AllowAll)
            }
        };

        Ok(Driver {
            model_client: self
                .model_client
                .with_retry_policy(self.retry_policy.clone()),
            gate: AuthorizationGate::new(authorizer, Arc::clone(&toolbox)),
            toolbox,
            system_prompt: self.system_prompt,
            retry_policy: self.retry_policy,
            max_agent_turns: self.max_agent_turns,
            on_transcript: self.on_transcript,
            on_transition: self.on_transition,
        })
    }
}
