//! Remote tools and per-user authorization backed by the
//! [Arcade](https://arcade.dev) API.
//!
//! [`ArcadeClient`] is both a [`ToolCatalog`] and an [`Authorizer`]: it
//! lists the configured toolkits, asks whether a user has granted a tool
//! (starting the OAuth flow if not), and executes tools on the user's
//! behalf.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use toolgate_core::BackendError;
use toolgate_core::auth::{AuthorizationStatus, Authorizer};
use toolgate_core::tool::{Error as ToolError, ToolCatalog, ToolOutput, ToolSpec};
use toolgate_model::ToolCallRequest;

pub use config::{ArcadeConfig, ArcadeConfigBuilder};
use proto::{
    AuthorizationResponse, AuthorizeRequest, ErrorBody, ExecuteRequest,
    ExecuteResponse, ToolDefinition, ToolPage,
};

const PAGE_SIZE: usize = 100;

/// A client of the Arcade API.
#[derive(Clone, Debug)]
pub struct ArcadeClient {
    client: Client,
    config: Arc<ArcadeConfig>,
}

impl ArcadeClient {
    /// Creates a new `ArcadeClient` with the given configuration.
    ///
    /// Fails if the HTTP client cannot be initialized (e.g. no TLS backend
    /// is usable).
    pub fn new(config: ArcadeConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                BackendError::rejected(format!("cannot create http client: {err}"))
            })?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, BackendError> {
        let resp = req
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_status(status, &body));
        }
        resp.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                BackendError::rejected(format!("malformed response: {err}"))
            } else {
                transport_error(err)
            }
        })
    }

    async fn list_toolkit(
        &self,
        toolkit: Option<&str>,
    ) -> Result<Vec<ToolDefinition>, BackendError> {
        let mut definitions = vec![];
        loop {
            let mut params = vec![
                ("limit", PAGE_SIZE.to_string()),
                ("offset", definitions.len().to_string()),
            ];
            if let Some(toolkit) = toolkit {
                params.push(("toolkit", toolkit.to_owned()));
            }
            let url = Url::parse_with_params(&self.endpoint("tools"), &params)
                .map_err(|err| BackendError::rejected(err.to_string()))?;

            let page: ToolPage = self.send(self.client.get(url)).await?;
            let count = page.items.len();
            definitions.extend(page.items);
            if count < PAGE_SIZE {
                break;
            }
        }
        Ok(definitions)
    }

    async fn get_tool(
        &self,
        name: &str,
    ) -> Result<ToolDefinition, BackendError> {
        let url = self.endpoint(&format!("tools/{name}"));
        self.send(self.client.get(url)).await
    }
}

/// Classifies a failure to exchange a request with the API. Only a request
/// that couldn't even be built is rejected, everything else (refused, reset
/// or timed out connections, bodies cut short) may work on the next try.
fn transport_error(err: reqwest::Error) -> BackendError {
    warn!("arcade request failed: {err}");
    if err.is_builder() {
        BackendError::rejected(err.to_string())
    } else {
        BackendError::unavailable(err.to_string())
    }
}

fn error_from_status(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|body| body.message)
        .unwrap_or_else(|_| body.trim().to_owned());
    let message = format!("{status}: {message}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BackendError::unavailable(message)
    } else {
        BackendError::rejected(message)
    }
}

#[async_trait]
impl ToolCatalog for ArcadeClient {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, BackendError> {
        let mut definitions = vec![];
        if self.config.toolkits.is_empty() && self.config.tools.is_empty() {
            definitions = self.list_toolkit(None).await?;
        }
        for toolkit in &self.config.toolkits {
            definitions.extend(self.list_toolkit(Some(toolkit)).await?);
        }
        for name in &self.config.tools {
            definitions.push(self.get_tool(name).await?);
        }

        let mut seen = HashSet::new();
        let specs: Vec<_> = definitions
            .iter()
            .map(ToolDefinition::to_spec)
            .filter(|spec| seen.insert(spec.name.clone()))
            .collect();
        debug!("listed {} arcade tools", specs.len());
        Ok(specs)
    }

    async fn invoke(&self, call: &ToolCallRequest, user_id: &str) -> ToolOutput {
        let req = self.client.post(self.endpoint("tools/execute")).json(
            &ExecuteRequest {
                tool_name: &call.name,
                input: &call.arguments,
                user_id,
            },
        );
        match self.send::<ExecuteResponse>(req).await {
            Ok(resp) => resp.into_output().map_err(|reason| {
                ToolError::execution_error().with_reason(reason)
            }),
            Err(err) if err.is_transient() => {
                Err(ToolError::backend_unavailable().with_reason(err.message()))
            }
            Err(err) => {
                Err(ToolError::execution_error().with_reason(err.message()))
            }
        }
    }
}

#[async_trait]
impl Authorizer for ArcadeClient {
    async fn authorize(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationStatus, BackendError> {
        let req = self
            .client
            .post(self.endpoint("tools/authorize"))
            .json(&AuthorizeRequest { tool_name, user_id });
        let resp: AuthorizationResponse = self.send(req).await?;
        trace!("authorization of {tool_name}: {}", resp.status);
        resp.into_status()
    }
}
