//! Per-user authorization of tools.
//!
//! Some tools act on behalf of a user (sending an email, starring a
//! repository) and need that user to grant access first, usually through an
//! OAuth consent page. The [`AuthorizationGate`] asks the [`Authorizer`]
//! backend whether the grant exists and, when it does not, hands back the
//! URL the user must visit. Granting happens out of band; the gate only
//! observes the status and never caches it beyond a single check.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolgate_model::ToolCallRequest;

use crate::BackendError;
use crate::tool::Toolbox;

/// The authorization status of a tool for a user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuthorizationStatus {
    /// The user has granted access.
    Completed,
    /// The user has not granted access yet.
    Pending {
        /// Where the user can grant access.
        url: Option<String>,
    },
}

/// A backend that knows whether a user has authorized a tool.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Queries (and, if needed, initiates) the authorization of `tool_name`
    /// for `user_id`.
    ///
    /// This must not block until the user completes the authorization.
    async fn authorize(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<AuthorizationStatus, BackendError>;
}

/// An authorizer that grants everything. Useful when all tools are
/// local.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(
        &self,
        _tool_name: &str,
        _user_id: &str,
    ) -> Result<AuthorizationStatus, BackendError> {
        Ok(AuthorizationStatus::Completed)
    }
}

/// The outcome of an authorization check.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateDecision {
    /// The workflow may execute the tool(s).
    Granted,
    /// The user must visit `resource_locator` before `tool_name` can run.
    Denied {
        /// The tool waiting for authorization.
        tool_name: String,
        /// The URL to present to the user.
        resource_locator: String,
    },
}

/// Decides whether a user may currently invoke a tool.
#[derive(Clone)]
pub struct AuthorizationGate {
    authorizer: Arc<dyn Authorizer>,
    toolbox: Arc<Toolbox>,
}

impl AuthorizationGate {
    /// Creates a gate for the tools in `toolbox`.
    #[inline]
    pub fn new(authorizer: Arc<dyn Authorizer>, toolbox: Arc<Toolbox>) -> Self {
        Self {
            authorizer,
            toolbox,
        }
    }

    /// Checks a single tool.
    ///
    /// Tools that don't require authorization, and tools unknown to the
    /// toolbox, are granted without asking the backend. Unknown tools will
    /// fail when executed, which the model gets to see.
    pub async fn check(
        &self,
        tool_name: &str,
        user_id: &str,
    ) -> Result<GateDecision, BackendError> {
        let requires_authorization = self
            .toolbox
            .spec(tool_name)
            .is_some_and(|spec| spec.requires_authorization);
        if !requires_authorization {
            trace!("{tool_name} needs no authorization");
            return Ok(GateDecision::Granted);
        }

        match self.authorizer.authorize(tool_name, user_id).await? {
            AuthorizationStatus::Completed => {
                debug!("{tool_name} is authorized for {user_id}");
                Ok(GateDecision::Granted)
            }
            AuthorizationStatus::Pending { url: Some(url) } => {
                debug!("{tool_name} is not authorized for {user_id} yet");
                Ok(GateDecision::Denied {
                    tool_name: tool_name.to_owned(),
                    resource_locator: url,
                })
            }
            AuthorizationStatus::Pending { url: None } => {
                Err(BackendError::rejected(format!(
                    "authorization of {tool_name} is pending, \
                     but no url was provided"
                )))
            }
        }
    }

    /// Checks every tool requested by `calls`, in request order. Each tool
    /// is checked once even if it's requested several times. Returns the
    /// first denial, if any.
    pub async fn check_calls(
        &self,
        calls: &[ToolCallRequest],
        user_id: &str,
    ) -> Result<GateDecision, BackendError> {
        let mut checked = HashSet::new();
        for call in calls {
            if !checked.insert(call.name.as_str()) {
                continue;
            }
            let decision = self.check(&call.name, user_id).await?;
            if decision != GateDecision::Granted {
                return Ok(decision);
            }
        }
        Ok(GateDecision::Granted)
    }
}
