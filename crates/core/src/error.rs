use std::fmt::{self, Display};

use thiserror::Error;
use toolgate_model::ErrorKind as ModelErrorKind;

use crate::backend::BackendError;
use crate::workflow::Stage;

/// The external collaborator a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// The language model provider.
    Model,
    /// The authorization backend.
    Authorization,
    /// The tool catalog backend.
    Tools,
}

impl Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Model => write!(f, "model"),
            Backend::Authorization => write!(f, "authorization"),
            Backend::Tools => write!(f, "tool"),
        }
    }
}

/// Hard failures of a workflow run.
///
/// Pending authorizations and failed tool invocations are not errors, they
/// are absorbed into the conversation (see [`crate::Outcome`]).
#[derive(Debug, Error)]
pub enum Error {
    /// The driver cannot be assembled from the given parts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A backend could not be reached, even after retrying.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable {
        /// Which backend failed.
        backend: Backend,
        /// What the backend (or the transport) reported.
        reason: String,
    },

    /// A backend refused the request.
    #[error("{backend} backend rejected the request: {reason}")]
    BackendRejected {
        /// Which backend failed.
        backend: Backend,
        /// What the backend reported.
        reason: String,
    },

    /// The model failed in a way that retrying will not fix.
    #[error("model error ({kind}): {reason}")]
    Model {
        /// Kind reported by the provider.
        kind: ModelErrorKind,
        /// What the provider reported.
        reason: String,
    },

    /// A new input was given while the previous run has not finished.
    #[error("the previous run is still at stage {0}")]
    RunInProgress(Stage),

    /// There is no user input to respond to.
    #[error("there is nothing to run")]
    NothingToRun,

    /// The agent kept requesting tools for too many turns.
    #[error("the agent did not finish within {0} turns")]
    TurnLimitExceeded(usize),
}

impl Error {
    pub(crate) fn from_backend(backend: Backend, err: BackendError) -> Self {
        let reason = err.message().to_owned();
        if err.is_transient() {
            Error::BackendUnavailable { backend, reason }
        } else {
            Error::BackendRejected { backend, reason }
        }
    }

    /// Returns `true` if resuming the same workflow state may succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::BackendUnavailable { .. } | Error::TurnLimitExceeded(_)
        )
    }
}
