use std::fmt::{self, Display};

/// The kind of failure reported by a remote backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// The backend could not be reached or failed on its side. The same
    /// request may succeed later.
    Unavailable,
    /// The backend understood the request and refused it.
    Rejected,
}

impl Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::Unavailable => write!(f, "Unavailable"),
            BackendErrorKind::Rejected => write!(f, "Rejected"),
        }
    }
}

/// An error from the authorization or tool backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    /// Creates a new error with the `Unavailable` kind.
    #[inline]
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self {
            kind: BackendErrorKind::Unavailable,
            message: message.into(),
        }
    }

    /// Creates a new error with the `Rejected` kind.
    #[inline]
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self {
            kind: BackendErrorKind::Rejected,
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if retrying the request may help.
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Unavailable
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BackendError {}
