use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RummageError {
    // Config
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // Lifecycle
    #[error("a search is already running on this coordinator")]
    AlreadyRunning,

    #[error("cannot start a search on a null target and no default target is configured")]
    NullTarget,

    #[error("coordinator was built for a single run and has been released")]
    Released,

    #[error("search session aborted: {0}")]
    SessionAborted(String),

    // Traversal
    #[error("property `{key}` is not readable: {reason}")]
    PropertyAccess { key: String, reason: String },

    #[error("strategy `{strategy}` failed: {reason}")]
    StrategyFault { strategy: String, reason: String },

    #[error("branch `{strategy}` failed: {reason}")]
    BranchFault { strategy: String, reason: String },

    // Terminal
    #[error("we haven't been able to resolve this case, yet")]
    Unresolved,
}

impl RummageError {
    /// Shorthand for [`RummageError::InvalidArgument`].
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The strategy this error occurred in, if applicable.
    /// Callers use this to present "Skipped: <strategy>" without matching on variants.
    pub fn strategy(&self) -> Option<&str> {
        match self {
            Self::StrategyFault { strategy, .. } | Self::BranchFault { strategy, .. } => {
                Some(strategy)
            }
            _ => None,
        }
    }

    /// Whether the search can continue after this error.
    ///
    /// Recoverable errors (an unreadable property, a strategy failing on one
    /// node, a branch failing) are reported to the error listener and the
    /// session keeps going.
    ///
    /// Configuration and lifecycle errors are returned to the caller before
    /// any traversal happens. `Unresolved` is the terminal "nothing found".
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PropertyAccess { .. } | Self::StrategyFault { .. } | Self::BranchFault { .. }
        )
    }
}
