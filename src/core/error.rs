//! Error types for the router core
//!
//! Provider adapters map upstream HTTP status onto [`ProviderError`]:
//! 429 becomes `RateLimited`, 401/403 become `AuthFailed`, 400 becomes
//! `InvalidRequest`, and 5xx/transport failures become `Unavailable`.
//! Fatal errors stop the attempt loop; retryable errors move it to the
//! next candidate.

/// Errors returned by provider adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("provider unavailable: {message}")]
    Unavailable { message: String },
}

impl ProviderError {
    /// Fatal errors must not be retried against another candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthFailed { .. } | ProviderError::InvalidRequest { .. }
        )
    }

    /// Retryable errors cause the router to try the next candidate.
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }
}

/// Errors returned by quota stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// The reservation amount does not fit the remaining daily budget.
    /// Retryable: the router moves on to the next candidate.
    #[error("quota exceeded for account {account_id}")]
    Exceeded { account_id: String },

    /// A reserve presented an idempotency key that was already used.
    /// The router generates a fresh UUID per attempt, so this only
    /// surfaces for external misuse of a store.
    #[error("duplicate idempotency key {key}")]
    DuplicateKey { key: String },

    /// Backend failure (network, transaction) in a distributed store.
    #[error("quota store error: {message}")]
    Store { message: String },
}

/// Errors surfaced to callers of the router.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// Candidate construction and filtering produced an empty list.
    #[error("no candidates available")]
    NoCandidates,

    /// Every candidate failed with a retryable error.
    #[error("all candidates failed after {attempts} attempt(s)")]
    AllFailed { attempts: usize },

    /// A single attempt failed fatally; no further candidates were tried.
    #[error("provider {provider} account {account_id} model {model} failed after {attempts} attempt(s): {source}")]
    Attempt {
        provider: String,
        account_id: String,
        model: String,
        attempts: usize,
        #[source]
        source: ProviderError,
    },
}

impl RouterError {
    /// How many candidates were attempted before this error was returned.
    pub fn attempts(&self) -> usize {
        match self {
            RouterError::NoCandidates => 0,
            RouterError::AllFailed { attempts } => *attempts,
            RouterError::Attempt { attempts, .. } => *attempts,
        }
    }

    /// The underlying provider error, if one caused this.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            RouterError::Attempt { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
