use thiserror::Error;

/// Why a license key is not entitled. Every variant is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("license token signature is invalid")]
    InvalidSignature,
    #[error("license token uses disallowed signing algorithm {0:?}")]
    AlgorithmNotAllowed(String),
    #[error("license token claims are malformed: {0}")]
    MalformedClaims(String),
    #[error("license token carries unknown plan {0:?}")]
    UnknownPlan(String),
    #[error("license token has expired")]
    TokenExpired,
    #[error("license rejected: {0}")]
    Rejected(String),
    #[error("license key is not valid")]
    NotValid,
    #[error("license belongs to a different product")]
    WrongProduct,
    #[error("purchase was refunded")]
    Refunded,
    #[error("purchase was charged back")]
    Chargebacked,
    #[error("purchase is disputed")]
    Disputed,
    #[error("subscription has ended")]
    SubscriptionEnded,
    #[error("subscription was cancelled")]
    SubscriptionCancelled,
    #[error("subscription payment failed")]
    SubscriptionFailed,
    #[error("subscription has expired")]
    SubscriptionExpired,
}

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed response from license service: {0}")]
    Decode(String),
    #[error(transparent)]
    Denied(#[from] Denial),
    #[error("license service unreachable: {0}")]
    Transport(String),
    #[error("workspace settings: {0}")]
    Settings(#[source] anyhow::Error),
}

impl LicenseError {
    /// Transport failures say nothing about the key itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, LicenseError::Transport(_))
    }
}
