//! Error types for the authorization pipeline

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the authorization pipeline
#[derive(Error, Debug)]
pub enum Error {
    // Policy rejections - each carries the specifics an operator needs
    // to diagnose a denied request
    #[error("transfers are disabled by configuration")]
    TransfersDisabled,

    #[error("invalid destination address: {0}")]
    InvalidAddressFormat(String),

    #[error("destination is not on the configured allowlist: {destination}")]
    AddressNotAllowlisted { destination: String },

    #[error("wallet service rejected the destination: {0}")]
    RemoteValidationFailed(String),

    #[error("amount {amount} exceeds the per-transfer ceiling of {max}")]
    AmountCeilingExceeded { amount: String, max: String },

    #[error("cooldown active: {remaining_secs}s until the next transfer is allowed")]
    CooldownActive { remaining_secs: u64 },

    #[error("daily limit of {ceiling} exceeded: already sent {sent_today} in the last 24h")]
    DailyLimitExceeded { ceiling: String, sent_today: String },

    #[error("unknown or already-used confirmation token")]
    InvalidConfirmationToken,

    #[error("confirmation token expired")]
    ExpiredConfirmationToken,

    #[error("no unlocked balance available to sweep")]
    NoUnlockedBalance,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    // Execution errors
    #[error("transfer execution failed (outcome unknown: {outcome_unknown}): {reason}")]
    RemoteExecutionFailed { reason: String, outcome_unknown: bool },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // RPC transport errors
    #[error("RPC error: {0}")]
    Rpc(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a policy rejection (the request was understood
    /// and denied before any funds moved), as opposed to an infrastructure
    /// fault or an execution failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::TransfersDisabled
                | Error::InvalidAddressFormat(_)
                | Error::AddressNotAllowlisted { .. }
                | Error::RemoteValidationFailed(_)
                | Error::AmountCeilingExceeded { .. }
                | Error::CooldownActive { .. }
                | Error::DailyLimitExceeded { .. }
                | Error::InvalidConfirmationToken
                | Error::ExpiredConfirmationToken
                | Error::NoUnlockedBalance
                | Error::InvalidAmount(_)
        )
    }

    /// Short machine-readable tag for audit records.
    pub fn reason_tag(&self) -> &'static str {
        match self {
            Error::TransfersDisabled => "transfers_disabled",
            Error::InvalidAddressFormat(_) => "invalid_address_format",
            Error::AddressNotAllowlisted { .. } => "address_not_allowlisted",
            Error::RemoteValidationFailed(_) => "remote_validation_failed",
            Error::AmountCeilingExceeded { .. } => "amount_ceiling_exceeded",
            Error::CooldownActive { .. } => "cooldown_active",
            Error::DailyLimitExceeded { .. } => "daily_limit_exceeded",
            Error::InvalidConfirmationToken => "invalid_confirmation_token",
            Error::ExpiredConfirmationToken => "expired_confirmation_token",
            Error::NoUnlockedBalance => "no_unlocked_balance",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::RemoteExecutionFailed { .. } => "remote_execution_failed",
            Error::Config(_) => "config_error",
            Error::Rpc(_) => "rpc_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
            Error::Anyhow(_) => "internal_error",
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_classified() {
        assert!(Error::TransfersDisabled.is_rejection());
        assert!(Error::CooldownActive { remaining_secs: 5 }.is_rejection());
        assert!(Error::InvalidConfirmationToken.is_rejection());

        assert!(!Error::Rpc("connection refused".into()).is_rejection());
        assert!(!Error::RemoteExecutionFailed {
            reason: "timeout".into(),
            outcome_unknown: true,
        }
        .is_rejection());
    }

    #[test]
    fn test_rejection_messages_are_actionable() {
        let err = Error::CooldownActive { remaining_secs: 42 };
        assert!(err.to_string().contains("42"));

        let err = Error::DailyLimitExceeded {
            ceiling: "1".into(),
            sent_today: "0.75".into(),
        };
        assert!(err.to_string().contains("0.75"));
    }
}
