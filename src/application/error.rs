use thiserror::Error;

use crate::domain::{flag_label, format_usd, Cents};

fn usd(cents: &Cents) -> String {
    format_usd(*cents)
}

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("You do not have permission to perform this operation")]
    Forbidden,

    #[error("{} are currently disabled by the system administrator", flag_label(.0))]
    FeatureDisabled(String),

    #[error("Transfers are currently disabled for account {0}. Please contact support.")]
    TransfersDisabled(String),

    #[error("Insufficient funds: need {}, have {}", usd(.needed), usd(.available))]
    InsufficientFunds { needed: Cents, available: Cents },

    /// A balance moved but its ledger entry could not be confirmed. The
    /// user-facing message stays generic; the detail goes to the operator log.
    #[error("The operation could not be completed safely. Please contact support.")]
    PartialFailure(String),

    #[error("Database error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl BankError {
    pub fn not_found(what: &str) -> Self {
        BankError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BankError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message_is_actionable() {
        let err = BankError::InsufficientFunds {
            needed: 15000,
            available: 10000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: need $150.00, have $100.00"
        );
    }

    #[test]
    fn test_feature_disabled_names_the_feature() {
        let err = BankError::FeatureDisabled("allow_wire_transfer".to_string());
        assert!(err.to_string().starts_with("Wire transfers"));
    }

    #[test]
    fn test_partial_failure_message_stays_generic() {
        let err = BankError::PartialFailure("rollback failed: disk full".to_string());
        assert!(!err.to_string().contains("disk full"));
    }
}
