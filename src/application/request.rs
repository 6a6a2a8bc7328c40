use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Cents, OwnerId};

use super::BankError;

/// The authenticated caller, as resolved by the surrounding auth layer.
/// The core trusts this identity as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: OwnerId,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: OwnerId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: OwnerId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

/// Outbound wire transfer to an external beneficiary. The beneficiary fields
/// are recorded in the ledger description only; there is no counterparty
/// settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTransferRequest {
    pub from_account_id: AccountId,
    pub beneficiary_account_number: String,
    pub beneficiary_name: Option<String>,
    pub amount_cents: Cents,
}

impl WireTransferRequest {
    pub fn validate(&self) -> Result<(), BankError> {
        validate_amount(self.amount_cents)?;
        validate_present(&self.beneficiary_account_number, "a beneficiary account number")
    }
}

/// Outbound ACH transfer to an external beneficiary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchTransferRequest {
    pub from_account_id: AccountId,
    pub beneficiary_account_number: String,
    pub beneficiary_name: Option<String>,
    pub beneficiary_account_type: Option<String>,
    pub amount_cents: Cents,
}

impl AchTransferRequest {
    pub fn validate(&self) -> Result<(), BankError> {
        validate_amount(self.amount_cents)?;
        validate_present(&self.beneficiary_account_number, "a beneficiary account number")
    }
}

/// Bill payment to a named payee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPayRequest {
    pub from_account_id: AccountId,
    pub payee_name: String,
    pub amount_cents: Cents,
}

impl BillPayRequest {
    pub fn validate(&self) -> Result<(), BankError> {
        validate_amount(self.amount_cents)?;
        validate_present(&self.payee_name, "a payee name")
    }
}

/// Transfer between two accounts this bank manages. The destination is
/// addressed by account number, as on a deposit slip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTransferRequest {
    pub from_account_id: AccountId,
    pub to_account_number: String,
    pub amount_cents: Cents,
}

impl InternalTransferRequest {
    pub fn validate(&self) -> Result<(), BankError> {
        validate_amount(self.amount_cents)?;
        validate_present(&self.to_account_number, "a destination account number")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    Increase,
    Decrease,
}

impl AdjustDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustDirection::Increase => "increase",
            AdjustDirection::Decrease => "decrease",
        }
    }
}

/// Administrative balance adjustment. Bypasses feature flags and the
/// per-account transfer toggle, but a decrease still may not overdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustBalanceRequest {
    pub account_id: AccountId,
    /// Always positive; the direction carries the sign.
    pub amount_cents: Cents,
    pub direction: AdjustDirection,
    pub description: Option<String>,
}

impl AdjustBalanceRequest {
    pub fn validate(&self) -> Result<(), BankError> {
        validate_amount(self.amount_cents)
    }
}

fn validate_amount(amount_cents: Cents) -> Result<(), BankError> {
    if amount_cents <= 0 {
        return Err(BankError::validation("a positive amount is required"));
    }
    Ok(())
}

fn validate_present(value: &str, what: &str) -> Result<(), BankError> {
    if value.trim().is_empty() {
        return Err(BankError::validation(format!("{} is required", what)));
    }
    Ok(())
}
