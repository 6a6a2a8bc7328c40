use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// Owner of an account. Users live in an external identity subsystem; the
/// ledger keeps only this weak reference and never cascades on user changes.
pub type OwnerId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "checking" => Some(AccountType::Checking),
            "savings" => Some(AccountType::Savings),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer account. The `balance_cents` column is the single source of
/// truth for funds; every change to it is paired with a ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: OwnerId,
    /// Unique 10-digit number used on statements and as the destination
    /// identifier for internal transfers.
    pub account_number: String,
    pub account_type: AccountType,
    pub balance_cents: Cents,
    /// Per-account override: when false, every outbound transfer or payment
    /// from this account is refused regardless of global feature flags.
    pub transfers_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account record. New accounts accept transfers by default.
    pub fn new(owner_id: OwnerId, account_type: AccountType, balance_cents: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            account_number: generate_account_number(),
            account_type,
            balance_cents,
            transfers_enabled: true,
            created_at: Utc::now(),
        }
    }
}

/// Generate a random 10-digit account number string.
/// Uniqueness is enforced by the storage layer's UNIQUE constraint; the
/// service retries on the (vanishingly rare) collision.
pub fn generate_account_number() -> String {
    let n: u64 = rand::thread_rng().gen_range(1_000_000_000..=9_999_999_999);
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        for at in [AccountType::Checking, AccountType::Savings] {
            assert_eq!(AccountType::from_str(at.as_str()), Some(at));
        }
        assert_eq!(AccountType::from_str("CHECKING"), Some(AccountType::Checking));
        assert_eq!(AccountType::from_str("money-market"), None);
    }

    #[test]
    fn test_new_account_defaults() {
        let owner = Uuid::new_v4();
        let account = Account::new(owner, AccountType::Checking, 10_000);

        assert_eq!(account.owner_id, owner);
        assert_eq!(account.balance_cents, 10_000);
        assert!(account.transfers_enabled);
    }

    #[test]
    fn test_account_number_is_ten_digits() {
        for _ in 0..100 {
            let number = generate_account_number();
            assert_eq!(number.len(), 10);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(number.chars().next(), Some('0'));
        }
    }
}
