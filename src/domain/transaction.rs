use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    WireTransferSent,
    AchTransferSent,
    BillPay,
    AdminAdjust,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::WireTransferSent => "wire_transfer_sent",
            TransactionKind::AchTransferSent => "ach_transfer_sent",
            TransactionKind::BillPay => "bill_pay",
            TransactionKind::AdminAdjust => "admin_adjust",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" => Some(TransactionKind::Withdrawal),
            "transfer_out" => Some(TransactionKind::TransferOut),
            "transfer_in" => Some(TransactionKind::TransferIn),
            "wire_transfer_sent" => Some(TransactionKind::WireTransferSent),
            "ach_transfer_sent" => Some(TransactionKind::AchTransferSent),
            "bill_pay" => Some(TransactionKind::BillPay),
            "admin_adjust" => Some(TransactionKind::AdminAdjust),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger entry. Rows are only ever inserted, never updated or
/// deleted; corrections happen through new `admin_adjust` entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing sequence number, assigned by the repository.
    /// The stable tie-break when several rows share a timestamp.
    pub sequence: i64,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    /// Signed amount: negative for debits, positive for credits.
    pub amount_cents: Cents,
    pub description: String,
    /// The other leg of an internal transfer; None for every other kind.
    pub related_account_id: Option<AccountId>,
    /// Snapshot of the account balance immediately after the paired balance
    /// mutation committed.
    pub balance_after_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new ledger entry. Sequence is assigned by the repository at
    /// insert time; `created_at` is server-assigned here.
    pub fn new(
        account_id: AccountId,
        kind: TransactionKind,
        amount_cents: Cents,
        description: impl Into<String>,
        balance_after_cents: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // set by the repository
            account_id,
            kind,
            amount_cents,
            description: description.into(),
            related_account_id: None,
            balance_after_cents,
            created_at: Utc::now(),
        }
    }

    pub fn with_related_account(mut self, related: AccountId) -> Self {
        self.related_account_id = Some(related);
        self
    }
}
