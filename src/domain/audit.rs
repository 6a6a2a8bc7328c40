use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Account, AccountId, Cents, Transaction};

/// One account whose stored balance disagrees with its ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFinding {
    pub account_id: AccountId,
    pub account_number: String,
    pub stored_balance: Cents,
    /// Sum of all signed ledger amounts for the account.
    pub ledger_sum: Cents,
    /// `balance_after` of the account's latest ledger entry, if any.
    pub last_balance_after: Option<Cents>,
}

/// Result of cross-checking account balances against the transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub accounts_checked: usize,
    pub transactions_checked: usize,
    /// True when the global sequence numbering has holes, which would mean
    /// a ledger row went missing.
    pub has_sequence_gaps: bool,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && !self.has_sequence_gaps
    }
}

/// Cross-check every account's stored balance against the sum of its ledger
/// amounts and the latest `balance_after` snapshot. Every balance mutation is
/// paired with a ledger row, so all three must agree.
pub fn build_audit_report(accounts: &[Account], transactions: &[Transaction]) -> AuditReport {
    let mut sums: HashMap<AccountId, Cents> = HashMap::new();
    let mut latest: HashMap<AccountId, (i64, Cents)> = HashMap::new();

    for txn in transactions {
        *sums.entry(txn.account_id).or_insert(0) += txn.amount_cents;
        let entry = latest.entry(txn.account_id).or_insert((txn.sequence, txn.balance_after_cents));
        if txn.sequence > entry.0 {
            *entry = (txn.sequence, txn.balance_after_cents);
        }
    }

    let mut findings = Vec::new();
    for account in accounts {
        let ledger_sum = sums.get(&account.id).copied().unwrap_or(0);
        let last_balance_after = latest.get(&account.id).map(|(_, b)| *b);

        let snapshot_ok = last_balance_after.is_none_or(|b| b == account.balance_cents);
        if ledger_sum != account.balance_cents || !snapshot_ok {
            findings.push(AuditFinding {
                account_id: account.id,
                account_number: account.account_number.clone(),
                stored_balance: account.balance_cents,
                ledger_sum,
                last_balance_after,
            });
        }
    }

    AuditReport {
        accounts_checked: accounts.len(),
        transactions_checked: transactions.len(),
        has_sequence_gaps: sequence_has_gaps(transactions),
        findings,
    }
}

fn sequence_has_gaps(transactions: &[Transaction]) -> bool {
    if transactions.is_empty() {
        return false;
    }
    let min = transactions.iter().map(|t| t.sequence).min().unwrap_or(0);
    let max = transactions.iter().map(|t| t.sequence).max().unwrap_or(0);
    (max - min + 1) != transactions.len() as i64
}
