use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{BankError, BankService, Caller};
use crate::domain::{format_cents, Account, AccountId, Transaction};

/// Full-database snapshot for offline inspection and backups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to external formats. Permission
/// checks are delegated to the service, so the exporter can only see what
/// its caller can.
pub struct Exporter<'a> {
    service: &'a BankService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a BankService) -> Self {
        Self { service }
    }

    /// Export one account's statement to CSV, newest entry first.
    pub async fn export_statement_csv<W: Write>(
        &self,
        caller: &Caller,
        account_id: AccountId,
        writer: W,
    ) -> Result<usize, BankError> {
        let transactions = self
            .service
            .list_transactions_for_account(caller, account_id)
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record([
                "id",
                "sequence",
                "date",
                "kind",
                "amount",
                "description",
                "related_account_id",
                "balance_after",
            ])
            .map_err(csv_err)?;

        let mut count = 0;
        for entry in &transactions {
            csv_writer
                .write_record([
                    entry.id.to_string(),
                    entry.sequence.to_string(),
                    entry.created_at.to_rfc3339(),
                    entry.kind.as_str().to_string(),
                    format_cents(entry.amount_cents),
                    entry.description.clone(),
                    entry
                        .related_account_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    format_cents(entry.balance_after_cents),
                ])
                .map_err(csv_err)?;
            count += 1;
        }

        csv_writer.flush().map_err(|e| csv_err(e.into()))?;
        Ok(count)
    }

    /// Export every account's identity and balance to CSV (admin overview).
    pub async fn export_accounts_csv<W: Write>(
        &self,
        caller: &Caller,
        writer: W,
    ) -> Result<usize, BankError> {
        let accounts = self.service.list_accounts_admin(caller).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record([
                "account_number",
                "owner_id",
                "type",
                "balance",
                "transfers_enabled",
                "created_at",
            ])
            .map_err(csv_err)?;

        let mut count = 0;
        for account in &accounts {
            csv_writer
                .write_record([
                    account.account_number.clone(),
                    account.owner_id.to_string(),
                    account.account_type.as_str().to_string(),
                    format_cents(account.balance_cents),
                    account.transfers_enabled.to_string(),
                    account.created_at.to_rfc3339(),
                ])
                .map_err(csv_err)?;
            count += 1;
        }

        csv_writer.flush().map_err(|e| csv_err(e.into()))?;
        Ok(count)
    }

    /// Export the full ledger as a JSON snapshot (admin-only).
    pub async fn export_full_json<W: Write>(
        &self,
        caller: &Caller,
        mut writer: W,
    ) -> Result<DatabaseSnapshot, BankError> {
        let accounts = self.service.list_accounts_admin(caller).await?;
        let transactions = self
            .service
            .list_all_transactions(caller)
            .await?
            .into_iter()
            .map(|row| row.transaction)
            .collect();

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| BankError::Persistence(anyhow::Error::new(e)))?;
        writer
            .write_all(json.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| BankError::Persistence(anyhow::Error::new(e)))?;

        Ok(snapshot)
    }
}

fn csv_err(err: csv::Error) -> BankError {
    BankError::Persistence(anyhow::Error::new(err))
}
