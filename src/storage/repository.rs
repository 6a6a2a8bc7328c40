use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountType, Cents, FeatureFlag, FlashMessage, MessageId, OwnerId,
    Transaction, TransactionKind, UserMessage,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_MESSAGES};

/// A ledger row joined with its account for the admin console.
#[derive(Debug, Clone)]
pub struct AdminTransactionRow {
    pub transaction: Transaction,
    pub account_number: String,
    pub owner_id: OwnerId,
}

/// Raised when a balance mutation could not be rolled back after its paired
/// ledger write failed. The one state the system must never hide: money moved
/// with no record of it.
#[derive(Debug, thiserror::Error)]
#[error("balance mutated but ledger entry could not be confirmed: {0}")]
pub struct PartialWriteError(pub String);

/// Repository for persisting and querying accounts, transactions, feature
/// flags, and messages. All money movement goes through the `*_and_log`
/// methods, which run the balance mutation and its ledger entry in a single
/// database transaction.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL. Writers contending for
    /// the database wait out the busy timeout rather than failing.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_MESSAGES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account. When an initial deposit entry is supplied it is
    /// inserted in the same database transaction as the account row, so an
    /// account can never exist with a funded balance and no opening record.
    pub async fn save_account(
        &self,
        account: &Account,
        initial_deposit: Option<Transaction>,
    ) -> Result<Option<Transaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin account creation")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, account_number, account_type, balance_cents, transfers_enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.owner_id.to_string())
        .bind(&account.account_number)
        .bind(account.account_type.as_str())
        .bind(account.balance_cents)
        .bind(account.transfers_enabled)
        .bind(account.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save account")?;

        let stored = match initial_deposit {
            Some(mut entry) => {
                entry.sequence = Self::next_sequence(&mut tx).await?;
                Self::insert_transaction(&mut tx, &entry).await?;
                Some(entry)
            }
            None => None,
        };

        tx.commit().await.context("Failed to commit account creation")?;
        Ok(stored)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, transfers_enabled, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Get an account by its account number.
    pub async fn get_account_by_number(&self, number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, transfers_enabled, created_at
            FROM accounts
            WHERE account_number = ?
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by number")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts belonging to one owner, oldest first.
    pub async fn list_accounts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, transfers_enabled, created_at
            FROM accounts
            WHERE owner_id = ?
            ORDER BY created_at, account_number
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts for owner")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// List every account, newest first (admin overview).
    pub async fn list_all_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, transfers_enabled, created_at
            FROM accounts
            ORDER BY created_at DESC, account_number DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Flip the per-account transfer switch. Returns false when the account
    /// does not exist.
    pub async fn set_transfers_enabled(&self, id: AccountId, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET transfers_enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update transfer toggle")?;
        Ok(result.rows_affected() > 0)
    }

    // ========================
    // Money movement
    // ========================

    /// Debit an account and append the paired ledger entry atomically.
    ///
    /// The debit is guarded: the UPDATE only fires while the balance covers
    /// the amount, so two racing debits serialize in the storage engine and
    /// the loser observes `Ok(None)` (insufficient funds at write time)
    /// rather than driving the balance negative.
    pub async fn debit_and_log(
        &self,
        account_id: AccountId,
        amount: Cents,
        kind: TransactionKind,
        description: &str,
        related_account_id: Option<AccountId>,
    ) -> Result<Option<Transaction>> {
        debug_assert!(amount > 0, "debit amount must be positive");

        let mut tx = self.pool.begin().await.context("Failed to begin debit")?;

        let Some(balance_after) = Self::guarded_debit(&mut tx, account_id, amount).await? else {
            tx.rollback().await.context("Failed to roll back refused debit")?;
            return Ok(None);
        };

        let mut entry = Transaction::new(account_id, kind, -amount, description, balance_after);
        if let Some(related) = related_account_id {
            entry = entry.with_related_account(related);
        }

        self.log_and_commit(tx, vec![&mut entry]).await?;
        Ok(Some(entry))
    }

    /// Credit an account and append the paired ledger entry atomically.
    /// Returns None when the account does not exist.
    pub async fn credit_and_log(
        &self,
        account_id: AccountId,
        amount: Cents,
        kind: TransactionKind,
        description: &str,
    ) -> Result<Option<Transaction>> {
        debug_assert!(amount > 0, "credit amount must be positive");

        let mut tx = self.pool.begin().await.context("Failed to begin credit")?;

        let Some(balance_after) = Self::credit(&mut tx, account_id, amount).await? else {
            tx.rollback().await.context("Failed to roll back refused credit")?;
            return Ok(None);
        };

        let mut entry = Transaction::new(account_id, kind, amount, description, balance_after);
        self.log_and_commit(tx, vec![&mut entry]).await?;
        Ok(Some(entry))
    }

    /// Move money between two managed accounts: guarded debit on the source,
    /// credit on the destination, and both ledger legs, in one transaction.
    /// Returns None when the source balance cannot cover the amount.
    pub async fn transfer_and_log(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
        out_description: &str,
        in_description: &str,
    ) -> Result<Option<(Transaction, Transaction)>> {
        debug_assert!(amount > 0, "transfer amount must be positive");

        let mut tx = self.pool.begin().await.context("Failed to begin transfer")?;

        let Some(from_balance) = Self::guarded_debit(&mut tx, from_account_id, amount).await? else {
            tx.rollback().await.context("Failed to roll back refused transfer")?;
            return Ok(None);
        };

        let to_balance = Self::credit(&mut tx, to_account_id, amount)
            .await?
            .context("Destination account vanished during transfer")?;

        let mut out_entry = Transaction::new(
            from_account_id,
            TransactionKind::TransferOut,
            -amount,
            out_description,
            from_balance,
        )
        .with_related_account(to_account_id);

        let mut in_entry = Transaction::new(
            to_account_id,
            TransactionKind::TransferIn,
            amount,
            in_description,
            to_balance,
        )
        .with_related_account(from_account_id);

        self.log_and_commit(tx, vec![&mut out_entry, &mut in_entry])
            .await?;
        Ok(Some((out_entry, in_entry)))
    }

    /// Assign sequences, insert the ledger entries, and commit. On failure
    /// after the balance mutation the transaction is rolled back; a rollback
    /// that cannot be confirmed is escalated as `PartialWriteError`.
    async fn log_and_commit(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
        entries: Vec<&mut Transaction>,
    ) -> Result<()> {
        let result: Result<()> = async {
            for entry in entries {
                entry.sequence = Self::next_sequence(&mut tx).await?;
                Self::insert_transaction(&mut tx, entry).await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => tx.commit().await.context("Failed to commit money movement"),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        error = %rollback_err,
                        cause = %err,
                        "rollback failed after ledger write error; balance may have moved without a record"
                    );
                    return Err(anyhow::Error::new(PartialWriteError(format!(
                        "{err:#}; rollback also failed: {rollback_err}"
                    ))));
                }
                Err(err).context("Ledger entry failed; balance mutation rolled back")
            }
        }
    }

    /// Guarded balance decrement. Returns the post-debit balance, or None
    /// when the balance does not cover the amount (or the row is missing).
    async fn guarded_debit(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents >= ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount)
        .bind(account_id.to_string())
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to debit account")?;

        Ok(row.map(|r| r.get("balance_cents")))
    }

    /// Unconditional balance increment. Returns the post-credit balance, or
    /// None when the row is missing.
    async fn credit(
        conn: &mut SqliteConnection,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Option<Cents>> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount)
        .bind(account_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to credit account")?;

        Ok(row.map(|r| r.get("balance_cents")))
    }

    /// Get the next ledger sequence number and increment the counter.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    async fn insert_transaction(conn: &mut SqliteConnection, entry: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, account_id, kind, amount_cents, description, related_account_id, balance_after_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.sequence)
        .bind(entry.account_id.to_string())
        .bind(entry.kind.as_str())
        .bind(entry.amount_cents)
        .bind(&entry.description)
        .bind(entry.related_account_id.map(|id| id.to_string()))
        .bind(entry.balance_after_cents)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert transaction")?;
        Ok(())
    }

    // ========================
    // Transaction queries
    // ========================

    /// List an account's ledger entries, newest first. Sequence breaks the
    /// tie for entries written within the same clock reading.
    pub async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, account_id, kind, amount_cents, description, related_account_id, balance_after_cents, created_at
            FROM transactions
            WHERE account_id = ?
            ORDER BY created_at DESC, sequence DESC
            "#,
        )
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// List every ledger entry joined with its account, newest first
    /// (admin overview).
    pub async fn list_all_transactions(&self) -> Result<Vec<AdminTransactionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.sequence, t.account_id, t.kind, t.amount_cents, t.description,
                   t.related_account_id, t.balance_after_cents, t.created_at,
                   a.account_number, a.owner_id
            FROM transactions t
            JOIN accounts a ON t.account_id = a.id
            ORDER BY t.created_at DESC, t.sequence DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list all transactions")?;

        rows.iter()
            .map(|row| {
                let owner_str: String = row.get("owner_id");
                Ok(AdminTransactionRow {
                    transaction: Self::row_to_transaction(row)?,
                    account_number: row.get("account_number"),
                    owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
                })
            })
            .collect()
    }

    /// List every ledger entry without joins, oldest first (audit input).
    pub async fn list_transactions_by_sequence(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, account_id, kind, amount_cents, description, related_account_id, balance_after_cents, created_at
            FROM transactions
            ORDER BY sequence
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions by sequence")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    // ========================
    // Feature flags
    // ========================

    /// Read one flag. An absent row reads as disabled.
    pub async fn get_flag(&self, name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT enabled FROM feature_flags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch feature flag")?;

        Ok(row.map(|r| r.get::<i32, _>("enabled") != 0).unwrap_or(false))
    }

    /// Upsert a flag value.
    pub async fn set_flag(&self, name: &str, enabled: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feature_flags (name, enabled)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET enabled = excluded.enabled
            "#,
        )
        .bind(name)
        .bind(enabled)
        .execute(&self.pool)
        .await
        .context("Failed to set feature flag")?;
        Ok(())
    }

    /// All stored flags, ordered by name.
    pub async fn all_flags(&self) -> Result<Vec<FeatureFlag>> {
        let rows = sqlx::query("SELECT name, enabled FROM feature_flags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list feature flags")?;

        Ok(rows
            .into_iter()
            .map(|row| FeatureFlag {
                name: row.get("name"),
                enabled: row.get::<i32, _>("enabled") != 0,
            })
            .collect())
    }

    // ========================
    // Messages
    // ========================

    pub async fn save_user_message(&self, message: &UserMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_messages (id, user_id, subject, body, is_read, sent_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.user_id.to_string())
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.is_read)
        .bind(message.sent_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user message")?;
        Ok(())
    }

    /// A user's inbox, newest first.
    pub async fn list_user_messages(&self, user_id: OwnerId) -> Result<Vec<UserMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, subject, body, is_read, sent_at
            FROM user_messages
            WHERE user_id = ?
            ORDER BY sent_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list user messages")?;

        rows.iter().map(Self::row_to_user_message).collect()
    }

    /// Mark a message read. The user id guards against marking someone
    /// else's mail. Returns false when nothing matched.
    pub async fn mark_message_read(&self, message_id: MessageId, user_id: OwnerId) -> Result<bool> {
        let result = sqlx::query("UPDATE user_messages SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(message_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to mark message read")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn save_flash_message(&self, message: &FlashMessage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flash_messages (id, message, is_active, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(&message.message)
        .bind(message.is_active)
        .bind(message.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save flash message")?;
        Ok(())
    }

    /// All flash messages, newest first. Visibility (active and unexpired)
    /// is decided by `FlashMessage::is_visible_at` in the service layer.
    pub async fn list_flash_messages(&self) -> Result<Vec<FlashMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, message, is_active, expires_at, created_at
            FROM flash_messages
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list flash messages")?;

        rows.iter().map(Self::row_to_flash_message).collect()
    }

    /// Deactivate a flash message. Returns false when nothing matched.
    pub async fn deactivate_flash_message(&self, message_id: MessageId) -> Result<bool> {
        let result = sqlx::query("UPDATE flash_messages SET is_active = 0 WHERE id = ? AND is_active = 1")
            .bind(message_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to deactivate flash message")?;
        Ok(result.rows_affected() > 0)
    }

    // ========================
    // Row mappers
    // ========================

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let type_str: String = row.get("account_type");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            account_number: row.get("account_number"),
            account_type: AccountType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
            balance_cents: row.get("balance_cents"),
            transfers_enabled: row.get::<i32, _>("transfers_enabled") != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let account_str: String = row.get("account_id");
        let kind_str: String = row.get("kind");
        let related_str: Option<String> = row.get("related_account_id");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_str).context("Invalid account ID")?,
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            description: row.get("description"),
            related_account_id: related_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid related account ID")?,
            balance_after_cents: row.get("balance_after_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_user_message(row: &sqlx::sqlite::SqliteRow) -> Result<UserMessage> {
        let id_str: String = row.get("id");
        let user_str: String = row.get("user_id");
        let sent_at_str: String = row.get("sent_at");

        Ok(UserMessage {
            id: Uuid::parse_str(&id_str).context("Invalid message ID")?,
            user_id: Uuid::parse_str(&user_str).context("Invalid user ID")?,
            subject: row.get("subject"),
            body: row.get("body"),
            is_read: row.get::<i32, _>("is_read") != 0,
            sent_at: DateTime::parse_from_rfc3339(&sent_at_str)
                .context("Invalid sent_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_flash_message(row: &sqlx::sqlite::SqliteRow) -> Result<FlashMessage> {
        let id_str: String = row.get("id");
        let expires_str: Option<String> = row.get("expires_at");
        let created_at_str: String = row.get("created_at");

        Ok(FlashMessage {
            id: Uuid::parse_str(&id_str).context("Invalid message ID")?,
            message: row.get("message"),
            is_active: row.get::<i32, _>("is_active") != 0,
            expires_at: expires_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid expires_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
