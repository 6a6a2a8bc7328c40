use chrono::{DateTime, Utc};

use crate::domain::{
    build_audit_report, flag_label, format_usd, Account, AccountId, AccountType, AuditReport,
    Cents, FeatureFlag, FlashMessage, MessageId, OwnerId, Transaction, TransactionKind,
    UserMessage, ALLOW_ACH, ALLOW_BILL_PAY, ALLOW_WIRE_TRANSFER, KNOWN_FLAGS,
};
use crate::storage::{AdminTransactionRow, PartialWriteError, Repository};

use super::{
    AchTransferRequest, AdjustBalanceRequest, AdjustDirection, BankError, BillPayRequest, Caller,
    InternalTransferRequest, WireTransferRequest,
};

/// Attempts to find a free account number before giving up. Collisions in a
/// 9-billion number space are effectively theoretical.
const ACCOUNT_NUMBER_ATTEMPTS: u32 = 5;

/// Application service providing the banking operations. This is the primary
/// interface for any client (CLI, HTTP routes, admin console).
pub struct BankService {
    repo: Repository,
}

/// Result of opening an account.
#[derive(Debug)]
pub struct OpenedAccount {
    pub account: Account,
    /// Present when the account was opened with a non-zero initial balance.
    pub initial_deposit: Option<Transaction>,
}

/// Result of an outbound transfer or payment (wire, ACH, bill-pay).
#[derive(Debug)]
pub struct TransferReceipt {
    pub transaction: Transaction,
    pub new_balance: Cents,
    pub message: String,
}

/// Result of an internal account-to-account transfer.
#[derive(Debug)]
pub struct InternalTransferReceipt {
    pub outgoing: Transaction,
    pub incoming: Transaction,
    pub message: String,
}

/// Result of an administrative balance adjustment.
#[derive(Debug)]
pub struct AdjustmentReceipt {
    pub transaction: Transaction,
    pub new_balance: Cents,
    pub message: String,
}

impl BankService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, BankError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, BankError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account for the caller. A non-zero initial balance writes a
    /// `deposit` ledger entry in the same storage transaction as the account.
    pub async fn open_account(
        &self,
        caller: &Caller,
        account_type: &str,
        initial_balance: Cents,
    ) -> Result<OpenedAccount, BankError> {
        let account_type = AccountType::from_str(account_type).ok_or_else(|| {
            BankError::validation(format!(
                "unknown account type '{}'; expected checking or savings",
                account_type
            ))
        })?;
        if initial_balance < 0 {
            return Err(BankError::validation("initial balance cannot be negative"));
        }

        let mut account = Account::new(caller.user_id, account_type, initial_balance);
        let mut attempts = 1;
        while self
            .repo
            .get_account_by_number(&account.account_number)
            .await?
            .is_some()
        {
            if attempts >= ACCOUNT_NUMBER_ATTEMPTS {
                return Err(BankError::Persistence(anyhow::anyhow!(
                    "could not allocate a unique account number"
                )));
            }
            account.account_number = crate::domain::generate_account_number();
            attempts += 1;
        }

        let initial_deposit = (initial_balance > 0).then(|| {
            Transaction::new(
                account.id,
                TransactionKind::Deposit,
                initial_balance,
                "Initial Deposit",
                initial_balance,
            )
        });

        let stored_deposit = self
            .repo
            .save_account(&account, initial_deposit)
            .await
            .map_err(map_storage_err)?;

        Ok(OpenedAccount {
            account,
            initial_deposit: stored_deposit,
        })
    }

    /// Get one account. Owners see their own accounts; admins see any.
    pub async fn get_account(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<Account, BankError> {
        let account = self
            .repo
            .get_account(account_id)
            .await?
            .ok_or_else(|| BankError::not_found("Account"))?;

        if account.owner_id != caller.user_id && !caller.is_admin {
            return Err(BankError::Forbidden);
        }
        Ok(account)
    }

    /// List the caller's accounts.
    pub async fn list_accounts(&self, caller: &Caller) -> Result<Vec<Account>, BankError> {
        Ok(self.repo.list_accounts_for_owner(caller.user_id).await?)
    }

    /// List every account in the system, newest first (admin overview).
    pub async fn list_accounts_admin(&self, caller: &Caller) -> Result<Vec<Account>, BankError> {
        require_admin(caller)?;
        Ok(self.repo.list_all_accounts().await?)
    }

    /// Flip the per-account transfer switch (admin-only) and return the
    /// updated account.
    pub async fn set_transfers_enabled(
        &self,
        caller: &Caller,
        account_id: AccountId,
        enabled: bool,
    ) -> Result<Account, BankError> {
        require_admin(caller)?;

        if !self.repo.set_transfers_enabled(account_id, enabled).await? {
            return Err(BankError::not_found("Account"));
        }
        tracing::info!(account = %account_id, enabled, "admin toggled per-account transfers");

        self.repo
            .get_account(account_id)
            .await?
            .ok_or_else(|| BankError::not_found("Account"))
    }

    // ========================
    // Transaction queries
    // ========================

    /// An account's ledger, newest first. Owners and admins only.
    pub async fn list_transactions_for_account(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, BankError> {
        // Ownership check piggybacks on get_account.
        let account = self.get_account(caller, account_id).await?;
        Ok(self.repo.list_transactions_for_account(account.id).await?)
    }

    /// The full ledger joined with account identity, newest first (admin).
    pub async fn list_all_transactions(
        &self,
        caller: &Caller,
    ) -> Result<Vec<AdminTransactionRow>, BankError> {
        require_admin(caller)?;
        Ok(self.repo.list_all_transactions().await?)
    }

    // ========================
    // Transfers and payments
    // ========================

    /// Send a wire transfer from one of the caller's accounts.
    pub async fn transfer_wire(
        &self,
        caller: &Caller,
        request: WireTransferRequest,
    ) -> Result<TransferReceipt, BankError> {
        request.validate()?;
        let description = format!(
            "Wire Transfer to {} ({})",
            request.beneficiary_account_number,
            request.beneficiary_name.as_deref().unwrap_or("N/A"),
        );
        self.execute_outbound(
            caller,
            ALLOW_WIRE_TRANSFER,
            request.from_account_id,
            request.amount_cents,
            TransactionKind::WireTransferSent,
            &description,
            "Wire transfer initiated successfully.".to_string(),
        )
        .await
    }

    /// Send an ACH transfer from one of the caller's accounts.
    pub async fn transfer_ach(
        &self,
        caller: &Caller,
        request: AchTransferRequest,
    ) -> Result<TransferReceipt, BankError> {
        request.validate()?;
        let description = format!(
            "ACH Transfer to {} ({}, Acc Type: {})",
            request.beneficiary_account_number,
            request.beneficiary_name.as_deref().unwrap_or("N/A"),
            request.beneficiary_account_type.as_deref().unwrap_or("N/A"),
        );
        self.execute_outbound(
            caller,
            ALLOW_ACH,
            request.from_account_id,
            request.amount_cents,
            TransactionKind::AchTransferSent,
            &description,
            "ACH transfer successful.".to_string(),
        )
        .await
    }

    /// Pay a bill from one of the caller's accounts.
    pub async fn pay_bill(
        &self,
        caller: &Caller,
        request: BillPayRequest,
    ) -> Result<TransferReceipt, BankError> {
        request.validate()?;
        let description = format!("Bill payment to {}", request.payee_name);
        self.execute_outbound(
            caller,
            ALLOW_BILL_PAY,
            request.from_account_id,
            request.amount_cents,
            TransactionKind::BillPay,
            &description,
            format!("Bill payment to {} successful.", request.payee_name),
        )
        .await
    }

    /// The shared outbound path: flag gate, ownership, per-account toggle,
    /// funds check, then the atomic debit-and-log.
    async fn execute_outbound(
        &self,
        caller: &Caller,
        flag_name: &str,
        from_account_id: AccountId,
        amount: Cents,
        kind: TransactionKind,
        description: &str,
        success_message: String,
    ) -> Result<TransferReceipt, BankError> {
        if !self.repo.get_flag(flag_name).await? {
            return Err(BankError::FeatureDisabled(flag_name.to_string()));
        }

        let source = self.load_owned_source(caller, from_account_id).await?;
        ensure_transfers_enabled(&source)?;

        // Pre-check for a precise message; the storage guard re-enforces it
        // at write time, which is what racing requests fall back on.
        if source.balance_cents < amount {
            return Err(BankError::InsufficientFunds {
                needed: amount,
                available: source.balance_cents,
            });
        }

        let debited = self
            .repo
            .debit_and_log(source.id, amount, kind, description, None)
            .await
            .map_err(map_storage_err)?;

        match debited {
            Some(transaction) => {
                let new_balance = transaction.balance_after_cents;
                Ok(TransferReceipt {
                    transaction,
                    new_balance,
                    message: success_message,
                })
            }
            // A concurrent debit got there first; report the balance as it
            // stands now.
            None => Err(self.insufficient_funds_now(source.id, amount).await?),
        }
    }

    /// Transfer between two accounts this bank manages. No feature flag
    /// applies; the per-account toggle governs the source only.
    pub async fn transfer_internal(
        &self,
        caller: &Caller,
        request: InternalTransferRequest,
    ) -> Result<InternalTransferReceipt, BankError> {
        request.validate()?;

        let source = self
            .load_owned_source(caller, request.from_account_id)
            .await?;
        ensure_transfers_enabled(&source)?;

        let destination = self
            .repo
            .get_account_by_number(request.to_account_number.trim())
            .await?
            .ok_or_else(|| BankError::not_found("Destination account"))?;

        if destination.id == source.id {
            return Err(BankError::validation(
                "cannot transfer an account to itself",
            ));
        }

        if source.balance_cents < request.amount_cents {
            return Err(BankError::InsufficientFunds {
                needed: request.amount_cents,
                available: source.balance_cents,
            });
        }

        let transferred = self
            .repo
            .transfer_and_log(
                source.id,
                destination.id,
                request.amount_cents,
                &format!("Transfer to {}", destination.account_number),
                &format!("Transfer from {}", source.account_number),
            )
            .await
            .map_err(map_storage_err)?;

        match transferred {
            Some((outgoing, incoming)) => Ok(InternalTransferReceipt {
                outgoing,
                incoming,
                message: format!(
                    "Transferred {} to account {}.",
                    format_usd(request.amount_cents),
                    destination.account_number
                ),
            }),
            None => Err(self
                .insufficient_funds_now(source.id, request.amount_cents)
                .await?),
        }
    }

    /// Administrative balance adjustment. Skips feature flags and the
    /// per-account toggle, but a decrease may not overdraw the account.
    pub async fn adjust_balance(
        &self,
        caller: &Caller,
        request: AdjustBalanceRequest,
    ) -> Result<AdjustmentReceipt, BankError> {
        require_admin(caller)?;
        request.validate()?;

        let account = self
            .repo
            .get_account(request.account_id)
            .await?
            .ok_or_else(|| BankError::not_found("Account"))?;

        let description = request
            .description
            .clone()
            .unwrap_or_else(|| format!("Admin {} adjustment", request.direction.as_str()));

        let adjusted = match request.direction {
            AdjustDirection::Increase => self
                .repo
                .credit_and_log(
                    account.id,
                    request.amount_cents,
                    TransactionKind::AdminAdjust,
                    &description,
                )
                .await
                .map_err(map_storage_err)?,
            AdjustDirection::Decrease => self
                .repo
                .debit_and_log(
                    account.id,
                    request.amount_cents,
                    TransactionKind::AdminAdjust,
                    &description,
                    None,
                )
                .await
                .map_err(map_storage_err)?,
        };

        let transaction = match adjusted {
            Some(transaction) => transaction,
            None => {
                return Err(match request.direction {
                    AdjustDirection::Increase => BankError::not_found("Account"),
                    AdjustDirection::Decrease => {
                        self.insufficient_funds_now(account.id, request.amount_cents)
                            .await?
                    }
                })
            }
        };

        tracing::info!(
            account = %account.account_number,
            direction = request.direction.as_str(),
            amount = request.amount_cents,
            "admin balance adjustment applied"
        );

        let new_balance = transaction.balance_after_cents;
        Ok(AdjustmentReceipt {
            transaction,
            new_balance,
            message: format!(
                "Account balance {}d successfully.",
                request.direction.as_str()
            ),
        })
    }

    // ========================
    // Feature flags
    // ========================

    /// All flags ordered by name (admin console).
    pub async fn feature_flags(&self, caller: &Caller) -> Result<Vec<FeatureFlag>, BankError> {
        require_admin(caller)?;
        Ok(self.repo.all_flags().await?)
    }

    /// Upsert one of the known flags (admin-only).
    pub async fn set_feature_flag(
        &self,
        caller: &Caller,
        name: &str,
        enabled: bool,
    ) -> Result<(), BankError> {
        require_admin(caller)?;
        if !KNOWN_FLAGS.contains(&name) {
            return Err(BankError::validation(format!(
                "unknown feature flag '{}'",
                name
            )));
        }
        self.repo.set_flag(name, enabled).await?;
        tracing::info!(flag = name, enabled, "feature flag updated: {}", flag_label(name));
        Ok(())
    }

    // ========================
    // Messages
    // ========================

    /// Send a message to a user's inbox (admin-only).
    pub async fn send_user_message(
        &self,
        caller: &Caller,
        user_id: OwnerId,
        subject: &str,
        body: &str,
    ) -> Result<UserMessage, BankError> {
        require_admin(caller)?;
        if subject.trim().is_empty() || body.trim().is_empty() {
            return Err(BankError::validation("a subject and body are required"));
        }

        let message = UserMessage::new(user_id, subject, body);
        self.repo.save_user_message(&message).await?;
        Ok(message)
    }

    /// The caller's inbox, newest first.
    pub async fn inbox(&self, caller: &Caller) -> Result<Vec<UserMessage>, BankError> {
        Ok(self.repo.list_user_messages(caller.user_id).await?)
    }

    /// Mark one of the caller's messages as read.
    pub async fn mark_message_read(
        &self,
        caller: &Caller,
        message_id: MessageId,
    ) -> Result<(), BankError> {
        if !self
            .repo
            .mark_message_read(message_id, caller.user_id)
            .await?
        {
            return Err(BankError::not_found("Message"));
        }
        Ok(())
    }

    /// Create a site-wide flash banner (admin-only).
    pub async fn create_flash_message(
        &self,
        caller: &Caller,
        text: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<FlashMessage, BankError> {
        require_admin(caller)?;
        if text.trim().is_empty() {
            return Err(BankError::validation("flash message text is required"));
        }

        let message = FlashMessage::new(text, expires_at);
        self.repo.save_flash_message(&message).await?;
        Ok(message)
    }

    /// Currently visible flash banners.
    pub async fn active_flash_messages(&self) -> Result<Vec<FlashMessage>, BankError> {
        let now = Utc::now();
        let banners = self.repo.list_flash_messages().await?;
        Ok(banners
            .into_iter()
            .filter(|banner| banner.is_visible_at(now))
            .collect())
    }

    /// Take down a flash banner (admin-only).
    pub async fn deactivate_flash_message(
        &self,
        caller: &Caller,
        message_id: MessageId,
    ) -> Result<(), BankError> {
        require_admin(caller)?;
        if !self.repo.deactivate_flash_message(message_id).await? {
            return Err(BankError::not_found("Flash message"));
        }
        Ok(())
    }

    // ========================
    // Audit
    // ========================

    /// Cross-check every stored balance against the ledger (admin-only).
    pub async fn audit(&self, caller: &Caller) -> Result<AuditReport, BankError> {
        require_admin(caller)?;
        let accounts = self.repo.list_all_accounts().await?;
        let transactions = self.repo.list_transactions_by_sequence().await?;
        let report = build_audit_report(&accounts, &transactions);

        if !report.is_clean() {
            tracing::warn!(
                findings = report.findings.len(),
                sequence_gaps = report.has_sequence_gaps,
                "ledger audit found discrepancies"
            );
        }
        Ok(report)
    }

    // ========================
    // Helpers
    // ========================

    /// Load a transfer source, requiring it to exist and belong to the
    /// caller. Both failures report the same way so callers cannot probe for
    /// accounts they do not own.
    async fn load_owned_source(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<Account, BankError> {
        match self.repo.get_account(account_id).await? {
            Some(account) if account.owner_id == caller.user_id => Ok(account),
            _ => Err(BankError::not_found("Source account")),
        }
    }

    /// Build an insufficient-funds error against the balance as currently
    /// stored. Used when the write-time guard refused a debit the pre-check
    /// had passed.
    async fn insufficient_funds_now(
        &self,
        account_id: AccountId,
        needed: Cents,
    ) -> Result<BankError, BankError> {
        let available = self
            .repo
            .get_account(account_id)
            .await?
            .map(|account| account.balance_cents)
            .unwrap_or(0);
        Ok(BankError::InsufficientFunds { needed, available })
    }
}

fn require_admin(caller: &Caller) -> Result<(), BankError> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(BankError::Forbidden)
    }
}

fn ensure_transfers_enabled(account: &Account) -> Result<(), BankError> {
    if account.transfers_enabled {
        Ok(())
    } else {
        Err(BankError::TransfersDisabled(account.account_number.clone()))
    }
}

/// Storage failures on money-movement paths: a rollback that could not be
/// confirmed surfaces as a partial failure; everything else is a plain
/// persistence error. Both are logged with their specific cause.
fn map_storage_err(err: anyhow::Error) -> BankError {
    if err.downcast_ref::<PartialWriteError>().is_some() {
        tracing::error!(error = %err, "partial write during money movement");
        return BankError::PartialFailure(format!("{err:#}"));
    }
    tracing::error!(error = %err, "storage failure during money movement");
    BankError::Persistence(err)
}
