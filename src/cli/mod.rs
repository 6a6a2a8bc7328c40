use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    AchTransferRequest, AdjustBalanceRequest, AdjustDirection, BankService, BillPayRequest,
    Caller, InternalTransferRequest, WireTransferRequest,
};
use crate::domain::{format_usd, parse_cents, Account, Transaction};

/// Minibank - Online banking ledger core
#[derive(Parser)]
#[command(name = "minibank")]
#[command(about = "A feature-gated banking ledger with atomic transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "minibank.db")]
    pub database: String,

    /// Acting user ID (UUID)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Act with administrator privileges
    #[arg(long, global = true)]
    pub admin: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Transfer between two accounts at this bank
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: String,

        /// Destination account number
        #[arg(long)]
        to: String,
    },

    /// Send a wire transfer to an external beneficiary
    Wire {
        /// Amount to send (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: String,

        /// Beneficiary account number
        #[arg(long)]
        to: String,

        /// Beneficiary name
        #[arg(long)]
        name: Option<String>,
    },

    /// Send an ACH transfer to an external beneficiary
    Ach {
        /// Amount to send (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: String,

        /// Beneficiary account number
        #[arg(long)]
        to: String,

        /// Beneficiary name
        #[arg(long)]
        name: Option<String>,

        /// Beneficiary account type (checking or savings)
        #[arg(long = "type")]
        account_type: Option<String>,
    },

    /// Pay a bill to a named payee
    Billpay {
        /// Amount to pay (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: String,

        /// Payee name
        #[arg(long)]
        payee: String,
    },

    /// List an account's transactions, newest first
    Transactions {
        /// Account ID
        account: String,
    },

    /// Read the acting user's inbox
    Inbox,

    /// Mark an inbox message as read
    Read {
        /// Message ID
        id: String,
    },

    /// Show active site-wide banners
    Banners,

    /// Export data to CSV or JSON
    Export {
        /// What to export: statement, accounts, full
        export_type: String,

        /// Account ID (required for statement export)
        #[arg(long)]
        account: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Verify ledger integrity (admin)
    Check,

    /// Administrative commands
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account for the acting user
    Open {
        /// Account type: checking or savings
        #[arg(short = 't', long = "type")]
        account_type: String,

        /// Initial balance (e.g., "100.00", defaults to zero)
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// List the acting user's accounts
    List,

    /// Show one account
    Show {
        /// Account ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Adjust an account balance up or down
    Adjust {
        /// Account ID
        account: String,

        /// Amount (always positive; direction carries the sign)
        amount: String,

        /// Direction: increase or decrease
        #[arg(short, long)]
        direction: String,

        /// Ledger description
        #[arg(long)]
        description: Option<String>,
    },

    /// Enable or disable transfers for one account
    ToggleTransfers {
        /// Account ID
        account: String,

        /// New state: on or off
        state: String,
    },

    /// List all feature flags
    Flags,

    /// Enable or disable a feature flag
    SetFlag {
        /// Flag name (allow_wire_transfer, allow_ach, allow_bill_pay)
        name: String,

        /// New state: on or off
        state: String,
    },

    /// List every account
    Accounts,

    /// List every transaction across all accounts
    Transactions,

    /// Send a message to a user's inbox
    Message {
        /// Recipient user ID
        user: String,

        /// Message subject
        #[arg(short, long)]
        subject: String,

        /// Message body
        #[arg(short, long)]
        body: String,
    },

    /// Post a site-wide banner
    Flash {
        /// Banner text
        text: String,

        /// Expiry (RFC 3339, e.g. 2026-09-15T00:00:00Z; omit for open-ended)
        #[arg(long)]
        expires: Option<String>,
    },

    /// Take down a site-wide banner
    FlashDown {
        /// Banner ID
        id: String,
    },
}

impl Cli {
    fn caller(&self) -> Result<Caller> {
        let user_str = self
            .user
            .as_deref()
            .context("Provide the acting user with --user <UUID>")?;
        let user_id = Uuid::parse_str(user_str).context("Invalid user ID format (expected UUID)")?;
        Ok(if self.admin {
            Caller::admin(user_id)
        } else {
            Caller::user(user_id)
        })
    }

    pub async fn run(self) -> Result<()> {
        match &self.command {
            Commands::Init => {
                BankService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
                return Ok(());
            }
            Commands::Banners => {
                let service = BankService::connect(&self.database).await?;
                let banners = service.active_flash_messages().await?;
                if banners.is_empty() {
                    println!("No active banners.");
                }
                for banner in banners {
                    println!("[{}] {}", banner.id, banner.message);
                }
                return Ok(());
            }
            _ => {}
        }

        let service = BankService::connect(&self.database).await?;
        let caller = self.caller()?;

        match self.command {
            Commands::Init | Commands::Banners => unreachable!("handled above"),

            Commands::Account(account_cmd) => {
                run_account_command(&service, &caller, account_cmd).await?;
            }

            Commands::Transfer { amount, from, to } => {
                let receipt = service
                    .transfer_internal(
                        &caller,
                        InternalTransferRequest {
                            from_account_id: parse_account_id(&from)?,
                            to_account_number: to,
                            amount_cents: parse_amount(&amount)?,
                        },
                    )
                    .await?;
                println!("{}", receipt.message);
                println!(
                    "New balance: {}",
                    format_usd(receipt.outgoing.balance_after_cents)
                );
            }

            Commands::Wire {
                amount,
                from,
                to,
                name,
            } => {
                let receipt = service
                    .transfer_wire(
                        &caller,
                        WireTransferRequest {
                            from_account_id: parse_account_id(&from)?,
                            beneficiary_account_number: to,
                            beneficiary_name: name,
                            amount_cents: parse_amount(&amount)?,
                        },
                    )
                    .await?;
                println!("{}", receipt.message);
                println!("New balance: {}", format_usd(receipt.new_balance));
            }

            Commands::Ach {
                amount,
                from,
                to,
                name,
                account_type,
            } => {
                let receipt = service
                    .transfer_ach(
                        &caller,
                        AchTransferRequest {
                            from_account_id: parse_account_id(&from)?,
                            beneficiary_account_number: to,
                            beneficiary_name: name,
                            beneficiary_account_type: account_type,
                            amount_cents: parse_amount(&amount)?,
                        },
                    )
                    .await?;
                println!("{}", receipt.message);
                println!("New balance: {}", format_usd(receipt.new_balance));
            }

            Commands::Billpay {
                amount,
                from,
                payee,
            } => {
                let receipt = service
                    .pay_bill(
                        &caller,
                        BillPayRequest {
                            from_account_id: parse_account_id(&from)?,
                            payee_name: payee,
                            amount_cents: parse_amount(&amount)?,
                        },
                    )
                    .await?;
                println!("{}", receipt.message);
                println!("New balance: {}", format_usd(receipt.new_balance));
            }

            Commands::Transactions { account } => {
                let transactions = service
                    .list_transactions_for_account(&caller, parse_account_id(&account)?)
                    .await?;
                print_transactions(&transactions);
            }

            Commands::Inbox => {
                let messages = service.inbox(&caller).await?;
                if messages.is_empty() {
                    println!("Your inbox is empty.");
                }
                for message in messages {
                    let marker = if message.is_read { " " } else { "*" };
                    println!(
                        "{} [{}] {} ({})",
                        marker,
                        message.id,
                        message.subject,
                        message.sent_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }

            Commands::Read { id } => {
                let message_id =
                    Uuid::parse_str(&id).context("Invalid message ID format (expected UUID)")?;
                service.mark_message_read(&caller, message_id).await?;
                println!("Marked as read.");
            }

            Commands::Export {
                export_type,
                account,
                output,
            } => {
                run_export_command(&service, &caller, &export_type, account.as_deref(), output)
                    .await?;
            }

            Commands::Check => {
                let report = service.audit(&caller).await?;
                println!(
                    "Checked {} accounts across {} transactions.",
                    report.accounts_checked, report.transactions_checked
                );
                if report.is_clean() {
                    println!("Ledger is consistent.");
                } else {
                    if report.has_sequence_gaps {
                        println!("WARNING: gaps found in the transaction sequence.");
                    }
                    for finding in &report.findings {
                        println!(
                            "Account {}: stored balance {} but ledger says {}",
                            finding.account_number,
                            format_usd(finding.stored_balance),
                            format_usd(finding.ledger_sum)
                        );
                    }
                    anyhow::bail!("ledger audit failed with {} finding(s)", report.findings.len());
                }
            }

            Commands::Admin(admin_cmd) => {
                run_admin_command(&service, &caller, admin_cmd).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(
    service: &BankService,
    caller: &Caller,
    cmd: AccountCommands,
) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            account_type,
            balance,
        } => {
            let initial_balance = parse_amount(&balance)?;
            let opened = service
                .open_account(caller, &account_type, initial_balance)
                .await?;
            println!(
                "Opened {} account {} ({})",
                opened.account.account_type,
                opened.account.account_number,
                opened.account.id
            );
            println!("Balance: {}", format_usd(opened.account.balance_cents));
        }

        AccountCommands::List => {
            let accounts = service.list_accounts(caller).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                print_account_table(&accounts);
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(caller, parse_account_id(&id)?).await?;
            println!("Account: {}", account.account_number);
            println!("  ID:        {}", account.id);
            println!("  Owner:     {}", account.owner_id);
            println!("  Type:      {}", account.account_type);
            println!("  Balance:   {}", format_usd(account.balance_cents));
            println!(
                "  Transfers: {}",
                if account.transfers_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "  Opened:    {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

async fn run_admin_command(
    service: &BankService,
    caller: &Caller,
    cmd: AdminCommands,
) -> Result<()> {
    match cmd {
        AdminCommands::Adjust {
            account,
            amount,
            direction,
            description,
        } => {
            let direction = match direction.as_str() {
                "increase" => AdjustDirection::Increase,
                "decrease" => AdjustDirection::Decrease,
                other => anyhow::bail!(
                    "Invalid direction '{}'. Use 'increase' or 'decrease'",
                    other
                ),
            };
            let receipt = service
                .adjust_balance(
                    caller,
                    AdjustBalanceRequest {
                        account_id: parse_account_id(&account)?,
                        amount_cents: parse_amount(&amount)?,
                        direction,
                        description,
                    },
                )
                .await?;
            println!("{}", receipt.message);
            println!("New balance: {}", format_usd(receipt.new_balance));
        }

        AdminCommands::ToggleTransfers { account, state } => {
            let enabled = parse_on_off(&state)?;
            let updated = service
                .set_transfers_enabled(caller, parse_account_id(&account)?, enabled)
                .await?;
            println!(
                "Transfers {} for account {}",
                if updated.transfers_enabled {
                    "enabled"
                } else {
                    "disabled"
                },
                updated.account_number
            );
        }

        AdminCommands::Flags => {
            let flags = service.feature_flags(caller).await?;
            for flag in flags {
                println!(
                    "{:<22} {}",
                    flag.name,
                    if flag.enabled { "on" } else { "off" }
                );
            }
        }

        AdminCommands::SetFlag { name, state } => {
            let enabled = parse_on_off(&state)?;
            service.set_feature_flag(caller, &name, enabled).await?;
            println!("{} is now {}", name, if enabled { "on" } else { "off" });
        }

        AdminCommands::Accounts => {
            let accounts = service.list_accounts_admin(caller).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                print_account_table(&accounts);
            }
        }

        AdminCommands::Transactions => {
            let rows = service.list_all_transactions(caller).await?;
            if rows.is_empty() {
                println!("No transactions found.");
            } else {
                println!(
                    "{:<12} {:<20} {:<18} {:>12}  {}",
                    "ACCOUNT", "DATE", "KIND", "AMOUNT", "DESCRIPTION"
                );
                println!("{}", "-".repeat(90));
                for row in rows {
                    let t = &row.transaction;
                    println!(
                        "{:<12} {:<20} {:<18} {:>12}  {}",
                        row.account_number,
                        t.created_at.format("%Y-%m-%d %H:%M:%S"),
                        t.kind.as_str(),
                        format_usd(t.amount_cents),
                        t.description
                    );
                }
            }
        }

        AdminCommands::Message {
            user,
            subject,
            body,
        } => {
            let user_id =
                Uuid::parse_str(&user).context("Invalid user ID format (expected UUID)")?;
            let message = service
                .send_user_message(caller, user_id, &subject, &body)
                .await?;
            println!("Message sent ({})", message.id);
        }

        AdminCommands::Flash { text, expires } => {
            let expires_at = expires
                .map(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .with_context(|| format!("Invalid expiry '{}'. Use RFC 3339", s))
                })
                .transpose()?;
            let banner = service.create_flash_message(caller, &text, expires_at).await?;
            println!("Banner posted ({})", banner.id);
        }

        AdminCommands::FlashDown { id } => {
            let message_id =
                Uuid::parse_str(&id).context("Invalid banner ID format (expected UUID)")?;
            service.deactivate_flash_message(caller, message_id).await?;
            println!("Banner taken down.");
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &BankService,
    caller: &Caller,
    export_type: &str,
    account: Option<&str>,
    output: Option<String>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "statement" => {
            let account_id = account
                .context("Statement export requires --account <ID>")
                .and_then(parse_account_id)?;
            let count = exporter
                .export_statement_csv(caller, account_id, writer)
                .await?;
            eprintln!("Exported {} transaction(s)", count);
        }
        "accounts" => {
            let count = exporter.export_accounts_csv(caller, writer).await?;
            eprintln!("Exported {} account(s)", count);
        }
        "full" => {
            let snapshot = exporter.export_full_json(caller, writer).await?;
            eprintln!(
                "Exported {} account(s) and {} transaction(s)",
                snapshot.accounts.len(),
                snapshot.transactions.len()
            );
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Valid types: statement, accounts, full",
            other
        ),
    }
    Ok(())
}

fn print_account_table(accounts: &[Account]) {
    println!(
        "{:<12} {:<10} {:>14}  {:<9} {}",
        "NUMBER", "TYPE", "BALANCE", "TRANSFERS", "ID"
    );
    println!("{}", "-".repeat(88));
    for account in accounts {
        println!(
            "{:<12} {:<10} {:>14}  {:<9} {}",
            account.account_number,
            account.account_type.as_str(),
            format_usd(account.balance_cents),
            if account.transfers_enabled { "on" } else { "off" },
            account.id
        );
    }
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions found.");
        return;
    }
    println!(
        "{:<20} {:<18} {:>12} {:>14}  {}",
        "DATE", "KIND", "AMOUNT", "BALANCE", "DESCRIPTION"
    );
    println!("{}", "-".repeat(96));
    for entry in transactions {
        println!(
            "{:<20} {:<18} {:>12} {:>14}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.kind.as_str(),
            format_usd(entry.amount_cents),
            format_usd(entry.balance_after_cents),
            entry.description
        );
    }
}

fn parse_account_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid account ID format (expected UUID)")
}

fn parse_amount(amount: &str) -> Result<i64> {
    let cents = parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
    Ok(cents)
}

fn parse_on_off(state: &str) -> Result<bool> {
    match state {
        "on" | "enabled" | "true" => Ok(true),
        "off" | "disabled" | "false" => Ok(false),
        other => anyhow::bail!("Invalid state '{}'. Use 'on' or 'off'", other),
    }
}
