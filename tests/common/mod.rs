// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use minibank::application::{BankService, Caller};
use minibank::domain::{Account, Cents, ALLOW_ACH, ALLOW_BILL_PAY, ALLOW_WIRE_TRANSFER};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = BankService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// A fresh non-admin caller
pub fn customer() -> Caller {
    Caller::user(Uuid::new_v4())
}

/// A fresh admin caller
pub fn admin() -> Caller {
    Caller::admin(Uuid::new_v4())
}

/// Open a checking account for the caller with the given balance
pub async fn open_checking(
    service: &BankService,
    caller: &Caller,
    balance: Cents,
) -> Result<Account> {
    let opened = service.open_account(caller, "checking", balance).await?;
    Ok(opened.account)
}

/// Turn on all three transfer feature flags
pub async fn enable_all_flags(service: &BankService) -> Result<()> {
    let admin = admin();
    for flag in [ALLOW_WIRE_TRANSFER, ALLOW_ACH, ALLOW_BILL_PAY] {
        service.set_feature_flag(&admin, flag, true).await?;
    }
    Ok(())
}
