mod common;

use anyhow::Result;
use common::{admin, customer, open_checking, test_service};
use minibank::application::BankError;
use minibank::domain::TransactionKind;
use uuid::Uuid;

#[tokio::test]
async fn test_open_account_with_initial_balance_writes_deposit() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();

    let opened = service.open_account(&caller, "checking", 10_000).await?;
    assert_eq!(opened.account.balance_cents, 10_000);
    assert_eq!(opened.account.account_number.len(), 10);
    assert!(opened.account.transfers_enabled);

    let deposit = opened.initial_deposit.expect("expected a deposit entry");
    assert_eq!(deposit.kind, TransactionKind::Deposit);
    assert_eq!(deposit.amount_cents, 10_000);
    assert_eq!(deposit.balance_after_cents, 10_000);
    assert_eq!(deposit.description, "Initial Deposit");

    // The persisted ledger agrees
    let transactions = service
        .list_transactions_for_account(&caller, opened.account.id)
        .await?;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount_cents, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_open_account_with_zero_balance_writes_no_deposit() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();

    let opened = service.open_account(&caller, "savings", 0).await?;
    assert!(opened.initial_deposit.is_none());

    let transactions = service
        .list_transactions_for_account(&caller, opened.account.id)
        .await?;
    assert!(transactions.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_open_account_rejects_bad_input() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();

    let err = service
        .open_account(&caller, "offshore", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));

    let err = service
        .open_account(&caller, "checking", -100)
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_accounts_are_private_to_their_owner() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = customer();
    let mallory = customer();

    let account = open_checking(&service, &alice, 5000).await?;

    // The owner can read it
    assert!(service.get_account(&alice, account.id).await.is_ok());

    // A stranger cannot
    let err = service.get_account(&mallory, account.id).await.unwrap_err();
    assert!(matches!(err, BankError::Forbidden));

    // Neither can they read its statement
    let err = service
        .list_transactions_for_account(&mallory, account.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Forbidden));

    // An admin can read anything
    let admin = admin();
    assert!(service.get_account(&admin, account.id).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_missing_account_reads_as_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();

    let err = service
        .get_account(&caller, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::NotFound(_)));
    assert_eq!(err.to_string(), "Account not found");

    Ok(())
}

#[tokio::test]
async fn test_list_accounts_only_shows_own() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = customer();
    let bob = customer();

    open_checking(&service, &alice, 1000).await?;
    open_checking(&service, &alice, 2000).await?;
    open_checking(&service, &bob, 3000).await?;

    assert_eq!(service.list_accounts(&alice).await?.len(), 2);
    assert_eq!(service.list_accounts(&bob).await?.len(), 1);

    // Admin listing spans everyone
    assert_eq!(service.list_accounts_admin(&admin()).await?.len(), 3);

    Ok(())
}
