mod common;

use anyhow::Result;
use common::{admin, customer, open_checking, test_service};
use minibank::application::{AdjustBalanceRequest, AdjustDirection, BankError};
use minibank::domain::{TransactionKind, ALLOW_ACH, ALLOW_WIRE_TRANSFER, KNOWN_FLAGS};

#[tokio::test]
async fn test_adjust_balance_up_and_down() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let owner = customer();
    let admin = admin();
    let account = open_checking(&service, &owner, 10_000).await?;

    let receipt = service
        .adjust_balance(
            &admin,
            AdjustBalanceRequest {
                account_id: account.id,
                amount_cents: 2500,
                direction: AdjustDirection::Increase,
                description: Some("Fee refund".into()),
            },
        )
        .await?;
    assert_eq!(receipt.new_balance, 12_500);
    assert_eq!(receipt.transaction.kind, TransactionKind::AdminAdjust);
    assert_eq!(receipt.transaction.amount_cents, 2500);
    assert_eq!(receipt.transaction.description, "Fee refund");

    let receipt = service
        .adjust_balance(
            &admin,
            AdjustBalanceRequest {
                account_id: account.id,
                amount_cents: 500,
                direction: AdjustDirection::Decrease,
                description: None,
            },
        )
        .await?;
    assert_eq!(receipt.new_balance, 12_000);
    assert_eq!(receipt.transaction.amount_cents, -500);
    assert_eq!(receipt.transaction.description, "Admin decrease adjustment");

    // The owner sees both adjustments in the statement
    let transactions = service
        .list_transactions_for_account(&owner, account.id)
        .await?;
    assert_eq!(transactions.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_adjust_decrease_cannot_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let owner = customer();
    let account = open_checking(&service, &owner, 1000).await?;

    let err = service
        .adjust_balance(
            &admin(),
            AdjustBalanceRequest {
                account_id: account.id,
                amount_cents: 5000,
                direction: AdjustDirection::Decrease,
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::InsufficientFunds { .. }));

    let account = service.get_account(&owner, account.id).await?;
    assert_eq!(account.balance_cents, 1000);

    Ok(())
}

#[tokio::test]
async fn test_admin_surfaces_require_admin() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();
    let account = open_checking(&service, &caller, 1000).await?;

    let adjust = AdjustBalanceRequest {
        account_id: account.id,
        amount_cents: 100,
        direction: AdjustDirection::Increase,
        description: None,
    };
    assert!(matches!(
        service.adjust_balance(&caller, adjust).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        service.feature_flags(&caller).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        service.set_feature_flag(&caller, ALLOW_ACH, true).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        service.list_accounts_admin(&caller).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        service.list_all_transactions(&caller).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        service
            .set_transfers_enabled(&caller, account.id, false)
            .await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        service.audit(&caller).await,
        Err(BankError::Forbidden)
    ));

    Ok(())
}

#[tokio::test]
async fn test_flags_ship_disabled_and_flip_independently() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let admin = admin();

    let flags = service.feature_flags(&admin).await?;
    assert_eq!(flags.len(), KNOWN_FLAGS.len());
    assert!(flags.iter().all(|flag| !flag.enabled));

    service
        .set_feature_flag(&admin, ALLOW_WIRE_TRANSFER, true)
        .await?;

    let flags = service.feature_flags(&admin).await?;
    let enabled = |name: &str| flags.iter().any(|f| f.name == name && f.enabled);
    assert!(enabled(ALLOW_WIRE_TRANSFER));
    assert!(!enabled(ALLOW_ACH));

    Ok(())
}

#[tokio::test]
async fn test_unknown_flag_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .set_feature_flag(&admin(), "allow_time_travel", true)
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_toggle_transfers_returns_updated_account() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let owner = customer();
    let admin = admin();
    let account = open_checking(&service, &owner, 1000).await?;

    let updated = service
        .set_transfers_enabled(&admin, account.id, false)
        .await?;
    assert!(!updated.transfers_enabled);

    let updated = service
        .set_transfers_enabled(&admin, account.id, true)
        .await?;
    assert!(updated.transfers_enabled);

    Ok(())
}

#[tokio::test]
async fn test_admin_transaction_feed_spans_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = customer();
    let bob = customer();
    let a = open_checking(&service, &alice, 1000).await?;
    let b = open_checking(&service, &bob, 2000).await?;

    let rows = service.list_all_transactions(&admin()).await?;
    assert_eq!(rows.len(), 2);

    let numbers: Vec<_> = rows.iter().map(|r| r.account_number.as_str()).collect();
    assert!(numbers.contains(&a.account_number.as_str()));
    assert!(numbers.contains(&b.account_number.as_str()));
    assert!(rows.iter().any(|r| r.owner_id == alice.user_id));

    Ok(())
}
