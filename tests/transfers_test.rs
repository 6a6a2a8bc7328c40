mod common;

use anyhow::Result;
use common::{admin, customer, enable_all_flags, open_checking, test_service};
use minibank::application::{
    AchTransferRequest, BankError, BillPayRequest, InternalTransferRequest, WireTransferRequest,
};
use minibank::domain::TransactionKind;

#[tokio::test]
async fn test_wire_rejected_then_ach_succeeds_from_same_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    enable_all_flags(&service).await?;
    let caller = customer();
    let account = open_checking(&service, &caller, 10_000).await?;

    // A 150.00 wire against a 100.00 balance is rejected outright
    let err = service
        .transfer_wire(
            &caller,
            WireTransferRequest {
                from_account_id: account.id,
                beneficiary_account_number: "9999999999".into(),
                beneficiary_name: Some("Acme Corp".into()),
                amount_cents: 15_000,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Insufficient funds: need $150.00, have $100.00"
    );

    // The rejection left no trace: balance intact, ledger shows only the
    // opening deposit
    let account = service.get_account(&caller, account.id).await?;
    assert_eq!(account.balance_cents, 10_000);
    let transactions = service
        .list_transactions_for_account(&caller, account.id)
        .await?;
    assert_eq!(transactions.len(), 1);

    // A 40.00 ACH then goes through against the untouched balance
    let receipt = service
        .transfer_ach(
            &caller,
            AchTransferRequest {
                from_account_id: account.id,
                beneficiary_account_number: "8888888888".into(),
                beneficiary_name: Some("Jane Doe".into()),
                beneficiary_account_type: Some("savings".into()),
                amount_cents: 4000,
            },
        )
        .await?;
    assert_eq!(receipt.new_balance, 6000);
    assert_eq!(receipt.message, "ACH transfer successful.");

    let account = service.get_account(&caller, account.id).await?;
    assert_eq!(account.balance_cents, 6000);

    Ok(())
}

#[tokio::test]
async fn test_outbound_transfer_ledger_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    enable_all_flags(&service).await?;
    let caller = customer();
    let account = open_checking(&service, &caller, 20_000).await?;

    service
        .transfer_wire(
            &caller,
            WireTransferRequest {
                from_account_id: account.id,
                beneficiary_account_number: "1112223334".into(),
                beneficiary_name: Some("Acme Corp".into()),
                amount_cents: 5000,
            },
        )
        .await?;

    let receipt = service
        .pay_bill(
            &caller,
            BillPayRequest {
                from_account_id: account.id,
                payee_name: "City Power".into(),
                amount_cents: 2500,
            },
        )
        .await?;
    assert_eq!(receipt.message, "Bill payment to City Power successful.");

    // Newest first: bill pay, wire, opening deposit
    let transactions = service
        .list_transactions_for_account(&caller, account.id)
        .await?;
    assert_eq!(transactions.len(), 3);

    assert_eq!(transactions[0].kind, TransactionKind::BillPay);
    assert_eq!(transactions[0].amount_cents, -2500);
    assert_eq!(transactions[0].balance_after_cents, 12_500);
    assert_eq!(transactions[0].description, "Bill payment to City Power");

    assert_eq!(transactions[1].kind, TransactionKind::WireTransferSent);
    assert_eq!(transactions[1].amount_cents, -5000);
    assert_eq!(transactions[1].balance_after_cents, 15_000);
    assert_eq!(
        transactions[1].description,
        "Wire Transfer to 1112223334 (Acme Corp)"
    );

    // Sequences strictly increase with time
    assert!(transactions[0].sequence > transactions[1].sequence);
    assert!(transactions[1].sequence > transactions[2].sequence);

    Ok(())
}

#[tokio::test]
async fn test_disabled_flag_blocks_the_transfer() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();
    let account = open_checking(&service, &caller, 10_000).await?;

    // Flags ship disabled; no flag was flipped here
    let err = service
        .transfer_wire(
            &caller,
            WireTransferRequest {
                from_account_id: account.id,
                beneficiary_account_number: "9999999999".into(),
                beneficiary_name: None,
                amount_cents: 1000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::FeatureDisabled(_)));
    assert!(err.to_string().contains("Wire transfers"));

    // Nothing moved
    let account = service.get_account(&caller, account.id).await?;
    assert_eq!(account.balance_cents, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_per_account_toggle_blocks_all_outbound_flows() -> Result<()> {
    let (service, _temp) = test_service().await?;
    enable_all_flags(&service).await?;
    let caller = customer();
    let account = open_checking(&service, &caller, 10_000).await?;

    service
        .set_transfers_enabled(&admin(), account.id, false)
        .await?;

    let err = service
        .pay_bill(
            &caller,
            BillPayRequest {
                from_account_id: account.id,
                payee_name: "City Power".into(),
                amount_cents: 1000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::TransfersDisabled(_)));
    assert!(err.to_string().contains(&account.account_number));

    Ok(())
}

#[tokio::test]
async fn test_cannot_transfer_from_someone_elses_account() -> Result<()> {
    let (service, _temp) = test_service().await?;
    enable_all_flags(&service).await?;
    let alice = customer();
    let mallory = customer();
    let account = open_checking(&service, &alice, 10_000).await?;

    // Reported identically to a nonexistent account
    let err = service
        .transfer_wire(
            &mallory,
            WireTransferRequest {
                from_account_id: account.id,
                beneficiary_account_number: "9999999999".into(),
                beneficiary_name: None,
                amount_cents: 1000,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Source account not found");

    Ok(())
}

#[tokio::test]
async fn test_internal_transfer_moves_both_balances_atomically() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = customer();
    let bob = customer();
    let from = open_checking(&service, &alice, 10_000).await?;
    let to = open_checking(&service, &bob, 1000).await?;

    let receipt = service
        .transfer_internal(
            &alice,
            InternalTransferRequest {
                from_account_id: from.id,
                to_account_number: to.account_number.clone(),
                amount_cents: 3000,
            },
        )
        .await?;

    assert_eq!(receipt.outgoing.amount_cents, -3000);
    assert_eq!(receipt.outgoing.balance_after_cents, 7000);
    assert_eq!(
        receipt.outgoing.description,
        format!("Transfer to {}", to.account_number)
    );
    assert_eq!(receipt.outgoing.related_account_id, Some(to.id));

    assert_eq!(receipt.incoming.amount_cents, 3000);
    assert_eq!(receipt.incoming.balance_after_cents, 4000);
    assert_eq!(
        receipt.incoming.description,
        format!("Transfer from {}", from.account_number)
    );
    assert_eq!(receipt.incoming.related_account_id, Some(from.id));

    // Both legs are visible to their respective owners
    let alice_view = service
        .list_transactions_for_account(&alice, from.id)
        .await?;
    assert_eq!(alice_view[0].kind, TransactionKind::TransferOut);

    let bob_view = service.list_transactions_for_account(&bob, to.id).await?;
    assert_eq!(bob_view[0].kind, TransactionKind::TransferIn);

    Ok(())
}

#[tokio::test]
async fn test_repeated_statement_reads_are_identical() -> Result<()> {
    let (service, _temp) = test_service().await?;
    enable_all_flags(&service).await?;
    let alice = customer();
    let bob = customer();
    let from = open_checking(&service, &alice, 30_000).await?;
    let to = open_checking(&service, &bob, 0).await?;

    service
        .transfer_internal(
            &alice,
            InternalTransferRequest {
                from_account_id: from.id,
                to_account_number: to.account_number.clone(),
                amount_cents: 5000,
            },
        )
        .await?;
    service
        .pay_bill(
            &alice,
            BillPayRequest {
                from_account_id: from.id,
                payee_name: "City Power".into(),
                amount_cents: 2500,
            },
        )
        .await?;

    // Two reads with no writes in between return the same rows in the same
    // order
    let first = service
        .list_transactions_for_account(&alice, from.id)
        .await?;
    let second = service
        .list_transactions_for_account(&alice, from.id)
        .await?;

    assert_eq!(first.len(), 3);
    let ordering = |entries: &[minibank::domain::Transaction]| {
        entries
            .iter()
            .map(|t| (t.id, t.sequence))
            .collect::<Vec<_>>()
    };
    assert_eq!(ordering(&first), ordering(&second));

    Ok(())
}

#[tokio::test]
async fn test_internal_transfer_edge_cases() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let caller = customer();
    let account = open_checking(&service, &caller, 10_000).await?;

    // Unknown destination number
    let err = service
        .transfer_internal(
            &caller,
            InternalTransferRequest {
                from_account_id: account.id,
                to_account_number: "0000000000".into(),
                amount_cents: 1000,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Destination account not found");

    // Self-transfer
    let err = service
        .transfer_internal(
            &caller,
            InternalTransferRequest {
                from_account_id: account.id,
                to_account_number: account.account_number.clone(),
                amount_cents: 1000,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));

    // Zero amount
    let err = service
        .transfer_internal(
            &caller,
            InternalTransferRequest {
                from_account_id: account.id,
                to_account_number: "1234567890".into(),
                amount_cents: 0,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));

    Ok(())
}
