mod common;

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use common::{AccountPair, balance_of, first_page, test_service};
use simplebank::application::AppError;
use simplebank::domain::{Currency, TransferParams, entries_net_to_zero, is_conserving};

#[tokio::test]
async fn test_single_transfer_moves_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;

    let result = service
        .engine()
        .execute(TransferParams::new(pair.x.id, pair.y.id, 1352))
        .await?;

    assert_eq!(result.transfer.from_account_id, pair.x.id);
    assert_eq!(result.transfer.to_account_id, pair.y.id);
    assert_eq!(result.from_entry.account_id, pair.x.id);
    assert_eq!(result.to_entry.account_id, pair.y.id);
    assert_eq!(result.from_account.id, pair.x.id);
    assert_eq!(result.to_account.id, pair.y.id);
    assert!(is_conserving(
        pair.x.balance,
        result.from_account.balance,
        pair.y.balance,
        result.to_account.balance,
    ));

    assert_eq!(balance_of(&service, &pair.x).await?, -352);
    assert_eq!(balance_of(&service, &pair.y).await?, 1852);

    let transfer = service.get_transfer(result.transfer.id).await?;
    assert_eq!(transfer, result.transfer);
    assert_eq!(service.get_entry(result.from_entry.id).await?, result.from_entry);
    assert_eq!(service.get_entry(result.to_entry.id).await?, result.to_entry);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_one_direction() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;
    let amount = 1352;
    let n = 10;

    let mut handles = Vec::new();
    for _ in 0..n {
        let engine = service.engine().clone();
        let params = TransferParams::new(pair.x.id, pair.y.id, amount);
        handles.push(tokio::spawn(async move { engine.execute(params).await }));
    }

    let mut seen_steps = HashSet::new();
    for handle in handles {
        let result = handle.await??;

        assert_eq!(result.transfer.amount, amount);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.amount, amount);

        // Every committed transfer observes a distinct multiple of the amount
        let diff_from = pair.x.balance - result.from_account.balance;
        let diff_to = result.to_account.balance - pair.y.balance;
        assert_eq!(diff_from, diff_to);
        assert!(diff_from > 0);
        assert_eq!(diff_from % amount, 0);

        let k = diff_from / amount;
        assert!((1..=n).contains(&k));
        assert!(seen_steps.insert(k), "step {k} observed twice");
    }
    assert_eq!(seen_steps.len() as i64, n);

    assert_eq!(balance_of(&service, &pair.x).await?, 1000 - n * amount);
    assert_eq!(balance_of(&service, &pair.y).await?, 500 + n * amount);
    assert_eq!(balance_of(&service, &pair.x).await?, -12_520);
    assert_eq!(balance_of(&service, &pair.y).await?, 14_020);

    let stats = service.store().ledger_stats().await?;
    assert_eq!(stats.transfer_count, n);
    assert_eq!(stats.entry_count, 2 * n);
    assert_eq!(stats.entry_total, 0);

    let x_entries = service.list_entries(pair.x.id, first_page()).await?;
    assert_eq!(x_entries.len() as i64, n);
    assert!(x_entries.iter().all(|e| e.amount == -amount));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_both_directions() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;
    let amount = 10;

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = service.engine().clone();
        let params = if i % 2 == 0 {
            TransferParams::new(pair.x.id, pair.y.id, amount)
        } else {
            TransferParams::new(pair.y.id, pair.x.id, amount)
        };
        handles.push(tokio::spawn(async move { engine.execute(params).await }));
    }

    for handle in handles {
        handle.await??;
    }

    // Five each way cancel out
    assert_eq!(balance_of(&service, &pair.x).await?, 1000);
    assert_eq!(balance_of(&service, &pair.y).await?, 500);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.stats.transfer_count, 10);
    assert_eq!(report.stats.entry_count, 20);

    Ok(())
}

#[tokio::test]
async fn test_transfer_from_higher_to_lower_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;
    assert!(pair.y.id > pair.x.id);

    let result = service
        .engine()
        .execute(TransferParams::new(pair.y.id, pair.x.id, 300))
        .await?;

    // Snapshots follow the transfer direction, not the update order
    assert_eq!(result.from_account.id, pair.y.id);
    assert_eq!(result.from_account.balance, 200);
    assert_eq!(result.to_account.id, pair.x.id);
    assert_eq!(result.to_account.balance, 1300);
    assert_eq!(result.from_entry.account_id, pair.y.id);
    assert_eq!(result.to_entry.account_id, pair.x.id);

    Ok(())
}

#[tokio::test]
async fn test_self_transfer_keeps_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = service.create_account("nina", Currency::Usd, 700).await?;

    let result = service
        .engine()
        .execute(TransferParams::new(account.id, account.id, 250))
        .await?;

    assert_eq!(result.from_account.balance, 700);
    assert_eq!(result.to_account.balance, 700);
    assert_eq!(balance_of(&service, &account).await?, 700);

    let entries = service.list_entries(account.id, first_page()).await?;
    assert_eq!(entries.len(), 2);
    assert!(entries_net_to_zero(&entries));

    Ok(())
}

#[tokio::test]
async fn test_repeated_transfer_is_not_deduplicated() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;
    let params = TransferParams::new(pair.x.id, pair.y.id, 100);

    let first = service.engine().execute(params).await?;
    let second = service.engine().execute(params).await?;

    assert_ne!(first.transfer.id, second.transfer.id);
    assert_eq!(balance_of(&service, &pair.x).await?, 800);
    assert_eq!(balance_of(&service, &pair.y).await?, 700);

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_missing_account_writes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;

    let err = service
        .engine()
        .execute(TransferParams::new(pair.x.id, 999, 100))
        .await
        .expect_err("transfer to a missing account must fail");

    let err = AppError::from_storage(err);
    assert!(matches!(err, AppError::MissingResource(_)), "got {err:?}");
    assert!(!err.is_retryable());

    let stats = service.store().ledger_stats().await?;
    assert_eq!(stats.transfer_count, 0);
    assert_eq!(stats.entry_count, 0);
    assert_eq!(balance_of(&service, &pair.x).await?, 1000);

    Ok(())
}

#[tokio::test]
async fn test_failed_unit_of_work_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;
    let params = TransferParams::new(pair.x.id, pair.y.id, 100);

    let result: Result<()> = service
        .store()
        .exec_tx(move |mut q| {
            Box::pin(async move {
                q.create_transfer(&params).await?;
                q.create_entry(params.from_account_id, params.debit_amount())
                    .await?;
                q.add_account_balance(params.from_account_id, params.debit_amount())
                    .await?;
                Err::<(), _>(anyhow::anyhow!("abort after partial writes"))
            })
        })
        .await;

    let err = result.expect_err("unit of work must fail");
    assert!(err.to_string().contains("abort after partial writes"));

    let stats = service.store().ledger_stats().await?;
    assert_eq!(stats.transfer_count, 0);
    assert_eq!(stats.entry_count, 0);
    assert_eq!(balance_of(&service, &pair.x).await?, 1000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_unit_of_work_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;
    let params = TransferParams::new(pair.x.id, pair.y.id, 100);

    let store = service.store().clone();
    let pending = store.exec_tx(move |mut q| {
        Box::pin(async move {
            q.create_transfer(&params).await?;
            q.add_account_balance(params.from_account_id, params.debit_amount())
                .await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, anyhow::Error>(())
        })
    });

    let outcome = tokio::time::timeout(Duration::from_millis(200), pending).await;
    assert!(outcome.is_err(), "unit of work should have timed out");

    // The dropped transaction leaves nothing behind and releases its lock
    let result = service
        .engine()
        .execute(TransferParams::new(pair.x.id, pair.y.id, 50))
        .await?;
    assert_eq!(result.from_account.balance, 950);
    assert_eq!(result.to_account.balance, 550);

    let stats = service.store().ledger_stats().await?;
    assert_eq!(stats.transfer_count, 1);
    assert_eq!(stats.entry_count, 2);

    Ok(())
}

#[tokio::test]
async fn test_integrity_after_transfers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let pair = AccountPair::scenario(&service).await?;

    for amount in [1, 20, 300] {
        service
            .engine()
            .execute(TransferParams::new(pair.x.id, pair.y.id, amount))
            .await?;
    }

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.stats.account_count, 2);
    assert_eq!(report.stats.transfer_count, 3);
    assert_eq!(report.stats.entry_count, 6);
    assert_eq!(report.stats.entry_total, 0);
    assert_eq!(report.stats.invalid_amounts, 0);

    Ok(())
}
