mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use common::*;
use finora::application::{AppError, TransactionFilter};
use finora::domain::{TransactionCategory, TransactionKind, TransactionUpdate};
use uuid::Uuid;

#[tokio::test]
async fn test_create_update_delete_moves_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let main = create_passbook(&service, "Main").await?;
    assert_eq!(main.balance, 0);

    let tx = income(&service, &main, 1000).await?;
    assert_eq!(balance_of(&service, &main).await?, 1000);

    service
        .update_transaction(tx.id, TransactionUpdate::amount(700))
        .await?;
    assert_eq!(balance_of(&service, &main).await?, 700);

    service.delete_transaction(tx.id).await?;
    assert_eq!(balance_of(&service, &main).await?, 0);
    assert!(service.all_transactions().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_expense_lowers_balance_and_snapshots_passbook() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;
    income(&service, &main, 5000).await?;

    let tx = service
        .create_transaction(
            main.id,
            1250,
            TransactionKind::Expense,
            parse_date("2024-03-15"),
            Some("Lunch".to_string()),
            Some(TransactionCategory::Dining),
        )
        .await?;

    assert!(!tx.is_income);
    assert_eq!(tx.passbook_name, "Main");
    assert_eq!(tx.passbook_color, "#7B68EE");
    assert_eq!(tx.description, "Lunch");
    assert_eq!(tx.category, Some(TransactionCategory::Dining));
    assert_eq!(balance_of(&service, &main).await?, 3750);

    Ok(())
}

#[tokio::test]
async fn test_expense_may_overdraw() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;

    expense(&service, &main, 300).await?;
    assert_eq!(balance_of(&service, &main).await?, -300);

    Ok(())
}

#[tokio::test]
async fn test_moving_transaction_between_passbooks() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let x = create_passbook(&service, "X").await?;
    let y = service
        .create_passbook("Y".to_string(), "#FF7F50".to_string(), None)
        .await?;

    income(&service, &x, 500).await?;
    let tx = income(&service, &y, 200).await?;
    assert_eq!(balance_of(&service, &x).await?, 500);
    assert_eq!(balance_of(&service, &y).await?, 200);

    let moved = service
        .update_transaction(tx.id, TransactionUpdate::passbook(x.id))
        .await?;

    assert_eq!(balance_of(&service, &x).await?, 700);
    assert_eq!(balance_of(&service, &y).await?, 0);
    assert_eq!(moved.passbook_id, x.id);
    assert_eq!(moved.passbook_name, "X");
    assert_eq!(moved.passbook_color, "#7B68EE");
    assert_consistent(&service).await?;

    Ok(())
}

#[tokio::test]
async fn test_move_with_new_amount() -> Result<()> {
    let service = memory_service();
    let x = create_passbook(&service, "X").await?;
    let y = create_passbook(&service, "Y").await?;
    income(&service, &x, 500).await?;
    let tx = expense(&service, &y, 200).await?;
    assert_eq!(balance_of(&service, &y).await?, -200);

    service
        .update_transaction(
            tx.id,
            TransactionUpdate {
                amount_cents: Some(100),
                passbook_id: Some(x.id),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(balance_of(&service, &x).await?, 400);
    assert_eq!(balance_of(&service, &y).await?, 0);
    assert_consistent(&service).await?;

    Ok(())
}

#[tokio::test]
async fn test_update_to_same_passbook_and_amount_is_idempotent() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;
    let tx = income(&service, &main, 900).await?;

    for _ in 0..3 {
        service
            .update_transaction(
                tx.id,
                TransactionUpdate {
                    amount_cents: Some(900),
                    passbook_id: Some(main.id),
                    ..Default::default()
                },
            )
            .await?;
    }

    assert_eq!(balance_of(&service, &main).await?, 900);
    Ok(())
}

#[tokio::test]
async fn test_metadata_update_leaves_balance_alone() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;
    let tx = expense(&service, &main, 450).await?;

    let updated = service
        .update_transaction(
            tx.id,
            TransactionUpdate {
                description: Some("Bus pass".to_string()),
                date: Some(parse_date("2024-05-01")),
                category: Some(TransactionCategory::Transportation),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(updated.description, "Bus pass");
    assert_eq!(updated.date, parse_date("2024-05-01"));
    assert_eq!(updated.category, Some(TransactionCategory::Transportation));
    assert_eq!(updated.created_at, tx.created_at);
    assert!(updated.updated_at >= tx.updated_at);
    assert_eq!(balance_of(&service, &main).await?, -450);

    Ok(())
}

#[tokio::test]
async fn test_invalid_amounts_are_rejected() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;

    for amount in [0, -100] {
        let err = service
            .create_transaction(
                main.id,
                amount,
                TransactionKind::Income,
                Utc::now(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }

    let tx = income(&service, &main, 100).await?;
    let err = service
        .update_transaction(tx.id, TransactionUpdate::amount(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    assert_eq!(balance_of(&service, &main).await?, 100);
    assert_eq!(service.all_transactions().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_balance_out_of_range_is_rejected_without_writes() -> Result<()> {
    let service = memory_service();
    let main = create_with_ratio(&service, "Main", 100).await?;
    let side = create_passbook(&service, "Side").await?;
    income(&service, &main, i64::MAX - 10).await?;
    let small = income(&service, &side, 100).await?;
    let before = snapshot(&service).await?;

    let err = income(&service, &main, 100).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::InvalidAmount(_))
    ));

    let err = service
        .update_transaction(small.id, TransactionUpdate::passbook(main.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .distribute_income(100, &[main.id], None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    assert_eq!(snapshot(&service).await?, before);
    assert_eq!(balance_of(&service, &main).await?, i64::MAX - 10);
    assert_eq!(service.all_transactions().await?.len(), 2);

    // Spending brings the balance back into range
    expense(&service, &main, 1000).await?;
    income(&service, &main, 100).await?;
    assert_eq!(balance_of(&service, &main).await?, i64::MAX - 910);

    Ok(())
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;

    let err = service
        .create_transaction(
            Uuid::new_v4(),
            100,
            TransactionKind::Income,
            Utc::now(),
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PassbookNotFound(_)));

    let err = service
        .update_transaction(Uuid::new_v4(), TransactionUpdate::amount(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    let err = service.delete_transaction(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::TransactionNotFound(_)));

    // Moving to a missing passbook leaves everything untouched
    let tx = income(&service, &main, 250).await?;
    let err = service
        .update_transaction(tx.id, TransactionUpdate::passbook(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PassbookNotFound(_)));
    assert_eq!(balance_of(&service, &main).await?, 250);
    assert_eq!(service.get_transaction(tx.id).await?.passbook_id, main.id);

    Ok(())
}

#[tokio::test]
async fn test_list_transactions_filters_and_orders() -> Result<()> {
    let service = memory_service();
    let main = create_passbook(&service, "Main").await?;
    let travel = create_passbook(&service, "Travel").await?;

    for (passbook, amount, kind, date) in [
        (&main, 5000, TransactionKind::Income, "2024-01-01"),
        (&main, 700, TransactionKind::Expense, "2024-01-20"),
        (&travel, 300, TransactionKind::Expense, "2024-01-10"),
        (&main, 200, TransactionKind::Expense, "2024-02-03"),
    ] {
        service
            .create_transaction(passbook.id, amount, kind, parse_date(date), None, None)
            .await?;
    }

    let all = service.list_transactions(&TransactionFilter::default()).await?;
    let dates: Vec<_> = all
        .iter()
        .map(|t| t.date.format("%Y-%m-%d").to_string())
        .collect();
    assert_eq!(dates, ["2024-02-03", "2024-01-20", "2024-01-10", "2024-01-01"]);

    let main_only = service
        .list_transactions(&TransactionFilter::for_passbook(main.id))
        .await?;
    assert_eq!(main_only.len(), 3);

    let january_expenses = service
        .list_transactions(&TransactionFilter {
            kind: Some(TransactionKind::Expense),
            ..TransactionFilter::between(parse_date("2024-01-01"), parse_date("2024-01-31"))
        })
        .await?;
    let amounts: Vec<_> = january_expenses.iter().map(|t| t.amount_cents).collect();
    assert_eq!(amounts, [700, 300]);

    let recent = service.recent_transactions(2).await?;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].amount_cents, 200);

    Ok(())
}

#[tokio::test]
async fn test_balance_matches_replay_after_mixed_operations() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = create_passbook(&service, "A").await?;
    let b = create_passbook(&service, "B").await?;
    let c = create_passbook(&service, "C").await?;
    let books = [&a, &b, &c];

    // Deterministic pseudo-random sequence of creates, edits, moves and deletes
    let mut seed: u64 = 0x5EED;
    let mut next = move |bound: u64| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) % bound
    };

    let mut ids = Vec::new();
    for _ in 0..60 {
        match next(4) {
            0 | 1 => {
                let book = books[next(3) as usize];
                let amount = next(10_000) as i64 + 1;
                let tx = if next(2) == 0 {
                    income(&service, book, amount).await?
                } else {
                    expense(&service, book, amount).await?
                };
                ids.push(tx.id);
            }
            2 if !ids.is_empty() => {
                let id = ids[next(ids.len() as u64) as usize];
                let update = TransactionUpdate {
                    amount_cents: Some(next(5_000) as i64 + 1),
                    passbook_id: Some(books[next(3) as usize].id),
                    ..Default::default()
                };
                service.update_transaction(id, update).await?;
            }
            3 if !ids.is_empty() => {
                let id = ids.swap_remove(next(ids.len() as u64) as usize);
                service.delete_transaction(id).await?;
            }
            _ => {}
        }
    }

    assert_consistent(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_writers_keep_ledger_consistent() -> Result<()> {
    let service = Arc::new(memory_service());
    let main = create_passbook(&*service, "Main").await?;
    let side = create_passbook(&*service, "Side").await?;

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        let (main, side) = (main.clone(), side.clone());
        handles.push(tokio::spawn(async move {
            let tx = income(&*service, &main, 100).await?;
            if i % 2 == 0 {
                service
                    .update_transaction(tx.id, TransactionUpdate::passbook(side.id))
                    .await?;
            }
            anyhow::Ok(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(service.all_transactions().await?.len(), 20);
    assert_eq!(balance_of(&*service, &main).await?, 1000);
    assert_eq!(balance_of(&*service, &side).await?, 1000);
    assert_consistent(&*service).await?;

    Ok(())
}
