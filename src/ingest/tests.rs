#![allow(clippy::unwrap_used)]

use super::*;
use rust_decimal_macros::dec;

fn row(date: &str, description: &str, amount: rust_decimal::Decimal) -> RawTransactionRow {
    RawTransactionRow {
        date: date.into(),
        description: description.into(),
        amount: Some(amount),
        balance: None,
        category: None,
    }
}

// ── Transfer detection ────────────────────────────────────────

#[test]
fn test_default_transfer_keywords() {
    let rules = TransferRules::default();
    assert!(rules.is_transfer("E-TRANSFER TO JANE"));
    assert!(rules.is_transfer("online transfer from savings"));
    assert!(rules.is_transfer("INTERAC e-Transfer"));
    assert!(rules.is_transfer("CC PAYMENT THANK YOU"));
    assert!(!rules.is_transfer("GROCERY STORE #42"));
    assert!(!rules.is_transfer("PAYROLL DEPOSIT"));
}

#[test]
fn test_custom_transfer_keywords() {
    let rules = TransferRules::new(&["wire"]);
    assert!(rules.is_transfer("Incoming WIRE"));
    assert!(!rules.is_transfer("E-TRANSFER TO JANE"));
}

// ── Statement processing ──────────────────────────────────────

#[test]
fn test_process_statement_persists_rows() {
    let mut db = Database::open_in_memory().unwrap();
    let rows = vec![
        row("2024-01-01", "COFFEE", dec!(-5.00)),
        row("2024-01-02", "PAY", dec!(1000.00)),
    ];
    let outcome = process_statement(
        &mut db,
        &TransferRules::default(),
        "A.pdf",
        AccountType::Debit,
        None,
        &rows,
    )
    .unwrap();

    match outcome {
        StatementOutcome::Processed {
            statement_date,
            transactions_added,
            transactions_parsed,
            ..
        } => {
            assert_eq!(transactions_added, 2);
            assert_eq!(transactions_parsed, 2);
            // No explicit date in the payload: first row's date is used.
            assert_eq!(
                statement_date,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let summary = db.get_spending_summary(None, None, None).unwrap();
    assert_eq!(summary.transaction_count, 2);
    assert_eq!(summary.total_spent, dec!(5.00));
    assert_eq!(summary.total_income, dec!(1000.00));
    assert_eq!(summary.average_expense, dec!(5.00));
}

#[test]
fn test_reingest_same_filename_reports_already_processed() {
    let mut db = Database::open_in_memory().unwrap();
    let rows = vec![row("2024-01-01", "COFFEE", dec!(-5.00))];
    let rules = TransferRules::default();

    process_statement(&mut db, &rules, "A.pdf", AccountType::Debit, None, &rows).unwrap();
    let second =
        process_statement(&mut db, &rules, "A.pdf", AccountType::Debit, None, &rows).unwrap();

    assert!(matches!(
        second,
        StatementOutcome::AlreadyProcessed { ref filename } if filename == "A.pdf"
    ));
    let summary = db.get_spending_summary(None, None, None).unwrap();
    assert_eq!(summary.transaction_count, 1);
}

#[test]
fn test_invalid_rows_skipped_batch_continues() {
    let mut db = Database::open_in_memory().unwrap();
    let rows = vec![
        row("not-a-date", "BAD DATE", dec!(-1.00)),
        row("2024-01-05", "   ", dec!(-2.00)),
        RawTransactionRow {
            amount: None,
            ..row("2024-01-05", "NO AMOUNT", dec!(0))
        },
        row("2024-01-06", "GOOD ROW", dec!(-3.00)),
    ];
    let outcome = process_statement(
        &mut db,
        &TransferRules::default(),
        "B.pdf",
        AccountType::Debit,
        None,
        &rows,
    )
    .unwrap();

    match outcome {
        StatementOutcome::Processed {
            transactions_added,
            transactions_parsed,
            ..
        } => {
            assert_eq!(transactions_parsed, 1);
            assert_eq!(transactions_added, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_all_rows_invalid_is_validation_error() {
    let mut db = Database::open_in_memory().unwrap();
    let rows = vec![row("2024/01/05", "SLASHED DATE", dec!(-1.00))];
    let err = process_statement(
        &mut db,
        &TransferRules::default(),
        "C.pdf",
        AccountType::Debit,
        None,
        &rows,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    // Nothing committed: the filename stays unprocessed.
    assert!(!db.is_statement_processed("C.pdf").unwrap());
}

#[test]
fn test_transfer_rows_flagged_on_ingest() {
    let mut db = Database::open_in_memory().unwrap();
    let rows = vec![
        row("2024-01-01", "E-TRANSFER TO JANE", dec!(-100.00)),
        row("2024-01-02", "GROCERY STORE", dec!(-50.00)),
    ];
    process_statement(
        &mut db,
        &TransferRules::default(),
        "D.pdf",
        AccountType::Debit,
        None,
        &rows,
    )
    .unwrap();

    let summary = db.get_spending_summary(None, None, None).unwrap();
    assert_eq!(summary.total_spent, dec!(50.00));
}

#[test]
fn test_explicit_statement_date_preserved() {
    let mut db = Database::open_in_memory().unwrap();
    let rows = vec![row("2024-01-15", "COFFEE", dec!(-5.00))];
    let outcome = process_statement(
        &mut db,
        &TransferRules::default(),
        "E.pdf",
        AccountType::Credit,
        NaiveDate::from_ymd_opt(2024, 1, 31),
        &rows,
    )
    .unwrap();
    match outcome {
        StatementOutcome::Processed { statement_date, .. } => {
            assert_eq!(
                statement_date,
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
