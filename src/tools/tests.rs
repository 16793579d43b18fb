#![allow(clippy::unwrap_used)]

use super::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn handler_db() -> Database {
    Database::open_in_memory().unwrap()
}

fn request(tool: &str, arguments: Value) -> ToolRequest {
    ToolRequest {
        tool: tool.to_string(),
        arguments,
    }
}

fn recent_date(days_ago: i64) -> String {
    (Local::now().date_naive() - Duration::days(days_ago))
        .format("%Y-%m-%d")
        .to_string()
}

fn statement_args(filename: &str) -> Value {
    json!({
        "statement_filename": filename,
        "account_type": "debit",
        "transactions": [
            { "date": recent_date(3), "description": "GROCERY MART", "amount": "-42.50" },
            { "date": recent_date(2), "description": "PAYROLL DEPOSIT", "amount": "1500.00" },
            { "date": recent_date(1), "description": "E-TRANSFER TO SAVINGS", "amount": "-200.00" },
        ],
    })
}

struct FixedSource {
    txns: Vec<Transaction>,
}

impl TransactionSource for FixedSource {
    fn fetch_transactions(&self, _login_id: &str, days: u32) -> Result<Vec<Transaction>> {
        let start = Local::now().date_naive() - Duration::days(i64::from(days));
        Ok(self
            .txns
            .iter()
            .filter(|t| t.date > start)
            .cloned()
            .collect())
    }
}

fn source_txn(days_ago: i64, amount: Decimal, category: &str) -> Transaction {
    Transaction {
        id: None,
        date: Local::now().date_naive() - Duration::days(days_ago),
        description: format!("{category} PURCHASE"),
        amount,
        balance: None,
        account_type: AccountType::Debit,
        category: Some(category.to_string()),
        is_transfer: false,
        statement_file: "mar.pdf".into(),
    }
}

// ── Storage tools ─────────────────────────────────────────────

#[test]
fn test_process_statement_reply() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request("process_statement", statement_args("mar.pdf")));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert_eq!(data["transactions_added"], 3);
    assert_eq!(data["transactions_parsed"], 3);
}

#[test]
fn test_process_statement_twice_reports_already_processed() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    handler.dispatch(&request("process_statement", statement_args("mar.pdf")));
    let reply = handler.dispatch(&request("process_statement", statement_args("mar.pdf")));
    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["already_processed"], true);
}

#[test]
fn test_process_statement_rejects_bad_account_type() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let mut args = statement_args("mar.pdf");
    args["account_type"] = json!("chequing");
    let reply = handler.dispatch(&request("process_statement", args));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("account_type"));
}

#[test]
fn test_query_transactions_prefers_search_term() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    handler.dispatch(&request("process_statement", statement_args("mar.pdf")));
    let reply = handler.dispatch(&request(
        "query_transactions",
        json!({ "search_term": "grocery" }),
    ));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert_eq!(data["count"], 1);
    assert_eq!(data["transactions"][0]["description"], "GROCERY MART");
}

#[test]
fn test_row_without_amount_skipped_batch_continues() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request(
        "process_statement",
        json!({
            "statement_filename": "partial.pdf",
            "account_type": "debit",
            "transactions": [
                { "date": recent_date(2), "description": "GOOD ROW", "amount": "-9.99" },
                { "date": recent_date(1), "description": "NO AMOUNT" },
            ],
        }),
    ));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert_eq!(data["transactions_parsed"], 1);
    assert_eq!(data["transactions_added"], 1);
}

#[test]
fn test_query_window_defaults_to_trailing_days() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    handler.dispatch(&request(
        "process_statement",
        json!({
            "statement_filename": "mixed.pdf",
            "account_type": "debit",
            "transactions": [
                { "date": recent_date(200), "description": "STALE PURCHASE", "amount": "-10.00" },
                { "date": recent_date(2), "description": "FRESH PURCHASE", "amount": "-20.00" },
            ],
        }),
    ));

    let reply = handler.dispatch(&request("query_transactions", json!({ "days": 7 })));
    let data = reply.data.unwrap();
    assert_eq!(data["count"], 1);
    assert_eq!(data["transactions"][0]["description"], "FRESH PURCHASE");

    // No arguments at all: the default 30-day window still applies.
    let reply = handler.dispatch(&request("query_transactions", json!({})));
    assert_eq!(reply.data.unwrap()["count"], 1);

    // Explicit dates win over the day window.
    let reply = handler.dispatch(&request(
        "query_transactions",
        json!({ "start_date": "2000-01-01" }),
    ));
    assert_eq!(reply.data.unwrap()["count"], 2);

    let reply = handler.dispatch(&request("query_transactions", json!({ "days": 0 })));
    assert!(!reply.success);
}

#[test]
fn test_spending_summary_respects_days_window() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    handler.dispatch(&request(
        "process_statement",
        json!({
            "statement_filename": "mixed.pdf",
            "account_type": "debit",
            "transactions": [
                { "date": recent_date(200), "description": "STALE PURCHASE", "amount": "-10.00" },
                { "date": recent_date(2), "description": "FRESH PURCHASE", "amount": "-20.00" },
            ],
        }),
    ));
    let reply = handler.dispatch(&request("get_spending_summary", json!({ "days": 7 })));
    let data = reply.data.unwrap();
    assert_eq!(data["total_spent"], 20.0);
    assert_eq!(data["transaction_count"], 1);
}

#[test]
fn test_spending_summary_excludes_transfers() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    handler.dispatch(&request("process_statement", statement_args("mar.pdf")));
    let reply = handler.dispatch(&request("get_spending_summary", json!({})));
    let data = reply.data.unwrap();
    // the -200.00 e-transfer does not count as spending
    assert_eq!(data["total_spent"], 42.5);
    assert_eq!(data["total_income"], 1500.0);
}

#[test]
fn test_update_category_rejects_blank() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request(
        "update_transaction_category",
        json!({ "transaction_id": 1, "category": "   " }),
    ));
    assert!(!reply.success);
}

#[test]
fn test_category_tools_round_trip() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request(
        "upsert_category",
        json!({ "name": "Dining", "keywords": ["restaurant", "coffee"] }),
    ));
    assert!(reply.success);
    let reply = handler.dispatch(&request("get_categories", json!({})));
    let data = reply.data.unwrap();
    assert_eq!(data["count"], 1);
    assert_eq!(data["categories"][0]["name"], "Dining");
    assert_eq!(data["categories"][0]["keywords"][1], "coffee");
}

#[test]
fn test_unknown_tool_is_an_error_reply() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request("defragment", json!({})));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("defragment"));
}

#[test]
fn test_malformed_arguments_become_error_reply() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request(
        "update_transaction_category",
        json!({ "transaction_id": "not-a-number", "category": "Dining" }),
    ));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("invalid arguments"));
}

// ── Analysis tools ────────────────────────────────────────────

#[test]
fn test_analyze_spending_via_source() {
    let mut db = handler_db();
    let source = FixedSource {
        txns: vec![
            source_txn(1, dec!(-60.00), "Groceries"),
            source_txn(2, dec!(-40.00), "Dining"),
        ],
    };
    let mut handler = ToolHandler::with_source(&mut db, &source);
    let reply = handler.dispatch(&request("analyze_spending", json!({ "days": 30 })));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert_eq!(data["period_summary"]["total_spent"], 100.0);
    assert_eq!(data["category_breakdown"][0]["category"], "Groceries");
    assert!(!data["insights"].as_array().unwrap().is_empty());
}

#[test]
fn test_analyze_spending_rejects_out_of_range_days() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request("analyze_spending", json!({ "days": 400 })));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("between 1 and 365"));
}

#[test]
fn test_analyze_spending_empty_window() {
    let mut db = handler_db();
    let mut handler = ToolHandler::new(&mut db);
    let reply = handler.dispatch(&request("analyze_spending", json!({})));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("No transactions found"));
}

#[test]
fn test_analyze_spending_falls_back_to_store() {
    let mut db = handler_db();
    let today = Local::now().date_naive();
    let args = json!({
        "statement_filename": "recent.pdf",
        "account_type": "debit",
        "transactions": [
            { "date": today.format("%Y-%m-%d").to_string(),
              "description": "COFFEE BAR", "amount": "-4.50", "category": "Dining" },
        ],
    });
    let mut handler = ToolHandler::new(&mut db);
    handler.dispatch(&request("process_statement", args));
    let reply = handler.dispatch(&request("analyze_spending", json!({ "days": 7 })));
    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["period_summary"]["total_spent"], 4.5);
}

#[test]
fn test_source_failure_becomes_error_reply() {
    struct DownSource;
    impl TransactionSource for DownSource {
        fn fetch_transactions(&self, _login_id: &str, _days: u32) -> Result<Vec<Transaction>> {
            Err(crate::error::Error::Upstream("connection refused".into()))
        }
    }
    let mut db = handler_db();
    let source = DownSource;
    let mut handler = ToolHandler::with_source(&mut db, &source);
    let reply = handler.dispatch(&request("analyze_spending", json!({})));
    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("upstream data source unavailable"));
}

#[test]
fn test_compare_periods_splits_on_boundary() {
    let mut db = handler_db();
    let source = FixedSource {
        txns: vec![
            source_txn(5, dec!(-100.00), "Groceries"),
            source_txn(40, dec!(-50.00), "Groceries"),
        ],
    };
    let mut handler = ToolHandler::with_source(&mut db, &source);
    let reply = handler.dispatch(&request(
        "compare_periods",
        json!({ "current_period_days": 30, "previous_period_days": 30 }),
    ));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert_eq!(data["comparison"]["current_period"]["total"], 100.0);
    assert_eq!(data["comparison"]["previous_period"]["total"], 50.0);
    assert_eq!(data["comparison"]["trend"], "increased");
}

#[test]
fn test_categorize_expenses_reports_metrics() {
    let mut db = handler_db();
    let source = FixedSource {
        txns: vec![
            source_txn(1, dec!(-70.00), "Groceries"),
            source_txn(2, dec!(-30.00), "Entertainment"),
        ],
    };
    let mut handler = ToolHandler::with_source(&mut db, &source);
    let reply = handler.dispatch(&request("categorize_expenses", json!({})));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert_eq!(data["summary"]["category_count"], 2);
    assert_eq!(data["metrics"]["concentration_level"], "high");
    assert_eq!(
        data["metrics"]["classification_breakdown"]["essential"]["amount"],
        70.0
    );
}

#[test]
fn test_financial_summary_includes_health_and_split() {
    let mut db = handler_db();
    let source = FixedSource {
        txns: vec![
            source_txn(1, dec!(-60.00), "Groceries"),
            source_txn(2, dec!(-40.00), "Dining"),
        ],
    };
    let mut handler = ToolHandler::with_source(&mut db, &source);
    let reply = handler.dispatch(&request(
        "get_financial_summary",
        json!({ "days": 30, "include_comparisons": false }),
    ));
    assert!(reply.success);
    let data = reply.data.unwrap();
    assert!(data["health_score"].as_u64().unwrap() <= 100);
    assert_eq!(data["spending_by_type"]["essential"]["amount"], 60.0);
    assert!(data.get("comparison").is_none());
    assert_eq!(data["top_categories"][0]["category"], "Groceries");
}

#[test]
fn test_financial_summary_with_comparison_window() {
    let mut db = handler_db();
    let source = FixedSource {
        txns: vec![
            source_txn(3, dec!(-80.00), "Groceries"),
            source_txn(45, dec!(-20.00), "Groceries"),
        ],
    };
    let mut handler = ToolHandler::with_source(&mut db, &source);
    let reply = handler.dispatch(&request("get_financial_summary", json!({ "days": 30 })));
    assert!(reply.success);
    let data = reply.data.unwrap();
    let comparison = &data["comparison"]["comparison"];
    assert_eq!(comparison["current_period"]["total"], 80.0);
    assert_eq!(comparison["previous_period"]["total"], 20.0);
}
