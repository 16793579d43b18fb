use chrono::NaiveDate;
use serde::Serialize;

use super::AccountType;

/// One ingested source document. `filename` is globally unique; a statement
/// is processed at most once and is immutable after ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub id: Option<i64>,
    pub filename: String,
    pub statement_date: NaiveDate,
    pub account_type: AccountType,
    pub transaction_count: i64,
}

impl Statement {
    pub fn new(
        filename: String,
        statement_date: NaiveDate,
        account_type: AccountType,
        transaction_count: i64,
    ) -> Self {
        Self {
            id: None,
            filename,
            statement_date,
            account_type,
            transaction_count,
        }
    }
}
