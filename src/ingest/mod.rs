use chrono::NaiveDate;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{AccountType, RawTransactionRow, Statement, Transaction};

/// Keyword rules for spotting money movement between the user's own
/// accounts. Heuristic only: a match flags the row for exclusion from
/// spend/income totals, nothing more.
#[derive(Debug, Clone)]
pub(crate) struct TransferRules {
    keywords: Vec<String>,
}

impl TransferRules {
    pub(crate) fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_uppercase()).collect(),
        }
    }

    pub(crate) fn is_transfer(&self, description: &str) -> bool {
        let upper = description.to_uppercase();
        self.keywords.iter().any(|k| upper.contains(k))
    }
}

impl Default for TransferRules {
    fn default() -> Self {
        Self::new(&[
            "TRANSFER",
            "E-TRANSFER",
            "INTERAC",
            "ONLINE TRANSFER",
            "CREDIT CARD PAYMENT",
            "CC PAYMENT",
            "PAYMENT TO",
        ])
    }
}

/// Result of submitting one parsed statement for ingestion.
#[derive(Debug, Clone)]
pub(crate) enum StatementOutcome {
    AlreadyProcessed {
        filename: String,
    },
    Processed {
        statement_id: i64,
        statement_date: NaiveDate,
        transactions_added: usize,
        transactions_parsed: usize,
    },
}

/// Validates and persists one parsed statement. Rows that fail validation
/// are logged and skipped; the statement row and its surviving transactions
/// commit atomically. Re-submitting a known filename is reported, not
/// re-applied.
pub(crate) fn process_statement(
    db: &mut Database,
    rules: &TransferRules,
    filename: &str,
    account_type: AccountType,
    statement_date: Option<NaiveDate>,
    rows: &[RawTransactionRow],
) -> Result<StatementOutcome> {
    if db.is_statement_processed(filename)? {
        return Ok(StatementOutcome::AlreadyProcessed {
            filename: filename.to_string(),
        });
    }

    let mut txns = Vec::with_capacity(rows.len());
    for row in rows {
        match validate_row(row, rules, account_type, filename) {
            Ok(txn) => txns.push(txn),
            Err(e) => {
                warn!(date = %row.date, description = %row.description, error = %e,
                    "skipping invalid transaction row");
            }
        }
    }

    if txns.is_empty() {
        return Err(Error::Validation(
            "no valid transactions found in statement payload".into(),
        ));
    }

    // Fall back to the first row's date when the payload carries none.
    let statement_date = statement_date.unwrap_or(txns[0].date);
    let statement = Statement::new(
        filename.to_string(),
        statement_date,
        account_type,
        txns.len() as i64,
    );

    let (statement_id, transactions_added) = db.record_statement(&statement, &txns)?;
    info!(
        filename,
        transactions_added,
        transactions_parsed = txns.len(),
        "statement processed"
    );

    Ok(StatementOutcome::Processed {
        statement_id,
        statement_date,
        transactions_added,
        transactions_parsed: txns.len(),
    })
}

fn validate_row(
    row: &RawTransactionRow,
    rules: &TransferRules,
    account_type: AccountType,
    filename: &str,
) -> Result<Transaction> {
    let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("unparseable date '{}': {e}", row.date)))?;
    let description = row.description.trim();
    if description.is_empty() {
        return Err(Error::Validation("empty description".into()));
    }
    let amount = row
        .amount
        .ok_or_else(|| Error::Validation("missing or unparseable amount".into()))?;
    Ok(Transaction {
        id: None,
        date,
        description: description.to_string(),
        amount,
        balance: row.balance,
        account_type,
        category: row
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        is_transfer: rules.is_transfer(description),
        statement_file: filename.to_string(),
    })
}

#[cfg(test)]
mod tests;
