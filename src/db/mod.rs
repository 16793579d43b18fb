mod schema;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::*;

/// Aggregate spend/income figures for a date window, transfers excluded.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SpendingSummary {
    pub transaction_count: i64,
    pub total_spent: Decimal,
    pub total_income: Decimal,
    pub average_expense: Decimal,
}

/// One row of the per-category spending breakdown.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CategorySpend {
    pub category: String,
    pub transaction_count: i64,
    pub total_spent: Decimal,
}

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Statements ────────────────────────────────────────────

    pub(crate) fn add_statement(&self, statement: &Statement) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT INTO statements (filename, statement_date, account_type, transaction_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                statement.filename,
                statement.statement_date.format("%Y-%m-%d").to_string(),
                statement.account_type.as_str(),
                statement.transaction_count,
            ],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateStatement(statement.filename.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn is_statement_processed(&self, filename: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM statements WHERE filename = ?1",
            params![filename],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Persists a statement row together with its transaction rows as one
    /// SQLite transaction. Transactions are staged first and the statement
    /// row committed last, so a concurrent reader never observes a recorded
    /// statement without its rows (or vice versa).
    pub(crate) fn record_statement(
        &mut self,
        statement: &Statement,
        txns: &[Transaction],
    ) -> Result<(i64, usize)> {
        let tx = self.conn.transaction()?;
        let added = insert_batch(&tx, txns)?;
        tx.execute(
            "INSERT INTO statements (filename, statement_date, account_type, transaction_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                statement.filename,
                statement.statement_date.format("%Y-%m-%d").to_string(),
                statement.account_type.as_str(),
                statement.transaction_count,
            ],
        )?;
        let statement_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok((statement_id, added))
    }

    // ── Transactions ──────────────────────────────────────────

    /// Inserts non-duplicate transactions, returning the count actually
    /// inserted. Duplicates on (date, description, amount, statement_file)
    /// are skipped, not errors.
    pub(crate) fn add_transactions(&mut self, txns: &[Transaction]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let added = insert_batch(&tx, txns)?;
        tx.commit()?;
        Ok(added)
    }

    pub(crate) fn get_transactions(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        category: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>> {
        let mut sql = String::from(
            "SELECT id, date, description, amount, balance, account_type, category,
                    is_transfer, statement_file
             FROM transactions WHERE 1=1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(start) = start_date {
            sql.push_str(&format!(" AND date >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = end_date {
            sql.push_str(&format!(" AND date <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(end.format("%Y-%m-%d").to_string()));
        }
        if let Some(cat) = category {
            sql.push_str(&format!(" AND category = ?{}", param_values.len() + 1));
            param_values.push(Box::new(cat.to_string()));
        }

        sql.push_str(" ORDER BY date DESC, id DESC");

        if let Some(l) = limit {
            sql.push_str(&format!(" LIMIT {l}"));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), map_transaction)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn search_transactions(
        &self,
        search_term: &str,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, description, amount, balance, account_type, category,
                    is_transfer, statement_file
             FROM transactions WHERE description LIKE ?1
             ORDER BY date DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            params![format!("%{search_term}%"), limit],
            map_transaction,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn get_spending_summary(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        category: Option<&str>,
    ) -> Result<SpendingSummary> {
        let mut sql = String::from(
            "SELECT COUNT(*),
                    CAST(COALESCE(SUM(CASE WHEN CAST(amount AS REAL) < 0
                        THEN -CAST(amount AS REAL) ELSE 0 END), 0) AS TEXT),
                    CAST(COALESCE(SUM(CASE WHEN CAST(amount AS REAL) > 0
                        THEN CAST(amount AS REAL) ELSE 0 END), 0) AS TEXT),
                    CAST(COALESCE(AVG(CASE WHEN CAST(amount AS REAL) < 0
                        THEN -CAST(amount AS REAL) ELSE NULL END), 0) AS TEXT)
             FROM transactions WHERE is_transfer = 0",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(start) = start_date {
            sql.push_str(&format!(" AND date >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = end_date {
            sql.push_str(&format!(" AND date <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(end.format("%Y-%m-%d").to_string()));
        }
        if let Some(cat) = category {
            sql.push_str(&format!(" AND category = ?{}", param_values.len() + 1));
            param_values.push(Box::new(cat.to_string()));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let (count, spent, income, avg): (i64, String, String, String) =
            self.conn.query_row(&sql, params_ref.as_slice(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;

        Ok(SpendingSummary {
            transaction_count: count,
            total_spent: Decimal::from_str(&spent).unwrap_or_default().round_dp(2),
            total_income: Decimal::from_str(&income).unwrap_or_default().round_dp(2),
            average_expense: Decimal::from_str(&avg).unwrap_or_default().round_dp(2),
        })
    }

    pub(crate) fn get_category_breakdown(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CategorySpend>> {
        let mut sql = String::from(
            "SELECT COALESCE(category, 'Uncategorized') AS category,
                    COUNT(*),
                    CAST(SUM(-CAST(amount AS REAL)) AS TEXT)
             FROM transactions
             WHERE CAST(amount AS REAL) < 0 AND is_transfer = 0",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(start) = start_date {
            sql.push_str(&format!(" AND date >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = end_date {
            sql.push_str(&format!(" AND date <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(end.format("%Y-%m-%d").to_string()));
        }

        sql.push_str(" GROUP BY category ORDER BY SUM(-CAST(amount AS REAL)) DESC");

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), |row| {
            let spent: String = row.get(2)?;
            Ok(CategorySpend {
                category: row.get(0)?,
                transaction_count: row.get(1)?,
                total_spent: Decimal::from_str(&spent).unwrap_or_default().round_dp(2),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn update_transaction_category(
        &self,
        transaction_id: i64,
        category: &str,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE transactions SET category = ?1 WHERE id = ?2",
            params![category, transaction_id],
        )?;
        Ok(())
    }

    pub(crate) fn get_uncategorized_transactions(&self, limit: u32) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, description, amount, balance, account_type, category,
                    is_transfer, statement_file
             FROM transactions WHERE category IS NULL
             ORDER BY date DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], map_transaction)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Categories ────────────────────────────────────────────

    pub(crate) fn upsert_category(&self, name: &str, keywords: &[String]) -> Result<()> {
        let keywords_json = if keywords.is_empty() {
            None
        } else {
            serde_json::to_string(keywords).ok()
        };
        self.conn.execute(
            "INSERT INTO categories (name, keywords) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET keywords = excluded.keywords",
            params![name, keywords_json],
        )?;
        Ok(())
    }

    pub(crate) fn get_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, keywords FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            let keywords_json: Option<String> = row.get(2)?;
            Ok(Category {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                keywords: keywords_json
                    .and_then(|k| serde_json::from_str(&k).ok())
                    .unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

/// Stages a batch inside an open SQLite transaction, skipping rows whose
/// (date, description, amount, statement_file) key is already present.
fn insert_batch(tx: &rusqlite::Transaction<'_>, txns: &[Transaction]) -> Result<usize> {
    let mut added = 0;
    for txn in txns {
        let date = txn.date.format("%Y-%m-%d").to_string();
        let amount = txn.amount.to_string();
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions
             WHERE date = ?1 AND description = ?2 AND amount = ?3 AND statement_file = ?4)",
            params![date, txn.description, amount, txn.statement_file],
            |row| row.get(0),
        )?;
        if exists {
            debug!(
                description = %txn.description,
                date = %date,
                "duplicate transaction skipped"
            );
            continue;
        }
        tx.execute(
            "INSERT INTO transactions
             (date, description, amount, balance, account_type, category, is_transfer, statement_file)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                date,
                txn.description,
                amount,
                txn.balance.map(|b| b.to_string()),
                txn.account_type.as_str(),
                txn.category,
                txn.is_transfer,
                txn.statement_file,
            ],
        )?;
        added += 1;
    }
    Ok(added)
}

fn map_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(1)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let amount_str: String = row.get(3)?;
    let balance_str: Option<String> = row.get(4)?;
    let account_type: String = row.get(5)?;
    Ok(Transaction {
        id: Some(row.get(0)?),
        date,
        description: row.get(2)?,
        amount: Decimal::from_str(&amount_str).unwrap_or_default(),
        balance: balance_str.and_then(|b| Decimal::from_str(&b).ok()),
        account_type: AccountType::parse(&account_type).unwrap_or(AccountType::Debit),
        category: row.get(6)?,
        is_transfer: row.get(7)?,
        statement_file: row.get(8)?,
    })
}
