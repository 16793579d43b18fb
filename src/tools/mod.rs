use chrono::{Duration, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::analyze::{self, SpendingAnalysis};
use crate::classify::Classifier;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::health;
use crate::ingest::{self, StatementOutcome, TransferRules};
use crate::models::{AccountType, RawTransactionRow, Transaction};
use crate::source::{RateLimiter, TransactionSource};

const UPSTREAM_CALLS_PER_MINUTE: usize = 30;

/// One decoded request line: a tool name plus its JSON arguments.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ToolReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolReply {
    fn ok(data: Value, message: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message,
        }
    }

    pub(crate) fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

// ── Request payloads ──────────────────────────────────────────

fn default_days() -> u32 {
    30
}

fn default_limit() -> u32 {
    100
}

fn default_uncategorized_limit() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct StoreStatementRequest {
    statement_filename: String,
    account_type: String,
    #[serde(default)]
    statement_date: Option<String>,
    transactions: Vec<RawTransactionRow>,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default = "default_days")]
    days: u32,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    search_term: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
}

impl QueryRequest {
    /// Explicit dates take precedence; otherwise the trailing `days` window
    /// applies.
    fn window(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        if start.is_some() || end.is_some() {
            return Ok((start, end));
        }
        validate_days(self.days)?;
        let start = Local::now().date_naive() - Duration::days(i64::from(self.days));
        Ok((Some(start), None))
    }
}

#[derive(Debug, Deserialize)]
struct UncategorizedRequest {
    #[serde(default = "default_uncategorized_limit")]
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct RecategorizeRequest {
    transaction_id: i64,
    category: String,
}

#[derive(Debug, Deserialize)]
struct UpsertCategoryRequest {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    login_id: String,
    #[serde(default = "default_days")]
    days: u32,
}

#[derive(Debug, Deserialize)]
struct CompareRequest {
    #[serde(default)]
    login_id: String,
    #[serde(default = "default_days")]
    current_period_days: u32,
    #[serde(default = "default_days")]
    previous_period_days: u32,
}

#[derive(Debug, Deserialize)]
struct SummaryRequest {
    #[serde(default)]
    login_id: String,
    #[serde(default = "default_days")]
    days: u32,
    #[serde(default = "default_true")]
    include_comparisons: bool,
}

// ── Handler ───────────────────────────────────────────────────

/// Routes decoded tool requests to storage, ingestion and analysis.
/// Analytics tools read from the wired transaction source when one is
/// present and fall back to the local store otherwise.
pub(crate) struct ToolHandler<'a> {
    db: &'a mut Database,
    source: Option<&'a dyn TransactionSource>,
    limiter: RateLimiter,
    classifier: Classifier,
    transfer_rules: TransferRules,
}

impl<'a> ToolHandler<'a> {
    pub(crate) fn new(db: &'a mut Database) -> Self {
        Self {
            db,
            source: None,
            limiter: RateLimiter::new(UPSTREAM_CALLS_PER_MINUTE),
            classifier: Classifier::default(),
            transfer_rules: TransferRules::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_source(db: &'a mut Database, source: &'a dyn TransactionSource) -> Self {
        Self {
            db,
            source: Some(source),
            limiter: RateLimiter::new(UPSTREAM_CALLS_PER_MINUTE),
            classifier: Classifier::default(),
            transfer_rules: TransferRules::default(),
        }
    }

    /// Every failure becomes an error reply; the request loop never sees
    /// an Err from here.
    pub(crate) fn dispatch(&mut self, request: &ToolRequest) -> ToolReply {
        debug!(tool = %request.tool, "dispatching tool request");
        let result = match request.tool.as_str() {
            "process_statement" => self.process_statement(&request.arguments),
            "query_transactions" => self.query_transactions(&request.arguments),
            "get_spending_summary" => self.spending_summary(&request.arguments),
            "get_category_breakdown" => self.category_breakdown(&request.arguments),
            "get_uncategorized_transactions" => self.uncategorized(&request.arguments),
            "update_transaction_category" => self.recategorize(&request.arguments),
            "upsert_category" => self.upsert_category(&request.arguments),
            "get_categories" => self.get_categories(),
            "analyze_spending" => self.analyze_spending(&request.arguments),
            "compare_periods" => self.compare_periods(&request.arguments),
            "categorize_expenses" => self.categorize_expenses(&request.arguments),
            "get_financial_summary" => self.financial_summary(&request.arguments),
            other => return ToolReply::err(format!("unknown tool '{other}'")),
        };
        result.unwrap_or_else(|e| ToolReply::err(e.to_string()))
    }

    // ── Storage tools ─────────────────────────────────────────

    fn process_statement(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: StoreStatementRequest = parse_args(arguments)?;
        let account_type = AccountType::parse(&req.account_type).ok_or_else(|| {
            Error::Validation(format!(
                "account_type must be 'debit' or 'credit', got '{}'",
                req.account_type
            ))
        })?;
        let statement_date = req
            .statement_date
            .as_deref()
            .map(parse_date)
            .transpose()?;

        let outcome = ingest::process_statement(
            self.db,
            &self.transfer_rules,
            &req.statement_filename,
            account_type,
            statement_date,
            &req.transactions,
        )?;

        Ok(match outcome {
            StatementOutcome::AlreadyProcessed { filename } => ToolReply::ok(
                json!({ "already_processed": true, "filename": filename }),
                Some(format!("statement '{filename}' has already been processed")),
            ),
            StatementOutcome::Processed {
                statement_id,
                statement_date,
                transactions_added,
                transactions_parsed,
            } => ToolReply::ok(
                json!({
                    "statement_id": statement_id,
                    "statement_date": statement_date,
                    "transactions_added": transactions_added,
                    "transactions_parsed": transactions_parsed,
                }),
                Some(format!(
                    "stored {transactions_added} of {transactions_parsed} transactions"
                )),
            ),
        })
    }

    fn query_transactions(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: QueryRequest = parse_args(arguments)?;
        let txns = match req.search_term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => self.db.search_transactions(term, req.limit)?,
            _ => {
                let (start, end) = req.window()?;
                self.db
                    .get_transactions(start, end, req.category.as_deref(), Some(req.limit))?
            }
        };
        Ok(ToolReply::ok(
            json!({ "count": txns.len(), "transactions": txns }),
            None,
        ))
    }

    fn spending_summary(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: QueryRequest = parse_args(arguments)?;
        let (start, end) = req.window()?;
        let summary = self
            .db
            .get_spending_summary(start, end, req.category.as_deref())?;
        Ok(ToolReply::ok(json!(summary), None))
    }

    fn category_breakdown(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: QueryRequest = parse_args(arguments)?;
        let (start, end) = req.window()?;
        let categories = self.db.get_category_breakdown(start, end)?;
        Ok(ToolReply::ok(
            json!({ "count": categories.len(), "categories": categories }),
            None,
        ))
    }

    fn uncategorized(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: UncategorizedRequest = parse_args(arguments)?;
        let txns = self.db.get_uncategorized_transactions(req.limit)?;
        Ok(ToolReply::ok(
            json!({ "count": txns.len(), "transactions": txns }),
            None,
        ))
    }

    fn recategorize(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: RecategorizeRequest = parse_args(arguments)?;
        let category = req.category.trim();
        if category.is_empty() {
            return Err(Error::Validation("category must not be empty".into()));
        }
        self.db
            .update_transaction_category(req.transaction_id, category)?;
        Ok(ToolReply::ok(
            json!({ "transaction_id": req.transaction_id, "category": category }),
            Some(format!(
                "transaction {} categorized as '{category}'",
                req.transaction_id
            )),
        ))
    }

    fn upsert_category(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: UpsertCategoryRequest = parse_args(arguments)?;
        let name = req.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("category name must not be empty".into()));
        }
        self.db.upsert_category(name, &req.keywords)?;
        Ok(ToolReply::ok(
            json!({ "name": name, "keywords": req.keywords }),
            Some(format!("category '{name}' saved")),
        ))
    }

    fn get_categories(&mut self) -> Result<ToolReply> {
        let categories = self.db.get_categories()?;
        Ok(ToolReply::ok(
            json!({ "count": categories.len(), "categories": categories }),
            None,
        ))
    }

    // ── Analysis tools ────────────────────────────────────────

    fn analyze_spending(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: AnalyzeRequest = parse_args(arguments)?;
        validate_days(req.days)?;
        let txns = self.fetch_window(&req.login_id, req.days)?;
        if txns.is_empty() {
            return Ok(ToolReply::err(format!(
                "No transactions found for the last {} days",
                req.days
            )));
        }

        let analysis = SpendingAnalysis::from_transactions(&txns, req.days);
        let breakdown = analysis.category_breakdown(&self.classifier);
        Ok(ToolReply::ok(
            json!({
                "period_summary": {
                    "days": analysis.period_days,
                    "total_spent": analysis.total_spent.round_dp(2),
                    "transaction_count": analysis.transaction_count,
                    "average_transaction": analysis.average_transaction,
                    "daily_average": analysis.daily_average(),
                    "transactions_per_day": analysis.transactions_per_day(),
                },
                "category_breakdown": breakdown,
                "top_spending_days": analysis.top_spending_days(5),
                "spending_trend": analysis.spending_trend(),
                "daily_spending": analysis.daily_spending,
                "insights": analysis.insights(),
            }),
            None,
        ))
    }

    fn compare_periods(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: CompareRequest = parse_args(arguments)?;
        validate_days(req.current_period_days)?;
        validate_days(req.previous_period_days)?;

        let span = req.current_period_days + req.previous_period_days;
        let txns = self.fetch_window(&req.login_id, span)?;
        let boundary =
            Local::now().date_naive() - Duration::days(i64::from(req.current_period_days));
        let (current, previous): (Vec<Transaction>, Vec<Transaction>) =
            txns.into_iter().partition(|t| t.date > boundary);

        let current = SpendingAnalysis::from_transactions(&current, req.current_period_days);
        let previous = SpendingAnalysis::from_transactions(&previous, req.previous_period_days);
        let comparison = analyze::compare_periods(&current, &previous);
        let insights = analyze::comparison_insights(&comparison);

        Ok(ToolReply::ok(
            json!({ "comparison": comparison, "insights": insights }),
            None,
        ))
    }

    fn categorize_expenses(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: AnalyzeRequest = parse_args(arguments)?;
        validate_days(req.days)?;
        let txns = self.fetch_window(&req.login_id, req.days)?;
        let analysis = SpendingAnalysis::from_transactions(&txns, req.days);
        let breakdown = analysis.category_breakdown(&self.classifier);
        if breakdown.is_empty() {
            return Ok(ToolReply::err(format!(
                "No categorized spending found for the last {} days",
                req.days
            )));
        }

        let metrics = analyze::breakdown_metrics(&breakdown, analysis.total_spent);
        let insights = analyze::breakdown_insights(&breakdown, analysis.total_spent);
        Ok(ToolReply::ok(
            json!({
                "categories": breakdown,
                "metrics": metrics,
                "insights": insights,
                "summary": {
                    "total_spent": analysis.total_spent.round_dp(2),
                    "category_count": breakdown.len(),
                    "period_days": analysis.period_days,
                },
            }),
            None,
        ))
    }

    fn financial_summary(&mut self, arguments: &Value) -> Result<ToolReply> {
        let req: SummaryRequest = parse_args(arguments)?;
        validate_days(req.days)?;
        let txns = self.fetch_window(&req.login_id, req.days)?;
        let analysis = SpendingAnalysis::from_transactions(&txns, req.days);
        let breakdown = analysis.category_breakdown(&self.classifier);
        let report = health::assess(&analysis, &self.classifier);
        let by_type = health::spending_by_type(&analysis, &self.classifier);

        let mut data = json!({
            "period_summary": {
                "days": analysis.period_days,
                "total_spent": analysis.total_spent.round_dp(2),
                "transaction_count": analysis.transaction_count,
                "daily_average": analysis.daily_average(),
            },
            "health_score": report.score(),
            "health": report,
            "spending_by_type": by_type,
            "top_categories": breakdown.iter().take(5).collect::<Vec<_>>(),
        });

        // A comparison window shorter than a week is mostly noise.
        if req.include_comparisons && req.days >= 7 {
            let comparison_days = req.days.min(30);
            let span = req.days + comparison_days;
            let all = self.fetch_window(&req.login_id, span)?;
            let boundary = Local::now().date_naive() - Duration::days(i64::from(req.days));
            let previous: Vec<Transaction> =
                all.into_iter().filter(|t| t.date <= boundary).collect();
            let previous = SpendingAnalysis::from_transactions(&previous, comparison_days);
            let comparison = analyze::compare_periods(&analysis, &previous);
            let insights = analyze::comparison_insights(&comparison);
            data["comparison"] = json!({ "comparison": comparison, "insights": insights });
        }

        Ok(ToolReply::ok(data, None))
    }

    /// Analytics window source: the upstream provider when wired, else the
    /// trailing window of locally stored transactions.
    fn fetch_window(&self, login_id: &str, days: u32) -> Result<Vec<Transaction>> {
        if let Some(source) = self.source {
            self.limiter.acquire();
            return source.fetch_transactions(login_id, days);
        }
        let start = Local::now().date_naive() - Duration::days(i64::from(days));
        self.db.get_transactions(Some(start), None, None, None)
    }
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| Error::Validation(format!("invalid arguments: {e}")))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("unparseable date '{value}': {e}")))
}

fn validate_days(days: u32) -> Result<()> {
    if !(1..=365).contains(&days) {
        return Err(Error::Validation(format!(
            "days must be between 1 and 365, got {days}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
