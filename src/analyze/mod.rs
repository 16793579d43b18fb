use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::classify::{Classification, Classifier, Priority};
use crate::models::Transaction;

const PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Spending aggregates over one date window, computed from a flat
/// transaction slice. Only negative, non-transfer amounts count toward
/// totals; `transaction_count` covers the whole input.
#[derive(Debug, Clone)]
pub(crate) struct SpendingAnalysis {
    pub total_spent: Decimal,
    pub categories: BTreeMap<String, Decimal>,
    pub daily_spending: BTreeMap<NaiveDate, Decimal>,
    pub transaction_count: usize,
    pub average_transaction: Decimal,
    pub period_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CategoryShare {
    pub category: String,
    pub amount: Decimal,
    pub percentage: Decimal,
    pub daily_average: Decimal,
    pub classification: Classification,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DailySpend {
    pub date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TrendReport {
    pub trend: Trend,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_half_average: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_half_average: Option<Decimal>,
}

impl SpendingAnalysis {
    pub(crate) fn from_transactions(txns: &[Transaction], period_days: u32) -> Self {
        let mut total_spent = Decimal::ZERO;
        let mut categories: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut daily_spending: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

        for txn in txns {
            if !txn.is_expense() || txn.is_transfer {
                continue;
            }
            let amount = txn.abs_amount();
            total_spent += amount;
            let category = txn.category.clone().unwrap_or_else(|| "Other".to_string());
            *categories.entry(category).or_default() += amount;
            *daily_spending.entry(txn.date).or_default() += amount;
        }

        let transaction_count = txns.len();
        let average_transaction = if transaction_count > 0 {
            (total_spent / Decimal::from(transaction_count)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            total_spent,
            categories,
            daily_spending,
            transaction_count,
            average_transaction,
            period_days,
        }
    }

    pub(crate) fn daily_average(&self) -> Decimal {
        if self.period_days == 0 {
            return Decimal::ZERO;
        }
        (self.total_spent / Decimal::from(self.period_days)).round_dp(2)
    }

    pub(crate) fn transactions_per_day(&self) -> Decimal {
        if self.period_days == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.transaction_count) / Decimal::from(self.period_days)).round_dp(2)
    }

    /// Per-category shares sorted by amount descending, enriched with the
    /// classifier's classification and monitoring priority.
    pub(crate) fn category_breakdown(&self, classifier: &Classifier) -> Vec<CategoryShare> {
        let mut breakdown: Vec<CategoryShare> = self
            .categories
            .iter()
            .map(|(category, &amount)| {
                let percentage = if self.total_spent > Decimal::ZERO {
                    (amount / self.total_spent * PERCENT).round_dp(2)
                } else {
                    Decimal::ZERO
                };
                let daily_average = if self.period_days > 0 {
                    (amount / Decimal::from(self.period_days)).round_dp(2)
                } else {
                    Decimal::ZERO
                };
                CategoryShare {
                    category: category.clone(),
                    amount: amount.round_dp(2),
                    percentage,
                    daily_average,
                    classification: classifier.classify(category),
                    priority: Classifier::priority(percentage),
                }
            })
            .collect();
        breakdown.sort_by(|a, b| b.amount.cmp(&a.amount));
        breakdown
    }

    /// The heaviest spending days in the window, largest first.
    pub(crate) fn top_spending_days(&self, n: usize) -> Vec<DailySpend> {
        let mut days: Vec<DailySpend> = self
            .daily_spending
            .iter()
            .map(|(&date, &amount)| DailySpend {
                date,
                amount: amount.round_dp(2),
            })
            .collect();
        days.sort_by(|a, b| b.amount.cmp(&a.amount));
        days.truncate(n);
        days
    }

    /// First-half/second-half comparison of the day-sorted series, with a
    /// 10% band around "stable". Needs at least two distinct days.
    pub(crate) fn spending_trend(&self) -> TrendReport {
        if self.daily_spending.len() < 2 {
            return TrendReport {
                trend: Trend::InsufficientData,
                description: "Not enough data to determine trend",
                first_half_average: None,
                second_half_average: None,
            };
        }

        let amounts: Vec<Decimal> = self.daily_spending.values().copied().collect();
        let mid = amounts.len() / 2;
        let first_half: Decimal = amounts[..mid].iter().sum();
        let second_half: Decimal = amounts[mid..].iter().sum();
        let first_avg = first_half / Decimal::from(mid);
        let second_avg = second_half / Decimal::from(amounts.len() - mid);

        let (trend, description) = if second_avg > first_avg * Decimal::new(11, 1) {
            (Trend::Increasing, "Spending is trending upward")
        } else if second_avg < first_avg * Decimal::new(9, 1) {
            (Trend::Decreasing, "Spending is trending downward")
        } else {
            (Trend::Stable, "Spending is relatively stable")
        };

        TrendReport {
            trend,
            description,
            first_half_average: Some(first_avg.round_dp(2)),
            second_half_average: Some(second_avg.round_dp(2)),
        }
    }

    /// Narrative observations about the window.
    pub(crate) fn insights(&self) -> Vec<String> {
        let mut insights = Vec::new();

        if let Some((category, amount)) = self
            .categories
            .iter()
            .max_by(|a, b| a.1.cmp(b.1))
        {
            insights.push(format!(
                "Your highest spending category is {category} at ${}",
                amount.round_dp(2)
            ));
        }

        let daily_average = self.daily_average();
        if daily_average > Decimal::ZERO {
            insights.push(format!("You spend an average of ${daily_average} per day"));
        }

        if self.categories.len() > 5 {
            insights.push("Your spending is well-diversified across multiple categories".into());
        } else if self.categories.len() <= 2 && !self.categories.is_empty() {
            insights.push("Your spending is concentrated in few categories".into());
        }

        if self.transaction_count > 0 && self.total_spent > Decimal::ZERO {
            let avg = self.total_spent / Decimal::from(self.transaction_count);
            if avg < Decimal::from(20) {
                insights.push("You tend to make many small purchases".into());
            } else if avg > Decimal::from(100) {
                insights.push("You tend to make fewer, larger purchases".into());
            }
        }

        insights
    }
}

// ── Period comparison ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PeriodTotals {
    pub total: Decimal,
    pub days: u32,
    pub daily_average: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CategoryChange {
    pub current: Decimal,
    pub previous: Decimal,
    pub change: Decimal,
    pub change_percentage: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ChangeTrend {
    Increased,
    Decreased,
    Unchanged,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PeriodComparison {
    pub current_period: PeriodTotals,
    pub previous_period: PeriodTotals,
    pub change_amount: Decimal,
    pub change_percentage: Decimal,
    pub daily_change: Decimal,
    pub trend: ChangeTrend,
    pub category_changes: BTreeMap<String, CategoryChange>,
}

/// Compares two independently-sized windows. Percentage changes are defined
/// as 0 when the baseline is 0 rather than a division fault.
pub(crate) fn compare_periods(
    current: &SpendingAnalysis,
    previous: &SpendingAnalysis,
) -> PeriodComparison {
    let change_amount = current.total_spent - previous.total_spent;
    let change_percentage = if previous.total_spent > Decimal::ZERO {
        (change_amount / previous.total_spent * PERCENT).round_dp(2)
    } else {
        Decimal::ZERO
    };

    let mut category_changes = BTreeMap::new();
    let all_categories: std::collections::BTreeSet<&String> = current
        .categories
        .keys()
        .chain(previous.categories.keys())
        .collect();
    for category in all_categories {
        let cur = current
            .categories
            .get(category)
            .copied()
            .unwrap_or_default();
        let prev = previous
            .categories
            .get(category)
            .copied()
            .unwrap_or_default();
        let change = cur - prev;
        let pct = if prev > Decimal::ZERO {
            (change / prev * PERCENT).round_dp(2)
        } else {
            Decimal::ZERO
        };
        category_changes.insert(
            category.clone(),
            CategoryChange {
                current: cur.round_dp(2),
                previous: prev.round_dp(2),
                change: change.round_dp(2),
                change_percentage: pct,
            },
        );
    }

    let trend = if change_amount > Decimal::ZERO {
        ChangeTrend::Increased
    } else if change_amount < Decimal::ZERO {
        ChangeTrend::Decreased
    } else {
        ChangeTrend::Unchanged
    };

    let current_daily = current.daily_average();
    let previous_daily = previous.daily_average();

    PeriodComparison {
        current_period: PeriodTotals {
            total: current.total_spent.round_dp(2),
            days: current.period_days,
            daily_average: current_daily,
        },
        previous_period: PeriodTotals {
            total: previous.total_spent.round_dp(2),
            days: previous.period_days,
            daily_average: previous_daily,
        },
        change_amount: change_amount.round_dp(2),
        change_percentage,
        daily_change: (current_daily - previous_daily).round_dp(2),
        trend,
        category_changes,
    }
}

/// Narrative summary of a period comparison.
pub(crate) fn comparison_insights(comparison: &PeriodComparison) -> Vec<String> {
    let mut insights = Vec::new();
    let pct = comparison.change_percentage;
    let amount = comparison.change_amount;

    if pct > Decimal::from(10) {
        insights.push(format!(
            "Your spending has increased significantly by {pct}% (${amount})"
        ));
    } else if pct > Decimal::from(5) {
        insights.push(format!(
            "Your spending has increased moderately by {pct}% (${amount})"
        ));
    } else if pct < Decimal::from(-10) {
        insights.push(format!(
            "Your spending has decreased significantly by {}% (${})",
            pct.abs(),
            amount.abs()
        ));
    } else if pct < Decimal::from(-5) {
        insights.push(format!(
            "Your spending has decreased moderately by {}% (${})",
            pct.abs(),
            amount.abs()
        ));
    } else {
        insights.push("Your spending has remained relatively stable between periods".into());
    }

    if let Some((category, change)) = comparison
        .category_changes
        .iter()
        .max_by(|a, b| a.1.change.cmp(&b.1.change))
    {
        if change.change > Decimal::ZERO {
            insights.push(format!(
                "Biggest spending increase: {category} (+${})",
                change.change
            ));
        }
    }
    if let Some((category, change)) = comparison
        .category_changes
        .iter()
        .min_by(|a, b| a.1.change.cmp(&b.1.change))
    {
        if change.change < Decimal::ZERO {
            insights.push(format!(
                "Biggest spending decrease: {category} (-${})",
                change.change.abs()
            ));
        }
    }

    if comparison.daily_change.abs() > Decimal::from(5) {
        let direction = if comparison.daily_change > Decimal::ZERO {
            "increased"
        } else {
            "decreased"
        };
        insights.push(format!(
            "Daily spending average {direction} by ${}",
            comparison.daily_change.abs()
        ));
    }

    insights
}

// ── Breakdown metrics ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClassificationSlice {
    pub count: usize,
    pub amount: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BreakdownMetrics {
    pub classification_breakdown: BTreeMap<&'static str, ClassificationSlice>,
    pub priority_distribution: BTreeMap<&'static str, usize>,
    pub top_3_percentage: Decimal,
    pub concentration_level: &'static str,
}

/// Classification and concentration metrics over a sorted breakdown.
pub(crate) fn breakdown_metrics(
    breakdown: &[CategoryShare],
    total_spent: Decimal,
) -> BreakdownMetrics {
    let mut classification_breakdown: BTreeMap<&'static str, ClassificationSlice> = BTreeMap::new();
    for share in breakdown {
        let slice = classification_breakdown
            .entry(share.classification.as_str())
            .or_insert_with(|| ClassificationSlice {
                count: 0,
                amount: Decimal::ZERO,
                percentage: Decimal::ZERO,
            });
        slice.count += 1;
        slice.amount += share.amount;
    }
    for slice in classification_breakdown.values_mut() {
        slice.percentage = if total_spent > Decimal::ZERO {
            (slice.amount / total_spent * PERCENT).round_dp(2)
        } else {
            Decimal::ZERO
        };
        slice.amount = slice.amount.round_dp(2);
    }

    let mut priority_distribution: BTreeMap<&'static str, usize> = BTreeMap::new();
    for share in breakdown {
        *priority_distribution.entry(share.priority.as_str()).or_insert(0) += 1;
    }

    let top_3_percentage: Decimal = breakdown.iter().take(3).map(|s| s.percentage).sum();
    let concentration_level = if top_3_percentage > Decimal::from(70) {
        "high"
    } else if top_3_percentage > Decimal::from(50) {
        "medium"
    } else {
        "low"
    };

    BreakdownMetrics {
        classification_breakdown,
        priority_distribution,
        top_3_percentage: top_3_percentage.round_dp(2),
        concentration_level,
    }
}

/// Narrative observations about a category breakdown.
pub(crate) fn breakdown_insights(breakdown: &[CategoryShare], total_spent: Decimal) -> Vec<String> {
    let Some(top) = breakdown.first() else {
        return vec!["No spending categories found".into()];
    };
    let mut insights = vec![format!(
        "Your highest spending category is {} at {}% of total spending",
        top.category,
        top.percentage.round_dp(1)
    )];

    let essential: Decimal = breakdown
        .iter()
        .filter(|s| s.classification == Classification::Essential)
        .map(|s| s.amount)
        .sum();
    let discretionary: Decimal = breakdown
        .iter()
        .filter(|s| s.classification == Classification::Discretionary)
        .map(|s| s.amount)
        .sum();

    if essential > Decimal::ZERO && discretionary > Decimal::ZERO && total_spent > Decimal::ZERO {
        let essential_pct = (essential / total_spent * PERCENT).round_dp(1);
        let discretionary_pct = (discretionary / total_spent * PERCENT).round_dp(1);
        insights.push(format!(
            "Essential expenses: {essential_pct}%, Discretionary: {discretionary_pct}%"
        ));
        if discretionary_pct > Decimal::from(40) {
            insights.push("High discretionary spending - consider reviewing optional expenses".into());
        } else if essential_pct > Decimal::from(70) {
            insights.push("Most spending is on essentials - you have good spending discipline".into());
        }
    }

    let top_3: Decimal = breakdown.iter().take(3).map(|s| s.percentage).sum();
    if top_3 > Decimal::from(70) {
        insights.push("Spending is highly concentrated in few categories".into());
    } else if breakdown.len() > 8 {
        insights.push("Spending is well-diversified across many categories".into());
    }

    insights
}
