use rust_decimal::Decimal;
use serde::Serialize;

use crate::analyze::SpendingAnalysis;
use crate::classify::{Classification, Classifier};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct HealthIndicator {
    pub score: u32,
    pub status: &'static str,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct HealthIndicators {
    pub spending_diversity: HealthIndicator,
    pub transaction_frequency: HealthIndicator,
    pub spending_consistency: HealthIndicator,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OverallAssessment {
    pub status: &'static str,
    pub score: u32,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Alert {
    pub level: &'static str,
    pub title: &'static str,
    pub message: String,
    pub action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct HealthReport {
    pub indicators: HealthIndicators,
    pub overall: OverallAssessment,
    pub recommendations: Vec<String>,
    pub alerts: Vec<Alert>,
}

impl HealthReport {
    pub(crate) fn score(&self) -> u32 {
        self.overall.score
    }
}

/// Combines heuristic indicators into a bounded 0-100 health score with a
/// status label and narrative. Total-spend divisions are guarded so a
/// single-transaction window still produces a report.
pub(crate) fn assess(analysis: &SpendingAnalysis, classifier: &Classifier) -> HealthReport {
    let category_count = analysis.categories.len();
    let spending_diversity = HealthIndicator {
        score: (category_count as u32 * 10).min(100),
        status: if category_count >= 5 {
            "good"
        } else if category_count >= 3 {
            "fair"
        } else {
            "poor"
        },
        description: format!("Spending across {category_count} categories"),
    };

    let count = analysis.transaction_count;
    let transaction_frequency = HealthIndicator {
        score: if (1..=50).contains(&count) {
            100
        } else if count <= 100 {
            70
        } else {
            50
        },
        status: if (1..=50).contains(&count) {
            "good"
        } else {
            "fair"
        },
        description: format!("{count} transactions in period"),
    };

    // Placeholder until daily-variance data feeds a real consistency model.
    let spending_consistency = HealthIndicator {
        score: 75,
        status: "good",
        description: "Based on daily spending patterns".into(),
    };

    let scores = [
        spending_diversity.score,
        transaction_frequency.score,
        spending_consistency.score,
    ];
    let avg = (scores.iter().sum::<u32>() as f64 / scores.len() as f64).round() as u32;
    let overall = overall_assessment(avg.min(100));

    let recommendations = recommendations(analysis, classifier);
    let alerts = alerts(analysis, classifier);

    HealthReport {
        indicators: HealthIndicators {
            spending_diversity,
            transaction_frequency,
            spending_consistency,
        },
        overall,
        recommendations,
        alerts,
    }
}

fn overall_assessment(score: u32) -> OverallAssessment {
    let (status, message) = if score >= 80 {
        ("excellent", "Your financial habits look very healthy")
    } else if score >= 65 {
        (
            "good",
            "Your financial habits are generally good with room for improvement",
        )
    } else if score >= 50 {
        (
            "fair",
            "Your financial habits are average - consider some improvements",
        )
    } else {
        (
            "needs_improvement",
            "Your financial habits could benefit from attention",
        )
    };
    OverallAssessment {
        status,
        score,
        message,
    }
}

fn recommendations(analysis: &SpendingAnalysis, classifier: &Classifier) -> Vec<String> {
    let mut recs = Vec::new();

    if analysis.total_spent > Decimal::ZERO {
        if let Some((category, &amount)) = analysis.categories.iter().max_by(|a, b| a.1.cmp(b.1)) {
            if amount / analysis.total_spent > Decimal::new(4, 1) {
                recs.push(format!(
                    "Consider diversifying spending - {category} represents a large portion of your budget"
                ));
            }
        }
        recs.push("Consider setting monthly spending limits for each category".into());
        recs.push("Track your spending regularly to identify patterns and opportunities".into());
    }

    let has_investment = analysis
        .categories
        .keys()
        .any(|c| classifier.classify(c) == Classification::Investment);
    if !has_investment {
        recs.push("Consider allocating budget for savings and investments".into());
    }

    recs
}

fn alerts(analysis: &SpendingAnalysis, classifier: &Classifier) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if analysis.total_spent > Decimal::ZERO {
        if let Some((category, &amount)) = analysis.categories.iter().max_by(|a, b| a.1.cmp(b.1)) {
            if amount / analysis.total_spent > Decimal::new(5, 1) {
                alerts.push(Alert {
                    level: "warning",
                    title: "High Spending Concentration",
                    message: format!("Over 50% of spending is in {category}"),
                    action: "Consider reviewing this category for potential savings",
                });
            }
        }

        let investment_spend: Decimal = analysis
            .categories
            .iter()
            .filter(|(c, _)| classifier.classify(c) == Classification::Investment)
            .map(|(_, &amount)| amount)
            .sum();
        if investment_spend == Decimal::ZERO {
            alerts.push(Alert {
                level: "info",
                title: "No Investment Activity",
                message: "No investment or savings activity detected".into(),
                action: "Consider setting up automatic savings or investment contributions",
            });
        }
    }

    alerts
}

// ── Essential/discretionary/investment split ──────────────────

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TypeSlice {
    pub amount: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SpendingByType {
    pub essential: TypeSlice,
    pub discretionary: TypeSlice,
    pub investment: TypeSlice,
    pub status: &'static str,
    pub message: &'static str,
}

/// Splits total spend across the three classified buckets and labels the
/// overall balance between them.
pub(crate) fn spending_by_type(
    analysis: &SpendingAnalysis,
    classifier: &Classifier,
) -> SpendingByType {
    let mut essential = Decimal::ZERO;
    let mut discretionary = Decimal::ZERO;
    let mut investment = Decimal::ZERO;

    for (category, &amount) in &analysis.categories {
        match classifier.classify(category) {
            Classification::Essential => essential += amount,
            Classification::Discretionary => discretionary += amount,
            Classification::Investment => investment += amount,
            Classification::Other => {}
        }
    }

    let total = analysis.total_spent;
    let slice = |amount: Decimal| {
        let percentage = if total > Decimal::ZERO {
            (amount / total * Decimal::ONE_HUNDRED).round_dp(1)
        } else {
            Decimal::ZERO
        };
        TypeSlice {
            amount: amount.round_dp(2),
            percentage,
        }
    };
    let essential = slice(essential);
    let discretionary = slice(discretionary);
    let investment = slice(investment);

    let (status, message) = if total == Decimal::ZERO {
        ("no_data", "No spending data available")
    } else if essential.percentage > Decimal::from(70) {
        ("essential_heavy", "Spending is heavily focused on essentials")
    } else if discretionary.percentage > Decimal::from(60) {
        (
            "discretionary_heavy",
            "High discretionary spending - consider reviewing optional expenses",
        )
    } else if investment.percentage > Decimal::from(20) {
        (
            "investment_focused",
            "Good focus on savings and investments",
        )
    } else {
        ("balanced", "Reasonably balanced spending across categories")
    };

    SpendingByType {
        essential,
        discretionary,
        investment,
        status,
        message,
    }
}
