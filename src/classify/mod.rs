use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Classification {
    Essential,
    Discretionary,
    Investment,
    Other,
}

impl Classification {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Discretionary => "discretionary",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

/// How closely a category's share of total spending warrants monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Priority {
    High,
    Medium,
    Low,
    Minimal,
}

impl Priority {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
        }
    }
}

/// One ordered rule: a classification and the keywords that select it.
#[derive(Debug, Clone)]
pub(crate) struct KeywordSet {
    pub classification: Classification,
    pub keywords: Vec<String>,
}

impl KeywordSet {
    pub(crate) fn new(classification: Classification, keywords: &[&str]) -> Self {
        Self {
            classification,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// Keyword-containment classifier over category names. Sets are checked in
/// construction order and the first match wins, so callers control
/// precedence through the config they pass in.
pub(crate) struct Classifier {
    sets: Vec<KeywordSet>,
}

impl Classifier {
    pub(crate) fn new(sets: Vec<KeywordSet>) -> Self {
        Self { sets }
    }

    pub(crate) fn classify(&self, category: &str) -> Classification {
        let lower = category.to_lowercase();
        for set in &self.sets {
            if set.keywords.iter().any(|k| lower.contains(k)) {
                return set.classification;
            }
        }
        Classification::Other
    }

    /// Monitoring priority as a function of a category's share of total spend.
    pub(crate) fn priority(percentage_of_total: Decimal) -> Priority {
        if percentage_of_total > Decimal::from(30) {
            Priority::High
        } else if percentage_of_total > Decimal::from(15) {
            Priority::Medium
        } else if percentage_of_total > Decimal::from(5) {
            Priority::Low
        } else {
            Priority::Minimal
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![
            KeywordSet::new(
                Classification::Essential,
                &[
                    "groceries",
                    "grocery",
                    "food",
                    "utilities",
                    "rent",
                    "mortgage",
                    "insurance",
                    "medical",
                    "healthcare",
                    "pharmacy",
                    "gas",
                    "fuel",
                    "transportation",
                    "phone",
                    "internet",
                ],
            ),
            KeywordSet::new(
                Classification::Investment,
                &[
                    "investment",
                    "savings",
                    "retirement",
                    "mutual fund",
                    "stock",
                    "bond",
                    "rrsp",
                    "tfsa",
                    "education",
                    "tuition",
                ],
            ),
            KeywordSet::new(
                Classification::Discretionary,
                &[
                    "restaurant",
                    "dining",
                    "entertainment",
                    "shopping",
                    "retail",
                    "travel",
                    "vacation",
                    "hobby",
                    "clothing",
                    "electronics",
                    "subscription",
                    "streaming",
                    "coffee",
                    "bar",
                    "alcohol",
                ],
            ),
        ])
    }
}
