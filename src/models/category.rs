use serde::Serialize;

/// A reference entry in the category lookup table. Not enforced as a
/// foreign key on transactions; `Transaction::category` stays free text.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: Option<i64>,
    pub name: String,
    pub keywords: Vec<String>,
}
