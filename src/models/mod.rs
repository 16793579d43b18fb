mod category;
mod statement;
mod transaction;

pub use category::Category;
pub use statement::Statement;
pub use transaction::{AccountType, RawTransactionRow, Transaction};
