//! Fluent request builders and predicate construction

pub mod delete;
pub mod expr;
pub mod filter;
pub mod insert;
pub mod query;
pub mod retry;
pub mod update;

pub use delete::DeleteWrapper;
pub use expr::{BoolOp, CmpOp, Expr, FilterValue, LikeKind};
pub use filter::{Conditions, Filter};
pub use insert::InsertWrapper;
pub use query::{AnnSearch, QueryWrapper};
pub use retry::execute_with_retry;
pub use update::UpdateWrapper;
