//! Chain state: record types, ordered stores, and the pending overlay.

/// Chain state stores and the transactional overlay.
pub mod chain;

/// Generic object store boundary.
pub mod objects;

/// Record types mutated by market execution.
pub mod records;

pub use chain::{ChainState, PendingState};
pub use objects::{EvaluationContext, ObjectKind, ObjectRecord, SetObjectOperation};
pub use records::{AssetRecord, BalanceKey, BalanceRecord, MarketStatus, AVG_PRICE_WINDOW};
