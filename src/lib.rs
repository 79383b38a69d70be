//! # Basalt DEX
//!
//! Deterministic order-matching and settlement engine for the Basalt chain's
//! decentralized exchange.
//!
//! ## Architecture
//!
//! - **Types**: prices, assets, orders, trade records, receipts
//! - **State**: ordered chain-state stores and the transactional overlay
//! - **Engine**: book cursors and the matching/settlement state machine
//!
//! ## Design Principles
//!
//! 1. **Determinism**: iteration order, tie-breaks, rounding, and fee
//!    capture are consensus rules; identical inputs produce byte-identical
//!    trade logs on every validating node
//! 2. **No Floating Point**: amounts are i64 fixed-point, prices are u128
//!    ratios; all conversions truncate toward zero
//! 3. **Atomicity**: each pair execution commits wholesale or not at all;
//!    a faulted execution leaves only an error annotation behind
//! 4. **Margin safety**: due margin calls settle before any resting ask

/// Matching engine: cursors, matching loop, settlement.
pub mod engine;

/// Error types.
pub mod error;

/// Chain state records and stores.
pub mod state;

/// Core value types.
pub mod types;

pub use engine::{MarketEngine, MarketExecution};
pub use error::{MarketError, Result};
pub use state::{
    AssetRecord, BalanceKey, BalanceRecord, ChainState, EvaluationContext, MarketStatus,
    ObjectKind, ObjectRecord, PendingState, SetObjectOperation,
};
pub use types::{
    Address, Asset, AssetId, CollateralRecord, ExecutionReceipt, MarketIndexKey, MarketOrder,
    MarketTransaction, OrderKind, OrderRecord, Price,
};
