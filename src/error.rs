//! Error types for the matching and settlement engine.
//!
//! Two families of errors live here:
//!
//! - **Skip errors** (`InsufficientCollateral`): handled inside the matching
//!   loop by discarding the current order and retrying. They never escape an
//!   execution.
//! - **Fatal errors** (everything else): abort the pair execution. The
//!   pending overlay is discarded and the error text is recorded on the prior
//!   state's market status.

use thiserror::Error;

use crate::types::{Address, AssetId};

/// Errors produced by market execution and the object-store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// A market-issued asset requires a reference price feed that is absent.
    #[error("no price feed available for market-issued asset {0}")]
    InsufficientPriceFeed(AssetId),

    /// A margin call cannot be serviced by the current bid. The cover order
    /// is skipped; the execution continues.
    #[error("margin call requires {required} but only {collateral} collateral is held")]
    InsufficientCollateral { required: i64, collateral: i64 },

    /// Post-execution liquidity fell below the policy floor on either side.
    #[error(
        "insufficient market depth after execution: bid depth {bid_depth}, \
         ask depth {ask_depth}, required {required}"
    )]
    InsufficientMarketDepth {
        bid_depth: i64,
        ask_depth: i64,
        required: i64,
    },

    /// A settlement postcondition failed. Always fatal; indicates a logic or
    /// data-corruption bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The object-store boundary was asked to do something unimplemented
    /// (legacy object kinds, negative-id writes).
    #[error("unsupported object operation: {0}")]
    UnsupportedObjectOperation(String),

    /// An object owner's signature is required but absent.
    #[error("missing signature for owner {0}")]
    MissingSignature(Address),

    /// An object update referenced an id that does not exist.
    #[error("no object with id {0}")]
    ObjectNotFound(i64),

    /// Arithmetic between two different asset identifiers.
    #[error("asset mismatch: expected asset {expected}, found asset {found}")]
    AssetMismatch { expected: AssetId, found: AssetId },

    /// A fixed-point computation left the representable range.
    #[error("amount overflow in {0}")]
    AmountOverflow(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MarketError>;
