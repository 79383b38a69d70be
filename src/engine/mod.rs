//! The matching engine: cursors, the matching loop, and settlement.
//!
//! ## Example
//!
//! ```
//! use basalt_dex::engine::MarketEngine;
//! use basalt_dex::state::{AssetRecord, ChainState};
//! use basalt_dex::types::{Address, MarketIndexKey, OrderRecord, Price};
//!
//! let mut chain = ChainState::new();
//! chain.store_asset_record(AssetRecord::new(0, "BSLT", false));
//! chain.store_asset_record(AssetRecord::new(1, "GOLD", false));
//!
//! // A bid and an ask crossing at the same price
//! let price = Price::from_decimal_str("2", 1, 0).unwrap();
//! chain.store_bid_record(
//!     MarketIndexKey::new(price, Address::from_low_u64(1)),
//!     OrderRecord::new(1_000_000),
//! );
//! chain.store_ask_record(
//!     MarketIndexKey::new(price, Address::from_low_u64(2)),
//!     OrderRecord::new(500_000),
//! );
//!
//! let result = MarketEngine::new(&mut chain, 1, 0).execute(0);
//! assert!(result.is_ok());
//! assert_eq!(result.transactions.len(), 1);
//! ```

pub mod cursor;
pub mod matcher;

pub use cursor::BookCursor;
pub use matcher::{
    MarketEngine, MarketExecution, COVER_LIQUIDATION_FEE_BPS, MARKET_DEPTH_REQUIREMENT,
};
