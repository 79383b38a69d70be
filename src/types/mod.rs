//! Core value types: assets, prices, orders, and trade records.

/// Asset amounts, asset identifiers, and owner addresses.
pub mod asset;

/// Order records, book keys, and the polymorphic market-order view.
pub mod order;

/// Price ratios and consensus rounding.
pub mod price;

/// Execution receipts and trade-log digests.
pub mod receipt;

/// Executed-trade records and their wire encoding.
pub mod transaction;

pub use asset::{Address, Asset, AssetId, CHAIN_PRECISION, NATIVE_ASSET_ID};
pub use order::{CollateralRecord, MarketIndexKey, MarketOrder, OrderKind, OrderRecord};
pub use price::{Price, PRICE_SCALE};
pub use receipt::ExecutionReceipt;
pub use transaction::{MarketTransaction, WireMarketTransaction};
