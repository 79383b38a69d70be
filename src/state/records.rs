//! Chain-state records mutated by market execution.

use crate::types::{Address, Asset, AssetId, Price};

/// Length of the trailing moving-average window for the per-pair price.
pub const AVG_PRICE_WINDOW: u128 = 24;

// ============================================================================
// AssetRecord
// ============================================================================

/// Per-asset chain record.
///
/// `collected_fees` accrues rounding residuals and dust sweeps denominated in
/// this asset; `current_share_supply` moves as shorts borrow (mint) and
/// covers retire (burn) market-issued supply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetRecord {
    /// Asset identifier.
    pub id: AssetId,

    /// Ticker symbol, display only.
    pub symbol: String,

    /// True for assets issued by the market itself (backed by collateralized
    /// shorts rather than a registered issuer).
    pub market_issued: bool,

    /// Fees accrued in this asset, awaiting liquidation into the native
    /// fee pool.
    pub collected_fees: i64,

    /// Outstanding share supply.
    pub current_share_supply: i64,
}

impl AssetRecord {
    /// Create a record with no fees and no supply.
    pub fn new(id: AssetId, symbol: &str, market_issued: bool) -> AssetRecord {
        AssetRecord {
            id,
            symbol: symbol.to_string(),
            market_issued,
            collected_fees: 0,
            current_share_supply: 0,
        }
    }

    /// True for market-issued assets.
    pub fn is_market_issued(&self) -> bool {
        self.market_issued
    }
}

// ============================================================================
// BalanceRecord
// ============================================================================

/// Key addressing an account balance: one owner, one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BalanceKey {
    /// Owning address.
    pub owner: Address,

    /// Asset the balance is held in.
    pub asset_id: AssetId,
}

impl BalanceKey {
    /// Create a balance key.
    pub fn new(owner: Address, asset_id: AssetId) -> BalanceKey {
        BalanceKey { owner, asset_id }
    }
}

/// An account balance. Created lazily the first time a payout targets an
/// owner that has never held the asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRecord {
    /// Owning address.
    pub owner: Address,

    /// Held amount.
    pub balance: Asset,

    /// Timestamp (seconds) of the last mutation.
    pub last_update: u64,
}

impl BalanceRecord {
    /// Create a balance record.
    pub fn new(owner: Address, balance: Asset, last_update: u64) -> BalanceRecord {
        BalanceRecord {
            owner,
            balance,
            last_update,
        }
    }

    /// The store key for this record.
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.owner, self.balance.asset_id)
    }
}

// ============================================================================
// MarketStatus
// ============================================================================

/// Rolling statistics for one trading pair, created lazily on the pair's
/// first execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketStatus {
    /// Quote asset of the pair.
    pub quote_asset_id: AssetId,

    /// Base asset of the pair.
    pub base_asset_id: AssetId,

    /// Base-denominated volume consumed from the bid side during the most
    /// recent execution.
    pub bid_depth: i64,

    /// Base-denominated volume consumed from the ask side during the most
    /// recent execution.
    pub ask_depth: i64,

    /// Trailing moving-average price, seeded from the feed on the first
    /// execution that has one.
    pub avg_price: Option<Price>,

    /// Human-readable annotation of the last fatal execution error, cleared
    /// by the next successful execution.
    pub last_error: Option<String>,
}

impl MarketStatus {
    /// Create a fresh status with zero depth and no average.
    pub fn new(quote_asset_id: AssetId, base_asset_id: AssetId) -> MarketStatus {
        MarketStatus {
            quote_asset_id,
            base_asset_id,
            bid_depth: 0,
            ask_depth: 0,
            avg_price: None,
            last_error: None,
        }
    }

    /// Blend the current best bid and ask into the moving average.
    ///
    /// No-op until the average has been seeded. The window is
    /// [`AVG_PRICE_WINDOW`]: the previous average carries `window - 1` parts
    /// and each side of the book one part.
    pub fn blend_avg_price(&mut self, bid: Price, ask: Price) {
        if let Some(avg) = &mut self.avg_price {
            avg.ratio = avg
                .ratio
                .saturating_mul(AVG_PRICE_WINDOW - 1)
                .saturating_add(bid.ratio)
                .saturating_add(ask.ratio)
                / (AVG_PRICE_WINDOW + 1);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
