//! Chain state stores and the transactional pending overlay.
//!
//! Every store is an ordered map so that iteration order is deterministic
//! and one trading pair's orders occupy a contiguous key range. Record
//! lifetime is simply "present in the map or not": storing an order record
//! with zero balance removes its key, as does storing a fully-spent
//! collateral record.
//!
//! [`ChainState::fork`] yields a [`PendingState`] — a private clone that a
//! market execution mutates freely. On success the clone replaces the parent
//! via [`PendingState::apply_to`]; on failure it is dropped and only an
//! error annotation lands in the parent.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use crate::state::objects::{ObjectKind, ObjectRecord};
use crate::state::records::{AssetRecord, BalanceKey, BalanceRecord, MarketStatus};
use crate::types::{Address, AssetId, CollateralRecord, MarketIndexKey, OrderRecord, Price};

/// The full mutable chain state visible to market execution.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    bids: BTreeMap<MarketIndexKey, OrderRecord>,
    asks: BTreeMap<MarketIndexKey, OrderRecord>,
    shorts: BTreeMap<MarketIndexKey, OrderRecord>,
    collateral: BTreeMap<MarketIndexKey, CollateralRecord>,
    balances: BTreeMap<BalanceKey, BalanceRecord>,
    assets: BTreeMap<AssetId, AssetRecord>,
    market_statuses: BTreeMap<(AssetId, AssetId), MarketStatus>,
    feed_prices: BTreeMap<AssetId, Price>,
    accumulated_fees: i64,
    objects: BTreeMap<(ObjectKind, i64), ObjectRecord>,
    next_object_ids: BTreeMap<ObjectKind, i64>,
}

fn store_order(
    map: &mut BTreeMap<MarketIndexKey, OrderRecord>,
    key: MarketIndexKey,
    record: OrderRecord,
) {
    if record.balance == 0 {
        map.remove(&key);
    } else {
        map.insert(key, record);
    }
}

impl ChainState {
    /// Create an empty chain state.
    pub fn new() -> ChainState {
        ChainState::default()
    }

    // ========================================================================
    // Order books
    // ========================================================================

    /// The bid book (read access for cursors).
    pub fn bids(&self) -> &BTreeMap<MarketIndexKey, OrderRecord> {
        &self.bids
    }

    /// The ask book (read access for cursors).
    pub fn asks(&self) -> &BTreeMap<MarketIndexKey, OrderRecord> {
        &self.asks
    }

    /// The short book (read access for cursors).
    pub fn shorts(&self) -> &BTreeMap<MarketIndexKey, OrderRecord> {
        &self.shorts
    }

    /// The collateral store (read access for cursors).
    pub fn collateral(&self) -> &BTreeMap<MarketIndexKey, CollateralRecord> {
        &self.collateral
    }

    /// Look up a bid by key.
    pub fn get_bid_record(&self, key: &MarketIndexKey) -> Option<OrderRecord> {
        self.bids.get(key).copied()
    }

    /// Write a bid record; zero balance removes the key.
    pub fn store_bid_record(&mut self, key: MarketIndexKey, record: OrderRecord) {
        store_order(&mut self.bids, key, record);
    }

    /// Look up an ask by key.
    pub fn get_ask_record(&self, key: &MarketIndexKey) -> Option<OrderRecord> {
        self.asks.get(key).copied()
    }

    /// Write an ask record; zero balance removes the key.
    pub fn store_ask_record(&mut self, key: MarketIndexKey, record: OrderRecord) {
        store_order(&mut self.asks, key, record);
    }

    /// Look up a short by key.
    pub fn get_short_record(&self, key: &MarketIndexKey) -> Option<OrderRecord> {
        self.shorts.get(key).copied()
    }

    /// Write a short record; zero balance removes the key.
    pub fn store_short_record(&mut self, key: MarketIndexKey, record: OrderRecord) {
        store_order(&mut self.shorts, key, record);
    }

    /// Look up a collateral position by key.
    pub fn get_collateral_record(&self, key: &MarketIndexKey) -> Option<CollateralRecord> {
        self.collateral.get(key).copied()
    }

    /// Write a collateral record; a fully-spent record removes the key.
    pub fn store_collateral_record(&mut self, key: MarketIndexKey, record: CollateralRecord) {
        if record.is_spent() {
            self.collateral.remove(&key);
        } else {
            self.collateral.insert(key, record);
        }
    }

    // ========================================================================
    // Balances and assets
    // ========================================================================

    /// Look up an account balance.
    pub fn get_balance_record(&self, key: &BalanceKey) -> Option<BalanceRecord> {
        self.balances.get(key).cloned()
    }

    /// Write an account balance under its derived key.
    pub fn store_balance_record(&mut self, record: BalanceRecord) {
        self.balances.insert(record.key(), record);
    }

    /// Look up an asset record.
    pub fn get_asset_record(&self, id: AssetId) -> Option<AssetRecord> {
        self.assets.get(&id).cloned()
    }

    /// Write an asset record.
    pub fn store_asset_record(&mut self, record: AssetRecord) {
        self.assets.insert(record.id, record);
    }

    // ========================================================================
    // Market statistics and feeds
    // ========================================================================

    /// Look up the status of a trading pair.
    pub fn get_market_status(
        &self,
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
    ) -> Option<MarketStatus> {
        self.market_statuses
            .get(&(quote_asset_id, base_asset_id))
            .cloned()
    }

    /// Write the status of a trading pair.
    pub fn store_market_status(&mut self, status: MarketStatus) {
        self.market_statuses
            .insert((status.quote_asset_id, status.base_asset_id), status);
    }

    /// The externally-supplied median feed price for an asset, quoted
    /// against the native asset.
    pub fn get_feed_median_price(&self, quote_asset_id: AssetId) -> Option<Price> {
        self.feed_prices.get(&quote_asset_id).copied()
    }

    /// Record a feed price for an asset.
    pub fn store_feed_price(&mut self, quote_asset_id: AssetId, price: Price) {
        self.feed_prices.insert(quote_asset_id, price);
    }

    /// The network-global accumulated fee counter (native asset units).
    pub fn get_accumulated_fees(&self) -> i64 {
        self.accumulated_fees
    }

    /// Overwrite the network-global accumulated fee counter.
    pub fn set_accumulated_fees(&mut self, fees: i64) {
        self.accumulated_fees = fees;
    }

    // ========================================================================
    // Object store
    // ========================================================================

    /// Allocate the next object id for a kind. Ids start at 1 and increase
    /// monotonically per kind for a given chain state.
    pub fn new_object_id(&mut self, kind: ObjectKind) -> i64 {
        let next = self.next_object_ids.entry(kind).or_insert(0);
        *next += 1;
        *next
    }

    /// Look up an object record.
    pub fn get_object_record(&self, kind: ObjectKind, id: i64) -> Option<ObjectRecord> {
        self.objects.get(&(kind, id)).cloned()
    }

    /// Write an object record.
    pub fn store_object_record(&mut self, record: ObjectRecord) {
        self.objects.insert((record.kind, record.id), record);
    }

    /// The addresses that must sign for an object.
    pub fn get_object_owners(&self, record: &ObjectRecord) -> BTreeSet<Address> {
        record.owners.clone()
    }

    // ========================================================================
    // Transactional overlay
    // ========================================================================

    /// Fork a pending overlay for one atomic execution.
    pub fn fork(&self) -> PendingState {
        PendingState {
            state: self.clone(),
        }
    }
}

/// A forked copy of chain state holding one execution's uncommitted
/// mutations.
#[derive(Debug, Clone)]
pub struct PendingState {
    state: ChainState,
}

impl PendingState {
    /// Commit every pending mutation into the parent state.
    pub fn apply_to(self, parent: &mut ChainState) {
        *parent = self.state;
    }

    /// Drop every pending mutation.
    pub fn discard(self) {}
}

impl Deref for PendingState {
    type Target = ChainState;

    fn deref(&self) -> &ChainState {
        &self.state
    }
}

impl DerefMut for PendingState {
    fn deref_mut(&mut self) -> &mut ChainState {
        &mut self.state
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
