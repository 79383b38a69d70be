//! Order-book cursors over one trading pair's key range.
//!
//! A cursor snapshots the pair's slice of an ordered store when the engine
//! is constructed, then walks it one way with peek/advance. Settlement
//! writes go to the pending overlay, never to the snapshot, so the cursor
//! always presents the book as it stood when execution began — the same
//! read-your-start-state semantics the committed-database iterators of the
//! storage engine provide, without holding a borrow across mutations.

use std::collections::BTreeMap;

use crate::types::{AssetId, MarketIndexKey};

/// A one-directional cursor over the `(price, owner)` keys of one pair.
#[derive(Debug, Clone)]
pub struct BookCursor<R> {
    entries: Vec<(MarketIndexKey, R)>,
    pos: usize,
}

impl<R: Clone> BookCursor<R> {
    /// Cursor from the pair's lowest price upward (ask traversal).
    pub fn ascending(
        store: &BTreeMap<MarketIndexKey, R>,
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
    ) -> BookCursor<R> {
        let (low, high) = MarketIndexKey::pair_range(quote_asset_id, base_asset_id);
        BookCursor {
            entries: store
                .range(low..=high)
                .map(|(key, record)| (*key, record.clone()))
                .collect(),
            pos: 0,
        }
    }

    /// Cursor from the pair's highest price downward (bid/short traversal).
    pub fn descending(
        store: &BTreeMap<MarketIndexKey, R>,
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
    ) -> BookCursor<R> {
        let (low, high) = MarketIndexKey::pair_range(quote_asset_id, base_asset_id);
        BookCursor {
            entries: store
                .range(low..=high)
                .rev()
                .map(|(key, record)| (*key, record.clone()))
                .collect(),
            pos: 0,
        }
    }

    /// The entry under the cursor, if any.
    pub fn peek(&self) -> Option<&(MarketIndexKey, R)> {
        self.entries.get(self.pos)
    }

    /// Step past the current entry.
    pub fn advance(&mut self) {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
    }

    /// Entries not yet consumed.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.pos
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
