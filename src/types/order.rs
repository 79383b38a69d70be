//! Order records, book keys, and the polymorphic market-order view.
//!
//! Four kinds of orders can appear in a market execution. Bids and asks are
//! ordinary limit orders; shorts open leveraged positions and are treated as
//! bids with collateral obligations; covers are forced buy-backs synthesized
//! from collateral records, never placed by a user. A [`MarketOrder`] gives
//! the matching loop one price/quantity/balance/owner surface over all four,
//! selected by pattern matching rather than virtual dispatch.

use crate::error::Result;
use crate::types::asset::{Address, Asset, AssetId};
use crate::types::price::Price;

// ============================================================================
// OrderKind
// ============================================================================

/// The four order kinds that can take part in a trade.
///
/// Raw u8 values (for wire encoding): Bid = 0, Ask = 1, Short = 2, Cover = 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderKind {
    /// Buy base with quote.
    #[default]
    Bid,
    /// Sell base for quote.
    Ask,
    /// Open a leveraged position; a bid with collateral obligations.
    Short,
    /// Forced buy-back of a short position (margin call), derived from a
    /// collateral record.
    Cover,
}

impl OrderKind {
    /// Convert to u8 for wire encoding.
    pub fn to_u8(self) -> u8 {
        match self {
            OrderKind::Bid => 0,
            OrderKind::Ask => 1,
            OrderKind::Short => 2,
            OrderKind::Cover => 3,
        }
    }

    /// Convert from u8 for wire decoding.
    pub fn from_u8(value: u8) -> Option<OrderKind> {
        match value {
            0 => Some(OrderKind::Bid),
            1 => Some(OrderKind::Ask),
            2 => Some(OrderKind::Short),
            3 => Some(OrderKind::Cover),
            _ => None,
        }
    }

    /// True for the kinds that sit on the bid side of the book.
    pub fn is_bid_side(self) -> bool {
        matches!(self, OrderKind::Bid | OrderKind::Short)
    }
}

// ============================================================================
// Store records and keys
// ============================================================================

/// Composite key addressing an order (or collateral position) in its store.
///
/// Sorts by price, then owner. Because [`Price`] sorts pairs contiguously,
/// every order of one trading pair occupies one ascending key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MarketIndexKey {
    /// The order's limit price (a cover's call price).
    pub order_price: Price,

    /// The owning address.
    pub owner: Address,
}

impl MarketIndexKey {
    /// Create a key from a price and owner.
    pub fn new(order_price: Price, owner: Address) -> MarketIndexKey {
        MarketIndexKey { order_price, owner }
    }

    /// Inclusive key bounds covering every order of one trading pair.
    pub fn pair_range(
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
    ) -> (MarketIndexKey, MarketIndexKey) {
        (
            MarketIndexKey::new(Price::new(0, quote_asset_id, base_asset_id), Address::MIN),
            MarketIndexKey::new(
                Price::new(u128::MAX, quote_asset_id, base_asset_id),
                Address::MAX,
            ),
        )
    }
}

/// Persistent state of a resting order: the remaining balance in the order's
/// paid unit (bid: quote, ask: base, short: base, cover: quote payoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderRecord {
    /// Remaining balance in indivisible units.
    pub balance: i64,
}

impl OrderRecord {
    /// Create a record with the given balance.
    pub fn new(balance: i64) -> OrderRecord {
        OrderRecord { balance }
    }
}

/// Persistent state of a short position's collateral.
///
/// Both balances are non-negative at all times. The record synthesizes a
/// cover order while `payoff_balance` is positive; once the payoff is retired
/// and the collateral returned, the record disappears from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollateralRecord {
    /// Native-asset collateral held against the position.
    pub collateral_balance: i64,

    /// Outstanding debt in the quote asset.
    pub payoff_balance: i64,
}

impl CollateralRecord {
    /// Create a collateral record.
    pub fn new(collateral_balance: i64, payoff_balance: i64) -> CollateralRecord {
        CollateralRecord {
            collateral_balance,
            payoff_balance,
        }
    }

    /// True once the position is fully retired and emptied.
    pub fn is_spent(&self) -> bool {
        self.collateral_balance == 0 && self.payoff_balance == 0
    }
}

// ============================================================================
// MarketOrder
// ============================================================================

/// A uniform view over the four order kinds, used as the matching loop's
/// "current bid" / "current ask".
///
/// The `state` balance is mutated in place as trades settle; the backing
/// store is rewritten from it by the settlement routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrder {
    /// Which kind of order this is.
    pub kind: OrderKind,

    /// Store key: (price, owner).
    pub market_index: MarketIndexKey,

    /// Remaining balance in the order's paid unit.
    pub state: OrderRecord,

    /// Backing collateral, present only for covers.
    pub collateral: Option<i64>,
}

impl MarketOrder {
    /// Create a view over a bid, ask, or short record.
    pub fn new(kind: OrderKind, market_index: MarketIndexKey, state: OrderRecord) -> MarketOrder {
        MarketOrder {
            kind,
            market_index,
            state,
            collateral: None,
        }
    }

    /// Create a cover view synthesized from a collateral record.
    pub fn with_collateral(
        kind: OrderKind,
        market_index: MarketIndexKey,
        state: OrderRecord,
        collateral: i64,
    ) -> MarketOrder {
        MarketOrder {
            kind,
            market_index,
            state,
            collateral: Some(collateral),
        }
    }

    /// The order's limit price (a cover's call price).
    pub fn price(&self) -> Price {
        self.market_index.order_price
    }

    /// The owning address.
    pub fn owner(&self) -> Address {
        self.market_index.owner
    }

    /// The remaining balance, denominated in the unit this order pays with.
    pub fn balance(&self) -> Asset {
        let price = self.price();
        let asset_id = match self.kind {
            OrderKind::Bid | OrderKind::Cover => price.quote_asset_id,
            OrderKind::Ask | OrderKind::Short => price.base_asset_id,
        };
        Asset::new(self.state.balance, asset_id)
    }

    /// Remaining quantity in base units.
    pub fn quantity(&self) -> Result<Asset> {
        match self.kind {
            OrderKind::Bid | OrderKind::Cover => self.price().convert(self.balance()),
            OrderKind::Ask | OrderKind::Short => Ok(self.balance()),
        }
    }

    /// Remaining quantity in quote units.
    pub fn quote_quantity(&self) -> Result<Asset> {
        match self.kind {
            OrderKind::Bid | OrderKind::Cover => Ok(self.balance()),
            OrderKind::Ask | OrderKind::Short => self.price().convert(self.balance()),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(price: &str, owner: u64) -> MarketIndexKey {
        MarketIndexKey::new(
            Price::from_decimal_str(price, 1, 0).unwrap(),
            Address::from_low_u64(owner),
        )
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            OrderKind::Bid,
            OrderKind::Ask,
            OrderKind::Short,
            OrderKind::Cover,
        ] {
            assert_eq!(OrderKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(OrderKind::from_u8(4), None);
    }

    #[test]
    fn test_kind_sides() {
        assert!(OrderKind::Bid.is_bid_side());
        assert!(OrderKind::Short.is_bid_side());
        assert!(!OrderKind::Ask.is_bid_side());
        assert!(!OrderKind::Cover.is_bid_side());
    }

    #[test]
    fn test_key_ordering() {
        // Price dominates, owner breaks ties
        assert!(key("1", 9) < key("2", 1));
        assert!(key("2", 1) < key("2", 2));
    }

    #[test]
    fn test_pair_range_bounds() {
        let (lo, hi) = MarketIndexKey::pair_range(1, 0);
        assert!(lo < key("0.00000001", 0));
        assert!(key("999999", 99) < hi);

        // Orders of another pair fall outside the range
        let other = MarketIndexKey::new(Price::new(1, 2, 0), Address::MIN);
        assert!(other > hi);
    }

    #[test]
    fn test_bid_accessors() {
        // Bid: 10 quote units at 2 quote/base buys 5 base units
        let bid = MarketOrder::new(OrderKind::Bid, key("2", 1), OrderRecord::new(1_000_000));

        assert_eq!(bid.balance(), Asset::new(1_000_000, 1));
        assert_eq!(bid.quantity().unwrap(), Asset::new(500_000, 0));
        assert_eq!(bid.quote_quantity().unwrap(), Asset::new(1_000_000, 1));
        assert_eq!(bid.owner(), Address::from_low_u64(1));
    }

    #[test]
    fn test_ask_accessors() {
        // Ask: 3 base units at 2 quote/base asks for 6 quote units
        let ask = MarketOrder::new(OrderKind::Ask, key("2", 2), OrderRecord::new(300_000));

        assert_eq!(ask.balance(), Asset::new(300_000, 0));
        assert_eq!(ask.quantity().unwrap(), Asset::new(300_000, 0));
        assert_eq!(ask.quote_quantity().unwrap(), Asset::new(600_000, 1));
    }

    #[test]
    fn test_short_accessors() {
        // Short balances are base-denominated, like asks
        let short = MarketOrder::new(OrderKind::Short, key("1.5", 3), OrderRecord::new(200_000));

        assert_eq!(short.balance(), Asset::new(200_000, 0));
        assert_eq!(short.quantity().unwrap(), Asset::new(200_000, 0));
        assert_eq!(short.quote_quantity().unwrap(), Asset::new(300_000, 1));
    }

    #[test]
    fn test_cover_accessors() {
        // Cover balances are the quote payoff owed
        let cover = MarketOrder::with_collateral(
            OrderKind::Cover,
            key("2", 4),
            OrderRecord::new(400_000),
            900_000,
        );

        assert_eq!(cover.balance(), Asset::new(400_000, 1));
        assert_eq!(cover.quantity().unwrap(), Asset::new(200_000, 0));
        assert_eq!(cover.quote_quantity().unwrap(), Asset::new(400_000, 1));
        assert_eq!(cover.collateral, Some(900_000));
    }

    #[test]
    fn test_collateral_record_spent() {
        assert!(CollateralRecord::new(0, 0).is_spent());
        assert!(!CollateralRecord::new(100, 0).is_spent());
        assert!(!CollateralRecord::new(0, 100).is_spent());
    }
}
