//! Executed-trade records and their deterministic wire encoding.
//!
//! Every match produced by the engine is logged as a [`MarketTransaction`].
//! The typed form is what settlement works with; [`WireMarketTransaction`] is
//! the SSZ `SimpleSerialize` mirror (enums as raw u8, addresses as raw bytes)
//! whose byte encoding feeds the execution receipt digest. All validating
//! nodes must produce byte-identical logs for identical inputs.

use ssz_rs::prelude::*;

use crate::error::{MarketError, Result as MarketResult};
use crate::types::asset::{Address, Asset};
use crate::types::order::{MarketOrder, OrderKind};
use crate::types::price::Price;

/// One executed trade between a bid-side and an ask-side order.
///
/// ## Invariants
///
/// Checked by [`MarketTransaction::validate`] before a trade settles or is
/// appended to the log:
///
/// - every amount is non-negative;
/// - `bid_paid >= ask_received` and `ask_paid >= bid_received` — the
///   residuals are exactly the fee capture;
/// - paid/received pairs are denominated in the same asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketTransaction {
    /// Price the bid side committed to.
    pub bid_price: Price,

    /// Price the ask side committed to (a cover's call price until the trade
    /// re-prices it at the bid).
    pub ask_price: Price,

    /// Owner of the bid-side order.
    pub bid_owner: Address,

    /// Owner of the ask-side order.
    pub ask_owner: Address,

    /// Kind of the bid-side order (Bid or Short).
    pub bid_kind: OrderKind,

    /// Kind of the ask-side order (Ask or Cover).
    pub ask_kind: OrderKind,

    /// Quote the bid side paid out.
    pub bid_paid: Asset,

    /// Base the bid side received.
    pub bid_received: Asset,

    /// Base the ask side paid out.
    pub ask_paid: Asset,

    /// Quote the ask side received.
    pub ask_received: Asset,

    /// Fees captured by this trade: rounding residual or liquidation fee.
    pub fees_collected: Asset,
}

impl MarketTransaction {
    /// Start a transaction between the current bid and ask, with zeroed
    /// amounts in the correct units.
    pub fn between(bid: &MarketOrder, ask: &MarketOrder) -> MarketTransaction {
        let bid_price = bid.price();
        let ask_price = ask.price();
        MarketTransaction {
            bid_price,
            ask_price,
            bid_owner: bid.owner(),
            ask_owner: ask.owner(),
            bid_kind: bid.kind,
            ask_kind: ask.kind,
            bid_paid: Asset::zero(bid_price.quote_asset_id),
            bid_received: Asset::zero(bid_price.base_asset_id),
            ask_paid: Asset::zero(ask_price.base_asset_id),
            ask_received: Asset::zero(ask_price.quote_asset_id),
            fees_collected: Asset::zero(bid_price.quote_asset_id),
        }
    }

    /// Check the trade invariants.
    pub fn validate(&self) -> MarketResult<()> {
        if !self.bid_kind.is_bid_side() || self.ask_kind.is_bid_side() {
            return Err(MarketError::InvariantViolation(format!(
                "illegal order pairing {:?}/{:?}",
                self.ask_kind, self.bid_kind
            )));
        }
        if !self
            .bid_price
            .is_for_pair(self.ask_price.quote_asset_id, self.ask_price.base_asset_id)
        {
            return Err(MarketError::InvariantViolation(format!(
                "bid price {} and ask price {} belong to different pairs",
                self.bid_price, self.ask_price
            )));
        }

        for (name, asset) in [
            ("bid_paid", &self.bid_paid),
            ("bid_received", &self.bid_received),
            ("ask_paid", &self.ask_paid),
            ("ask_received", &self.ask_received),
            ("fees_collected", &self.fees_collected),
        ] {
            if asset.is_negative() {
                return Err(MarketError::InvariantViolation(format!(
                    "negative {name} in market transaction: {asset}"
                )));
            }
        }

        let quote_residual = self.bid_paid.checked_sub(&self.ask_received)?;
        if quote_residual.is_negative() {
            return Err(MarketError::InvariantViolation(format!(
                "bid paid {} less than ask received {}",
                self.bid_paid, self.ask_received
            )));
        }
        let base_residual = self.ask_paid.checked_sub(&self.bid_received)?;
        if base_residual.is_negative() {
            return Err(MarketError::InvariantViolation(format!(
                "ask paid {} less than bid received {}",
                self.ask_paid, self.bid_received
            )));
        }
        Ok(())
    }

    /// Flatten into the SSZ wire form.
    pub fn to_wire(&self) -> WireMarketTransaction {
        WireMarketTransaction {
            quote_asset_id: self.bid_price.quote_asset_id,
            base_asset_id: self.bid_price.base_asset_id,
            bid_price_ratio: self.bid_price.ratio,
            ask_price_ratio: self.ask_price.ratio,
            bid_owner: *self.bid_owner.as_bytes(),
            ask_owner: *self.ask_owner.as_bytes(),
            bid_kind_raw: self.bid_kind.to_u8(),
            ask_kind_raw: self.ask_kind.to_u8(),
            bid_paid: self.bid_paid.amount.max(0) as u64,
            bid_received: self.bid_received.amount.max(0) as u64,
            ask_paid: self.ask_paid.amount.max(0) as u64,
            ask_received: self.ask_received.amount.max(0) as u64,
            fees_collected: self.fees_collected.amount.max(0) as u64,
            fees_asset_id: self.fees_collected.asset_id,
        }
    }
}

/// SSZ wire form of a [`MarketTransaction`].
///
/// Fixed-size container of raw fields; order kinds are carried as u8 and
/// addresses as 20-byte arrays for SSZ compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct WireMarketTransaction {
    /// Quote asset of the pair.
    pub quote_asset_id: u32,

    /// Base asset of the pair.
    pub base_asset_id: u32,

    /// Bid price ratio, scaled by 10^8.
    pub bid_price_ratio: u128,

    /// Ask price ratio, scaled by 10^8.
    pub ask_price_ratio: u128,

    /// Bid owner address bytes.
    pub bid_owner: [u8; 20],

    /// Ask owner address bytes.
    pub ask_owner: [u8; 20],

    /// Bid order kind as u8 (0=Bid, 2=Short).
    pub bid_kind_raw: u8,

    /// Ask order kind as u8 (1=Ask, 3=Cover).
    pub ask_kind_raw: u8,

    /// Quote paid by the bid side.
    pub bid_paid: u64,

    /// Base received by the bid side.
    pub bid_received: u64,

    /// Base paid by the ask side.
    pub ask_paid: u64,

    /// Quote received by the ask side.
    pub ask_received: u64,

    /// Fees captured by this trade.
    pub fees_collected: u64,

    /// Asset the fees are denominated in.
    pub fees_asset_id: u32,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::order::{MarketIndexKey, OrderRecord};

    fn sample() -> MarketTransaction {
        let bid = MarketOrder::new(
            OrderKind::Bid,
            MarketIndexKey::new(
                Price::from_decimal_str("2", 1, 0).unwrap(),
                Address::from_low_u64(1),
            ),
            OrderRecord::new(1_000_000),
        );
        let ask = MarketOrder::new(
            OrderKind::Ask,
            MarketIndexKey::new(
                Price::from_decimal_str("1.5", 1, 0).unwrap(),
                Address::from_low_u64(2),
            ),
            OrderRecord::new(300_000),
        );
        let mut mtrx = MarketTransaction::between(&bid, &ask);
        mtrx.bid_paid = Asset::new(600_000, 1);
        mtrx.ask_received = Asset::new(450_000, 1);
        mtrx.ask_paid = Asset::new(300_000, 0);
        mtrx.bid_received = Asset::new(300_000, 0);
        mtrx.fees_collected = Asset::new(150_000, 1);
        mtrx
    }

    #[test]
    fn test_between_units() {
        let mtrx = sample();
        assert_eq!(mtrx.bid_paid.asset_id, 1);
        assert_eq!(mtrx.bid_received.asset_id, 0);
        assert_eq!(mtrx.ask_paid.asset_id, 0);
        assert_eq!(mtrx.ask_received.asset_id, 1);
    }

    #[test]
    fn test_validate_accepts_fee_residual() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_amount() {
        let mut mtrx = sample();
        mtrx.bid_paid.amount = -1;
        assert!(mtrx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_underpaying_bid() {
        let mut mtrx = sample();
        // Ask receives more quote than the bid paid
        mtrx.ask_received.amount = mtrx.bid_paid.amount + 1;
        assert!(mtrx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_underpaying_ask() {
        let mut mtrx = sample();
        mtrx.bid_received.amount = mtrx.ask_paid.amount + 1;
        assert!(mtrx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_sideless_pairing() {
        let mut mtrx = sample();
        mtrx.ask_kind = OrderKind::Short;
        assert!(mtrx.validate().is_err());

        let mut mtrx = sample();
        mtrx.bid_kind = OrderKind::Cover;
        assert!(mtrx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_mixed_pairs() {
        let mut mtrx = sample();
        mtrx.ask_price = Price::from_decimal_str("1.5", 2, 0).unwrap();
        assert!(mtrx.validate().is_err());
    }

    #[test]
    fn test_wire_field_mapping() {
        let wire = sample().to_wire();
        assert_eq!(wire.quote_asset_id, 1);
        assert_eq!(wire.base_asset_id, 0);
        assert_eq!(wire.bid_price_ratio, 200_000_000);
        assert_eq!(wire.ask_price_ratio, 150_000_000);
        assert_eq!(wire.bid_kind_raw, 0);
        assert_eq!(wire.ask_kind_raw, 1);
        assert_eq!(wire.bid_paid, 600_000);
        assert_eq!(wire.fees_collected, 150_000);
        assert_eq!(wire.fees_asset_id, 1);
    }

    #[test]
    fn test_wire_ssz_roundtrip() {
        let wire = sample().to_wire();

        let serialized = ssz_rs::serialize(&wire).expect("Failed to serialize");
        let deserialized: WireMarketTransaction =
            ssz_rs::deserialize(&serialized).expect("Failed to deserialize");

        assert_eq!(wire, deserialized);
    }

    #[test]
    fn test_wire_deterministic_serialization() {
        let wire = sample().to_wire();

        let bytes1 = ssz_rs::serialize(&wire).expect("Failed to serialize");
        let bytes2 = ssz_rs::serialize(&wire).expect("Failed to serialize");

        assert_eq!(bytes1, bytes2, "SSZ serialization must be deterministic");
    }
}
