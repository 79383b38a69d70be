//! Price ratios between a quote and a base asset.
//!
//! ## Representation
//!
//! A price is the rational "quote units per base unit", stored as a u128
//! ratio scaled by [`PRICE_SCALE`] (10^8) and tagged with the two asset
//! identifiers. All conversions truncate toward zero; the residual amounts
//! lost to truncation are captured as fees, so the rounding direction is part
//! of the consensus protocol, not a numerical nicety.
//!
//! ## Ordering
//!
//! `Price` orders by `(quote_asset_id, base_asset_id, ratio)`. Within one
//! trading pair that is simply the effective exchange rate; across pairs it
//! groups every pair into one contiguous ascending key range, which is what
//! the order-book cursors rely on.

use std::fmt;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::error::{MarketError, Result};
use crate::types::asset::{Asset, AssetId};

/// Scaling factor for price ratios: 10^8, i.e. 8 decimal places.
pub const PRICE_SCALE: u128 = 100_000_000;

/// A price ratio of `quote_asset_id` per `base_asset_id`.
///
/// Field declaration order matters: the derived `Ord` sorts by quote id,
/// then base id, then ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price {
    /// Asset the price is quoted in.
    pub quote_asset_id: AssetId,

    /// Asset the price is quoted against.
    pub base_asset_id: AssetId,

    /// Quote units per base unit, scaled by [`PRICE_SCALE`].
    pub ratio: u128,
}

impl Price {
    /// Create a price from a raw scaled ratio.
    pub fn new(ratio: u128, quote_asset_id: AssetId, base_asset_id: AssetId) -> Price {
        Price {
            quote_asset_id,
            base_asset_id,
            ratio,
        }
    }

    /// Parse a decimal string (quote per base) into a price.
    ///
    /// Truncates toward zero past 8 decimal places. Returns `None` for
    /// unparseable or out-of-range input.
    pub fn from_decimal_str(
        s: &str,
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
    ) -> Option<Price> {
        let value = Decimal::from_str(s).ok()?;
        if value.is_sign_negative() {
            return None;
        }
        let scaled = value.checked_mul(Decimal::from(100_000_000u64))?;
        let ratio = scaled.trunc().to_u128()?;
        Some(Price::new(ratio, quote_asset_id, base_asset_id))
    }

    /// The price implied by exchanging `quote` for `base`.
    ///
    /// Used to derive a short position's call price from its debt and
    /// collateral. The base amount must be positive.
    pub fn ratio_of(quote: Asset, base: Asset) -> Result<Price> {
        if base.amount <= 0 {
            return Err(MarketError::InvariantViolation(format!(
                "cannot form a price against non-positive base amount {}",
                base.amount
            )));
        }
        if quote.amount < 0 {
            return Err(MarketError::InvariantViolation(format!(
                "cannot form a price from negative quote amount {}",
                quote.amount
            )));
        }
        let ratio = (quote.amount as u128)
            .checked_mul(PRICE_SCALE)
            .ok_or(MarketError::AmountOverflow("price ratio"))?
            / (base.amount as u128);
        Ok(Price::new(ratio, quote.asset_id, base.asset_id))
    }

    /// Convert an amount across this price.
    ///
    /// A base-denominated asset multiplies into quote units; a
    /// quote-denominated asset divides into base units. Any other asset id is
    /// a unit error. Both directions truncate toward zero.
    pub fn convert(&self, asset: Asset) -> Result<Asset> {
        if asset.asset_id == self.base_asset_id {
            let ratio = i128::try_from(self.ratio)
                .map_err(|_| MarketError::AmountOverflow("price ratio"))?;
            let amount = (asset.amount as i128)
                .checked_mul(ratio)
                .ok_or(MarketError::AmountOverflow("base to quote conversion"))?
                / PRICE_SCALE as i128;
            let amount = i64::try_from(amount)
                .map_err(|_| MarketError::AmountOverflow("base to quote conversion"))?;
            Ok(Asset::new(amount, self.quote_asset_id))
        } else if asset.asset_id == self.quote_asset_id {
            if self.ratio == 0 {
                return Err(MarketError::InvariantViolation(
                    "conversion across a zero price ratio".to_string(),
                ));
            }
            let ratio = i128::try_from(self.ratio)
                .map_err(|_| MarketError::AmountOverflow("price ratio"))?;
            let amount = (asset.amount as i128)
                .checked_mul(PRICE_SCALE as i128)
                .ok_or(MarketError::AmountOverflow("quote to base conversion"))?
                / ratio;
            let amount = i64::try_from(amount)
                .map_err(|_| MarketError::AmountOverflow("quote to base conversion"))?;
            Ok(Asset::new(amount, self.base_asset_id))
        } else {
            Err(MarketError::AssetMismatch {
                expected: self.base_asset_id,
                found: asset.asset_id,
            })
        }
    }

    /// Scale the ratio by `numerator / denominator`, keeping the pair.
    ///
    /// Used for the feed-derived policy bounds (short-bid ceiling at 4/3 of
    /// the median, cover-ask floor at 2/3). Saturates on u128 multiply
    /// overflow; `denominator` must be non-zero.
    pub fn scale_ratio(&self, numerator: u128, denominator: u128) -> Price {
        Price {
            quote_asset_id: self.quote_asset_id,
            base_asset_id: self.base_asset_id,
            ratio: self.ratio.saturating_mul(numerator) / denominator,
        }
    }

    /// True when this price belongs to the given trading pair.
    pub fn is_for_pair(&self, quote_asset_id: AssetId, base_asset_id: AssetId) -> bool {
        self.quote_asset_id == quote_asset_id && self.base_asset_id == base_asset_id
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match i128::try_from(self.ratio)
            .ok()
            .and_then(|r| Decimal::try_from_i128_with_scale(r, 8).ok())
        {
            Some(value) => write!(
                f,
                "{} ({}/{})",
                value.normalize(),
                self.quote_asset_id,
                self.base_asset_id
            ),
            None => write!(
                f,
                "ratio {} ({}/{})",
                self.ratio, self.quote_asset_id, self.base_asset_id
            ),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::from_decimal_str(s, 1, 0).unwrap()
    }

    #[test]
    fn test_from_decimal_str() {
        assert_eq!(price("1").ratio, 100_000_000);
        assert_eq!(price("2.5").ratio, 250_000_000);
        assert_eq!(price("0.00000001").ratio, 1);
        assert!(Price::from_decimal_str("-1", 1, 0).is_none());
        assert!(Price::from_decimal_str("junk", 1, 0).is_none());
    }

    #[test]
    fn test_convert_base_to_quote() {
        // 3 base units at 2 quote/base = 6 quote units
        let result = price("2").convert(Asset::new(300_000, 0)).unwrap();
        assert_eq!(result, Asset::new(600_000, 1));
    }

    #[test]
    fn test_convert_quote_to_base() {
        // 5 quote units at 2 quote/base = 2.5 base units
        let result = price("2").convert(Asset::new(500_000, 1)).unwrap();
        assert_eq!(result, Asset::new(250_000, 0));
    }

    #[test]
    fn test_convert_truncates_toward_zero() {
        // 100001 raw quote at 1.5 = 66667.33.. raw base, truncated
        let result = price("1.5").convert(Asset::new(100_001, 1)).unwrap();
        assert_eq!(result.amount, 66_667);

        // 1 raw base at 0.5 = 0.5 raw quote, truncated to zero
        let result = price("0.5").convert(Asset::new(1, 0)).unwrap();
        assert_eq!(result.amount, 0);
    }

    #[test]
    fn test_convert_rejects_foreign_asset() {
        let result = price("2").convert(Asset::new(100, 9));
        assert_eq!(
            result,
            Err(MarketError::AssetMismatch {
                expected: 0,
                found: 9
            })
        );
    }

    #[test]
    fn test_convert_zero_ratio_is_invalid() {
        let zero = Price::new(0, 1, 0);
        assert!(zero.convert(Asset::new(100, 1)).is_err());
    }

    #[test]
    fn test_ratio_of() {
        // 3 quote over 2 base = 1.5
        let p = Price::ratio_of(Asset::new(300_000, 1), Asset::new(200_000, 0)).unwrap();
        assert_eq!(p.ratio, 150_000_000);
        assert_eq!(p.quote_asset_id, 1);
        assert_eq!(p.base_asset_id, 0);

        assert!(Price::ratio_of(Asset::new(100, 1), Asset::new(0, 0)).is_err());
        assert!(Price::ratio_of(Asset::new(-1, 1), Asset::new(100, 0)).is_err());
    }

    #[test]
    fn test_scale_ratio() {
        let median = price("3");
        assert_eq!(median.scale_ratio(4, 3).ratio, 400_000_000);
        assert_eq!(median.scale_ratio(2, 3).ratio, 200_000_000);
    }

    #[test]
    fn test_ordering_within_pair() {
        assert!(price("1") < price("2"));
        assert!(price("2.00000001") > price("2"));
    }

    #[test]
    fn test_ordering_groups_pairs() {
        // Every price of pair (1, 0) sorts before every price of pair (2, 0)
        let high_in_low_pair = Price::new(u128::MAX, 1, 0);
        let low_in_high_pair = Price::new(0, 2, 0);
        assert!(high_in_low_pair < low_in_high_pair);
    }

    #[test]
    fn test_display() {
        assert_eq!(price("2.5").to_string(), "2.5 (1/0)");
    }
}
