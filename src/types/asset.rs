//! Asset amounts and owner addresses.
//!
//! ## Fixed-Point Representation
//!
//! Amounts are signed 64-bit integers denominated in the smallest indivisible
//! unit of their asset. One whole unit of any asset is [`CHAIN_PRECISION`]
//! indivisible units. Floating point is never used: identical inputs must
//! produce identical amounts on every validating node.
//!
//! Negative amounts are representable (the type is used as an arithmetic
//! intermediate) but are invalid in every stored record; settlement code
//! asserts non-negativity before persisting.

use std::fmt;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::error::{MarketError, Result};

/// Identifier of an asset registered on the chain.
pub type AssetId = u32;

/// The network's native settlement asset. Shorts post collateral in this
/// asset and network-wide fees accumulate in it.
pub const NATIVE_ASSET_ID: AssetId = 0;

/// Indivisible units per whole asset unit (10^5).
///
/// Also the dust threshold: a residual order quantity below one whole unit
/// is absorbed into the trade that produced it.
pub const CHAIN_PRECISION: i64 = 100_000;

// ============================================================================
// Address
// ============================================================================

/// A 20-byte account address.
///
/// Ordering is lexicographic over the raw bytes, which makes addresses usable
/// as the tie-break component of order-book keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The null address. Owns nothing; used as the bid side of synthetic
    /// fee-pool trades.
    pub const NULL: Address = Address([0u8; 20]);

    /// Smallest possible address (all zero bytes).
    pub const MIN: Address = Address([0u8; 20]);

    /// Largest possible address (all 0xff bytes).
    pub const MAX: Address = Address([0xffu8; 20]);

    /// Build an address from a small integer. Handy for tests and demos.
    pub fn from_low_u64(value: u64) -> Address {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Address(bytes)
    }

    /// Raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the null (fee pool) address.
    pub fn is_null(&self) -> bool {
        *self == Address::NULL
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ============================================================================
// Asset
// ============================================================================

/// A signed fixed-point amount tagged with its asset identifier.
///
/// Arithmetic between mismatched identifiers is invalid and returns
/// [`MarketError::AssetMismatch`] rather than silently mixing units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Asset {
    /// Amount in indivisible units. May be negative only as an arithmetic
    /// intermediate, never in a stored record.
    pub amount: i64,

    /// The asset this amount is denominated in.
    pub asset_id: AssetId,
}

impl Asset {
    /// Create an amount of the given asset.
    pub fn new(amount: i64, asset_id: AssetId) -> Asset {
        Asset { amount, asset_id }
    }

    /// Zero of the given asset.
    pub fn zero(asset_id: AssetId) -> Asset {
        Asset {
            amount: 0,
            asset_id,
        }
    }

    /// Parse a decimal string (whole asset units) into an amount.
    ///
    /// Truncates toward zero past [`CHAIN_PRECISION`] resolution. Returns
    /// `None` for unparseable or out-of-range input.
    pub fn from_decimal_str(s: &str, asset_id: AssetId) -> Option<Asset> {
        let value = Decimal::from_str(s).ok()?;
        let scaled = value.checked_mul(Decimal::from(CHAIN_PRECISION))?;
        let amount = scaled.trunc().to_i64()?;
        Some(Asset { amount, asset_id })
    }

    fn require_same_asset(&self, other: &Asset) -> Result<()> {
        if self.asset_id == other.asset_id {
            Ok(())
        } else {
            Err(MarketError::AssetMismatch {
                expected: self.asset_id,
                found: other.asset_id,
            })
        }
    }

    /// Add two amounts of the same asset.
    pub fn checked_add(&self, other: &Asset) -> Result<Asset> {
        self.require_same_asset(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MarketError::AmountOverflow("asset addition"))?;
        Ok(Asset::new(amount, self.asset_id))
    }

    /// Subtract two amounts of the same asset.
    pub fn checked_sub(&self, other: &Asset) -> Result<Asset> {
        self.require_same_asset(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(MarketError::AmountOverflow("asset subtraction"))?;
        Ok(Asset::new(amount, self.asset_id))
    }

    /// The smaller of two amounts of the same asset.
    pub fn checked_min(&self, other: &Asset) -> Result<Asset> {
        self.require_same_asset(other)?;
        Ok(Asset::new(self.amount.min(other.amount), self.asset_id))
    }

    /// True when the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// True when the amount is below zero.
    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = Decimal::new(self.amount, 5).normalize();
        write!(f, "{} (asset {})", value, self.asset_id)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
