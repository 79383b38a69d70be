//! Execution receipt summarizing one market-pair execution.
//!
//! The receipt's trade root is a SHA-256 digest over the SSZ encodings of the
//! execution's transaction log, in log order. Two nodes replaying the same
//! block agree on the root if and only if they produced the identical log.

use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;

use crate::error::{MarketError, Result as MarketResult};
use crate::types::asset::AssetId;
use crate::types::transaction::MarketTransaction;

/// Summary of one pair execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct ExecutionReceipt {
    /// Quote asset of the executed pair.
    pub quote_asset_id: u32,

    /// Base asset of the executed pair.
    pub base_asset_id: u32,

    /// Number of market transactions in the log.
    pub transactions_executed: u64,

    /// SHA-256 over the concatenated SSZ transaction encodings.
    pub trade_root: [u8; 32],

    /// Execution timestamp (seconds).
    pub timestamp: u64,
}

impl ExecutionReceipt {
    /// Create a receipt from precomputed fields.
    pub fn new(
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
        transactions_executed: u64,
        trade_root: [u8; 32],
        timestamp: u64,
    ) -> ExecutionReceipt {
        ExecutionReceipt {
            quote_asset_id,
            base_asset_id,
            transactions_executed,
            trade_root,
            timestamp,
        }
    }

    /// Build the receipt for an execution's transaction log.
    pub fn for_transactions(
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
        transactions: &[MarketTransaction],
        timestamp: u64,
    ) -> MarketResult<ExecutionReceipt> {
        let mut hasher = Sha256::new();
        for mtrx in transactions {
            let bytes = ssz_rs::serialize(&mtrx.to_wire()).map_err(|e| {
                MarketError::InvariantViolation(format!("wire encoding failed: {e:?}"))
            })?;
            hasher.update(&bytes);
        }

        let mut trade_root = [0u8; 32];
        trade_root.copy_from_slice(&hasher.finalize());

        Ok(ExecutionReceipt {
            quote_asset_id,
            base_asset_id,
            transactions_executed: transactions.len() as u64,
            trade_root,
            timestamp,
        })
    }

    /// The trade root as a hex string.
    pub fn trade_root_hex(&self) -> String {
        hex::encode(self.trade_root)
    }

    /// True when no transactions were executed.
    pub fn is_empty(&self) -> bool {
        self.transactions_executed == 0
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
