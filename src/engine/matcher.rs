//! The matching and settlement state machine.
//!
//! ## Execution model
//!
//! One [`MarketEngine`] runs one trading pair once. It forks a pending
//! overlay of the chain state, optionally liquidates previously collected
//! fees, then repeatedly pulls the best bid and best ask through the merged
//! cursors and settles crossing trades until none remain. On success the
//! overlay replaces the parent state in one step; on any fatal error the
//! overlay is discarded and only a human-readable annotation is written to
//! the parent's market status.
//!
//! ## Order priority
//!
//! The bid side merges resting bids with resting shorts; a short outranks
//! the best bid only when its price is strictly higher. The ask side gives
//! absolute priority to due margin calls (collateral positions whose call
//! price is at or below the current bid) and only then falls back to
//! resting asks.
//!
//! ## Determinism
//!
//! Iteration order, tie-breaks, truncation, and fee capture here are all
//! consensus-visible: every validating node must produce byte-identical
//! transaction logs from identical inputs. Nothing in this module may read
//! clocks, maps with unstable ordering, or thread state.

use tracing::{debug, error, warn};

use crate::engine::cursor::BookCursor;
use crate::error::{MarketError, Result};
use crate::state::{
    AssetRecord, BalanceKey, BalanceRecord, ChainState, MarketStatus, PendingState,
};
use crate::types::{
    Address, Asset, AssetId, CollateralRecord, ExecutionReceipt, MarketIndexKey, MarketOrder,
    MarketTransaction, OrderKind, OrderRecord, Price, CHAIN_PRECISION, NATIVE_ASSET_ID,
};

/// Minimum consumed depth, per side, that a market-issued pair must clear in
/// one execution (100 whole native units).
pub const MARKET_DEPTH_REQUIREMENT: i64 = 100 * CHAIN_PRECISION;

/// Fee on collateral returned by a retired margin call, in basis points.
pub const COVER_LIQUIDATION_FEE_BPS: i64 = 500;

fn ensure(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(MarketError::InvariantViolation(what.to_string()))
    }
}

/// Outcome of one pair execution.
///
/// `transactions` is the ordered trade log and is empty when the execution
/// faulted (a discarded execution publishes nothing but its error).
#[derive(Debug)]
pub struct MarketExecution {
    /// Quote asset of the executed pair.
    pub quote_asset_id: AssetId,

    /// Base asset of the executed pair.
    pub base_asset_id: AssetId,

    /// Ordered log of executed trades.
    pub transactions: Vec<MarketTransaction>,

    /// Receipt over the trade log.
    pub receipt: ExecutionReceipt,

    /// The fatal error, if the execution was discarded.
    pub error: Option<MarketError>,
}

impl MarketExecution {
    /// True when the execution committed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The per-pair matching engine.
pub struct MarketEngine<'a> {
    prior: &'a mut ChainState,
    pending: PendingState,
    quote_id: AssetId,
    base_id: AssetId,
    timestamp: u64,

    bid_cursor: BookCursor<OrderRecord>,
    short_cursor: BookCursor<OrderRecord>,
    ask_cursor: BookCursor<OrderRecord>,
    collateral_cursor: BookCursor<CollateralRecord>,

    current_bid: Option<MarketOrder>,
    current_ask: Option<MarketOrder>,

    /// Feed-derived ceiling for new short bids (median * 4/3).
    max_short_bid: Option<Price>,
    /// Feed-derived floor for margin-call pricing (median * 2/3).
    min_cover_ask: Option<Price>,

    consumed_bid_depth: i64,
    consumed_ask_depth: i64,

    transactions: Vec<MarketTransaction>,
}

impl<'a> MarketEngine<'a> {
    /// Position the cursors for one pair and fork the pending overlay.
    pub fn new(
        chain: &'a mut ChainState,
        quote_asset_id: AssetId,
        base_asset_id: AssetId,
    ) -> MarketEngine<'a> {
        let bid_cursor = BookCursor::descending(chain.bids(), quote_asset_id, base_asset_id);
        let short_cursor = BookCursor::descending(chain.shorts(), quote_asset_id, base_asset_id);
        let ask_cursor = BookCursor::ascending(chain.asks(), quote_asset_id, base_asset_id);
        // Lowest call price first: the deepest in-the-money margin calls are
        // serviced before shallower ones.
        let collateral_cursor =
            BookCursor::ascending(chain.collateral(), quote_asset_id, base_asset_id);
        let pending = chain.fork();

        MarketEngine {
            prior: chain,
            pending,
            quote_id: quote_asset_id,
            base_id: base_asset_id,
            timestamp: 0,
            bid_cursor,
            short_cursor,
            ask_cursor,
            collateral_cursor,
            current_bid: None,
            current_ask: None,
            max_short_bid: None,
            min_cover_ask: None,
            consumed_bid_depth: 0,
            consumed_ask_depth: 0,
            transactions: Vec::new(),
        }
    }

    /// Run the pair to completion and commit or discard atomically.
    pub fn execute(mut self, timestamp: u64) -> MarketExecution {
        self.timestamp = timestamp;
        let quote_asset_id = self.quote_id;
        let base_asset_id = self.base_id;

        let outcome = self.match_orders().and_then(|()| {
            ExecutionReceipt::for_transactions(
                quote_asset_id,
                base_asset_id,
                &self.transactions,
                timestamp,
            )
        });

        match outcome {
            Ok(receipt) => {
                let MarketEngine {
                    prior,
                    pending,
                    transactions,
                    ..
                } = self;
                pending.apply_to(prior);
                MarketExecution {
                    quote_asset_id,
                    base_asset_id,
                    transactions,
                    receipt,
                    error: None,
                }
            }
            Err(err) => {
                error!(
                    quote = quote_asset_id,
                    base = base_asset_id,
                    %err,
                    "market execution failed; discarding pending changes"
                );
                let MarketEngine { prior, .. } = self;
                let mut status = prior
                    .get_market_status(quote_asset_id, base_asset_id)
                    .unwrap_or_else(|| MarketStatus::new(quote_asset_id, base_asset_id));
                status.last_error = Some(err.to_string());
                prior.store_market_status(status);

                let receipt =
                    ExecutionReceipt::for_transactions(quote_asset_id, base_asset_id, &[], timestamp)
                        .unwrap_or_default();
                MarketExecution {
                    quote_asset_id,
                    base_asset_id,
                    transactions: Vec::new(),
                    receipt,
                    error: Some(err),
                }
            }
        }
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    fn match_orders(&mut self) -> Result<()> {
        ensure(
            self.quote_id != self.base_id,
            "quote and base asset of a pair must differ",
        )?;

        let mut quote_asset = self.pending.get_asset_record(self.quote_id).ok_or_else(|| {
            MarketError::InvariantViolation(format!("unknown quote asset {}", self.quote_id))
        })?;
        let mut base_asset = self.pending.get_asset_record(self.base_id).ok_or_else(|| {
            MarketError::InvariantViolation(format!("unknown base asset {}", self.base_id))
        })?;

        let median_price = self.pending.get_feed_median_price(self.quote_id);

        if self.base_id == NATIVE_ASSET_ID && quote_asset.is_market_issued() {
            let median = median_price.ok_or(MarketError::InsufficientPriceFeed(self.quote_id))?;
            self.max_short_bid = Some(median.scale_ratio(4, 3));
            self.min_cover_ask = Some(median.scale_ratio(2, 3));
            debug!(
                median = %median,
                ceiling = %median.scale_ratio(4, 3),
                floor = %median.scale_ratio(2, 3),
                "feed policy bounds"
            );

            self.liquidate_fees(&mut quote_asset, &mut base_asset)?;
        }

        while self.next_bid()? && self.next_ask()? {
            let (Some(bid), Some(ask)) = (self.current_bid.clone(), self.current_ask.clone())
            else {
                break;
            };

            // No crossing trade left: the best ask (or call price) sits above
            // the best bid.
            if ask.price() > bid.price() {
                break;
            }

            let mtrx = MarketTransaction::between(&bid, &ask);
            let filled = match (ask.kind, bid.kind) {
                (OrderKind::Cover, OrderKind::Short) => {
                    self.fill_cover_with_short(&bid, &ask, mtrx, &mut quote_asset)?
                }
                (OrderKind::Cover, OrderKind::Bid) => {
                    self.fill_cover_with_bid(&bid, &ask, mtrx, &mut quote_asset, &mut base_asset)?
                }
                (OrderKind::Ask, OrderKind::Short) => {
                    self.fill_ask_with_short(&bid, &ask, mtrx, &mut quote_asset, &mut base_asset)?
                }
                (OrderKind::Ask, OrderKind::Bid) => {
                    self.fill_ask_with_bid(&bid, &ask, mtrx, &mut quote_asset, &mut base_asset)?
                }
                (ask_kind, bid_kind) => {
                    return Err(MarketError::InvariantViolation(format!(
                        "unmatchable order pairing {ask_kind:?}/{bid_kind:?}"
                    )))
                }
            };

            // A skipped order produced no transaction; retry with the next
            // candidate on that side.
            let Some(mtrx) = filled else { continue };

            self.accumulate_fees(&mtrx, &mut quote_asset)?;
            self.push_market_transaction(mtrx)?;
        }

        self.pending.store_asset_record(quote_asset.clone());
        self.pending.store_asset_record(base_asset.clone());

        let mut status = self
            .pending
            .get_market_status(self.quote_id, self.base_id)
            .unwrap_or_else(|| MarketStatus::new(self.quote_id, self.base_id));
        status.last_error = None;

        if status.avg_price.is_none() && median_price.is_some() {
            // Bootstrap the average from the feed until the market runs on
            // its own.
            status.avg_price = median_price;
        } else {
            if let (Some(bid), Some(ask)) = (&self.current_bid, &self.current_ask) {
                status.blend_avg_price(bid.price(), ask.price());
            }

            if quote_asset.is_market_issued()
                && (self.consumed_ask_depth < MARKET_DEPTH_REQUIREMENT
                    || self.consumed_bid_depth < MARKET_DEPTH_REQUIREMENT)
            {
                return Err(MarketError::InsufficientMarketDepth {
                    bid_depth: self.consumed_bid_depth,
                    ask_depth: self.consumed_ask_depth,
                    required: MARKET_DEPTH_REQUIREMENT,
                });
            }
        }

        status.bid_depth = self.consumed_bid_depth;
        status.ask_depth = self.consumed_ask_depth;
        self.pending.store_market_status(status);

        debug!(
            transactions = self.transactions.len(),
            bid_depth = self.consumed_bid_depth,
            ask_depth = self.consumed_ask_depth,
            "done matching orders"
        );
        Ok(())
    }

    /// Pre-pass: sell previously collected quote-asset fees against the best
    /// resting asks and route the proceeds into the network fee pool.
    fn liquidate_fees(
        &mut self,
        quote_asset: &mut AssetRecord,
        base_asset: &mut AssetRecord,
    ) -> Result<()> {
        debug!(
            collected_fees = quote_asset.collected_fees,
            "liquidating collected fees"
        );

        // Positions the bid side; margin calls cannot be synthesized without
        // a current bid.
        self.next_bid()?;

        while self.next_ask()? && quote_asset.collected_fees > 0 {
            let Some(ask) = self.current_ask.clone() else {
                break;
            };

            // A synthetic bid owned by the null address, at the ask's own
            // price: the fee pool trades against itself.
            let mut mtrx = MarketTransaction {
                bid_price: ask.price(),
                ask_price: ask.price(),
                bid_owner: Address::NULL,
                ask_owner: ask.owner(),
                bid_kind: OrderKind::Bid,
                ask_kind: ask.kind,
                bid_paid: Asset::zero(self.quote_id),
                bid_received: Asset::zero(self.base_id),
                ask_paid: Asset::zero(self.base_id),
                ask_received: Asset::zero(self.quote_id),
                fees_collected: Asset::zero(self.quote_id),
            };

            let ask_quote_quantity = ask.quote_quantity()?;
            let quote_amount = quote_asset.collected_fees.min(ask_quote_quantity.amount);
            mtrx.ask_received = Asset::new(quote_amount, self.quote_id);
            mtrx.ask_paid = mtrx.ask_price.convert(mtrx.ask_received)?;
            mtrx.bid_paid = mtrx.ask_received;
            mtrx.bid_received = mtrx.ask_paid;

            // Degenerate price: nothing left that converts to a whole base
            // unit.
            if mtrx.ask_paid.is_zero() {
                break;
            }

            mtrx.validate()?;
            if mtrx.ask_kind == OrderKind::Ask {
                self.pay_current_ask(&mtrx, base_asset)?;
            } else {
                self.pay_current_cover(&mut mtrx, quote_asset)?;
            }

            self.consumed_ask_depth += mtrx.ask_paid.amount;
            quote_asset.collected_fees -= mtrx.bid_paid.amount;

            // Proceeds go to the network fee pool, never to a user balance.
            let prev = self.pending.get_accumulated_fees();
            self.pending.set_accumulated_fees(prev + mtrx.ask_paid.amount);

            self.accumulate_fees(&mtrx, quote_asset)?;
            self.push_market_transaction(mtrx)?;
        }

        self.pending.store_asset_record(quote_asset.clone());
        self.pending.store_asset_record(base_asset.clone());

        debug!(
            remaining = quote_asset.collected_fees,
            "fee liquidation complete"
        );
        Ok(())
    }

    // ========================================================================
    // Trade classification arms
    // ========================================================================

    fn require_native_pair(&self, quote_asset: &AssetRecord) -> Result<()> {
        ensure(
            quote_asset.is_market_issued() && self.base_id == NATIVE_ASSET_ID,
            "collateralized orders require a market-issued quote over the native base",
        )
    }

    /// Margin call settling against a new short.
    fn fill_cover_with_short(
        &mut self,
        bid: &MarketOrder,
        ask: &MarketOrder,
        mut mtrx: MarketTransaction,
        quote_asset: &mut AssetRecord,
    ) -> Result<Option<MarketTransaction>> {
        self.require_native_pair(quote_asset)?;
        let min_cover_ask = self
            .min_cover_ask
            .ok_or_else(|| MarketError::InvariantViolation("margin call without feed bounds".into()))?;

        // The margin call accepts the bid's price.
        mtrx.ask_price = mtrx.bid_price;

        if mtrx.bid_price < min_cover_ask {
            debug!(bid_price = %mtrx.bid_price, floor = %min_cover_ask, "skipping cover priced below the feed floor");
            self.current_ask = None;
            return Ok(None);
        }

        let bid_quantity = bid.quantity()?;
        let ask_quantity = mtrx.ask_price.convert(ask.balance())?;
        let quantity = bid_quantity.checked_min(&ask_quantity)?;

        let mut base_paid_by_short;
        if ask_quantity.amount == quantity.amount {
            // The entire payoff is retired.
            mtrx.ask_received = ask.balance();
            mtrx.bid_paid = ask.balance();
            base_paid_by_short = quantity;
        } else {
            mtrx.ask_received = mtrx.ask_price.convert(quantity)?;
            mtrx.bid_paid = mtrx.bid_price.convert(bid.balance())?;
            base_paid_by_short = bid.balance();
        }

        // A sub-precision remainder is absorbed into the trade.
        if bid_quantity.amount - quantity.amount < CHAIN_PRECISION {
            base_paid_by_short = bid_quantity;
        }

        mtrx.ask_paid = quantity;
        mtrx.bid_received = quantity;

        ensure(
            base_paid_by_short.amount <= bid.balance().amount,
            "short paying more than its remaining balance",
        )?;

        let collateral = ask
            .collateral
            .ok_or_else(|| MarketError::InvariantViolation("cover without collateral".into()))?;
        if mtrx.ask_paid.amount > collateral {
            let err = MarketError::InsufficientCollateral {
                required: mtrx.ask_paid.amount,
                collateral,
            };
            debug!(%err, "skipping margin call");
            self.current_ask = None;
            return Ok(None);
        }

        mtrx.validate()?;
        self.pay_current_short(&mtrx, base_paid_by_short, quote_asset)?;
        self.pay_current_cover(&mut mtrx, quote_asset)?;

        self.consumed_bid_depth += base_paid_by_short.amount;
        self.consumed_ask_depth += mtrx.ask_paid.amount;
        Ok(Some(mtrx))
    }

    /// Margin call settling against an ordinary bid.
    fn fill_cover_with_bid(
        &mut self,
        bid: &MarketOrder,
        ask: &MarketOrder,
        mut mtrx: MarketTransaction,
        quote_asset: &mut AssetRecord,
        base_asset: &mut AssetRecord,
    ) -> Result<Option<MarketTransaction>> {
        self.require_native_pair(quote_asset)?;
        let min_cover_ask = self
            .min_cover_ask
            .ok_or_else(|| MarketError::InvariantViolation("margin call without feed bounds".into()))?;

        mtrx.ask_price = mtrx.bid_price;

        // Covers never fill below the feed floor; this blocks manipulation
        // that would force the short to accept an arbitrarily low valuation.
        if mtrx.bid_price < min_cover_ask {
            debug!(bid_price = %mtrx.bid_price, floor = %min_cover_ask, "skipping cover priced below the feed floor");
            self.current_ask = None;
            return Ok(None);
        }

        let quote_exchanged = bid.balance().checked_min(&ask.balance())?;
        mtrx.bid_paid = quote_exchanged;
        mtrx.ask_received = quote_exchanged;
        mtrx.ask_paid = mtrx.bid_price.convert(quote_exchanged)?;
        mtrx.bid_received = mtrx.ask_paid;

        mtrx.validate()?;

        let collateral = ask
            .collateral
            .ok_or_else(|| MarketError::InvariantViolation("cover without collateral".into()))?;
        if mtrx.ask_paid.amount > collateral {
            // Insolvency backstop: the shortfall is minted into the base
            // supply so quote holders stay whole at the expense of every
            // base holder.
            let shortfall = mtrx.ask_paid.amount - collateral;
            if let Some(current) = self.current_ask.as_mut() {
                if let Some(held) = current.collateral.as_mut() {
                    *held += shortfall;
                }
            }
            base_asset.current_share_supply += shortfall;
            warn!(
                shortfall,
                "cover collateral exhausted; minting shortfall into base supply"
            );
            self.consumed_ask_depth += collateral;
        } else {
            self.consumed_ask_depth += mtrx.ask_paid.amount;
        }
        self.consumed_bid_depth += mtrx.bid_received.amount;

        self.pay_current_bid(&mtrx, quote_asset)?;
        self.pay_current_cover(&mut mtrx, quote_asset)?;
        Ok(Some(mtrx))
    }

    /// New short opening against a resting ask.
    fn fill_ask_with_short(
        &mut self,
        bid: &MarketOrder,
        ask: &MarketOrder,
        mut mtrx: MarketTransaction,
        quote_asset: &mut AssetRecord,
        base_asset: &mut AssetRecord,
    ) -> Result<Option<MarketTransaction>> {
        self.require_native_pair(quote_asset)?;
        let max_short_bid = self
            .max_short_bid
            .ok_or_else(|| MarketError::InvariantViolation("short bid without feed bounds".into()))?;

        if mtrx.bid_price > max_short_bid {
            debug!(bid_price = %mtrx.bid_price, ceiling = %max_short_bid, "skipping short priced above the feed ceiling");
            self.current_bid = None;
            return Ok(None);
        }

        let bid_quantity = bid.quantity()?;
        let ask_quantity = ask.quantity()?;
        let quantity = bid_quantity.checked_min(&ask_quantity)?;

        mtrx.bid_paid = mtrx.bid_price.convert(quantity)?;
        mtrx.ask_paid = quantity;
        mtrx.bid_received = quantity;
        mtrx.ask_received = mtrx.ask_price.convert(quantity)?;

        let mut base_paid_by_short = quantity;
        if bid_quantity.amount - quantity.amount < CHAIN_PRECISION {
            base_paid_by_short = bid_quantity;
        }

        ensure(
            base_paid_by_short.amount <= bid.balance().amount,
            "short paying more than its remaining balance",
        )?;

        mtrx.fees_collected = mtrx.bid_paid.checked_sub(&mtrx.ask_received)?;

        mtrx.validate()?;
        self.pay_current_short(&mtrx, base_paid_by_short, quote_asset)?;
        self.pay_current_ask(&mtrx, base_asset)?;

        self.consumed_bid_depth += base_paid_by_short.amount;
        self.consumed_ask_depth += mtrx.ask_paid.amount;
        Ok(Some(mtrx))
    }

    /// Ordinary crossing trade.
    fn fill_ask_with_bid(
        &mut self,
        bid: &MarketOrder,
        ask: &MarketOrder,
        mut mtrx: MarketTransaction,
        quote_asset: &mut AssetRecord,
        base_asset: &mut AssetRecord,
    ) -> Result<Option<MarketTransaction>> {
        let bid_quantity = bid.quantity()?;
        let ask_quantity = ask.quantity()?;
        let quantity = bid_quantity.checked_min(&ask_quantity)?;

        // The ask receives exactly its ask price; the bid pays its bid
        // price; the difference is the fee residual.
        mtrx.bid_paid = mtrx.bid_price.convert(quantity)?;
        mtrx.ask_received = mtrx.ask_price.convert(quantity)?;
        mtrx.ask_paid = quantity;
        mtrx.bid_received = quantity;

        // A sub-precision bid remainder is consumed whole so no un-fillable
        // dust order is left behind.
        if bid_quantity.amount - quantity.amount < CHAIN_PRECISION {
            mtrx.bid_paid = bid.balance();
        }

        mtrx.fees_collected = mtrx.bid_paid.checked_sub(&mtrx.ask_received)?;

        mtrx.validate()?;
        self.pay_current_bid(&mtrx, quote_asset)?;
        self.pay_current_ask(&mtrx, base_asset)?;

        self.consumed_bid_depth += mtrx.bid_received.amount;
        self.consumed_ask_depth += mtrx.ask_paid.amount;
        Ok(Some(mtrx))
    }

    // ========================================================================
    // Settlement ledger
    // ========================================================================

    fn push_market_transaction(&mut self, mtrx: MarketTransaction) -> Result<()> {
        mtrx.validate()?;
        self.transactions.push(mtrx);
        Ok(())
    }

    /// Settle the paying short: mint the borrowed quote, open or grow the
    /// collateral position, shrink the short order.
    fn pay_current_short(
        &mut self,
        mtrx: &MarketTransaction,
        base_paid_by_short: Asset,
        quote_asset: &mut AssetRecord,
    ) -> Result<()> {
        let bid = self
            .current_bid
            .as_mut()
            .ok_or_else(|| MarketError::InvariantViolation("no current bid to settle".into()))?;
        ensure(
            bid.kind == OrderKind::Short && mtrx.bid_kind == OrderKind::Short,
            "pay_current_short on a non-short order",
        )?;

        quote_asset.current_share_supply += mtrx.bid_paid.amount;

        // The position holds the short's base plus the base bought from the
        // ask side.
        let collateral_amount = base_paid_by_short.amount * 2;

        if mtrx.bid_paid.amount <= 0 {
            bid.state.balance -= base_paid_by_short.amount;
            ensure(bid.state.balance >= 0, "short balance went negative")?;
            let (index, state) = (bid.market_index, bid.state);
            self.pending.store_short_record(index, state);
            return Ok(());
        }

        // Call price: debt over 3/4 of the collateral.
        let cover_price = Price::ratio_of(
            mtrx.bid_paid,
            Asset::new(collateral_amount * 3 / 4, self.base_id),
        )?;
        let cover_index = MarketIndexKey::new(cover_price, bid.owner());

        let mut cover_record = self
            .pending
            .get_collateral_record(&cover_index)
            .unwrap_or_default();
        cover_record.collateral_balance += collateral_amount;
        cover_record.payoff_balance += mtrx.bid_paid.amount;

        ensure(
            cover_record.payoff_balance >= 0,
            "collateral payoff went negative",
        )?;
        ensure(
            cover_record.collateral_balance >= 0,
            "collateral balance went negative",
        )?;

        bid.state.balance -= base_paid_by_short.amount;
        ensure(bid.state.balance >= 0, "short balance went negative")?;

        let (index, state) = (bid.market_index, bid.state);
        self.pending.store_collateral_record(cover_index, cover_record);
        self.pending.store_short_record(index, state);
        Ok(())
    }

    /// Settle the paying bid: shrink its balance, credit the owner with the
    /// base received, sweep unreachable dust into fees.
    fn pay_current_bid(
        &mut self,
        mtrx: &MarketTransaction,
        quote_asset: &mut AssetRecord,
    ) -> Result<()> {
        let bid = self
            .current_bid
            .as_mut()
            .ok_or_else(|| MarketError::InvariantViolation("no current bid to settle".into()))?;
        ensure(
            bid.kind == OrderKind::Bid && mtrx.bid_kind == OrderKind::Bid,
            "pay_current_bid on a non-bid order",
        )?;

        bid.state.balance -= mtrx.bid_paid.amount;
        ensure(bid.state.balance >= 0, "bid balance went negative")?;

        let key = BalanceKey::new(mtrx.bid_owner, self.base_id);
        let mut payout = self.pending.get_balance_record(&key).unwrap_or_else(|| {
            BalanceRecord::new(mtrx.bid_owner, Asset::zero(self.base_id), 0)
        });
        payout.balance = payout.balance.checked_add(&mtrx.bid_received)?;
        payout.last_update = self.timestamp;
        self.pending.store_balance_record(payout);

        // A remainder too small to buy a single base unit can never fill;
        // sweep it into fees and retire the order.
        if bid.quantity()?.amount == 0 {
            quote_asset.collected_fees += bid.state.balance;
            bid.state.balance = 0;
        }

        let (index, state) = (bid.market_index, bid.state);
        self.pending.store_bid_record(index, state);
        Ok(())
    }

    /// Settle the covering position: retire debt, consume collateral, burn
    /// the retired quote supply, and return leftovers once fully covered.
    fn pay_current_cover(
        &mut self,
        mtrx: &mut MarketTransaction,
        quote_asset: &mut AssetRecord,
    ) -> Result<()> {
        let ask = self
            .current_ask
            .as_mut()
            .ok_or_else(|| MarketError::InvariantViolation("no current ask to settle".into()))?;
        ensure(
            ask.kind == OrderKind::Cover && mtrx.ask_kind == OrderKind::Cover,
            "pay_current_cover on a non-cover order",
        )?;
        let owner = ask.owner();
        let index = ask.market_index;
        let collateral = ask
            .collateral
            .as_mut()
            .ok_or_else(|| MarketError::InvariantViolation("cover without collateral".into()))?;

        ask.state.balance -= mtrx.bid_paid.amount;
        *collateral -= mtrx.ask_paid.amount;
        quote_asset.current_share_supply -= mtrx.ask_received.amount;

        ensure(ask.state.balance >= 0, "cover payoff went negative")?;
        ensure(*collateral >= 0, "cover collateral went negative")?;
        ensure(
            quote_asset.current_share_supply >= 0,
            "share supply went negative",
        )?;

        if ask.state.balance == 0 {
            // Fully covered: the remaining collateral goes home, minus the
            // liquidation fee for having been margin called.
            let fee = *collateral * COVER_LIQUIDATION_FEE_BPS / 10_000;
            let returned = *collateral - fee;

            // A cover always takes the bid's exact price, so the only fee a
            // cover trade can carry is this one.
            ensure(
                mtrx.fees_collected.amount == 0,
                "cover trade carried unexpected fees",
            )?;
            mtrx.fees_collected = Asset::new(fee, NATIVE_ASSET_ID);

            debug!(returned, fee, "cover retired; returning remaining collateral");

            let key = BalanceKey::new(owner, self.base_id);
            let mut payout = self
                .pending
                .get_balance_record(&key)
                .unwrap_or_else(|| BalanceRecord::new(owner, Asset::zero(self.base_id), 0));
            payout.balance = payout
                .balance
                .checked_add(&Asset::new(returned, self.base_id))?;
            payout.last_update = self.timestamp;
            self.pending.store_balance_record(payout);

            *collateral = 0;
        }

        // The position consumed more collateral than debt, so its call
        // price is stale; the record is re-stored under its existing key and
        // the price on it is only ever used as a trigger.
        let record = CollateralRecord::new(*collateral, ask.state.balance);
        self.pending.store_collateral_record(index, record);
        Ok(())
    }

    /// Settle the paying ask: shrink its balance, credit the owner with the
    /// quote received, sweep unreachable dust into fees.
    fn pay_current_ask(
        &mut self,
        mtrx: &MarketTransaction,
        base_asset: &mut AssetRecord,
    ) -> Result<()> {
        let ask = self
            .current_ask
            .as_mut()
            .ok_or_else(|| MarketError::InvariantViolation("no current ask to settle".into()))?;
        ensure(
            ask.kind == OrderKind::Ask && mtrx.ask_kind == OrderKind::Ask,
            "pay_current_ask on a non-ask order",
        )?;

        ask.state.balance -= mtrx.ask_paid.amount;
        ensure(ask.state.balance >= 0, "ask balance went negative")?;

        let key = BalanceKey::new(mtrx.ask_owner, self.quote_id);
        let mut payout = self.pending.get_balance_record(&key).unwrap_or_else(|| {
            BalanceRecord::new(mtrx.ask_owner, Asset::zero(self.quote_id), 0)
        });
        payout.balance = payout.balance.checked_add(&mtrx.ask_received)?;
        payout.last_update = self.timestamp;
        self.pending.store_balance_record(payout);

        // A remainder not worth a single quote unit can never fill.
        if ask.quote_quantity()?.amount == 0 {
            base_asset.collected_fees += ask.state.balance;
            ask.state.balance = 0;
        }

        let (index, state) = (ask.market_index, ask.state);
        self.pending.store_ask_record(index, state);
        Ok(())
    }

    /// Route a trade's captured fees into the native pool or the quote
    /// asset's collected fees.
    fn accumulate_fees(
        &mut self,
        mtrx: &MarketTransaction,
        quote_asset: &mut AssetRecord,
    ) -> Result<()> {
        if mtrx.fees_collected.is_zero() {
            return Ok(());
        }
        if mtrx.fees_collected.asset_id == NATIVE_ASSET_ID {
            let prev = self.pending.get_accumulated_fees();
            self.pending
                .set_accumulated_fees(prev + mtrx.fees_collected.amount);
        } else {
            ensure(
                quote_asset.id == mtrx.fees_collected.asset_id,
                "fee asset is neither native nor the quote asset",
            )?;
            quote_asset.collected_fees += mtrx.fees_collected.amount;
        }
        Ok(())
    }

    // ========================================================================
    // Current-order selection
    // ========================================================================

    /// Load the best bid-side order, merging bids and shorts.
    ///
    /// Idempotent while the current bid still has quantity; a short head
    /// wins only when its price strictly exceeds the bid head's.
    fn next_bid(&mut self) -> Result<bool> {
        if let Some(bid) = &self.current_bid {
            if bid.quantity()?.amount > 0 {
                return Ok(true);
            }
        }
        self.current_bid = None;

        let take_short = match (self.bid_cursor.peek(), self.short_cursor.peek()) {
            (None, Some(_)) => true,
            (Some((bid_key, _)), Some((short_key, _))) => {
                short_key.order_price > bid_key.order_price
            }
            _ => false,
        };

        if take_short {
            if let Some((key, record)) = self.short_cursor.peek().cloned() {
                self.current_bid = Some(MarketOrder::new(OrderKind::Short, key, record));
                self.short_cursor.advance();
            }
        } else if let Some((key, record)) = self.bid_cursor.peek().cloned() {
            self.current_bid = Some(MarketOrder::new(OrderKind::Bid, key, record));
            self.bid_cursor.advance();
        }

        Ok(self.current_bid.is_some())
    }

    /// Load the best ask-side order. Margin calls take priority over all
    /// resting asks.
    ///
    /// Idempotent while the current ask still has balance. A collateral
    /// position is due once its call price is at or below the current bid.
    fn next_ask(&mut self) -> Result<bool> {
        if let Some(ask) = &self.current_ask {
            if ask.state.balance > 0 {
                return Ok(true);
            }
        }
        self.current_ask = None;

        if let Some(bid) = &self.current_bid {
            let bid_price = bid.price();
            while let Some((key, record)) = self.collateral_cursor.peek().cloned() {
                if record.payoff_balance <= 0 {
                    // Retired position awaiting cleanup; never a cover.
                    self.collateral_cursor.advance();
                    continue;
                }
                if key.order_price <= bid_price {
                    self.current_ask = Some(MarketOrder::with_collateral(
                        OrderKind::Cover,
                        key,
                        OrderRecord::new(record.payoff_balance),
                        record.collateral_balance,
                    ));
                    self.collateral_cursor.advance();
                    return Ok(true);
                }
                break;
            }
        }

        if let Some((key, record)) = self.ask_cursor.peek().cloned() {
            self.current_ask = Some(MarketOrder::new(OrderKind::Ask, key, record));
            self.ask_cursor.advance();
        }

        Ok(self.current_ask.is_some())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
