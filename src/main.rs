//! Basalt DEX - demo binary.
//!
//! Seeds a small chain state with a market-issued asset, resting orders on
//! both sides, an open margin call, and a pre-funded fee pool, then runs one
//! market execution and prints the resulting trade log and receipt.
//!
//! Run with `RUST_LOG=debug` to watch the engine's skip/settlement logging.

use basalt_dex::engine::MarketEngine;
use basalt_dex::state::{AssetRecord, ChainState};
use basalt_dex::types::{
    Address, CollateralRecord, MarketIndexKey, OrderRecord, Price, NATIVE_ASSET_ID,
};

const QUOTE: u32 = 1;

fn index(price: &str, owner: u64) -> MarketIndexKey {
    MarketIndexKey::new(
        Price::from_decimal_str(price, QUOTE, NATIVE_ASSET_ID).expect("demo price"),
        Address::from_low_u64(owner),
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("===========================================");
    println!("  Basalt DEX - market execution demo");
    println!("===========================================");
    println!();

    let mut chain = ChainState::new();
    chain.store_asset_record(AssetRecord::new(NATIVE_ASSET_ID, "BSLT", false));

    let mut quote_asset = AssetRecord::new(QUOTE, "BUSD", true);
    quote_asset.current_share_supply = 100_000_000;
    quote_asset.collected_fees = 200_000;
    chain.store_asset_record(quote_asset);

    // Reference price feed: 1 BUSD per BSLT
    chain.store_feed_price(
        QUOTE,
        Price::from_decimal_str("1", QUOTE, NATIVE_ASSET_ID).expect("demo price"),
    );

    // Resting book: two asks, one bid, one short, one open margin call
    chain.store_ask_record(index("1.05", 20), OrderRecord::new(1_000_000));
    chain.store_ask_record(index("1.10", 21), OrderRecord::new(500_000));
    chain.store_bid_record(index("1.08", 10), OrderRecord::new(1_000_000));
    chain.store_short_record(index("1.2", 11), OrderRecord::new(500_000));
    chain.store_collateral_record(index("0.95", 30), CollateralRecord::new(800_000, 300_000));

    println!("Executing pair {}/{}...", QUOTE, NATIVE_ASSET_ID);
    println!();

    let result = MarketEngine::new(&mut chain, QUOTE, NATIVE_ASSET_ID).execute(1_700_000_000);

    match &result.error {
        None => println!("Execution committed."),
        Some(err) => println!("Execution failed: {err}"),
    }
    println!();

    for (i, mtrx) in result.transactions.iter().enumerate() {
        println!("Trade {}:", i + 1);
        println!("  {:?} {} -> {:?} {}", mtrx.bid_kind, mtrx.bid_owner, mtrx.ask_kind, mtrx.ask_owner);
        println!("  bid price:    {}", mtrx.bid_price);
        println!("  ask price:    {}", mtrx.ask_price);
        println!("  bid paid:     {}", mtrx.bid_paid);
        println!("  bid received: {}", mtrx.bid_received);
        println!("  ask paid:     {}", mtrx.ask_paid);
        println!("  ask received: {}", mtrx.ask_received);
        println!("  fees:         {}", mtrx.fees_collected);
        println!();
    }

    println!("Receipt:");
    println!("  transactions: {}", result.receipt.transactions_executed);
    println!("  trade root:   {}", result.receipt.trade_root_hex());
    println!();

    if let Some(status) = chain.get_market_status(QUOTE, NATIVE_ASSET_ID) {
        println!("Market status:");
        println!("  bid depth consumed: {}", status.bid_depth);
        println!("  ask depth consumed: {}", status.ask_depth);
        match status.avg_price {
            Some(avg) => println!("  average price:      {avg}"),
            None => println!("  average price:      (unset)"),
        }
    }
    println!();
    println!(
        "Accumulated network fees: {}",
        chain.get_accumulated_fees()
    );
}
