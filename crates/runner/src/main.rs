//! Runs the gateway against the simulated venue.
//!
//! Starts both channels, prints what the strategy engine would see, and logs
//! a health line periodically until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth::VenueCredentials;
use clap::Parser;
use connector_core::RawDepthMarketData;
use connector_sim::{SimScript, SimVenue};
use gateway::{ChannelEngine, EngineEvent, Gateway, GatewayConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between synthetic market-data pushes.
const TICK_INTERVAL: Duration = Duration::from_millis(500);

const SIM_CONFIG: &str = r#"
[venue]
trading_address = "tcp://sim:10000"
market_data_address = "tcp://sim:10010"
"#;

#[derive(Debug, Parser)]
#[command(name = "venue-gateway", about = "Venue gateway driven by the simulated venue")]
struct Args {
    /// Gateway configuration file; the built-in simulator settings are used when absent
    #[arg(long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Order book ids whose ticks are forwarded to the engine
    #[arg(long, value_delimiter = ',', default_value = "RB1705,CU1705")]
    universe: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_logging();
    let args = Args::parse();

    let (config, credentials) = match &args.config {
        Some(path) => {
            let config = GatewayConfig::load(path)?;
            let credentials = config.credentials()?;
            (config, credentials)
        }
        None => {
            let config = GatewayConfig::from_toml_str(SIM_CONFIG)?;
            let credentials =
                VenueCredentials::new("demo".into(), "9999".into(), "demo".into())?;
            (config, credentials)
        }
    };

    let venue = SimVenue::new(SimScript::demo());
    let (engine, mut events) = ChannelEngine::new();
    let gateway = Arc::new(Gateway::new(
        &config,
        credentials,
        venue.trading_transport(),
        venue.market_data_transport(),
        Arc::new(engine),
    ));

    gateway.start().await.context("gateway failed to start")?;
    gateway.update_universe(args.universe.iter().cloned());

    let instruments = gateway.get_available_instruments();
    info!(count = instruments.len(), universe = ?args.universe, "Gateway started");

    match gateway.get_account().await {
        Ok(Some(account)) => info!(
            account = %account.account_id,
            balance = %account.balance,
            available = %account.available,
            "Account"
        ),
        Ok(None) => warn!("Venue returned no account"),
        Err(e) => warn!(error = %e, "Account query failed"),
    }
    match gateway.get_positions().await {
        Ok(positions) => {
            for position in positions.values() {
                info!(
                    order_book_id = %position.order_book_id,
                    long = position.buy.quantity,
                    short = position.sell.quantity,
                    "Position"
                );
            }
        }
        Err(e) => warn!(error = %e, "Position query failed"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn ctrl_c handler
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    // Synthetic quotes for every subscribed instrument
    let mut venue_ids: Vec<String> = instruments
        .values()
        .map(|i| i.venue_instrument_id.clone())
        .collect();
    venue_ids.sort();
    let ticker_venue = venue.clone();
    let mut ticker_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        let mut step: u32 = 0;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for id in &venue_ids {
                        if let Err(e) = ticker_venue.push_market_data(synthetic_depth(id, step)) {
                            warn!(error = %e, "Synthetic push failed");
                        }
                    }
                    step = step.wrapping_add(1);
                }
                _ = ticker_shutdown.changed() => {
                    if *ticker_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    // Spawn periodic health reporter
    let health_metrics = gateway.metrics();
    let mut health_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = health_metrics.snapshot();
                    info!(
                        status = %snapshot.health_status(),
                        ticks = snapshot.ticks_received,
                        forwarded = snapshot.ticks_forwarded,
                        timeouts = snapshot.request_timeouts,
                        errors = snapshot.venue_errors + snapshot.decode_drops,
                        disconnects = snapshot.disconnects,
                        "Health check"
                    );
                }
                _ = health_shutdown.changed() => {
                    if *health_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let mut shutdown = shutdown_rx;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(EngineEvent::Tick(tick)) => println!(
                    "{} | {} | last: {} | bid: {} | ask: {}",
                    tick.time, tick.order_book_id, tick.last, tick.bids[0].price, tick.asks[0].price
                ),
                Some(EngineEvent::Order(order)) => {
                    println!("order {} | {} | {:?}", order.order_id, order.order_book_id, order.status)
                }
                Some(EngineEvent::Trade(trade)) => println!(
                    "trade {} | {} | {} @ {}",
                    trade.order_id, trade.order_book_id, trade.quantity, trade.price
                ),
                Some(EngineEvent::Error { code, message }) => {
                    error!(code, %message, "Venue error");
                }
                None => break,
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if let Err(e) = gateway.stop() {
        warn!(error = %e, "Gateway did not stop cleanly");
    }

    println!("\n{}", gateway.metrics().snapshot());
    info!("Shutdown complete");
    Ok(())
}

/// A depth snapshot whose last price drifts around a fixed anchor.
fn synthetic_depth(instrument_id: &str, step: u32) -> RawDepthMarketData {
    let anchor = 3000.0 + instrument_id.bytes().map(f64::from).sum::<f64>();
    let last = anchor + f64::from(step % 20) - 10.0;
    let mut data = RawDepthMarketData {
        instrument_id: instrument_id.to_string(),
        trading_day: "20170301".into(),
        update_time: "10:15:30".into(),
        update_millisec: 0,
        open_price: anchor,
        last_price: last,
        highest_price: anchor + 10.0,
        lowest_price: anchor - 10.0,
        pre_close_price: anchor,
        pre_settlement_price: anchor,
        volume: i64::from(step) * 3,
        upper_limit_price: anchor * 1.05,
        lower_limit_price: anchor * 0.95,
        ..Default::default()
    };
    data.bid_prices[0] = last - 1.0;
    data.bid_volumes[0] = 5;
    data.ask_prices[0] = last + 1.0;
    data.ask_volumes[0] = 5;
    data
}
