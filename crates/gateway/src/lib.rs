//! Request/response gateway over a callback-driven futures venue API.
//!
//! The venue answers every request asynchronously through callbacks, often
//! spread over several fragments. This crate turns that into awaitable calls:
//!
//! - **[`TradingProxy`]**: login, instrument/commission loading, position,
//!   order and account queries, order submission and cancellation
//! - **[`QuotationProxy`]**: market-data subscriptions, the last-quotation
//!   cache and tick forwarding
//! - **[`Gateway`]**: both proxies behind one handle
//! - **[`StrategyEngine`]**: where pushed ticks, orders, trades and errors go
//!
//! # Example
//!
//! ```rust,ignore
//! use gateway::{ChannelEngine, Gateway, GatewayConfig};
//!
//! let config = GatewayConfig::load("gateway.toml")?;
//! let (engine, mut events) = ChannelEngine::new();
//! let gateway = Gateway::new(
//!     &config,
//!     config.credentials()?,
//!     trading_transport,
//!     market_data_transport,
//!     Arc::new(engine),
//! );
//! gateway.start().await?;
//! gateway.update_universe(["RB1705"]);
//! ```

mod config;
mod engine;
mod error;
mod facade;
mod gateway;
mod handler;
mod quotation;
mod retry;
mod trading;

pub use config::{CredentialsConfig, GatewayConfig, RetryConfig, VenueConfig};
pub use engine::{ChannelEngine, EngineEvent, StrategyEngine};
pub use error::GatewayError;
pub use facade::{QueryResponse, RequestFacade};
pub use gateway::Gateway;
pub use quotation::QuotationProxy;
pub use retry::connect_with_retry;
pub use trading::{SharedInstrumentCache, TradingProxy};
