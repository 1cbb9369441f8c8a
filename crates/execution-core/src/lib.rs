//! Core execution types and the request correlation machinery.
//!
//! This crate provides:
//!
//! - **Records**: `Order`, `OrderRequest`, `Trade`, `PositionSnapshot`, `Account`
//! - **Correlation table**: `CorrelationTable` turning request ids into awaitable results
//! - **Query aggregation**: `QueryAggregator` folding multi-fragment answers into collections
//!
//! # Request Lifecycle
//!
//! 1. Caller registers a pending call and receives a fresh request id
//! 2. The venue request is dispatched tagged with that id
//! 3. Callbacks for the id arrive on the delivery context, possibly fragmented
//! 4. The fragment flagged last completes the pending call
//! 5. The caller's wait resolves, or times out and the slot is dropped
//!
//! # Late Callbacks
//!
//! A timeout only abandons the caller-side wait. Callbacks that arrive after
//! it are discarded; they never resurrect the request.

mod account;
mod aggregator;
mod correlation;
mod error;
mod order;
mod position;
mod trade;

pub use account::Account;
pub use aggregator::{
    merge_commission, Aggregate, Collection, FragmentAccumulator, FragmentOutcome,
    QueryAggregator,
};
pub use correlation::{
    create_correlation_table, CorrelationTable, PendingCall, SharedCorrelationTable,
};
pub use error::{CorrelationError, VenueRejection};
pub use order::{Order, OrderRequest, OrderSide, OrderStatus, OrderType, PositionEffect};
pub use position::{PositionSide, PositionSnapshot};
pub use trade::Trade;
