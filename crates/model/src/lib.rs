//! Venue-independent market and reference data records.
//!
//! - [`Tick`] / [`Quotation`]: market-data pushes and the cached last quotation
//! - [`InstrumentSnapshot`] / [`CommissionRate`]: reference data built from queries
//! - [`symbology`]: mapping between venue instrument ids and order book ids

mod instrument;
mod market;
pub mod symbology;

pub use instrument::{
    CommissionRate, CommissionRatios, CommissionType, InstrumentSnapshot, MarginType,
};
pub use market::{BookLevel, Quotation, Tick, BOOK_DEPTH};
