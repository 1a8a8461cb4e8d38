//! Live kline fetching and chart-series normalization.
//!
//! [`LiveFeed`] pulls candles for a fixed set of trading pairs from a
//! [`KlineSource`] (Binance spot, in production), reshapes them into
//! equal-length series normalized to percentage change from the first
//! sample, and keeps a last-known-good snapshot to serve through outages.

pub mod binance;
pub mod fetch;
pub mod kline;
pub mod live;
pub mod range;
pub mod series;
pub mod source;

pub use binance::Binance;
pub use kline::Kline;
pub use live::{LiveFeed, LiveSeries, Snapshot};
pub use range::Range;
pub use source::KlineSource;
