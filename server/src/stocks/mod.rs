//! Market-data proxy in front of the brokerage API.

pub mod client;
pub mod routes;

pub use client::{AlpacaClient, Asset, BarsRequest, MarketData, MarketDataError, Timeframe};
