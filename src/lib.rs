//! TrendGate Library
//!
//! Decision-and-confirmation core for an automated market-trading agent:
//! multi-source trend aggregation, decision fusion with safety vetoes,
//! momentum confirmation of simulated orders, and adaptive strategy
//! configuration.

pub mod adaptive;
pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod types;
pub mod validator;

pub use error::CoreError;
