//! Core business logic: normalization, valuation and aggregation of holdings

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod holdings;
pub mod log;
pub mod provider;
pub mod token;
pub mod valuation;

// Re-export main types for cleaner imports
pub use aggregate::{ChainSummary, MergeKey, ToplineRow, WalletSnapshot};
pub use holdings::{HoldingsReport, TrackingConfig, build_holdings};
pub use provider::TokenProvider;
pub use token::{NormalizedHolding, RawToken};
