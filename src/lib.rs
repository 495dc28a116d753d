//! Moneyball
//!
//! Walk-forward Kelly position sizing and portfolio allocation for sports
//! betting strategies.
//!
//! ## Architecture
//!
//! ```text
//! EventTable → kelly (fraction, allocation) → simulator → search (kelly ratio)
//!                                                              ↓
//!                      bets ← portfolio (walk-forward weights) ← strategy returns
//! ```

pub mod bets;
pub mod config;
pub mod error;
pub mod kelly;
pub mod portfolio;
pub mod pricing;
pub mod returns;
pub mod search;
pub mod simulator;
pub mod storage;
pub mod strategy;
pub mod testing;
pub mod types;

#[cfg(test)]
mod config_tests;
