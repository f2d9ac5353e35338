//! Wildberries unit economics bot.
//!
//! A seller answers fourteen questions about one product (purchase cost,
//! logistics, commission, buyout rate, marketing, ...) over any of the supported
//! channels and gets back a report with the cost, profit and ROI per unit.
//!
//! - [`collector`]: per-user question flow and answer validation
//! - [`pricing`]: profitability formulas and report rendering
//! - [`channels`]: terminal, Telegram and HTTP transports
//! - [`agent`]: command routing and the main message loop

pub mod agent;
pub mod channels;
pub mod collector;
pub mod config;
pub mod error;
pub mod pricing;
