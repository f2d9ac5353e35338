//! Profitability engine for a single marketplace listing.
//!
//! Turns a complete [`ItemCalcInput`] into a [`ComputationResult`]:
//! - price after discount and marketplace commission
//! - expected return cost and its redistribution over bought-out units
//! - profit and ROI per sold unit and per shipped unit
//!
//! The engine performs no validation; callers hand it fully checked input.

mod engine;
mod report;

pub use engine::{ComputationResult, ItemCalcInput, PricingEngine};
pub use report::format_report;
