//! Bot logic.
//!
//! The bot connects the channels to the collector:
//! - Command routing (`/start`, `/calc`, `/cancel`, `/help`)
//! - Answer submission and replies
//! - Background expiry of idle sessions

mod bot;
mod router;

pub use bot::{Bot, GREETING, spawn_session_pruner};
pub use router::Command;
