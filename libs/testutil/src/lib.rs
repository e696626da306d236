//! Test helpers for chatmux crates: a scripted adapter and data builders.

pub mod fixtures;
mod scripted;

pub use fixtures::{EPOCH, at, conversation, message};
pub use scripted::ScriptedAdapter;
