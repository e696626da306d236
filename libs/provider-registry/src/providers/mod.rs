//! Backends compiled into the registry.

mod records;

#[cfg(feature = "fixture")]
pub mod fixture;

#[cfg(feature = "http")]
pub mod http;

pub use records::ConversationRecord;
