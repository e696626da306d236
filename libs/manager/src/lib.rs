//! Aggregation across provider adapters.
//!
//! [`Manager`] fans requests out to every registered [`chatmux_provider_registry::ProviderAdapter`],
//! merges and caches the answers, and gates sends on the owning adapter's capabilities.

mod errors;
mod manager;

pub use errors::ManagerError;
pub use manager::{Manager, ManagerBuilder, ManagerConfig, SendOutcome};
