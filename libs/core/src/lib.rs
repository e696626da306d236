//! chatmux core contracts and value types.
//!
//! This crate holds the data model shared between provider adapters, the aggregating manager,
//! and front ends, together with the pure algorithms that run on it: body normalization,
//! capability declarations, and the directionality/ordering rules used to render a thread.
pub mod capability;
pub mod errors;
pub mod normalize;
pub mod resolver;
pub mod types;

pub use capability::*;
pub use errors::*;
pub use normalize::{normalize, normalize_str};
pub use resolver::*;
pub use types::*;

/// Returns the semantic version advertised by this crate.
///
/// ```
/// assert_eq!(chatmux_core::version(), "0.1.0");
/// ```
pub fn version() -> &'static str {
    "0.1.0"
}
