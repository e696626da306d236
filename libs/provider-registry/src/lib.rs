//! Provider adapter contract, manifest loader, and registry shared by chatmux backends.

pub mod manifest;
pub mod providers;
pub mod registry;
pub mod traits;

pub use manifest::{ManifestError, ProviderManifest};
pub use registry::{AdapterFactory, ProviderConfig, ProviderRegistry, RegistryError};
pub use traits::{ProviderAdapter, SharedAdapter, ensure_owned};
