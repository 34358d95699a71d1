//! Provider collaborator interface
//!
//! Concrete vendor adapters live outside the engine; this module only defines
//! the contract they implement and the error type they raise.

pub mod adapter;
pub mod error;

pub use adapter::{ProviderAdapter, ProviderRequest, ProviderResponse};
pub use error::ProviderError;

#[cfg(test)]
pub use adapter::MockProviderAdapter;
