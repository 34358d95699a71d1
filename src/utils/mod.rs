//! Utility modules for the router
//!
//! - **error**: configuration and setup errors
//! - **logging**: tracing subscriber setup

pub mod error;
pub mod logging;

pub use error::{GatewayError, Result};
pub use logging::{LogFormat, init_logging};

use uuid::Uuid;

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
