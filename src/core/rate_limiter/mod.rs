//! Rate Limiting Implementation
//!
//! Fixed-window RPM/TPM admission per deployment and per requesting scope.
//! Windows are `floor(now / 60) * 60`; counters live in an
//! [`AtomicCounterStore`](crate::core::counter_store::AtomicCounterStore).

mod limiter;
mod types;
mod utils;


// Re-export public types
pub use limiter::RateLimiter;
pub use types::{AdmissionTicket, RateLimitRejection, RateLimitResult, ScopeLimit};
pub use utils::{reset_after, window_start};
