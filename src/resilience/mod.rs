//! Resilience plumbing around outbound calls and inbound traffic.
//!
//! - [`RateLimiter`]: fixed sliding-window counter per client key.
//! - [`retry_with_backoff`]: exponential backoff for upstream calls.
//! - [`CircuitBreaker`]: shared open/closed guard with a fixed cooldown.

pub mod circuit;
pub mod rate_limit;
pub mod retry;

pub use circuit::{BreakerError, CircuitBreaker};
pub use rate_limit::{RateDecision, RateLimiter};
pub use retry::retry_with_backoff;
