//! Circuit breaker for upstream LLM calls.
//!
//! One shared open/closed state per breaker instance. While open, calls are
//! short-circuited without invoking the wrapped operation; a success closes
//! the circuit, a failure opens it for a fixed cooldown.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit open, retry after cooldown")]
    Open,
    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
pub struct CircuitBreaker {
    // None = closed; Some(t) = open until t.
    open_until: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            open_until: Mutex::new(None),
            cooldown,
        }
    }

    pub fn is_open(&self) -> bool {
        let guard = self.open_until.lock().unwrap();
        guard.is_some_and(|until| Instant::now() < until)
    }

    /// Run `op` through the breaker.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.is_open() {
            return Err(BreakerError::Open);
        }

        match op().await {
            Ok(v) => {
                *self.open_until.lock().unwrap() = None;
                Ok(v)
            }
            Err(e) => {
                let until = Instant::now() + self.cooldown;
                *self.open_until.lock().unwrap() = Some(until);
                warn!(cooldown_secs = self.cooldown.as_secs(), "circuit opened");
                Err(BreakerError::Inner(e))
            }
        }
    }
}
