//! Injected dependencies for the engine.
//!
//! Time is the engine's only external dependency. It is abstracted behind
//! the [`Clock`] trait so tests can pin the current moment; production code
//! injects [`SystemClock`].

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
