//! Write timestamps.
//!
//! Every `createdAt`/`updatedAt` written by the dashboard comes from a
//! [`MonotonicClock`], so two writes issued back to back never share a
//! timestamp even when the wall clock has not advanced between them.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Wall-clock UTC time that strictly increases across calls.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next write timestamp: the current time, or one microsecond past the
    /// previous timestamp if the wall clock has not moved past it.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let wall = Utc::now();
        let next = match *last {
            Some(prev) if wall <= prev => prev + Duration::microseconds(1),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}
