// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wall clock abstraction.
//!
//! Every timestamp the sync subsystem records (`queued_at`, `captured_at`,
//! `last_success_at`, ...) comes from a [`ClockSource`], so tests can pin time.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;

/// Trait for getting the current wall clock time.
///
/// This allows injecting a manual clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using `chrono::Utc::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: ClockSource> ClockSource for &C {
    fn now(&self) -> DateTime<Utc> {
        (*self).now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { now: Mutex::new(start) }
    }

    /// Creates a clock frozen at `ms` milliseconds after the Unix epoch.
    pub fn at_ms(ms: i64) -> Self {
        let start = Utc.timestamp_millis_opt(ms).single().unwrap_or_default();
        Self::new(start)
    }

    /// Moves the clock to the given instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
