//! Time source for temporal claim checks.

use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Supplies the current time to the verifier.
pub trait Clock: Send + Sync + Debug {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests.
///
/// Clones share the same instant.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use extjwt_authn::clock::{Clock, FixedClock};
///
/// let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
/// let clock = FixedClock::new(start);
/// clock.advance(Duration::seconds(5));
/// assert_eq!(clock.now().timestamp(), 1_700_000_005);
/// ```
#[derive(Clone, Debug)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(RwLock::new(now)) }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
