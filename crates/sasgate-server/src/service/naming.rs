//! Per-request container names.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use jiff::Timestamp;
use sasgate_store::clock::Clock;
use sasgate_store::types::ContainerName;

use crate::service::{Error, Result};

/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
const UNIX_EPOCH_TICKS: i128 = 621_355_968_000_000_000;

/// Nanoseconds per tick.
const NANOS_PER_TICK: i128 = 100;

/// Returns the number of 100-nanosecond intervals since 0001-01-01T00:00:00Z.
pub fn ticks(instant: Timestamp) -> i64 {
    let ticks = UNIX_EPOCH_TICKS + instant.as_nanosecond() / NANOS_PER_TICK;
    i64::try_from(ticks.max(0)).unwrap_or(i64::MAX)
}

/// Derives unique container names of the form `{prefix}{ticks}`.
///
/// Clones share one monotonic guard: a name is never handed out twice even
/// when the clock stands still or steps backwards.
#[derive(Debug, Clone)]
pub struct ContainerNamer {
    prefix: Arc<str>,
    clock: Arc<dyn Clock>,
    last: Arc<AtomicI64>,
}

impl ContainerNamer {
    /// Creates a namer reading the time from `clock`.
    pub fn new(prefix: impl Into<Arc<str>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: prefix.into(),
            clock,
            last: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Returns the prefix of derived names.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derives the next container name.
    pub fn next_name(&self) -> Result<ContainerName> {
        let now = ticks(self.clock.now());
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        let value = now.max(previous.saturating_add(1));

        ContainerName::new(format!("{}{value}", self.prefix)).map_err(|e| {
            Error::config(format!("container prefix {:?} yields invalid names", &*self.prefix))
                .with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use jiff::SignedDuration;
    use sasgate_store::clock::FixedClock;

    use super::*;

    fn namer(clock: &FixedClock) -> ContainerNamer {
        ContainerNamer::new("sas-container-", Arc::new(clock.clone()))
    }

    #[test]
    fn ticks_count_from_year_one() {
        assert_eq!(ticks(Timestamp::UNIX_EPOCH), 621_355_968_000_000_000);
        let instant: Timestamp = "2024-05-01T12:00:00Z".parse().unwrap();
        assert_eq!(ticks(instant), 638_501_616_000_000_000);
    }

    #[test]
    fn names_follow_the_clock() {
        let clock = FixedClock::new("2024-05-01T12:00:00Z".parse().unwrap());
        let namer = namer(&clock);

        assert_eq!(namer.next_name().unwrap().as_str(), "sas-container-638501616000000000");
        clock.advance(SignedDuration::from_secs(1));
        assert_eq!(namer.next_name().unwrap().as_str(), "sas-container-638501616010000000");
    }

    #[test]
    fn names_are_unique_with_a_frozen_clock() {
        let clock = FixedClock::new("2024-05-01T12:00:00Z".parse().unwrap());
        let namer = namer(&clock);
        let cloned = namer.clone();

        let names: HashSet<String> = (0..100)
            .flat_map(|_| [namer.next_name().unwrap(), cloned.next_name().unwrap()])
            .map(String::from)
            .collect();

        assert_eq!(names.len(), 200);
    }

    #[test]
    fn names_never_go_backwards() {
        let clock = FixedClock::new("2024-05-01T12:00:00Z".parse().unwrap());
        let namer = namer(&clock);

        let first = namer.next_name().unwrap();
        clock.advance(SignedDuration::from_hours(-1));
        let second = namer.next_name().unwrap();

        assert!(second.as_str() > first.as_str());
    }
}
