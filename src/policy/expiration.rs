//! Expiration Policies
//!
//! Decide when a cache entry is stale and which accesses reset its clock.
//!
//! | Policy | Expired when | Read touches | Write touches |
//! |---|---|---|---|
//! | [`SinceCreation`] | now - created_at > ttl | no | no |
//! | [`SinceLastAccess`] | now - last_access > ttl | yes | yes |
//! | [`SinceLastWrite`] | now - last_access > ttl | no | yes |

use std::time::Duration;

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};
use crate::tasks::{Job, Scheduler, TaskHandle};

// == Expiration Policy ==
/// Time-based staleness rule applied by the periodic expiration sweep.
pub trait ExpirationPolicy<V>: Send + Sync {
    /// Time to live; also the delay between two sweeps.
    fn ttl(&self) -> Duration;

    /// Whether `entry` is stale at `now` (Unix milliseconds).
    fn is_expired(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        u128::from(entry.idle_ms(now)) > self.ttl().as_millis()
    }

    /// Called on every cache hit.
    fn on_read(&self, _entry: &CacheEntry<V>) {}

    /// Called on every freshly written entry before it is installed.
    fn on_write(&self, _entry: &CacheEntry<V>) {}

    /// Registers the cache's expiration sweep with a fixed delay of one ttl
    /// between the end of a sweep and the start of the next.
    fn schedule_sweep(&self, scheduler: &Scheduler, sweep: Job) -> Result<TaskHandle> {
        let ttl = self.ttl();
        scheduler.schedule_with_fixed_delay("expiration-sweep", ttl, ttl, sweep)
    }
}

fn validate_ttl(ttl: Duration) -> Result<Duration> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidConfig(
            "Expiration ttl must be greater than zero".to_string(),
        ));
    }
    Ok(ttl)
}

// == Since Creation ==
/// Entries expire a fixed time after they were written, however often they
/// are read.
#[derive(Debug, Clone, Copy)]
pub struct SinceCreation {
    ttl: Duration,
}

impl SinceCreation {
    /// # Panics
    /// Panics if `ttl` is zero; use [`SinceCreation::try_new`] for
    /// user-supplied values.
    pub fn new(ttl: Duration) -> Self {
        assert!(!ttl.is_zero(), "Expiration ttl must be greater than zero");
        Self { ttl }
    }

    pub fn try_new(ttl: Duration) -> Result<Self> {
        Ok(Self {
            ttl: validate_ttl(ttl)?,
        })
    }
}

impl<V> ExpirationPolicy<V> for SinceCreation {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        u128::from(entry.age_ms(now)) > self.ttl.as_millis()
    }
}

// == Since Last Access ==
/// Entries expire after a period with neither reads nor writes.
#[derive(Debug, Clone, Copy)]
pub struct SinceLastAccess {
    ttl: Duration,
}

impl SinceLastAccess {
    /// # Panics
    /// Panics if `ttl` is zero.
    pub fn new(ttl: Duration) -> Self {
        assert!(!ttl.is_zero(), "Expiration ttl must be greater than zero");
        Self { ttl }
    }

    pub fn try_new(ttl: Duration) -> Result<Self> {
        Ok(Self {
            ttl: validate_ttl(ttl)?,
        })
    }
}

impl<V> ExpirationPolicy<V> for SinceLastAccess {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn on_read(&self, entry: &CacheEntry<V>) {
        entry.touch();
    }

    fn on_write(&self, entry: &CacheEntry<V>) {
        entry.touch();
    }
}

// == Since Last Write ==
/// Entries expire after a period without writes; reads do not extend them.
#[derive(Debug, Clone, Copy)]
pub struct SinceLastWrite {
    ttl: Duration,
}

impl SinceLastWrite {
    /// # Panics
    /// Panics if `ttl` is zero.
    pub fn new(ttl: Duration) -> Self {
        assert!(!ttl.is_zero(), "Expiration ttl must be greater than zero");
        Self { ttl }
    }

    pub fn try_new(ttl: Duration) -> Result<Self> {
        Ok(Self {
            ttl: validate_ttl(ttl)?,
        })
    }
}

impl<V> ExpirationPolicy<V> for SinceLastWrite {
    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn on_write(&self, entry: &CacheEntry<V>) {
        entry.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::current_timestamp_ms;

    const TTL: Duration = Duration::from_millis(1_000);

    fn entry_at(created_at: u64) -> CacheEntry<&'static str> {
        CacheEntry::with_timestamp("v", created_at)
    }

    #[test]
    fn test_since_creation_uses_creation_time() {
        let policy = SinceCreation::new(TTL);
        let entry = entry_at(10_000);
        entry.touch_at(10_900);

        assert!(!policy.is_expired(&entry, 10_500));
        // Boundary: exactly ttl old is still live
        assert!(!policy.is_expired(&entry, 11_000));
        assert!(policy.is_expired(&entry, 11_001));
    }

    #[test]
    fn test_since_creation_ignores_accesses() {
        let policy = SinceCreation::new(TTL);
        let entry = CacheEntry::new("v");
        let created = entry.last_access();

        policy.on_read(&entry);
        policy.on_write(&entry);

        assert_eq!(entry.last_access(), created);
    }

    #[test]
    fn test_since_last_access_uses_last_access() {
        let policy = SinceLastAccess::new(TTL);
        let entry = entry_at(10_000);
        entry.touch_at(10_900);

        assert!(!policy.is_expired(&entry, 11_500));
        assert!(policy.is_expired(&entry, 11_901));
    }

    #[test]
    fn test_since_last_access_touches_on_read_and_write() {
        let policy = SinceLastAccess::new(TTL);

        let read = entry_at(0);
        policy.on_read(&read);
        assert!(read.last_access() > 0);

        let written = entry_at(0);
        policy.on_write(&written);
        assert!(written.last_access() > 0);
    }

    #[test]
    fn test_since_last_write_touches_only_on_write() {
        let policy = SinceLastWrite::new(TTL);

        let read = entry_at(0);
        policy.on_read(&read);
        assert_eq!(read.last_access(), 0);

        let written = entry_at(0);
        policy.on_write(&written);
        assert!(written.last_access() > 0);
    }

    #[test]
    fn test_fresh_entry_is_not_expired() {
        let now = current_timestamp_ms();
        let entry = CacheEntry::new("v");

        assert!(!SinceCreation::new(TTL).is_expired(&entry, now));
        assert!(!SinceLastAccess::new(TTL).is_expired(&entry, now));
        assert!(!SinceLastWrite::new(TTL).is_expired(&entry, now));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(matches!(
            SinceCreation::try_new(Duration::ZERO),
            Err(CacheError::InvalidConfig(_))
        ));
        assert!(SinceLastAccess::try_new(Duration::ZERO).is_err());
        assert!(SinceLastWrite::try_new(Duration::ZERO).is_err());
        assert!(SinceLastWrite::try_new(TTL).is_ok());
    }
}
