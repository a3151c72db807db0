//! Training Lease
//!
//! At most one training run at a time. A lease expires after its TTL so a
//! crashed holder cannot block training forever.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RiskError, RiskResult};
use crate::logic::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseToken {
    pub holder: String,
    /// Unique per acquisition; release must present it
    pub token: String,
    pub expires_at: i64,
}

pub trait TrainingLease: Send + Sync {
    /// Fails with `TrainingInProgress` while another unexpired lease exists
    fn try_acquire(&self, holder: &str, ttl_secs: u64) -> RiskResult<LeaseToken>;

    /// `false` if the token no longer holds the lease
    fn release(&self, token: &LeaseToken) -> RiskResult<bool>;

    /// Unexpired lease, if any
    fn current(&self) -> Option<LeaseToken>;
}

/// Process-local lease
pub struct InMemoryLease {
    clock: Arc<dyn Clock>,
    held: Mutex<Option<LeaseToken>>,
}

impl InMemoryLease {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            held: Mutex::new(None),
        }
    }
}

impl TrainingLease for InMemoryLease {
    fn try_acquire(&self, holder: &str, ttl_secs: u64) -> RiskResult<LeaseToken> {
        let now = self.clock.now_ts();
        let mut held = self.held.lock();

        if let Some(existing) = held.as_ref() {
            if existing.expires_at > now {
                return Err(RiskError::TrainingInProgress {
                    holder: existing.holder.clone(),
                    expires_at: existing.expires_at,
                });
            }
            log::warn!(
                "Reclaiming expired training lease of {} (expired at {})",
                existing.holder,
                existing.expires_at
            );
        }

        let token = LeaseToken {
            holder: holder.to_string(),
            token: Uuid::new_v4().to_string(),
            expires_at: now.saturating_add(ttl_secs.min(i64::MAX as u64) as i64),
        };
        *held = Some(token.clone());
        Ok(token)
    }

    fn release(&self, token: &LeaseToken) -> RiskResult<bool> {
        let mut held = self.held.lock();
        match held.as_ref() {
            Some(current) if current.token == token.token => {
                *held = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn current(&self) -> Option<LeaseToken> {
        let now = self.clock.now_ts();
        self.held.lock().clone().filter(|l| l.expires_at > now)
    }
}

/// Releases the lease on drop
pub struct LeaseGuard<'a> {
    lease: &'a dyn TrainingLease,
    token: LeaseToken,
}

impl<'a> LeaseGuard<'a> {
    pub fn acquire(lease: &'a dyn TrainingLease, holder: &str, ttl_secs: u64) -> RiskResult<Self> {
        let token = lease.try_acquire(holder, ttl_secs)?;
        Ok(Self { lease, token })
    }

    pub fn token(&self) -> &LeaseToken {
        &self.token
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        match self.lease.release(&self.token) {
            Ok(true) => {}
            Ok(false) => log::warn!("Training lease of {} was lost before release", self.token.holder),
            Err(e) => log::error!("Failed to release training lease: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::clock::ManualClock;

    #[test]
    fn test_second_holder_rejected() {
        let lease = InMemoryLease::new(Arc::new(ManualClock::new(1_000)));
        let first = lease.try_acquire("worker-a", 60).unwrap();
        assert_eq!(first.expires_at, 1_060);

        match lease.try_acquire("worker-b", 60) {
            Err(RiskError::TrainingInProgress { holder, expires_at }) => {
                assert_eq!(holder, "worker-a");
                assert_eq!(expires_at, 1_060);
            }
            other => panic!("expected TrainingInProgress, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_lease_is_reclaimed() {
        let clock = Arc::new(ManualClock::new(1_000));
        let lease = InMemoryLease::new(clock.clone());
        let stale = lease.try_acquire("crashed", 30).unwrap();

        clock.advance(31);
        assert!(lease.current().is_none());
        let fresh = lease.try_acquire("worker-b", 30).unwrap();
        assert_eq!(fresh.holder, "worker-b");

        // the crashed holder can no longer release someone else's lease
        assert!(!lease.release(&stale).unwrap());
        assert_eq!(lease.current(), Some(fresh));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lease = InMemoryLease::new(Arc::new(ManualClock::new(0)));
        {
            let guard = LeaseGuard::acquire(&lease, "worker-a", 600).unwrap();
            assert_eq!(guard.token().holder, "worker-a");
            assert!(lease.current().is_some());
        }
        assert!(lease.current().is_none());
        assert!(lease.try_acquire("worker-b", 600).is_ok());
    }
}
