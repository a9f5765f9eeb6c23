//! TTL cache in front of a [`RosterFeed`].
//!
//! The whole unavailable set is cached. A refresh is single-flight and
//! bounded by a timeout; when it fails the last good snapshot keeps being
//! served, and with no snapshot at all every subject counts as available.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::feed::RosterFeed;
use super::{normalize_subject_name, RosterStatusProvider};
use crate::error::KpropError;

/// Minimum gap between attempts after a failed refresh
const FAILURE_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Snapshot {
    names: Option<Arc<HashSet<String>>>,
    fetched_at: Option<Instant>,
    failed_at: Option<Instant>,
}

impl Snapshot {
    fn is_current(&self, ttl: Duration) -> bool {
        let fresh = self.fetched_at.is_some_and(|t| t.elapsed() < ttl);
        let backing_off = self
            .failed_at
            .is_some_and(|t| t.elapsed() < FAILURE_BACKOFF.min(ttl));
        fresh || backing_off
    }
}

pub struct RosterStatusCache {
    feed: Arc<dyn RosterFeed>,
    ttl: Duration,
    timeout: Duration,
    snapshot: RwLock<Snapshot>,
    refresh: Mutex<()>,
}

impl RosterStatusCache {
    pub fn new(feed: Arc<dyn RosterFeed>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            feed,
            ttl,
            timeout,
            snapshot: RwLock::new(Snapshot::default()),
            refresh: Mutex::new(()),
        }
    }

    async fn current(&self) -> Option<Arc<HashSet<String>>> {
        {
            let snapshot = self.snapshot.read().await;
            if snapshot.is_current(self.ttl) {
                return snapshot.names.clone();
            }
        }

        let _refresh = self.refresh.lock().await;

        // another caller may have refreshed while we waited
        {
            let snapshot = self.snapshot.read().await;
            if snapshot.is_current(self.ttl) {
                return snapshot.names.clone();
            }
        }

        let fetched = tokio::time::timeout(self.timeout, self.feed.fetch_unavailable()).await;
        let mut snapshot = self.snapshot.write().await;
        match fetched {
            Ok(Ok(names)) => {
                let set: HashSet<String> =
                    names.iter().map(|n| normalize_subject_name(n)).collect();
                info!(unavailable = set.len(), "roster snapshot refreshed");
                snapshot.names = Some(Arc::new(set));
                snapshot.fetched_at = Some(Instant::now());
                snapshot.failed_at = None;
            }
            Ok(Err(e)) => {
                warn!(error = %e, stale = snapshot.names.is_some(), "roster refresh failed");
                snapshot.failed_at = Some(Instant::now());
            }
            Err(_) => {
                let e = KpropError::Timeout {
                    operation: "roster refresh".to_string(),
                    elapsed_ms: self.timeout.as_millis() as u64,
                };
                warn!(error = %e, stale = snapshot.names.is_some(), "roster refresh failed");
                snapshot.failed_at = Some(Instant::now());
            }
        }
        snapshot.names.clone()
    }
}

#[async_trait]
impl RosterStatusProvider for RosterStatusCache {
    async fn is_unavailable(&self, subject: &str) -> bool {
        let key = normalize_subject_name(subject);
        self.current()
            .await
            .is_some_and(|names| names.contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KpropError, Result};
    use crate::roster::feed::MockRosterFeed;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn lookups_within_ttl_hit_the_cache() {
        let mut feed = MockRosterFeed::new();
        feed.expect_fetch_unavailable()
            .times(1)
            .returning(|| Ok(vec!["Jacob deGrom".to_string()]));

        let cache = RosterStatusCache::new(
            Arc::new(feed),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        assert!(cache.is_unavailable("jacob degrom").await);
        assert!(cache.is_unavailable("Jacob de-Grom").await);
        assert!(!cache.is_unavailable("Zack Wheeler").await);
    }

    #[tokio::test]
    async fn failures_fall_back_to_available_without_history() {
        let mut feed = MockRosterFeed::new();
        feed.expect_fetch_unavailable()
            .returning(|| Err(KpropError::upstream("roster", "502")));

        let cache = RosterStatusCache::new(
            Arc::new(feed),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        assert!(!cache.is_unavailable("Jacob deGrom").await);
    }

    /// Succeeds once, then fails every call
    struct FlakyFeed {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RosterFeed for FlakyFeed {
        async fn fetch_unavailable(&self) -> Result<Vec<String>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec!["Chris Sale".to_string()])
            } else {
                Err(KpropError::upstream("roster", "connection reset"))
            }
        }
    }

    #[tokio::test]
    async fn stale_snapshot_survives_failed_refresh() {
        let feed = Arc::new(FlakyFeed {
            calls: AtomicUsize::new(0),
        });
        let cache = RosterStatusCache::new(feed.clone(), Duration::ZERO, Duration::from_secs(1));

        assert!(cache.is_unavailable("Chris Sale").await);
        // ttl of zero forces a refresh, which fails
        assert!(cache.is_unavailable("Chris Sale").await);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 2);
    }

    struct SlowFeed;

    #[async_trait]
    impl RosterFeed for SlowFeed {
        async fn fetch_unavailable(&self) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec!["Chris Sale".to_string()])
        }
    }

    #[tokio::test]
    async fn slow_feed_times_out_as_available() {
        let cache = RosterStatusCache::new(
            Arc::new(SlowFeed),
            Duration::from_secs(60),
            Duration::from_millis(20),
        );
        assert!(!cache.is_unavailable("Chris Sale").await);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let mut feed = MockRosterFeed::new();
        feed.expect_fetch_unavailable()
            .times(1)
            .returning(|| Ok(vec![]));
        let cache = RosterStatusCache::new(
            Arc::new(feed),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        let lookups = (0..6).map(|i| {
            let cache = &cache;
            async move { cache.is_unavailable(&format!("pitcher {i}")).await }
        });
        let results = futures::future::join_all(lookups).await;
        assert!(results.iter().all(|unavailable| !unavailable));
    }
}
