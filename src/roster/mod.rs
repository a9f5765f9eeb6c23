//! Roster availability: is this pitcher on the injured list or scratched?

pub mod cache;
pub mod feed;

pub use cache::RosterStatusCache;
pub use feed::{HttpRosterFeed, RosterFeed, StaticRosterFeed};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RosterConfig;
use crate::error::Result;

#[async_trait]
pub trait RosterStatusProvider: Send + Sync {
    /// `true` only on positive evidence of unavailability
    async fn is_unavailable(&self, subject: &str) -> bool;
}

/// Used when no roster feed is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRosterChecks;

#[async_trait]
impl RosterStatusProvider for NoRosterChecks {
    async fn is_unavailable(&self, _subject: &str) -> bool {
        false
    }
}

/// Lookup key for roster matching: lowercase ASCII alphanumerics only.
///
/// "Jacob deGrom", "jacob degrom" and "Jacob de-Grom" share a key.
/// Distinct players whose names only differ in punctuation collide.
pub fn normalize_subject_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn roster_from_config(config: &RosterConfig) -> Result<Arc<dyn RosterStatusProvider>> {
    match config.url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let timeout = Duration::from_millis(config.timeout_ms);
            let feed = HttpRosterFeed::new(url, timeout)?;
            Ok(Arc::new(RosterStatusCache::new(
                Arc::new(feed),
                Duration::from_secs(config.ttl_secs),
                timeout,
            )))
        }
        _ => Ok(Arc::new(NoRosterChecks)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_case_and_separators() {
        assert_eq!(normalize_subject_name("Jacob deGrom"), "jacobdegrom");
        assert_eq!(normalize_subject_name("Jacob de-Grom"), "jacobdegrom");
        assert_eq!(normalize_subject_name("  A.J. Puk "), "ajpuk");
        assert_eq!(normalize_subject_name("Jesús Luzardo"), "jesúsluzardo");
    }

    #[test]
    fn no_checks_never_flags() {
        assert!(!tokio_test::block_on(NoRosterChecks.is_unavailable("anyone")));
    }
}
