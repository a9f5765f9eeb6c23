//! Sources of the "currently unavailable" list (injured list, scratches).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{KpropError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RosterFeed: Send + Sync {
    /// Names (or ids) of every subject currently unavailable
    async fn fetch_unavailable(&self) -> Result<Vec<String>>;
}

/// Feed entries may be bare names or records carrying a name
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedEntry {
    Name(String),
    Record { name: String },
}

impl FeedEntry {
    fn into_name(self) -> String {
        match self {
            FeedEntry::Name(name) | FeedEntry::Record { name } => name,
        }
    }
}

/// JSON feed over HTTP: `["Name", ...]` or `[{"name": "Name", ...}, ...]`
#[derive(Debug, Clone)]
pub struct HttpRosterFeed {
    http: reqwest::Client,
    url: String,
}

impl HttpRosterFeed {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kprop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KpropError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

pub(crate) fn parse_feed(body: &[u8]) -> Result<Vec<String>> {
    let entries: Vec<FeedEntry> = serde_json::from_slice(body)?;
    Ok(entries.into_iter().map(FeedEntry::into_name).collect())
}

#[async_trait]
impl RosterFeed for HttpRosterFeed {
    async fn fetch_unavailable(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KpropError::upstream("roster", e))?
            .error_for_status()
            .map_err(|e| KpropError::upstream("roster", e))?;
        let body = resp.bytes().await?;
        let names = parse_feed(&body)?;
        debug!(count = names.len(), "roster feed fetched");
        Ok(names)
    }
}

/// Fixed list, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticRosterFeed {
    names: Vec<String>,
}

impl StaticRosterFeed {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RosterFeed for StaticRosterFeed {
    async fn fetch_unavailable(&self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_records() {
        let names = parse_feed(br#"["Shohei Ohtani", {"name": "Gerrit Cole", "status": "IL-15"}]"#).unwrap();
        assert_eq!(names, vec!["Shohei Ohtani".to_string(), "Gerrit Cole".to_string()]);
        assert!(parse_feed(br#"{"name": "x"}"#).is_err());
    }
}
