use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use crate::domain::LAST_UPDATE_KEY;
use crate::fetch::Fetch;

/// Flat key/value pairs describing the whole dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: HashMap<String, String>,
}

impl Metadata {
    /// Splits every line once on its first comma into a trimmed key and value.
    /// Lines without a comma or with an empty key are skipped.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split_once(','))
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn last_update(&self) -> Option<&str> {
        self.get(LAST_UPDATE_KEY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetches and parses the metadata sheet. Transport failures give an empty mapping.
#[instrument(skip(fetcher))]
pub async fn load(fetcher: &dyn Fetch, locator: &str) -> Metadata {
    match fetcher.fetch(locator).await {
        Ok(text) => {
            let metadata = Metadata::parse(&text);
            debug!("Loaded {} metadata entries", metadata.len());
            metadata
        }
        Err(e) => {
            warn!("Loading metadata failed, continuing without it: {e}");
            Metadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::tests::MockFetcher;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_key_value_lines() {
        let metadata = Metadata::parse("last_update, 2024-05-01 \r\nauthor,Ana\n");
        assert_eq!(metadata.last_update(), Some("2024-05-01"));
        assert_eq!(metadata.get("author"), Some("Ana"));
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn skips_malformed_lines() {
        let metadata = Metadata::parse("no comma here\n\n,orphan value\nkey,\n");
        assert_eq!(metadata.get("no comma here"), None);
        assert_eq!(metadata.get(""), None);
        assert_eq!(metadata.get("key"), Some(""));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn value_keeps_later_commas() {
        let metadata = Metadata::parse("note,one, two\n");
        assert_eq!(metadata.get("note"), Some("one, two"));
    }

    #[tokio::test]
    async fn loads_through_the_transport() {
        let fetcher = MockFetcher::new().with("meta", "last_update,01/02/2025\n");
        let metadata = load(&fetcher, "meta").await;
        assert_eq!(metadata.last_update(), Some("01/02/2025"));
        assert_eq!(fetcher.calls("meta"), 1);
    }

    #[tokio::test]
    async fn transport_failure_gives_empty_metadata() {
        let fetcher = MockFetcher::new();
        let metadata = load(&fetcher, "meta").await;
        assert!(metadata.is_empty());
        assert_eq!(metadata.last_update(), None);
    }
}
