//! Read-only asset index collaborator.
//!
//! Some writers enrich their prompts (and the handoff manifest) with
//! an inventory of assets uploaded alongside the session. The core
//! only reads this index; producing and validating it is someone
//! else's job.

use async_trait::async_trait;
use quillflow_store::SessionId;
use serde::{Deserialize, Serialize};

/// One ingested asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub path: String,
    pub size: u64,
    pub content_type: String,
    pub checksum: String,
}

/// The inventory of a session's assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIndex {
    pub entries: Vec<AssetEntry>,
}

impl AssetIndex {
    pub fn new(entries: Vec<AssetEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Markdown bullet list used in prompts and the handoff manifest.
    pub fn summary_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("- {} ({}, {} bytes)", e.path, e.content_type, e.size))
            .collect()
    }
}

/// Collaborator yielding the asset index for a session, if any.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn index(&self, session: SessionId) -> anyhow::Result<Option<AssetIndex>>;
}

/// Default source: no assets.
pub struct NoAssets;

#[async_trait]
impl AssetSource for NoAssets {
    async fn index(&self, _session: SessionId) -> anyhow::Result<Option<AssetIndex>> {
        Ok(None)
    }
}

/// Fixed index, for demos and tests.
pub struct StaticAssets {
    index: AssetIndex,
}

impl StaticAssets {
    pub fn new(index: AssetIndex) -> Self {
        Self { index }
    }
}

#[async_trait]
impl AssetSource for StaticAssets {
    async fn index(&self, _session: SessionId) -> anyhow::Result<Option<AssetIndex>> {
        Ok(Some(self.index.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let index = AssetIndex::new(vec![AssetEntry {
            path: "data/survey.csv".to_string(),
            size: 1024,
            content_type: "text/csv".to_string(),
            checksum: "abc123".to_string(),
        }]);
        assert_eq!(
            index.summary_lines(),
            vec!["- data/survey.csv (text/csv, 1024 bytes)"]
        );
    }
}
