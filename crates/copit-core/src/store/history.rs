use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{generate_id, load_list, save_list};

pub const MAX_HISTORY_ITEMS: usize = 20;

const HISTORY_FILE: &str = "history.json";

/// A file that was downloaded from a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub file_path: String,
    pub repository_name: String,
    pub downloaded_at: DateTime<Utc>,
    pub download_url: String,
}

impl HistoryEntry {
    pub fn age_display(&self) -> String {
        super::age_display(self.downloaded_at)
    }
}

/// What the caller knows about a download; id and timestamp are filled in.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub file_path: String,
    pub repository_name: String,
    pub download_url: String,
}

/// Download history, newest first, capped at [`MAX_HISTORY_ITEMS`].
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// # Arguments
    /// * `dir` - Directory holding `history.json`
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(HISTORY_FILE),
        }
    }

    pub fn load(&self) -> Vec<HistoryEntry> {
        load_list(&self.path)
    }

    /// Record a download at the top. An earlier entry for the same file in
    /// the same repository is dropped.
    pub fn add(&self, item: NewHistoryEntry) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            id: generate_id(),
            file_path: item.file_path,
            repository_name: item.repository_name,
            downloaded_at: Utc::now(),
            download_url: item.download_url,
        };

        let mut history: Vec<HistoryEntry> = self
            .load()
            .into_iter()
            .filter(|h| {
                h.file_path != entry.file_path || h.repository_name != entry.repository_name
            })
            .collect();
        history.insert(0, entry.clone());
        history.truncate(MAX_HISTORY_ITEMS);

        save_list(&self.path, &history)?;
        debug!(file = %entry.file_path, repo = %entry.repository_name, "Recorded download");
        Ok(entry)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
