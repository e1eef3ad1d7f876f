//! Fetching repository files into a local directory.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::models::{FileItem, Repository};
use crate::store::{safe_relative_path, HistoryEntry, HistoryStore, NewHistoryEntry};

/// Download `item` to `dest_dir/<item.path>` and record it in `history`.
///
/// `api` should already carry the user's token. Failing to record history is
/// logged and does not fail the download.
pub async fn download_to(
    api: &ApiClient,
    history: &HistoryStore,
    dest_dir: &Path,
    repo: &Repository,
    item: &FileItem,
) -> Result<PathBuf> {
    if item.is_dir() {
        return Err(anyhow!("{} is a directory", item.path));
    }
    let url = item
        .download_url
        .as_deref()
        .ok_or_else(|| anyhow!("{} has no download URL", item.path))?;

    fetch_and_record(
        api,
        history,
        dest_dir,
        NewHistoryEntry {
            file_path: item.path.clone(),
            repository_name: repo.full_name.clone(),
            download_url: url.to_string(),
        },
    )
    .await
}

/// Fetch a previously downloaded file again from its recorded URL. The entry
/// moves to the top of `history`.
pub async fn download_history_entry(
    api: &ApiClient,
    history: &HistoryStore,
    dest_dir: &Path,
    entry: &HistoryEntry,
) -> Result<PathBuf> {
    fetch_and_record(
        api,
        history,
        dest_dir,
        NewHistoryEntry {
            file_path: entry.file_path.clone(),
            repository_name: entry.repository_name.clone(),
            download_url: entry.download_url.clone(),
        },
    )
    .await
}

async fn fetch_and_record(
    api: &ApiClient,
    history: &HistoryStore,
    dest_dir: &Path,
    download: NewHistoryEntry,
) -> Result<PathBuf> {
    let dest = dest_dir.join(safe_relative_path(&download.file_path)?);

    let bytes = api.download_file(&download.download_url).await?;
    write_file(&dest, &bytes).await?;
    info!(
        file = %download.file_path,
        repo = %download.repository_name,
        bytes = bytes.len(),
        "Downloaded file"
    );

    if let Err(e) = history.add(download) {
        warn!(error = %e, "Failed to record download history");
    }

    Ok(dest)
}

async fn write_file(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(dest, bytes)
        .await
        .with_context(|| format!("Failed to write {}", dest.display()))
}
