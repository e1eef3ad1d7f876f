//! JSON-backed stores kept under the config directory.
//!
//! - [`HistoryStore`]: recently downloaded files
//! - [`TemplateStore`]: local files registered as reusable templates

mod history;
mod templates;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

pub use history::{HistoryEntry, HistoryStore, NewHistoryEntry, MAX_HISTORY_ITEMS};
pub use templates::{DestinationExists, Template, TemplateStore};
pub(crate) use templates::safe_relative_path;

/// Read a JSON list, treating a missing or unreadable file as empty.
fn load_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read store file");
            return Vec::new();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(items) => items,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt store file");
            Vec::new()
        }
    }
}

fn save_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(items)?;
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Time-ordered id, unique enough for a single user's stores.
fn generate_id() -> String {
    format!(
        "{:x}{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

/// Short relative age such as "5m ago" or "2d ago".
pub fn age_display(at: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_display() {
        let now = Utc::now();
        assert_eq!(age_display(now), "just now");
        assert_eq!(age_display(now + Duration::minutes(5)), "just now");
        assert_eq!(age_display(now - Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(now - Duration::hours(3)), "3h ago");
        assert_eq!(age_display(now - Duration::days(2)), "2d ago");
    }

    #[test]
    fn test_generate_id_is_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_load_list_tolerates_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        assert!(load_list::<String>(&path).is_empty());

        std::fs::write(&path, "[1, 2").unwrap();
        assert!(load_list::<u32>(&path).is_empty());
    }
}
