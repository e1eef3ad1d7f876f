//! Listing the local filesystem for the template picker.

use std::cmp::Ordering;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

impl LocalEntry {
    pub fn is_parent_link(&self) -> bool {
        self.name == ".."
    }
}

/// Entries of `dir`: directories first, then by case-insensitive name.
/// A `..` entry pointing at the parent leads the list unless `dir` is a root.
pub fn list_local_files(dir: &Path) -> Result<Vec<LocalEntry>> {
    let read = std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry?;
        // file_type() does not follow symlinks; metadata() does.
        let is_dir = std::fs::metadata(entry.path())
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(LocalEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            is_dir,
        });
    }
    entries.sort_by(compare_entries);

    if let Some(parent) = dir.parent() {
        entries.insert(
            0,
            LocalEntry {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                is_dir: true,
            },
        );
    }

    Ok(entries)
}

/// Bytes read from the start of a file for a preview.
const PREVIEW_READ_LIMIT: u64 = 8 * 1024;

/// The first `max_lines` lines of a text file, read from at most the first
/// few kilobytes. Invalid UTF-8 is replaced rather than rejected.
pub fn preview_lines(path: &Path, max_lines: usize) -> Result<Vec<String>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut head = Vec::new();
    file.take(PREVIEW_READ_LIMIT)
        .read_to_end(&mut head)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(String::from_utf8_lossy(&head)
        .lines()
        .take(max_lines)
        .map(|line| line.replace('\t', "    "))
        .collect())
}

fn compare_entries(a: &LocalEntry, b: &LocalEntry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dirs_first_then_case_insensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("A.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("Alpha")).unwrap();

        let entries = list_local_files(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["..", "Alpha", "zeta", "A.txt", "b.txt"]);
        assert!(entries[0].is_parent_link());
        assert_eq!(entries[0].path, dir.path().parent().unwrap());
        assert!(entries[1].is_dir);
        assert!(!entries[3].is_dir);
    }

    #[test]
    fn test_root_has_no_parent_entry() {
        let root = Path::new("/");
        if let Ok(entries) = list_local_files(root) {
            assert!(entries.iter().all(|e| !e.is_parent_link()));
        }
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(list_local_files(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_preview_lines_takes_head() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ci.yml");
        std::fs::write(&path, "name: CI\non: push\njobs:\n\tbuild:\n  x\n  y\n").unwrap();

        let lines = preview_lines(&path, 4).unwrap();

        assert_eq!(lines, vec!["name: CI", "on: push", "jobs:", "    build:"]);
    }

    #[test]
    fn test_preview_lines_tolerates_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, b'\n', b'o', b'k']).unwrap();

        let lines = preview_lines(&path, 5).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "ok");
        assert!(preview_lines(&dir.path().join("missing"), 5).is_err());
    }
}
