use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Dir,
}

/// One entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    pub path: String,
    pub kind: FileKind,
    pub size: Option<u64>,
    pub download_url: Option<String>,
}

impl FileItem {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// Human readable size, e.g. "1.2 KB". Empty for directories.
    pub fn size_display(&self) -> String {
        match (self.kind, self.size) {
            (FileKind::Dir, _) | (_, None) => String::new(),
            (_, Some(bytes)) if bytes < 1024 => format!("{} B", bytes),
            (_, Some(bytes)) if bytes < 1024 * 1024 => format!("{:.1} KB", bytes as f64 / 1024.0),
            (_, Some(bytes)) => format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)),
        }
    }
}

/// Parent of a slash separated repository path; the root's parent is itself.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(size: Option<u64>) -> FileItem {
        FileItem {
            name: "a".into(),
            path: "a".into(),
            kind: FileKind::File,
            size,
            download_url: None,
        }
    }

    #[test]
    fn test_size_display() {
        assert_eq!(file(Some(12)).size_display(), "12 B");
        assert_eq!(file(Some(2048)).size_display(), "2.0 KB");
        assert_eq!(file(Some(3 * 1024 * 1024)).size_display(), "3.0 MB");
        assert_eq!(file(None).size_display(), "");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("src/auth/mod.rs"), "src/auth");
        assert_eq!(parent_path("src"), "");
        assert_eq!(parent_path(""), "");
    }
}
