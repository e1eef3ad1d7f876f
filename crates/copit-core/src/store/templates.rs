use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{generate_id, load_list, save_list};

const TEMPLATES_FILE: &str = "templates.json";
const TEMPLATES_DIR: &str = "templates";

/// A local file saved for reuse in other projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Where the file goes relative to the directory it is applied in.
    pub relative_path: String,
    pub registered_at: DateTime<Utc>,
    /// Working directory the template was registered from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_from: Option<String>,
}

/// Applying a template would replace a file that is already there.
#[derive(Debug, Error)]
#[error("{} already exists", .0.display())]
pub struct DestinationExists(pub PathBuf);

/// Template metadata in `templates.json` plus one directory of files per
/// template under `templates/<id>/`.
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// # Arguments
    /// * `root` - Directory holding `templates.json` and `templates/`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(TEMPLATES_FILE)
    }

    fn template_dir(&self, id: &str) -> PathBuf {
        self.root.join(TEMPLATES_DIR).join(id)
    }

    pub fn load(&self) -> Vec<Template> {
        load_list(&self.metadata_path())
    }

    /// Copy `source` into the store and list it first.
    ///
    /// # Arguments
    /// * `source` - File to copy
    /// * `relative_path` - Path the file is restored at when applied
    /// * `name` - Display name
    /// * `registered_from` - Directory the file was picked from
    pub fn register(
        &self,
        source: &Path,
        relative_path: &str,
        name: &str,
        registered_from: Option<&Path>,
    ) -> Result<Template> {
        let relative = safe_relative_path(relative_path)?;
        let name = name.trim();
        if name.is_empty() {
            bail!("Template name must not be empty");
        }

        let id = generate_id();
        let dest = self.template_dir(&id).join(&relative);
        copy_file(source, &dest)?;

        let template = Template {
            id,
            name: name.to_string(),
            relative_path: relative_path.to_string(),
            registered_at: Utc::now(),
            registered_from: registered_from.map(|p| p.display().to_string()),
        };

        let mut templates = self.load();
        templates.insert(0, template.clone());
        save_list(&self.metadata_path(), &templates)?;

        debug!(id = %template.id, name = %template.name, "Registered template");
        Ok(template)
    }

    /// Remove a template's files and metadata. Unknown ids are ignored.
    pub fn delete(&self, id: &str) -> Result<()> {
        let dir = self.template_dir(id);
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to remove template files");
            }
        }

        let templates: Vec<Template> = self.load().into_iter().filter(|t| t.id != id).collect();
        save_list(&self.metadata_path(), &templates)
    }

    /// Stored copy of a template's file.
    pub fn template_file_path(&self, template: &Template) -> PathBuf {
        self.template_dir(&template.id).join(&template.relative_path)
    }

    /// Copy a template to `dest_dir/<relative_path>`. Returns the written path.
    ///
    /// Fails with [`DestinationExists`] when the target is already there,
    /// unless `overwrite` is set.
    pub fn apply(&self, template: &Template, dest_dir: &Path, overwrite: bool) -> Result<PathBuf> {
        let relative = safe_relative_path(&template.relative_path)?;
        let dest = dest_dir.join(relative);
        if !overwrite && dest.exists() {
            return Err(DestinationExists(dest).into());
        }
        copy_file(&self.template_file_path(template), &dest)?;
        debug!(id = %template.id, dest = %dest.display(), "Applied template");
        Ok(dest)
    }
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::copy(source, dest).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), dest.display())
    })?;
    Ok(())
}

/// Reject paths that would escape the directory they are joined onto.
pub(crate) fn safe_relative_path(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    if path.is_empty() {
        bail!("Path must not be empty");
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("Refusing unsafe path: {}", path),
        }
    }
    Ok(candidate.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_register_copies_file_and_lists_first() {
        let store_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = TemplateStore::new(store_dir.path().to_path_buf());
        let first = source_file(work.path(), "a.toml", "a");
        let second = source_file(work.path(), "b.toml", "b");

        store.register(&first, "a.toml", "First", None).unwrap();
        let t = store
            .register(&second, ".config/b.toml", "Second", Some(work.path()))
            .unwrap();

        let templates = store.load();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name, "Second");
        assert_eq!(templates[1].name, "First");
        assert_eq!(
            std::fs::read_to_string(store.template_file_path(&t)).unwrap(),
            "b"
        );
        assert_eq!(
            t.registered_from.as_deref(),
            Some(work.path().display().to_string().as_str())
        );
    }

    #[test]
    fn test_apply_creates_directories() {
        let store_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let store = TemplateStore::new(store_dir.path().to_path_buf());
        let src = source_file(work.path(), "ci.yml", "on: push");

        let t = store
            .register(&src, ".github/workflows/ci.yml", "CI", None)
            .unwrap();
        let written = store.apply(&t, dest.path(), false).unwrap();

        assert_eq!(written, dest.path().join(".github/workflows/ci.yml"));
        assert_eq!(std::fs::read_to_string(written).unwrap(), "on: push");
    }

    #[test]
    fn test_apply_keeps_existing_file_unless_overwriting() {
        let store_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let store = TemplateStore::new(store_dir.path().to_path_buf());
        let src = source_file(work.path(), "Cargo.toml", "template contents");
        let t = store.register(&src, "Cargo.toml", "Cargo", None).unwrap();
        let existing = source_file(dest.path(), "Cargo.toml", "user work");

        let err = store.apply(&t, dest.path(), false).unwrap_err();
        let exists = err.downcast_ref::<DestinationExists>().unwrap();
        assert_eq!(exists.0, existing);
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "user work");

        store.apply(&t, dest.path(), true).unwrap();
        assert_eq!(
            std::fs::read_to_string(&existing).unwrap(),
            "template contents"
        );
    }

    #[test]
    fn test_delete_removes_files_and_metadata() {
        let store_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = TemplateStore::new(store_dir.path().to_path_buf());
        let src = source_file(work.path(), "x", "x");
        let t = store.register(&src, "x", "X", None).unwrap();
        let stored = store.template_file_path(&t);

        store.delete(&t.id).unwrap();
        store.delete("no-such-id").unwrap();

        assert!(store.load().is_empty());
        assert!(!stored.exists());
    }

    #[test]
    fn test_register_rejects_escaping_paths() {
        let store_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = TemplateStore::new(store_dir.path().to_path_buf());
        let src = source_file(work.path(), "x", "x");

        assert!(store.register(&src, "../x", "X", None).is_err());
        assert!(store.register(&src, "/etc/x", "X", None).is_err());
        assert!(store.register(&src, "x", "   ", None).is_err());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_missing_registered_from_parses() {
        let store_dir = TempDir::new().unwrap();
        std::fs::write(
            store_dir.path().join(TEMPLATES_FILE),
            r#"[{"id":"1","name":"n","relativePath":"a","registeredAt":"2024-05-01T10:00:00Z"}]"#,
        )
        .unwrap();
        let store = TemplateStore::new(store_dir.path().to_path_buf());

        let templates = store.load();
        assert_eq!(templates.len(), 1);
        assert!(templates[0].registered_from.is_none());
    }
}
