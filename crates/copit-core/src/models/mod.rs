//! Domain types for GitHub data, decoupled from the API response shapes.

pub mod content;
pub mod repository;

pub use content::{parent_path, FileItem, FileKind};
pub use repository::Repository;
