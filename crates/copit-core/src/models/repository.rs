use serde::{Deserialize, Serialize};

/// A repository as shown in the repository list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub description: Option<String>,
}

impl Repository {
    /// Short description for list rows, empty when the repository has none.
    pub fn description_display(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}
