use serde::Serialize;

/// One page in a reconstructed hierarchy. `children` is always present and sorted by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNode {
    pub id: String,
    pub path: String,
    pub title: String,
    pub order: i64,
    pub storage_path: String,
    pub children: Vec<PageNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub id: String,
    pub path: String,
    pub title: String,
    pub order: i64,
    pub storage_path: String,
    pub content: String,
    /// Entity tag of the loaded revision; usable as an `If-Match` precondition.
    pub version: String,
    pub is_parent_page: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

impl UpsertAction {
    pub fn from_existence(page_existed: bool) -> Self {
        if page_existed {
            Self::Updated
        } else {
            Self::Created
        }
    }

    /// Verb used in error messages and diagnostics.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Updated => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub id: String,
    pub path: String,
    pub title: String,
    pub order: i64,
    pub storage_path: String,
    pub version: String,
    pub is_parent_page: bool,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WikiDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub wiki_type: String,
    pub url: String,
    pub repository_id: String,
    pub mapped_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub title: String,
    pub path: String,
    pub url: String,
    pub content: String,
    pub project: String,
    pub wiki: String,
}
