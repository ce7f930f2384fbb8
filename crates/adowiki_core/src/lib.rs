//! Azure DevOps wiki adapter: page-tree reconstruction, create-or-update of
//! pages, and the tool-call surface exposed to a calling agent.

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod normalize;
pub mod page;
pub mod search;
pub mod tools;
pub mod tree;
pub mod upsert;

pub use error::{WikiError, WikiResult, WriteDiagnostics};
pub use model::{PageContent, PageNode, SearchHit, UpsertAction, UpsertOutcome, WikiDescriptor};
