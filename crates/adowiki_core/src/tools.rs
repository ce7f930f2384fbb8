//! Tool-call surface for the calling agent: names, input schemas and argument
//! validation. Execution lives in [`crate::host`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{WikiError, WikiResult};

pub const SEARCH_WIKI: &str = "search_wiki";
pub const LIST_WIKIS: &str = "wiki_list_wikis";
pub const GET_PAGE_TREE: &str = "wiki_get_page_tree";
pub const GET_PAGE: &str = "wiki_get_page";
pub const UPDATE_PAGE: &str = "wiki_update_page";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeArgs {
    pub organization: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchWikiArgs {
    #[serde(flatten)]
    pub scope: ScopeArgs,
    pub search_text: String,
    pub wiki_id: Option<String>,
    pub top: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWikisArgs {
    #[serde(flatten)]
    pub scope: ScopeArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTreeArgs {
    #[serde(flatten)]
    pub scope: ScopeArgs,
    pub wiki_id: String,
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPageArgs {
    #[serde(flatten)]
    pub scope: ScopeArgs,
    pub wiki_id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePageArgs {
    #[serde(flatten)]
    pub scope: ScopeArgs,
    pub wiki_id: String,
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    SearchWiki(SearchWikiArgs),
    ListWikis(ListWikisArgs),
    GetPageTree(PageTreeArgs),
    GetPage(GetPageArgs),
    UpdatePage(UpdatePageArgs),
}

impl ToolCall {
    /// Parse and validate one call. Missing arguments (`null`) are treated as `{}`.
    pub fn parse(name: &str, arguments: Value) -> WikiResult<Self> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        let call = match name {
            SEARCH_WIKI => Self::SearchWiki(decode(name, arguments)?),
            LIST_WIKIS => Self::ListWikis(decode(name, arguments)?),
            GET_PAGE_TREE => Self::GetPageTree(decode(name, arguments)?),
            GET_PAGE => Self::GetPage(decode(name, arguments)?),
            UPDATE_PAGE => Self::UpdatePage(decode(name, arguments)?),
            other => return Err(WikiError::InvalidRequest(format!("Unknown tool: {other}"))),
        };
        call.validate()?;
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchWiki(_) => SEARCH_WIKI,
            Self::ListWikis(_) => LIST_WIKIS,
            Self::GetPageTree(_) => GET_PAGE_TREE,
            Self::GetPage(_) => GET_PAGE,
            Self::UpdatePage(_) => UPDATE_PAGE,
        }
    }

    pub fn scope(&self) -> &ScopeArgs {
        match self {
            Self::SearchWiki(args) => &args.scope,
            Self::ListWikis(args) => &args.scope,
            Self::GetPageTree(args) => &args.scope,
            Self::GetPage(args) => &args.scope,
            Self::UpdatePage(args) => &args.scope,
        }
    }

    pub fn validate(&self) -> WikiResult<()> {
        let scope = self.scope();
        non_empty_if_present("organization", scope.organization.as_deref())?;
        non_empty_if_present("project", scope.project.as_deref())?;
        match self {
            Self::SearchWiki(args) => {
                non_empty("searchText", &args.search_text)?;
                non_empty_if_present("wikiId", args.wiki_id.as_deref())?;
                if args.top == Some(0) {
                    return Err(invalid("top must be a positive integer"));
                }
            }
            Self::ListWikis(_) => {}
            Self::GetPageTree(args) => {
                non_empty("wikiId", &args.wiki_id)?;
                if args.depth == Some(0) {
                    return Err(invalid("depth must be a positive integer"));
                }
            }
            Self::GetPage(args) => {
                non_empty("wikiId", &args.wiki_id)?;
                non_empty("path", &args.path)?;
            }
            Self::UpdatePage(args) => {
                non_empty("wikiId", &args.wiki_id)?;
                non_empty("path", &args.path)?;
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(name: &str, arguments: Value) -> WikiResult<T> {
    serde_json::from_value(arguments)
        .map_err(|error| invalid(format!("invalid arguments for {name}: {error}")))
}

fn non_empty(field: &str, value: &str) -> WikiResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn non_empty_if_present(field: &str, value: Option<&str>) -> WikiResult<()> {
    match value {
        Some(value) => non_empty(field, value),
        None => Ok(()),
    }
}

fn invalid(message: impl Into<String>) -> WikiError {
    WikiError::InvalidRequest(message.into())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Text result handed back to the calling agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn success(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    pub fn failure(error: &WikiError) -> Self {
        Self {
            text: format!("Error: {error}"),
            is_error: true,
        }
    }
}

pub fn tool_catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_WIKI,
            description: "Search across wiki content using Azure DevOps Search API",
            input_schema: schema(
                &[
                    ("searchText", "string", "Search query string"),
                    ("wikiId", "string", "Optional specific wiki identifier"),
                    ("top", "integer", "Maximum number of results"),
                ],
                &["searchText"],
            ),
        },
        ToolDefinition {
            name: LIST_WIKIS,
            description: "List wikis available in a project",
            input_schema: schema(&[], &[]),
        },
        ToolDefinition {
            name: GET_PAGE_TREE,
            description: "Retrieve hierarchical page structure from wiki",
            input_schema: schema(
                &[
                    ("wikiId", "string", "Wiki identifier"),
                    ("depth", "integer", "Optional maximum depth to retrieve"),
                ],
                &["wikiId"],
            ),
        },
        ToolDefinition {
            name: GET_PAGE,
            description: "Get content of a specific wiki page",
            input_schema: schema(
                &[
                    ("wikiId", "string", "Wiki identifier"),
                    ("path", "string", "Page path"),
                ],
                &["wikiId", "path"],
            ),
        },
        ToolDefinition {
            name: UPDATE_PAGE,
            description: "Create a wiki page or update it if it already exists",
            input_schema: schema(
                &[
                    ("wikiId", "string", "Wiki identifier"),
                    ("path", "string", "Page path"),
                    ("content", "string", "New page content (Markdown)"),
                ],
                &["wikiId", "path", "content"],
            ),
        },
    ]
}

fn schema(properties: &[(&str, &str, &str)], required: &[&str]) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(
        "organization".to_string(),
        json!({ "type": "string", "description": "Azure DevOps organization name" }),
    );
    map.insert(
        "project".to_string(),
        json!({ "type": "string", "description": "Project name" }),
    );
    for (name, kind, description) in properties {
        map.insert(
            (*name).to_string(),
            json!({ "type": kind, "description": description }),
        );
    }
    json!({
        "type": "object",
        "properties": map,
        "required": required,
    })
}
