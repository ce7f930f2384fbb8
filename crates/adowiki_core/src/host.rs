use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::client::AzureDevOpsClient;
use crate::config::{ProjectScope, Settings};
use crate::error::{WikiError, WikiResult};
use crate::search::SearchQuery;
use crate::tools::{ScopeArgs, ToolCall, ToolResponse};
use crate::upsert::{UpsertRequest, upsert_page};

/// Owns the resolved settings and the lazily built connection handle shared by all calls.
pub struct WikiHost {
    settings: Settings,
    client: OnceCell<AzureDevOpsClient>,
}

impl WikiHost {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    pub fn with_client(settings: Settings, client: AzureDevOpsClient) -> Self {
        Self {
            settings,
            client: OnceCell::new_with(Some(client)),
        }
    }

    pub async fn client(&self) -> WikiResult<&AzureDevOpsClient> {
        self.client
            .get_or_try_init(|| async {
                tracing::debug!("initializing Azure DevOps client");
                AzureDevOpsClient::new(&self.settings)
            })
            .await
    }

    pub fn scope(&self, args: &ScopeArgs) -> WikiResult<ProjectScope> {
        self.settings
            .scope(args.organization.as_deref(), args.project.as_deref())
    }

    /// Run a validated call and return its result as JSON.
    pub async fn execute(&self, call: &ToolCall) -> WikiResult<Value> {
        let scope = self.scope(call.scope())?;
        let client = self.client().await?;
        match call {
            ToolCall::SearchWiki(args) => {
                let mut query = SearchQuery::new(args.search_text.trim());
                query.wiki_id = args.wiki_id.clone();
                if let Some(top) = args.top {
                    query.top = top;
                }
                to_value(client.search(&scope, &query).await?)
            }
            ToolCall::ListWikis(_) => to_value(client.list_wikis(&scope).await?),
            ToolCall::GetPageTree(args) => {
                to_value(client.get_page_tree(&scope, &args.wiki_id, args.depth).await?)
            }
            ToolCall::GetPage(args) => {
                to_value(client.get_page(&scope, &args.wiki_id, &args.path).await?)
            }
            ToolCall::UpdatePage(args) => {
                let store = client.pages(&scope, &args.wiki_id);
                let request = UpsertRequest {
                    path: &args.path,
                    content: &args.content,
                    branch: &self.settings.default_branch,
                };
                to_value(upsert_page(&store, &request).await?)
            }
        }
    }

    /// Parse, execute and render one tool call. Never fails; errors become error responses.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResponse {
        let result = match ToolCall::parse(name, arguments) {
            Ok(call) => self.execute(&call).await,
            Err(error) => Err(error),
        };
        match result.and_then(|value| render(&value)) {
            Ok(text) => ToolResponse::success(text),
            Err(error) => {
                tracing::warn!(tool = name, %error, "tool call failed");
                ToolResponse::failure(&error)
            }
        }
    }
}

fn to_value<T: Serialize>(result: T) -> WikiResult<Value> {
    serde_json::to_value(result)
        .map_err(|error| WikiError::malformed("serialize result", error.to_string()))
}

fn render(value: &Value) -> WikiResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|error| WikiError::malformed("serialize result", error.to_string()))
}
