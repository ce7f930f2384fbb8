//! Create-or-update for a single page path.
//!
//! One probe decides whether the page exists and which entity tag to send as
//! `If-Match`; the write then either replaces the page conditionally or creates
//! it unconditionally. The service uses the same `PUT` for both, so failures
//! carry a full description of what was attempted.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{WikiError, WikiResult, WriteDiagnostics};
use crate::model::{UpsertAction, UpsertOutcome};
use crate::normalize::{NodeFields, bool_field, string_field};

pub const IF_MATCH_HEADER: &str = "If-Match";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

const PAGE_CONTAINER_FIELD: &str = "page";
const ETAG_FIELD: &str = "eTag";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub path: String,
    /// Branch the write is committed to.
    pub branch: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl WriteRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub status: u16,
    /// Fully resolved URL the write was sent to.
    pub url: String,
    pub etag: Option<String>,
    pub body: String,
}

/// Page storage as seen by the coordinator, scoped to one wiki.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Lightweight existence check. Errors here never abort an upsert.
    async fn probe(&self, path: &str) -> WikiResult<ProbeResponse>;

    async fn write(&self, request: &WriteRequest) -> WikiResult<WriteResponse>;
}

#[derive(Debug, Clone, Copy)]
pub struct UpsertRequest<'a> {
    pub path: &'a str,
    pub content: &'a str,
    pub branch: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Existence {
    Exists { version: Option<String> },
    Absent,
}

impl Existence {
    fn page_existed(&self) -> bool {
        matches!(self, Self::Exists { .. })
    }

    fn version(&self) -> Option<&str> {
        match self {
            Self::Exists { version } => version.as_deref(),
            Self::Absent => None,
        }
    }
}

pub async fn upsert_page<S>(store: &S, request: &UpsertRequest<'_>) -> WikiResult<UpsertOutcome>
where
    S: PageStore + ?Sized,
{
    let existence = probe_existence(store, request.path).await;
    let action = UpsertAction::from_existence(existence.page_existed());
    let operation = format!("{} page {}", action.verb(), request.path);

    let write = build_write_request(request, &existence);
    tracing::debug!(
        path = request.path,
        action = action.verb(),
        conditional = write.header(IF_MATCH_HEADER).is_some(),
        "writing wiki page"
    );

    let response = match store.write(&write).await {
        Ok(response) => response,
        Err(WikiError::TransportFailure { message, .. }) => {
            return Err(WikiError::TransportFailure {
                operation,
                message,
            });
        }
        Err(error) => return Err(error),
    };

    if !matches!(response.status, 200 | 201) {
        return Err(WikiError::UpstreamStatus {
            operation,
            status: response.status,
            diagnostics: Some(Box::new(WriteDiagnostics {
                action: action.verb(),
                status: response.status,
                url: response.url,
                headers: write.headers,
                body: write.body.to_string(),
                page_existed: existence.page_existed(),
                version: existence.version().map(ToString::to_string),
            })),
        });
    }

    outcome_from_response(&response, action, &operation)
}

async fn probe_existence<S>(store: &S, path: &str) -> Existence
where
    S: PageStore + ?Sized,
{
    match store.probe(path).await {
        Ok(probe) if (200..300).contains(&probe.status) => Existence::Exists {
            version: probe.etag.filter(|etag| !etag.is_empty()),
        },
        Ok(probe) => {
            tracing::debug!(path, status = probe.status, "probe found no page");
            Existence::Absent
        }
        Err(error) => {
            tracing::warn!(path, %error, "page probe failed; assuming page does not exist");
            Existence::Absent
        }
    }
}

fn build_write_request(request: &UpsertRequest<'_>, existence: &Existence) -> WriteRequest {
    let mut headers = vec![(
        CONTENT_TYPE_HEADER.to_string(),
        JSON_CONTENT_TYPE.to_string(),
    )];
    if let Some(version) = existence.version() {
        headers.push((IF_MATCH_HEADER.to_string(), version.to_string()));
    }
    WriteRequest {
        path: request.path.to_string(),
        branch: request.branch.to_string(),
        headers,
        body: json!({ "content": request.content }),
    }
}

fn outcome_from_response(
    response: &WriteResponse,
    action: UpsertAction,
    operation: &str,
) -> WikiResult<UpsertOutcome> {
    if response.body.trim().is_empty() {
        return Err(WikiError::malformed(operation, "empty response body"));
    }
    let payload: Value = serde_json::from_str(&response.body)
        .map_err(|error| WikiError::malformed(operation, error.to_string()))?;

    let page = match payload.get(PAGE_CONTAINER_FIELD) {
        Some(page) => page,
        None => &payload,
    };
    if !page.is_object() {
        return Err(WikiError::malformed(operation, "response contained no page"));
    }

    let fields = NodeFields::from_raw(page);
    let version = [
        string_field(page, ETAG_FIELD),
        string_field(&payload, ETAG_FIELD),
        response.etag.clone().unwrap_or_default(),
    ]
    .into_iter()
    .find(|candidate| !candidate.is_empty())
    .unwrap_or_default();

    Ok(UpsertOutcome {
        id: fields.id,
        path: fields.path,
        title: fields.title,
        order: fields.order,
        storage_path: fields.storage_path,
        version,
        is_parent_page: bool_field(page, "isParentPage"),
        action,
    })
}
