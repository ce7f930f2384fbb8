use async_trait::async_trait;
use reqwest::header::{ETAG, HeaderMap, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, Url};

use crate::config::{Credential, ProjectScope, Settings};
use crate::error::{WikiError, WikiResult};
use crate::model::{PageContent, PageNode, SearchHit, WikiDescriptor};
use crate::page::{
    GET_PAGE_OPERATION, LIST_WIKIS_OPERATION, page_content_from_response, wikis_from_response,
};
use crate::search::{SEARCH_OPERATION, SearchQuery, search_hits_from_response};
use crate::tree::{TREE_OPERATION, tree_from_response};
use crate::upsert::{PageStore, ProbeResponse, WriteRequest, WriteResponse};

pub const API_VERSION: &str = "7.1";

const PROBE_OPERATION: &str = "probe page";
const WRITE_OPERATION: &str = "write page";

/// Long-lived connection handle. Cheap to share; the host builds it once.
#[derive(Debug, Clone)]
pub struct AzureDevOpsClient {
    http: Client,
    credential: Credential,
    user_agent: String,
}

struct RawResponse {
    status: u16,
    etag: Option<String>,
    body: String,
}

impl AzureDevOpsClient {
    pub fn new(settings: &Settings) -> WikiResult<Self> {
        let credential = settings.require_credential()?.clone();
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| WikiError::transport("build Azure DevOps HTTP client", error))?;
        Ok(Self {
            http,
            credential,
            user_agent: settings.user_agent.clone(),
        })
    }

    pub async fn list_wikis(&self, scope: &ProjectScope) -> WikiResult<Vec<WikiDescriptor>> {
        let url = endpoint(&scope.project_api_url("wiki/wikis"), &[], LIST_WIKIS_OPERATION)?;
        let raw = self
            .execute(self.request(Method::GET, url), LIST_WIKIS_OPERATION)
            .await?;
        wikis_from_response(raw.status, &raw.body)
    }

    /// Raw page listing as `(status, body)`. `depth` requests the full hierarchy.
    pub async fn list_pages(
        &self,
        scope: &ProjectScope,
        wiki_id: &str,
        depth: Option<u32>,
    ) -> WikiResult<(u16, String)> {
        let url = pages_listing_url(scope, wiki_id, depth)?;
        let raw = self
            .execute(self.request(Method::GET, url), TREE_OPERATION)
            .await?;
        Ok((raw.status, raw.body))
    }

    pub async fn get_page_tree(
        &self,
        scope: &ProjectScope,
        wiki_id: &str,
        depth: Option<u32>,
    ) -> WikiResult<Vec<PageNode>> {
        let (status, body) = self.list_pages(scope, wiki_id, depth).await?;
        tree_from_response(status, &body)
    }

    pub async fn get_page(
        &self,
        scope: &ProjectScope,
        wiki_id: &str,
        path: &str,
    ) -> WikiResult<PageContent> {
        let url = endpoint(
            &pages_url(scope, wiki_id),
            &[("path", path), ("includeContent", "true")],
            GET_PAGE_OPERATION,
        )?;
        let raw = self
            .execute(self.request(Method::GET, url), GET_PAGE_OPERATION)
            .await?;
        page_content_from_response(path, raw.status, raw.etag.as_deref(), &raw.body)
    }

    pub async fn search(
        &self,
        scope: &ProjectScope,
        query: &SearchQuery,
    ) -> WikiResult<Vec<SearchHit>> {
        let url = endpoint(&scope.search_api_url(), &[], SEARCH_OPERATION)?;
        let builder = self
            .request(Method::POST, url)
            .json(&query.request_body(scope));
        let raw = self.execute(builder, SEARCH_OPERATION).await?;
        search_hits_from_response(scope, raw.status, &raw.body)
    }

    /// Page store for one wiki, used by the upsert coordinator.
    pub fn pages<'a>(&'a self, scope: &'a ProjectScope, wiki_id: &'a str) -> WikiPages<'a> {
        WikiPages {
            client: self,
            scope,
            wiki_id,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.as_str());
        match &self.credential {
            Credential::PersonalAccessToken(token) => builder.basic_auth("", Some(token)),
            Credential::Bearer(token) => builder.bearer_auth(token),
        }
    }

    async fn execute(&self, builder: RequestBuilder, operation: &str) -> WikiResult<RawResponse> {
        let response = builder
            .send()
            .await
            .map_err(|error| WikiError::transport(operation, error))?;
        read_response(response, operation).await
    }
}

pub struct WikiPages<'a> {
    client: &'a AzureDevOpsClient,
    scope: &'a ProjectScope,
    wiki_id: &'a str,
}

#[async_trait]
impl<'a> PageStore for WikiPages<'a> {
    async fn probe(&self, path: &str) -> WikiResult<ProbeResponse> {
        let url = endpoint(
            &pages_url(self.scope, self.wiki_id),
            &[("path", path)],
            PROBE_OPERATION,
        )?;
        let response = self
            .client
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|error| WikiError::transport(PROBE_OPERATION, error))?;
        Ok(ProbeResponse {
            status: response.status().as_u16(),
            etag: etag(response.headers()),
        })
    }

    async fn write(&self, request: &WriteRequest) -> WikiResult<WriteResponse> {
        let url = endpoint(
            &pages_url(self.scope, self.wiki_id),
            &[
                ("path", request.path.as_str()),
                ("versionDescriptor.version", request.branch.as_str()),
                ("versionDescriptor.versionType", "branch"),
            ],
            WRITE_OPERATION,
        )?;
        let url_text = url.to_string();
        let mut builder = self.client.request(Method::PUT, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let raw = self
            .client
            .execute(builder.body(request.body.to_string()), WRITE_OPERATION)
            .await?;
        Ok(WriteResponse {
            status: raw.status,
            url: url_text,
            etag: raw.etag,
            body: raw.body,
        })
    }
}

fn pages_url(scope: &ProjectScope, wiki_id: &str) -> String {
    scope.project_api_url(&format!("wiki/wikis/{wiki_id}/pages"))
}

/// Any depth asks for the full hierarchy; otherwise only the first level.
fn pages_listing_url(scope: &ProjectScope, wiki_id: &str, depth: Option<u32>) -> WikiResult<Url> {
    let recursion = if depth.is_some() { "Full" } else { "OneLevel" };
    endpoint(
        &pages_url(scope, wiki_id),
        &[("path", "/"), ("recursionLevel", recursion)],
        TREE_OPERATION,
    )
}

fn endpoint(base: &str, params: &[(&str, &str)], operation: &str) -> WikiResult<Url> {
    let mut pairs = params.to_vec();
    pairs.push(("api-version", API_VERSION));
    Url::parse_with_params(base, &pairs)
        .map_err(|error| WikiError::transport(operation, format!("invalid URL {base}: {error}")))
}

fn etag(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

async fn read_response(response: Response, operation: &str) -> WikiResult<RawResponse> {
    let status = response.status().as_u16();
    let etag = etag(response.headers());
    tracing::debug!(operation, status, url = %response.url(), "Azure DevOps response");
    let body = response
        .text()
        .await
        .map_err(|error| WikiError::transport(operation, error))?;
    Ok(RawResponse { status, etag, body })
}
