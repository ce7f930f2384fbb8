use reqwest::Url;
use serde_json::{Value, json};

use crate::config::ProjectScope;
use crate::error::{WikiError, WikiResult};
use crate::model::SearchHit;
use crate::normalize::{string_field, title_from_path};

pub const SEARCH_OPERATION: &str = "search wiki";
pub const DEFAULT_SEARCH_TOP: u32 = 25;

const HIGHLIGHT_SEPARATOR: &str = " ... ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub wiki_id: Option<String>,
    pub top: u32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            wiki_id: None,
            top: DEFAULT_SEARCH_TOP,
        }
    }

    pub fn request_body(&self, scope: &ProjectScope) -> Value {
        let mut filters = json!({ "Project": [scope.project] });
        if let Some(wiki_id) = &self.wiki_id {
            filters["Wiki"] = json!([wiki_id]);
        }
        json!({
            "searchText": self.text,
            "$skip": 0,
            "$top": self.top,
            "filters": filters,
        })
    }
}

pub fn search_hits_from_response(
    scope: &ProjectScope,
    status: u16,
    body: &str,
) -> WikiResult<Vec<SearchHit>> {
    if !(200..300).contains(&status) {
        return Err(WikiError::upstream(SEARCH_OPERATION, status));
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| WikiError::malformed(SEARCH_OPERATION, error.to_string()))?;
    let hits = payload
        .get("results")
        .and_then(Value::as_array)
        .map(|results| results.iter().map(|raw| search_hit(scope, raw)).collect())
        .unwrap_or_default();
    Ok(hits)
}

fn search_hit(scope: &ProjectScope, raw: &Value) -> SearchHit {
    let storage_path = string_field(raw, "path");
    let page_path = page_path_from_storage(&storage_path);
    let file_name = string_field(raw, "fileName");
    let title = match file_name.strip_suffix(".md") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => title_from_path(&page_path).to_string(),
    };

    let wiki = raw.get("wiki").cloned().unwrap_or(Value::Null);
    let wiki_name = string_field(&wiki, "name");
    let project = raw
        .get("project")
        .map(|project| string_field(project, "name"))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| scope.project.clone());

    let url = if wiki_name.is_empty() {
        String::new()
    } else {
        page_link(&scope.org_url, &project, &wiki_name, &page_path).unwrap_or_default()
    };

    SearchHit {
        title,
        path: page_path,
        url,
        content: highlights(raw),
        project,
        wiki: wiki_name,
    }
}

/// Browser link to a page; every segment and the page path are percent-encoded.
fn page_link(org_url: &str, project: &str, wiki: &str, page_path: &str) -> Option<String> {
    let mut url = Url::parse(org_url).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend([project, "_wiki", "wikis", wiki]);
    url.query_pairs_mut().append_pair("pagePath", page_path);
    Some(url.into())
}

/// Search reports the git item path (`/Home/Setup.md`); pages are addressed without the extension.
fn page_path_from_storage(storage_path: &str) -> String {
    storage_path
        .strip_suffix(".md")
        .unwrap_or(storage_path)
        .to_string()
}

fn highlights(raw: &Value) -> String {
    raw.get("hits")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|hit| hit.get("highlights").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join(HIGHLIGHT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ProjectScope {
        ProjectScope {
            organization: "org".to_string(),
            project: "proj".to_string(),
            org_url: "https://dev.azure.com/org".to_string(),
        }
    }

    #[test]
    fn request_body_filters_by_project_and_wiki() {
        let mut query = SearchQuery::new("deploy");
        query.wiki_id = Some("proj.wiki".to_string());
        query.top = 5;
        let body = query.request_body(&scope());
        assert_eq!(body["searchText"], "deploy");
        assert_eq!(body["$top"], 5);
        assert_eq!(body["filters"]["Project"], json!(["proj"]));
        assert_eq!(body["filters"]["Wiki"], json!(["proj.wiki"]));
    }

    #[test]
    fn request_body_omits_wiki_filter_when_unset() {
        let body = SearchQuery::new("deploy").request_body(&scope());
        assert!(body["filters"].get("Wiki").is_none());
        assert_eq!(body["$top"], DEFAULT_SEARCH_TOP);
    }

    #[test]
    fn results_are_mapped_to_hits() {
        let body = r#"{"count":1,"results":[{
            "fileName":"Setup.md",
            "path":"/Home/Setup.md",
            "project":{"name":"proj"},
            "wiki":{"id":"w1","name":"proj.wiki"},
            "hits":[{"fieldReferenceName":"content","highlights":["run <highlighthit>deploy</highlighthit>","then"]}]
        }]}"#;
        let hits = search_hits_from_response(&scope(), 200, body).expect("hits");
        assert_eq!(
            hits,
            vec![SearchHit {
                title: "Setup".to_string(),
                path: "/Home/Setup".to_string(),
                url: "https://dev.azure.com/org/proj/_wiki/wikis/proj.wiki?pagePath=%2FHome%2FSetup"
                    .to_string(),
                content: "run <highlighthit>deploy</highlighthit> ... then".to_string(),
                project: "proj".to_string(),
                wiki: "proj.wiki".to_string(),
            }]
        );
    }

    #[test]
    fn page_links_encode_special_characters() {
        let body = r#"{"results":[{
            "path":"/Q&A/Getting Started.md",
            "project":{"name":"My Project"},
            "wiki":{"name":"My Project.wiki"}
        }]}"#;
        let hits = search_hits_from_response(&scope(), 200, body).expect("hits");
        let url = Url::parse(&hits[0].url).expect("valid url");
        assert_eq!(url.path(), "/org/My%20Project/_wiki/wikis/My%20Project.wiki");
        let page_path = url
            .query_pairs()
            .find(|(key, _)| key == "pagePath")
            .map(|(_, value)| value.into_owned());
        assert_eq!(page_path.as_deref(), Some("/Q&A/Getting Started"));
    }

    #[test]
    fn sparse_results_use_defaults() {
        let body = r#"{"results":[{"path":"/Only.md"}]}"#;
        let hits = search_hits_from_response(&scope(), 200, body).expect("hits");
        assert_eq!(hits[0].title, "Only");
        assert_eq!(hits[0].project, "proj");
        assert_eq!(hits[0].url, "");
        assert_eq!(hits[0].content, "");
    }

    #[test]
    fn failed_search_reports_status() {
        let error = search_hits_from_response(&scope(), 403, "").expect_err("must fail");
        assert_eq!(error.to_string(), "Failed to search wiki: HTTP 403");
    }
}
