use serde_json::Value;

use crate::error::{WikiError, WikiResult};
use crate::model::{PageContent, WikiDescriptor};
use crate::normalize::{NodeFields, bool_field, id_field, string_field};

pub const GET_PAGE_OPERATION: &str = "get page";
pub const LIST_WIKIS_OPERATION: &str = "list wikis";

/// Map a single-page read. Unlike listings, a missing page is an error here.
pub fn page_content_from_response(
    path: &str,
    status: u16,
    etag: Option<&str>,
    body: &str,
) -> WikiResult<PageContent> {
    if status == 404 {
        return Err(WikiError::NotFound {
            path: path.to_string(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(WikiError::upstream(GET_PAGE_OPERATION, status));
    }
    if body.trim().is_empty() {
        return Err(WikiError::malformed(GET_PAGE_OPERATION, "empty response body"));
    }
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| WikiError::malformed(GET_PAGE_OPERATION, error.to_string()))?;
    let page = payload.get("page").unwrap_or(&payload);
    if !page.is_object() {
        return Err(WikiError::NotFound {
            path: path.to_string(),
        });
    }

    let fields = NodeFields::from_raw(page);
    let version = etag
        .map(ToString::to_string)
        .filter(|value| !value.is_empty())
        .or_else(|| non_empty(string_field(page, "eTag")))
        .unwrap_or_else(|| string_field(&payload, "eTag"));

    Ok(PageContent {
        id: fields.id,
        path: fields.path,
        title: fields.title,
        order: fields.order,
        storage_path: fields.storage_path,
        content: string_field(page, "content"),
        version,
        is_parent_page: bool_field(page, "isParentPage"),
    })
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

pub fn wikis_from_response(status: u16, body: &str) -> WikiResult<Vec<WikiDescriptor>> {
    if !(200..300).contains(&status) {
        return Err(WikiError::upstream(LIST_WIKIS_OPERATION, status));
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| WikiError::malformed(LIST_WIKIS_OPERATION, error.to_string()))?;
    let wikis = payload
        .get("value")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(wiki_descriptor).collect())
        .unwrap_or_default();
    Ok(wikis)
}

fn wiki_descriptor(raw: &Value) -> WikiDescriptor {
    WikiDescriptor {
        id: id_field(raw, "id"),
        name: string_field(raw, "name"),
        wiki_type: wiki_type_code(raw.get("type")),
        url: string_field(raw, "url"),
        repository_id: id_field(raw, "repositoryId"),
        mapped_path: string_field(raw, "mappedPath"),
    }
}

// The REST API reports the enum by name; the SDK contract uses its ordinal.
fn wiki_type_code(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(name)) => match name.as_str() {
            "projectWiki" => "0".to_string(),
            "codeWiki" => "1".to_string(),
            other => other.to_string(),
        },
        _ => String::new(),
    }
}
