//! Rebuilds the ordered page hierarchy from a page-listing response.
//!
//! The listing endpoint answers in one of three shapes depending on the
//! requested path and recursion level. The shape is resolved once at the top
//! level; every nested level is read as "list of `subPages`, or nothing".

use serde_json::Value;

use crate::error::{WikiError, WikiResult};
use crate::model::PageNode;
use crate::normalize::NodeFields;

pub const TREE_OPERATION: &str = "get page tree";

const LIST_FIELD: &str = "value";
const CHILDREN_FIELD: &str = "subPages";

/// Top-level shape of a listing payload.
#[derive(Debug, Clone, Copy)]
pub enum ListingShape<'a> {
    /// `{ "value": [...] }`: every element is a root.
    List(&'a [Value]),
    /// A single page object carrying its own `subPages`.
    Nested(&'a Value),
    /// A single page object with no children.
    Bare(&'a Value),
    /// Anything that is not an object carries no pages.
    Empty,
}

impl<'a> ListingShape<'a> {
    pub fn resolve(payload: &'a Value) -> Self {
        if !payload.is_object() {
            return Self::Empty;
        }
        if let Some(items) = payload.get(LIST_FIELD).and_then(Value::as_array) {
            return Self::List(items);
        }
        if payload.get(CHILDREN_FIELD).is_some() {
            return Self::Nested(payload);
        }
        Self::Bare(payload)
    }

    fn roots(self) -> Vec<PageNode> {
        match self {
            Self::List(items) => items.iter().map(build_node).collect(),
            Self::Nested(page) => vec![build_node(page)],
            Self::Bare(page) => vec![leaf_node(page)],
            Self::Empty => Vec::new(),
        }
    }
}

/// Reconstruct sorted root nodes from an already-parsed payload.
pub fn reconstruct_tree(payload: &Value) -> Vec<PageNode> {
    sort_siblings(ListingShape::resolve(payload).roots())
}

/// Reconstruct from a raw listing response. A non-success status or an empty
/// body means "no pages"; a body that is not a JSON object is an error.
pub fn tree_from_response(status: u16, body: &str) -> WikiResult<Vec<PageNode>> {
    if !(200..300).contains(&status) {
        tracing::debug!(status, "page listing returned non-success status; treating as empty");
        return Ok(Vec::new());
    }
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| WikiError::malformed(TREE_OPERATION, error.to_string()))?;
    if !payload.is_object() {
        return Err(WikiError::malformed(
            TREE_OPERATION,
            "expected a page listing object",
        ));
    }
    Ok(reconstruct_tree(&payload))
}

fn build_node(raw: &Value) -> PageNode {
    let children = raw
        .get(CHILDREN_FIELD)
        .and_then(Value::as_array)
        .map(|items| sort_siblings(items.iter().map(build_node).collect()))
        .unwrap_or_default();
    with_children(NodeFields::from_raw(raw), children)
}

fn leaf_node(raw: &Value) -> PageNode {
    with_children(NodeFields::from_raw(raw), Vec::new())
}

fn with_children(fields: NodeFields, children: Vec<PageNode>) -> PageNode {
    PageNode {
        id: fields.id,
        path: fields.path,
        title: fields.title,
        order: fields.order,
        storage_path: fields.storage_path,
        children,
    }
}

// `sort_by_key` is stable, so equal orders keep payload order.
fn sort_siblings(mut nodes: Vec<PageNode>) -> Vec<PageNode> {
    nodes.sort_by_key(|node| node.order);
    nodes
}
