use serde::{Deserialize, Serialize};

use super::response::PostResponse;

/// One page of results plus links to its neighbours.
#[derive(Debug, Deserialize, Serialize)]
pub struct PageWrapper<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Search output: a page when pagination is enabled, the bare list otherwise.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PostListing {
    Page(PageWrapper<PostResponse>),
    Full(Vec<PostResponse>),
}
