use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::{FieldErrors, RequestError};

use super::request::parse_timestamp;

pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Predicates accepted by the post listing.
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    Category(i64),
    Author(i64),
    /// Matches posts carrying any of the tags.
    Tags(Vec<i64>),
    PublishedDate(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    PublishedDate,
    Category,
    CreatedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostOrdering {
    pub key: OrderKey,
    pub descending: bool,
}

impl OrderKey {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "published_date" => Some(OrderKey::PublishedDate),
            "category" => Some(OrderKey::Category),
            "created_date" => Some(OrderKey::CreatedDate),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            OrderKey::PublishedDate => "posts.published_date",
            OrderKey::Category => "posts.category_id",
            OrderKey::CreatedDate => "posts.created_date",
        }
    }
}

impl PostOrdering {
    fn parse(term: &str) -> Option<Self> {
        let term = term.trim();
        let (name, descending) = match term.strip_prefix('-') {
            Some(name) => (name, true),
            None => (term, false),
        };
        OrderKey::parse(name).map(|key| PostOrdering { key, descending })
    }
}

pub const DEFAULT_ORDERING: PostOrdering = PostOrdering {
    key: OrderKey::PublishedDate,
    descending: true,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PostListQuery {
    pub filters: Vec<PostFilter>,
    pub ordering: Vec<PostOrdering>,
}

fn parse_id(errors: &mut FieldErrors, field: &str, value: &str) -> Option<i64> {
    match value.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

impl PostListQuery {
    /// Builds the query from raw `key=value` pairs. Empty values and unknown
    /// keys are ignored; repeated `tags` values accumulate.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, RequestError> {
        let mut errors = FieldErrors::new();
        let mut filters = Vec::new();
        let mut tags = Vec::new();
        let mut ordering = Vec::new();

        for (key, value) in pairs {
            if value.trim().is_empty() {
                continue;
            }
            match key.as_str() {
                "category" => {
                    if let Some(id) = parse_id(&mut errors, "category", value) {
                        filters.push(PostFilter::Category(id));
                    }
                }
                "author" => {
                    if let Some(id) = parse_id(&mut errors, "author", value) {
                        filters.push(PostFilter::Author(id));
                    }
                }
                "tags" => {
                    for part in value.split(',').filter(|part| !part.trim().is_empty()) {
                        if let Some(id) = parse_id(&mut errors, "tags", part) {
                            tags.push(id);
                        }
                    }
                }
                "published_date" => match parse_timestamp(value) {
                    Some(timestamp) => filters.push(PostFilter::PublishedDate(timestamp)),
                    None => errors.add("published_date", "Enter a valid date/time."),
                },
                "ordering" => {
                    ordering.extend(value.split(',').filter_map(PostOrdering::parse));
                }
                _ => {}
            }
        }
        errors.into_result()?;

        if !tags.is_empty() {
            tags.sort_unstable();
            tags.dedup();
            filters.push(PostFilter::Tags(tags));
        }
        if ordering.is_empty() {
            ordering.push(DEFAULT_ORDERING);
        }
        Ok(PostListQuery { filters, ordering })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Search criteria with empty inputs already dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PostSearch {
    pub text: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl From<&SearchParams> for PostSearch {
    fn from(params: &SearchParams) -> Self {
        let mut tags: Vec<String> = params
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        tags.sort();
        tags.dedup();

        PostSearch {
            text: non_empty(&params.q),
            category: non_empty(&params.category),
            author: non_empty(&params.author),
            tags,
        }
    }
}
