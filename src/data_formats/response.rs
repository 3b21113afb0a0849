use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Post, Tag, User};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: AuthorResponse,
    pub category: Option<CategoryResponse>,
    pub tags: Vec<TagResponse>,
    pub created_date: DateTime<Utc>,
    pub published_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct MessageResponse {
    pub detail: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct LoginResponse {
    pub detail: String,
    pub token: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct AcknowledgeResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(detail: &str) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(
        User {
            id,
            username,
            email,
            date_joined,
            ..
        }: User,
    ) -> Self {
        UserResponse {
            id,
            username,
            email,
            date_joined,
        }
    }
}

impl From<Category> for CategoryResponse {
    fn from(Category { id, name }: Category) -> Self {
        CategoryResponse { id, name }
    }
}

impl From<Tag> for TagResponse {
    fn from(Tag { id, name }: Tag) -> Self {
        TagResponse { id, name }
    }
}

impl PostResponse {
    pub fn new(
        Post {
            id,
            title,
            content,
            author_id,
            author_username,
            category_id,
            category_name,
            created_date,
            published_date,
        }: Post,
        tags: Vec<TagResponse>,
    ) -> Self {
        PostResponse {
            id,
            title,
            content,
            author: AuthorResponse {
                id: author_id,
                username: author_username,
            },
            category: category_id
                .zip(category_name)
                .map(|(id, name)| CategoryResponse { id, name }),
            tags,
            created_date,
            published_date,
        }
    }
}
