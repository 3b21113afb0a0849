use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::errors::{FieldErrors, RequestError};

const MAX_NAME_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 150;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

// Distinguishes an absent field from an explicit `null`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Trims `value` and records an error if it is missing, blank or too long.
fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_len: Option<usize>,
) -> Option<String> {
    let value = match value {
        Some(value) => value.trim().to_string(),
        None => {
            errors.add(field, REQUIRED);
            return None;
        }
    };
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max_len) = max_len {
        if value.chars().count() > max_len {
            errors.add(
                field,
                format!("Ensure this field has no more than {max_len} characters."),
            );
            return None;
        }
    }
    Some(value)
}

// ----------------- User Request -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A registration that passed validation. The password is still plain text.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewUser, RequestError> {
        let mut errors = FieldErrors::new();

        let username = required_text(
            &mut errors,
            "username",
            self.username,
            Some(MAX_USERNAME_LEN),
        );
        if let Some(username) = &username {
            if !is_valid_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }

        let email = required_text(&mut errors, "email", self.email, Some(254));
        if let Some(email) = &email {
            if !is_valid_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }

        // Passwords are taken verbatim, only emptiness is rejected.
        let password = match self.password {
            Some(password) if !password.is_empty() => Some(password),
            Some(_) => {
                errors.add("password", BLANK);
                None
            }
            None => {
                errors.add("password", REQUIRED);
                None
            }
        };

        errors.into_result()?;
        match (username, email, password) {
            (Some(username), Some(email), Some(password)) => Ok(NewUser {
                username,
                email,
                password,
            }),
            _ => Err(RequestError::ServerError),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ----------------- Post Request -----------------

/// How much of a post a write request must describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Replace,
    Partial,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(deserialize_with = "deserialize_some")]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub published_date: Option<Option<String>>,
}

/// Validated post fields. `None` means "leave unchanged"; for the nullable
/// fields `Some(None)` means "clear".
#[derive(Debug, Default, PartialEq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub published_date: Option<Option<DateTime<Utc>>>,
}

impl PostChanges {
    pub fn touches_columns(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.category.is_some()
            || self.published_date.is_some()
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    // Naive timestamps are taken as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl PostRequest {
    pub fn validate(self, mode: WriteMode) -> Result<PostChanges, RequestError> {
        let mut errors = FieldErrors::new();
        let whole = mode != WriteMode::Partial;

        let title = match self.title {
            None if !whole => None,
            title => required_text(&mut errors, "title", title, Some(MAX_NAME_LEN)),
        };
        let content = match self.content {
            None if !whole => None,
            content => required_text(&mut errors, "content", content, None),
        };

        let category = match self.category {
            Some(Some(name)) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    errors.add("category", BLANK);
                }
                Some(Some(name))
            }
            other => other,
        };

        let tags = self.tags.map(|names| {
            let mut set = BTreeSet::new();
            for name in names {
                let name = name.trim();
                if name.is_empty() {
                    errors.add("tags", "Tag names may not be blank.");
                } else {
                    set.insert(name.to_string());
                }
            }
            set.into_iter().collect::<Vec<_>>()
        });

        let published_date = match self.published_date {
            Some(Some(raw)) => match parse_timestamp(&raw) {
                Some(timestamp) => Some(Some(timestamp)),
                None => {
                    errors.add(
                        "published_date",
                        "Datetime has wrong format. Use an RFC 3339 timestamp.",
                    );
                    None
                }
            },
            Some(None) => Some(None),
            None => None,
        };

        errors.into_result()?;
        let changes = PostChanges {
            title,
            content,
            category,
            tags,
            published_date,
        };
        if mode == WriteMode::Create {
            return Ok(PostChanges {
                category: Some(changes.category.flatten()),
                tags: Some(changes.tags.unwrap_or_default()),
                published_date: Some(changes.published_date.flatten()),
                ..changes
            });
        }
        Ok(changes)
    }
}

// ----------------- Category / Tag Request -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct NameRequest {
    pub name: Option<String>,
}

impl NameRequest {
    pub fn validate(self) -> Result<String, RequestError> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "name", self.name, Some(MAX_NAME_LEN));
        errors.into_result()?;
        name.ok_or(RequestError::ServerError)
    }
}
