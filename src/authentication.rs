use std::sync::Arc;

use crate::errors::RequestError;
use crate::sessions::SessionStore;
use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaim {
    sid: String,
    id: i64,
    exp: i64,
}

/// The caller behind a valid session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
}

/// The caller if a token was presented, `None` for anonymous requests.
pub struct MaybeUser(pub Option<AuthUser>);

/// The raw token from the `Authorization` header, unverified.
pub struct SessionToken(pub Option<String>);

fn token_from_parts(parts: &Parts) -> Result<Option<&str>, RequestError> {
    let header = match parts.headers.get("Authorization") {
        Some(header) => header,
        None => return Ok(None),
    };
    let header = header.to_str().map_err(|_| {
        tracing::debug!("authorization header is not valid ascii");
        RequestError::NotAuthorized("Invalid token")
    })?;
    match header.strip_prefix("Token ") {
        Some(token) => Ok(Some(token.trim())),
        None => {
            tracing::debug!("authorization header without Token prefix");
            Err(RequestError::NotAuthorized("Invalid token"))
        }
    }
}

fn session_store(parts: &Parts) -> Result<Arc<SessionStore>, RequestError> {
    parts
        .extensions
        .get::<Arc<SessionStore>>()
        .cloned()
        .ok_or_else(|| {
            tracing::error!("session store missing from request extensions");
            RequestError::ServerError
        })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = match token_from_parts(parts)? {
            Some(token) => token.to_string(),
            None => return Ok(MaybeUser(None)),
        };
        let id = session_store(parts)?.resolve(&token).await?;
        Ok(MaybeUser(Some(AuthUser { id })))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(user),
            MaybeUser(None) => Err(RequestError::NotAuthorized(
                "Authentication credentials were not provided.",
            )),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync + 'static,
{
    type Rejection = std::convert::Infallible;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok().flatten().map(str::to_string);
        Ok(SessionToken(token))
    }
}

pub fn sign_session_token(
    secret: &str,
    session_id: &str,
    user_id: i64,
    expires_at: OffsetDateTime,
) -> Result<String> {
    let claim = SessionClaim {
        sid: session_id.to_string(),
        id: user_id,
        exp: expires_at.unix_timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claim,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_ref()),
    )
    .context("Failed to sign session token")
}

/// Checks signature and expiry, returning `(session_id, user_id)`.
pub fn verify_session_token(secret: &str, token: &str) -> Result<(String, i64), RequestError> {
    let token_data = jsonwebtoken::decode::<SessionClaim>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        RequestError::NotAuthorized("Invalid token")
    })?;
    let claim = token_data.claims;
    if claim.exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(RequestError::NotAuthorized("Token expired"));
    }
    Ok((claim.sid, claim.id))
}

pub async fn verify_password_argon2(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Stored password hash is malformed"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}
