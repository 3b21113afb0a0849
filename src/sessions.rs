//! In-process session registry.
//!
//! A session lives here from login until logout or expiry. The token handed to
//! the client is a signed claim naming the session; it is only honoured while
//! the session is still registered for the same user.

use std::collections::HashMap;

use rand::distributions::{Alphanumeric, DistString};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::authentication::{sign_session_token, verify_session_token};
use crate::errors::RequestError;

const SESSION_ID_LEN: usize = 32;

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    expires_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct SessionStore {
    secret: String,
    ttl: time::Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: time::Duration::hours(ttl_hours),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session for `user_id` and returns its signed token.
    pub async fn create(&self, user_id: i64) -> Result<String, RequestError> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.ttl;
        let session_id = Alphanumeric.sample_string(&mut rand::thread_rng(), SESSION_ID_LEN);
        let token = sign_session_token(&self.secret, &session_id, user_id, expires_at)
            .map_err(|e| {
                tracing::error!(error = %e, "could not sign session token");
                RequestError::ServerError
            })?;

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            session_id,
            Session {
                user_id,
                expires_at,
            },
        );
        tracing::debug!(user_id, active = sessions.len(), "session created");
        Ok(token)
    }

    /// Returns the user id behind `token` if its session is still live.
    pub async fn resolve(&self, token: &str) -> Result<i64, RequestError> {
        let (session_id, user_id) = verify_session_token(&self.secret, token)?;
        let sessions = self.sessions.read().await;
        match sessions.get(&session_id) {
            Some(session)
                if session.user_id == user_id
                    && session.expires_at > OffsetDateTime::now_utc() =>
            {
                Ok(user_id)
            }
            _ => Err(RequestError::NotAuthorized("Session has ended")),
        }
    }

    /// Drops the session named by `token`. Returns whether one was removed.
    pub async fn revoke(&self, token: &str) -> bool {
        let session_id = match verify_session_token(&self.secret, token) {
            Ok((session_id, _)) => session_id,
            Err(_) => return false,
        };
        let removed = self.sessions.write().await.remove(&session_id);
        if let Some(session) = &removed {
            tracing::debug!(user_id = session.user_id, "session revoked");
        }
        removed.is_some()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_session_resolves_to_user() {
        let store = SessionStore::new("secret", 1);
        let token = store.create(42).await.unwrap();
        assert_eq!(store.resolve(&token).await.unwrap(), 42);
        assert_eq!(store.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn revoked_session_no_longer_resolves() {
        let store = SessionStore::new("secret", 1);
        let token = store.create(42).await.unwrap();
        assert!(store.revoke(&token).await);
        assert!(matches!(
            store.resolve(&token).await,
            Err(RequestError::NotAuthorized(_))
        ));
        assert!(!store.revoke(&token).await);
        assert_eq!(store.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = SessionStore::new("secret", 1);
        let first = store.create(1).await.unwrap();
        let second = store.create(1).await.unwrap();
        store.revoke(&first).await;
        assert_eq!(store.resolve(&second).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn token_from_another_store_is_unknown() {
        let store = SessionStore::new("secret", 1);
        let other = SessionStore::new("secret", 1);
        let token = other.create(5).await.unwrap();
        assert!(store.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let store = SessionStore::new("secret", 1);
        assert!(store.resolve("not-a-token").await.is_err());
        assert!(!store.revoke("not-a-token").await);
    }
}
