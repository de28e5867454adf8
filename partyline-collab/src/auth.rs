use std::sync::Arc;

use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Config, SessionStore, SessionStoreError};

/// Handles admin authentication for sessions
pub struct Auth<S> {
    store: Arc<S>,
    config: Config,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The session password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The supplied admin token is invalid or expired
    #[error("Invalid or expired token")]
    InvalidToken,
    /// Something else went wrong with the store
    #[error(transparent)]
    Store(SessionStoreError),
    #[error("HashError: {0}")]
    HashError(String),
}

/// A signed, time-limited token proving admin control over one session
#[derive(Debug, Clone)]
pub struct AdminToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The claims carried by an [AdminToken]. The subject is the session slug.
#[derive(Debug, Serialize, Deserialize)]
struct AdminClaims {
    sub: String,
    exp: i64,
}

impl<S> Auth<S>
where
    S: SessionStore,
{
    pub fn new(store: &Arc<S>, config: &Config) -> Self {
        Self {
            store: store.clone(),
            config: config.clone(),
            argon: Argon2::default(),
        }
    }

    /// Verifies a session password, returning an admin token on success
    pub async fn authenticate(&self, slug: &str, password: &str) -> Result<AdminToken, AuthError> {
        let hash = self
            .store
            .password_hash(slug)
            .await
            .map_err(|e| match e {
                SessionStoreError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Store(err),
            })?;

        let stored_password = PasswordHash::parse(&hash, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + self.config.admin_token_expiry();

        let claims = AdminClaims {
            sub: slug.to_string(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret_key.as_bytes()),
        )
        .map_err(|e| AuthError::HashError(e.to_string()))?;

        Ok(AdminToken { token, expires_at })
    }

    /// Verifies an admin token, returning the session slug it names.
    /// Expiry is enforced on every call.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let decoded = decode::<AdminClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret_key.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(decoded.claims.sub)
    }

    /// Hashes a session password for storage
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::HashError(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemorySessionStore, NewSession};

    async fn setup() -> (Auth<MemorySessionStore>, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let auth = Auth::new(&store, &Config::default());

        let hash = auth.hash_password("hunter2").expect("password hashes");

        store
            .create_session(NewSession {
                slug: "bobs-party".to_string(),
                name: "Bob's Party".to_string(),
                host: "Bob".to_string(),
                password_hash: hash,
            })
            .await
            .expect("session is created");

        (auth, store)
    }

    #[tokio::test]
    async fn test_token_names_the_session() {
        let (auth, _store) = setup().await;

        let token = auth
            .authenticate("bobs-party", "hunter2")
            .await
            .expect("authentication succeeds");

        assert_eq!(auth.verify(&token.token).expect("token verifies"), "bobs-party");
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let (auth, _store) = setup().await;

        let result = auth.authenticate("bobs-party", "letmein").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let (auth, _store) = setup().await;

        let result = auth.authenticate("no-such-party", "hunter2").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let (auth, _store) = setup().await;

        assert!(auth.verify("not-a-token").is_err());
    }
}
