use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
};

use crate::{context::ServerContext, errors::ServerError};

/// Proof that the request carries a valid admin token.
/// Holds the slug of the session the token grants control over.
pub struct Admin(String);

impl Admin {
    /// Checks that the token grants control over the given session
    pub fn ensure(&self, slug: &str) -> Result<(), ServerError> {
        if self.0 != slug {
            return Err(ServerError::Unauthorized);
        }

        Ok(())
    }

    pub fn slug(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Admin {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = header.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let slug = context
            .partyline
            .auth
            .verify(token)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

        Ok(Self(slug))
    }
}
