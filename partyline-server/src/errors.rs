use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use partyline_collab::{
    AuthError, ProviderError, RequestError, SessionError, SessionStoreError,
};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Session name is taken")]
    NameTaken,
    #[error("Session name is not valid")]
    InvalidName,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    Unauthorized,
    #[error("Session is not linked to a provider account")]
    NotLinked,
    #[error("Provider authorization expired, the session must be re-linked")]
    ProviderAuthExpired,
    #[error("Playback provider is unavailable")]
    ProviderUnavailable,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NameTaken => StatusCode::CONFLICT,
            Self::InvalidName => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotLinked => StatusCode::CONFLICT,
            Self::ProviderAuthExpired => StatusCode::CONFLICT,
            Self::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidToken => Self::Unauthorized,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<SessionStoreError> for ServerError {
    fn from(value: SessionStoreError) -> Self {
        match value {
            SessionStoreError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            SessionStoreError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::NotLinked => Self::NotLinked,
            ProviderError::AuthExpired => Self::ProviderAuthExpired,
            ProviderError::NotFound => Self::NotFound {
                resource: "provider resource",
                identifier: "id",
            },
            ProviderError::Unavailable(_) => Self::ProviderUnavailable,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::NotFound => Self::NotFound {
                resource: "session",
                identifier: "slug",
            },
            SessionError::NameTaken(_) => Self::NameTaken,
            SessionError::InvalidName(_) => Self::InvalidName,
            SessionError::Auth(e) => e.into(),
            SessionError::Provider(e) => e.into(),
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<RequestError> for ServerError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::ProviderUnavailable => Self::ProviderUnavailable,
            RequestError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_expired_provider_auth_is_not_reported_as_unlinked() {
        let expired: ServerError = ProviderError::AuthExpired.into();
        let unlinked: ServerError = ProviderError::NotLinked.into();

        assert!(matches!(expired, ServerError::ProviderAuthExpired));
        assert!(matches!(unlinked, ServerError::NotLinked));
    }
}
