use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

use crate::Track;

pub type Result<T> = std::result::Result<T, SessionStoreError>;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the store doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoStoreError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> SessionStoreError;
    fn any(self) -> SessionStoreError;
}

/// Represents a type that can persist partyline sessions and their
/// queued-track and request history
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn session_by_slug(&self, slug: &str) -> Result<SessionData>;
    async fn list_sessions(&self) -> Result<Vec<SessionData>>;
    /// Deletes a session, cascading its queued tracks, requests, and tokens
    async fn delete_session(&self, slug: &str) -> Result<()>;

    async fn set_playlist(&self, slug: &str, playlist_id: &str) -> Result<()>;
    async fn remove_playlist(&self, slug: &str) -> Result<()>;
    async fn set_approval_required(&self, slug: &str, required: bool) -> Result<()>;
    async fn set_provider_user(&self, slug: &str, user: Option<&ProviderUserData>) -> Result<()>;
    async fn password_hash(&self, slug: &str) -> Result<String>;

    async fn queued_tracks(&self, slug: &str) -> Result<Vec<QueuedTrackData>>;
    /// Appends a track to the session's queued-track log.
    /// Returns a conflict if the track was queued before.
    async fn insert_queued_track(
        &self,
        slug: &str,
        track_id: &str,
        requested_by_guest: bool,
    ) -> Result<QueuedTrackData>;

    async fn insert_request(&self, slug: &str, track: &Track) -> Result<RequestData>;
    async fn request_by_id(&self, slug: &str, request_id: PrimaryKey) -> Result<RequestData>;
    async fn pending_requests(&self, slug: &str) -> Result<Vec<RequestData>>;
    /// Applies a decision to a pending request. Returns false without
    /// changing anything if the request was already decided, so the first
    /// decision always wins.
    async fn update_request_decision(
        &self,
        slug: &str,
        request_id: PrimaryKey,
        approved: bool,
    ) -> Result<bool>;

    async fn tokens(&self, slug: &str) -> Result<Option<TokenData>>;
    async fn update_tokens(&self, slug: &str, tokens: &TokenData) -> Result<()>;
    async fn discard_tokens(&self, slug: &str) -> Result<()>;
}
