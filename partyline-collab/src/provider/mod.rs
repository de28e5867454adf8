use async_trait::async_trait;
use log::warn;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

mod spotify;
mod tokens;

pub use spotify::*;
pub use tokens::*;

use crate::{Playlist, PlaylistOverview, ProviderUserData, SessionStore, TokenData, Track};

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No provider account is linked to the session. A valid precondition
    /// failure, not a fault.
    #[error("Session is not linked to a provider account")]
    NotLinked,
    /// The token refresh failed terminally. The admin has to re-link.
    #[error("Provider authorization expired")]
    AuthExpired,
    /// The requested resource doesn't exist on the provider side
    #[error("Resource was not found")]
    NotFound,
    /// The provider rejected a request it already carried out
    #[error("Provider rejected a duplicate request")]
    Conflict,
    /// Network error, timeout, or a 5xx. Transient; callers retry next cycle.
    #[error("Provider is unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to parse provider response: {0}")]
    ParseError(String),
}

/// The playback state of a session as last observed from the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayingStatus {
    pub current: Option<Track>,
    pub queue: Vec<Track>,
}

/// Represents the external playback service a session plays through.
/// Implementations talk to the wire; access tokens are passed in by the
/// [TokenCache].
#[async_trait]
pub trait PlaybackProvider: Send + Sync + 'static {
    /// Exchanges an authorization code for a token pair
    async fn exchange_code(&self, code: &str) -> Result<TokenData, ProviderError>;

    /// Trades a refresh token for a fresh token pair
    async fn refresh_tokens(&self, refresh: &str) -> Result<TokenData, ProviderError>;

    /// Fetches the profile of the account the token belongs to
    async fn profile(&self, access: &str) -> Result<ProviderUserData, ProviderError>;

    /// Fetches the current track and upcoming queue. An empty player is a
    /// valid result, not an error.
    async fn playback_snapshot(&self, access: &str) -> Result<PlayingStatus, ProviderError>;

    /// Adds a track to the playback queue
    async fn enqueue(&self, access: &str, track_id: &str) -> Result<(), ProviderError>;

    async fn search_tracks(&self, access: &str, query: &str)
        -> Result<Vec<Track>, ProviderError>;

    async fn playlists(&self, access: &str) -> Result<Vec<PlaylistOverview>, ProviderError>;

    async fn playlist_details(
        &self,
        access: &str,
        playlist_id: &str,
    ) -> Result<Playlist, ProviderError>;
}

/// The boundary between sessions and the playback provider. Routes every
/// call through the [TokenCache] and absorbs transient failures on the
/// guest-facing paths, so a flaky provider never breaks a guest's view.
pub struct PlaybackClient<S, P> {
    tokens: Arc<TokenCache<S, P>>,
    provider: Arc<P>,
}

impl<S, P> PlaybackClient<S, P>
where
    S: SessionStore,
    P: PlaybackProvider,
{
    pub fn new(tokens: &Arc<TokenCache<S, P>>, provider: &Arc<P>) -> Self {
        Self {
            tokens: tokens.clone(),
            provider: provider.clone(),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenCache<S, P>> {
        &self.tokens
    }

    /// Fetches the playback snapshot for a session. Degrades to `None` on
    /// any failure, which callers treat as "try again next cycle".
    pub async fn snapshot(&self, slug: &str) -> Option<PlayingStatus> {
        let token = match self.tokens.get_valid(slug).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not get a token for session {}: {}", slug, e);
                return None;
            }
        };

        match self.provider.playback_snapshot(&token.access).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Snapshot fetch failed for session {}: {}", slug, e);
                None
            }
        }
    }

    /// Adds a track to the session's playback queue. A provider rejection
    /// because the track is already playing or queued counts as success.
    pub async fn enqueue(&self, slug: &str, track_id: &str) -> bool {
        let token = match self.tokens.get_valid(slug).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not get a token for session {}: {}", slug, e);
                return false;
            }
        };

        match self.provider.enqueue(&token.access, track_id).await {
            Ok(()) | Err(ProviderError::Conflict) => true,
            Err(e) => {
                warn!("Enqueue of {} failed for session {}: {}", track_id, slug, e);
                false
            }
        }
    }

    /// Searches the provider's catalog. A failed or rejected query is an
    /// empty result, not an error.
    pub async fn search(&self, slug: &str, query: &str) -> Vec<Track> {
        let token = match self.tokens.get_valid(slug).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not get a token for session {}: {}", slug, e);
                return vec![];
            }
        };

        match self.provider.search_tracks(&token.access, query).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Search failed for session {}: {}", slug, e);
                vec![]
            }
        }
    }

    /// Lists the playlists of the linked account. Admin-facing: auth
    /// failures surface instead of degrading.
    pub async fn playlists(&self, slug: &str) -> Result<Vec<PlaylistOverview>, ProviderError> {
        let token = self.tokens.get_valid(slug).await?;
        self.provider.playlists(&token.access).await
    }

    /// Fetches a playlist with its full track listing. Admin-facing.
    pub async fn playlist_details(
        &self,
        slug: &str,
        playlist_id: &str,
    ) -> Result<Playlist, ProviderError> {
        let token = self.tokens.get_valid(slug).await?;
        self.provider.playlist_details(&token.access, playlist_id).await
    }

    /// Fetches the linked account's profile. Admin-facing.
    pub async fn profile(&self, slug: &str) -> Result<ProviderUserData, ProviderError> {
        let token = self.tokens.get_valid(slug).await?;
        self.provider.profile(&token.access).await
    }
}
