use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    events::SessionEvent, slugify, Auth, AuthError, ListenerRegistry, NewSession, PlaybackClient,
    PlaybackProvider, Playlist, ProviderError, SessionData, SessionStore, SessionStoreError,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session name {0} is taken")]
    NameTaken(String),
    /// The name slugifies to nothing, so it can never be addressed
    #[error("Session name {0} is not valid")]
    InvalidName(String),
    #[error("Session does not exist")]
    NotFound,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(SessionStoreError),
}

/// Manages the lifecycle of sessions: creation, playlist binding, and
/// provider account linking
pub struct SessionManager<S, P> {
    store: Arc<S>,
    auth: Arc<Auth<S>>,
    playback: Arc<PlaybackClient<S, P>>,
    provider: Arc<P>,
    listeners: Arc<ListenerRegistry>,
}

impl<S, P> SessionManager<S, P>
where
    S: SessionStore,
    P: PlaybackProvider,
{
    pub fn new(
        store: &Arc<S>,
        auth: &Arc<Auth<S>>,
        playback: &Arc<PlaybackClient<S, P>>,
        provider: &Arc<P>,
        listeners: &Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            store: store.clone(),
            auth: auth.clone(),
            playback: playback.clone(),
            provider: provider.clone(),
            listeners: listeners.clone(),
        }
    }

    /// Creates a session. The slug is derived from the name and taken by
    /// the first session to claim it.
    pub async fn create_session(
        &self,
        name: &str,
        host: &str,
        password: &str,
    ) -> Result<SessionData, SessionError> {
        let slug = slugify(name);

        if slug.is_empty() {
            return Err(SessionError::InvalidName(name.to_string()));
        }

        let password_hash = self.auth.hash_password(password)?;

        let session = self
            .store
            .create_session(NewSession {
                slug,
                name: name.to_string(),
                host: host.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                SessionStoreError::Conflict { .. } => SessionError::NameTaken(name.to_string()),
                err => SessionError::Store(err),
            })?;

        info!("Session {} created by {}", session.slug, session.host);

        Ok(session)
    }

    pub async fn session(&self, slug: &str) -> Result<SessionData, SessionError> {
        self.store.session_by_slug(slug).await.map_err(not_found)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionData>, SessionError> {
        self.store.list_sessions().await.map_err(SessionError::Store)
    }

    /// Deletes a session along with its queued-track log, its requests,
    /// and its tokens
    pub async fn delete_session(&self, slug: &str) -> Result<(), SessionError> {
        self.store.delete_session(slug).await.map_err(not_found)?;

        info!("Session {} deleted", slug);
        Ok(())
    }

    pub async fn set_approval_required(
        &self,
        slug: &str,
        required: bool,
    ) -> Result<(), SessionError> {
        self.store
            .set_approval_required(slug, required)
            .await
            .map_err(not_found)
    }

    /// Binds one of the linked account's playlists to the session and
    /// announces it to the room
    pub async fn bind_playlist(
        &self,
        slug: &str,
        playlist_id: &str,
    ) -> Result<Playlist, SessionError> {
        let playlist = self.playback.playlist_details(slug, playlist_id).await?;

        self.store
            .set_playlist(slug, playlist_id)
            .await
            .map_err(not_found)?;

        self.listeners.broadcast(
            slug,
            SessionEvent::NewPlaylist {
                playlist: playlist.overview(),
            },
        );

        Ok(playlist)
    }

    pub async fn unbind_playlist(&self, slug: &str) -> Result<(), SessionError> {
        self.store.remove_playlist(slug).await.map_err(not_found)?;
        self.listeners.broadcast(slug, SessionEvent::PlaylistRemoved);

        Ok(())
    }

    /// Links a provider account to the session by exchanging the OAuth
    /// authorization code the admin brought back from the provider
    pub async fn link_provider(&self, slug: &str, code: &str) -> Result<SessionData, SessionError> {
        // The session has to exist before tokens are accepted for it
        self.session(slug).await?;

        let tokens = self.provider.exchange_code(code).await?;

        self.playback.tokens().store_tokens(slug, tokens).await?;

        let user = self.playback.profile(slug).await?;

        self.store
            .set_provider_user(slug, Some(&user))
            .await
            .map_err(SessionError::Store)?;

        info!("Session {} linked to provider account {}", slug, user.id);

        self.session(slug).await
    }

    /// Unlinks the provider account, discarding its tokens
    pub async fn unlink_provider(&self, slug: &str) -> Result<(), SessionError> {
        self.session(slug).await?;

        self.playback.tokens().discard(slug).await?;

        self.store
            .set_provider_user(slug, None)
            .await
            .map_err(SessionError::Store)?;

        info!("Session {} unlinked from its provider account", slug);
        Ok(())
    }
}

fn not_found(e: SessionStoreError) -> SessionError {
    match e {
        SessionStoreError::NotFound { .. } => SessionError::NotFound,
        err => SessionError::Store(err),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        Album, Artist, Config, MemorySessionStore, PlayingStatus, PlaylistOverview,
        ProviderUserData, TokenCache, TokenData, Track,
    };
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// A provider with one account and one playlist
    struct SinglePlaylistProvider;

    fn fixture_track() -> Track {
        Track {
            id: "track-1".to_string(),
            name: "Track".to_string(),
            album: Album {
                id: "album".to_string(),
                name: "Album".to_string(),
                art: String::new(),
                artists: vec![],
            },
            artists: vec![Artist {
                id: "artist".to_string(),
                name: "Artist".to_string(),
            }],
            duration_ms: 180_000,
        }
    }

    #[async_trait]
    impl crate::PlaybackProvider for SinglePlaylistProvider {
        async fn exchange_code(&self, code: &str) -> Result<TokenData, ProviderError> {
            if code != "good-code" {
                return Err(ProviderError::AuthExpired);
            }

            Ok(TokenData {
                access: "access".to_string(),
                refresh: "refresh".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }

        async fn refresh_tokens(&self, _refresh: &str) -> Result<TokenData, ProviderError> {
            unimplemented!()
        }

        async fn profile(&self, _access: &str) -> Result<ProviderUserData, ProviderError> {
            Ok(ProviderUserData {
                id: "bob".to_string(),
                name: "Bob".to_string(),
                image: None,
            })
        }

        async fn playback_snapshot(&self, _access: &str) -> Result<PlayingStatus, ProviderError> {
            Ok(PlayingStatus::default())
        }

        async fn enqueue(&self, _access: &str, _track_id: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn search_tracks(
            &self,
            _access: &str,
            _query: &str,
        ) -> Result<Vec<Track>, ProviderError> {
            Ok(vec![fixture_track()])
        }

        async fn playlists(&self, _access: &str) -> Result<Vec<PlaylistOverview>, ProviderError> {
            Ok(vec![])
        }

        async fn playlist_details(
            &self,
            _access: &str,
            playlist_id: &str,
        ) -> Result<Playlist, ProviderError> {
            if playlist_id != "party-hits" {
                return Err(ProviderError::NotFound);
            }

            Ok(Playlist {
                id: "party-hits".to_string(),
                url: "https://example.com/party-hits".to_string(),
                name: "Party Hits".to_string(),
                art: String::new(),
                tracks: vec![fixture_track()],
            })
        }
    }

    fn setup() -> (
        SessionManager<MemorySessionStore, SinglePlaylistProvider>,
        Arc<MemorySessionStore>,
        Arc<ListenerRegistry>,
    ) {
        let store = Arc::new(MemorySessionStore::new());
        let provider = Arc::new(SinglePlaylistProvider);
        let config = Config::default();

        let auth = Arc::new(Auth::new(&store, &config));
        let tokens = Arc::new(TokenCache::new(&store, &provider, &config));
        let playback = Arc::new(PlaybackClient::new(&tokens, &provider));
        let listeners = ListenerRegistry::new();

        let manager = SessionManager::new(&store, &auth, &playback, &provider, &listeners);

        (manager, store, listeners)
    }

    #[tokio::test]
    async fn test_created_sessions_get_slugs() {
        let (manager, _store, _listeners) = setup();

        let session = manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        assert_eq!(session.slug, "bobs-party");
        assert!(!session.approval_required);
    }

    #[tokio::test]
    async fn test_session_names_must_be_unique() {
        let (manager, _store, _listeners) = setup();

        manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        let result = manager.create_session("Bobs Party!", "Alice", "other").await;
        assert!(matches!(result, Err(SessionError::NameTaken(_))));
    }

    #[tokio::test]
    async fn test_unsluggable_names_are_rejected() {
        let (manager, _store, _listeners) = setup();

        let result = manager.create_session("???", "Bob", "hunter2").await;
        assert!(matches!(result, Err(SessionError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_linking_records_the_provider_account() {
        let (manager, store, _listeners) = setup();

        manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        let session = manager.link_provider("bobs-party", "good-code").await.unwrap();

        assert_eq!(
            session.provider_user.map(|u| u.id),
            Some("bob".to_string())
        );
        assert!(store.tokens("bobs-party").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bad_code_does_not_link() {
        let (manager, store, _listeners) = setup();

        manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        let result = manager.link_provider("bobs-party", "bad-code").await;

        assert!(matches!(
            result,
            Err(SessionError::Provider(ProviderError::AuthExpired))
        ));
        assert!(store.tokens("bobs-party").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unlinking_discards_tokens() {
        let (manager, store, _listeners) = setup();

        manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        manager.link_provider("bobs-party", "good-code").await.unwrap();
        manager.unlink_provider("bobs-party").await.unwrap();

        assert!(store.tokens("bobs-party").await.unwrap().is_none());

        let session = store.session_by_slug("bobs-party").await.unwrap();
        assert!(session.provider_user.is_none());
    }

    #[tokio::test]
    async fn test_binding_a_playlist_announces_it() {
        let (manager, store, listeners) = setup();

        manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        manager.link_provider("bobs-party", "good-code").await.unwrap();

        let handle = listeners.connect();
        listeners.join(handle.id(), "bobs-party");

        let playlist = manager
            .bind_playlist("bobs-party", "party-hits")
            .await
            .unwrap();

        assert_eq!(playlist.tracks.len(), 1);
        assert_eq!(handle.pending_len(), 2);

        let session = store.session_by_slug("bobs-party").await.unwrap();
        assert_eq!(session.playlist_id.as_deref(), Some("party-hits"));
    }

    #[tokio::test]
    async fn test_unknown_playlists_do_not_bind() {
        let (manager, store, _listeners) = setup();

        manager
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        manager.link_provider("bobs-party", "good-code").await.unwrap();

        let result = manager.bind_playlist("bobs-party", "no-such-playlist").await;

        assert!(matches!(
            result,
            Err(SessionError::Provider(ProviderError::NotFound))
        ));

        let session = store.session_by_slug("bobs-party").await.unwrap();
        assert!(session.playlist_id.is_none());
    }

    #[tokio::test]
    async fn test_deleting_an_unknown_session_is_not_found() {
        let (manager, _store, _listeners) = setup();

        let result = manager.delete_session("no-such-party").await;
        assert!(matches!(result, Err(SessionError::NotFound)));
    }
}
