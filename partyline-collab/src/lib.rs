mod auth;
mod config;
mod db;
pub mod events;
mod listeners;
mod provider;
mod requests;
mod sessions;
mod sync;
mod track;
mod util;

use std::result::Result;
use std::sync::Arc;

pub use auth::*;
pub use config::*;
pub use db::*;
pub use listeners::*;
pub use provider::*;
pub use requests::*;
pub use sessions::*;
pub use sync::*;
pub use track::*;
pub use util::*;

use events::SessionEvent;

/// The partyline collab system, facilitating session management, playback
/// synchronization, and queue moderation.
pub struct Partyline<S, P> {
    config: Config,

    pub auth: Arc<Auth<S>>,
    pub listeners: Arc<ListenerRegistry>,
    pub playback: Arc<PlaybackClient<S, P>>,
    pub sync: Arc<PlaybackSynchronizer<S, P>>,
    pub sessions: SessionManager<S, P>,
    pub requests: RequestWorkflow<S, P>,
}

impl<S, P> Partyline<S, P>
where
    S: SessionStore,
    P: PlaybackProvider,
{
    pub fn new(store: S, provider: P, config: Config) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(provider);

        let auth = Arc::new(Auth::new(&store, &config));
        let tokens = Arc::new(TokenCache::new(&store, &provider, &config));
        let playback = Arc::new(PlaybackClient::new(&tokens, &provider));
        let listeners = ListenerRegistry::new();
        let sync = Arc::new(PlaybackSynchronizer::new(&playback, &listeners));

        let sessions = SessionManager::new(&store, &auth, &playback, &provider, &listeners);
        let requests = RequestWorkflow::new(&store, &playback, &sync, &listeners);

        Self {
            config,
            auth,
            listeners,
            playback,
            sync,
            sessions,
            requests,
        }
    }

    /// Starts the playback poll loop
    pub fn start(self: &Arc<Self>) {
        self.sync.run(self.config.poll_interval());
    }

    /// Tunes a listener to a session and immediately sends it the last
    /// known playback state, so it doesn't wait out a poll cycle
    pub async fn join_session(
        &self,
        listener_id: ListenerId,
        slug: &str,
    ) -> Result<(), SessionError> {
        self.sessions.session(slug).await?;
        self.listeners.join(listener_id, slug);

        if let Some(status) = self.sync.status(slug) {
            self.listeners.send_to(
                listener_id,
                SessionEvent::Playback {
                    current: status.current,
                    queue: status.queue,
                },
            );
        }

        Ok(())
    }

    pub fn leave_session(&self, listener_id: ListenerId) {
        self.listeners.leave(listener_id);
    }

    /// Upgrades a listener to admin of the session its token names.
    /// Succeeds only if the listener is tuned to that session.
    pub fn authenticate_listener(
        &self,
        listener_id: ListenerId,
        token: &str,
    ) -> Result<String, AuthError> {
        let slug = self.auth.verify(token)?;

        if !self.listeners.authenticate_as_admin(listener_id, &slug) {
            return Err(AuthError::InvalidToken);
        }

        Ok(slug)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    struct StubProvider;

    #[async_trait]
    impl PlaybackProvider for StubProvider {
        async fn exchange_code(&self, _code: &str) -> Result<TokenData, ProviderError> {
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
            Ok(vec![])
        }

        async fn playlists(&self, _access: &str) -> Result<Vec<PlaylistOverview>, ProviderError> {
            Ok(vec![])
        }

        async fn playlist_details(
            &self,
            _access: &str,
            _playlist_id: &str,
        ) -> Result<Playlist, ProviderError> {
            Err(ProviderError::NotFound)
        }
    }

    fn setup() -> Arc<Partyline<MemorySessionStore, StubProvider>> {
        Arc::new(Partyline::new(
            MemorySessionStore::new(),
            StubProvider,
            Config::default(),
        ))
    }

    #[tokio::test]
    async fn test_joining_an_unknown_session_fails() {
        let partyline = setup();
        let handle = partyline.listeners.connect();

        let result = partyline.join_session(handle.id(), "no-such-party").await;
        assert!(matches!(result, Err(SessionError::NotFound)));
        assert!(partyline.listeners.active_slugs().is_empty());
    }

    #[tokio::test]
    async fn test_admin_token_only_works_inside_the_session() {
        let partyline = setup();

        partyline
            .sessions
            .create_session("Bob's Party", "Bob", "hunter2")
            .await
            .unwrap();

        let token = partyline
            .auth
            .authenticate("bobs-party", "hunter2")
            .await
            .unwrap();

        let handle = partyline.listeners.connect();

        // Not joined yet, so the token is refused
        assert!(partyline
            .authenticate_listener(handle.id(), &token.token)
            .is_err());

        partyline.join_session(handle.id(), "bobs-party").await.unwrap();

        let slug = partyline
            .authenticate_listener(handle.id(), &token.token)
            .unwrap();

        assert_eq!(slug, "bobs-party");
    }
}
