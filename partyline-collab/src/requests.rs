use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    events::SessionEvent, ListenerRegistry, PlaybackClient, PlaybackProvider,
    PlaybackSynchronizer, PrimaryKey, QueuedTrackData, RequestData, SessionStore,
    SessionStoreError, Track,
};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    /// The provider would not take the track. The submission is not
    /// recorded, so the guest can try again.
    #[error("Playback provider could not queue the track")]
    ProviderUnavailable,
}

/// What happened to a submitted track
#[derive(Debug)]
pub enum QueueOutcome {
    /// The track went straight to the playback queue
    Queued(QueuedTrackData),
    /// The track awaits an admin decision
    Requested(PrimaryKey),
    /// The track was queued in this session before, nothing was done
    AlreadyQueued,
    /// An identical submission is already awaiting a decision
    AlreadyRequested(PrimaryKey),
}

/// What happened to an admin's decision
#[derive(Debug)]
pub enum DecisionOutcome {
    Approved(QueuedTrackData),
    Rejected,
    /// Another admin got there first, nothing was done
    AlreadyDecided,
}

/// Walks guest submissions through moderation and into the playback queue.
/// Every track is queued at most once per session, and every request is
/// decided at most once.
pub struct RequestWorkflow<S, P> {
    store: Arc<S>,
    playback: Arc<PlaybackClient<S, P>>,
    sync: Arc<PlaybackSynchronizer<S, P>>,
    listeners: Arc<ListenerRegistry>,
}

impl<S, P> RequestWorkflow<S, P>
where
    S: SessionStore,
    P: PlaybackProvider,
{
    pub fn new(
        store: &Arc<S>,
        playback: &Arc<PlaybackClient<S, P>>,
        sync: &Arc<PlaybackSynchronizer<S, P>>,
        listeners: &Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            store: store.clone(),
            playback: playback.clone(),
            sync: sync.clone(),
            listeners: listeners.clone(),
        }
    }

    /// Takes a track submission. Admins and sessions without moderation go
    /// straight to the queue, everything else becomes a pending request.
    pub async fn submit(
        &self,
        slug: &str,
        track: Track,
        submitter_is_admin: bool,
    ) -> Result<QueueOutcome, RequestError> {
        let session = self.store.session_by_slug(slug).await?;

        let already_queued = self
            .store
            .queued_tracks(slug)
            .await?
            .iter()
            .any(|q| q.track_id == track.id);

        if already_queued {
            return Ok(QueueOutcome::AlreadyQueued);
        }

        if submitter_is_admin || !session.approval_required {
            return self.queue_track(slug, &track, !submitter_is_admin).await;
        }

        let pending = self
            .store
            .pending_requests(slug)
            .await?
            .into_iter()
            .find(|r| r.track.id == track.id);

        if let Some(existing) = pending {
            return Ok(QueueOutcome::AlreadyRequested(existing.id));
        }

        let request = self.store.insert_request(slug, &track).await?;

        info!("New request {} in session {}", request.id, slug);

        self.listeners.broadcast_to_admins(
            slug,
            SessionEvent::NewRequest {
                request_id: request.id,
                track,
            },
        );

        Ok(QueueOutcome::Requested(request.id))
    }

    /// Applies an admin's decision to a pending request. The first decision
    /// wins and an approved track goes to the playback queue.
    pub async fn decide(
        &self,
        slug: &str,
        request_id: PrimaryKey,
        approve: bool,
    ) -> Result<DecisionOutcome, RequestError> {
        let request = self.store.request_by_id(slug, request_id).await?;

        if request.is_decided() {
            return Ok(DecisionOutcome::AlreadyDecided);
        }

        let won = self
            .store
            .update_request_decision(slug, request_id, approve)
            .await?;

        if !won {
            return Ok(DecisionOutcome::AlreadyDecided);
        }

        if !approve {
            info!("Request {} in session {} rejected", request_id, slug);
            return Ok(DecisionOutcome::Rejected);
        }

        match self.queue_track(slug, &request.track, true).await? {
            QueueOutcome::Queued(data) => Ok(DecisionOutcome::Approved(data)),
            // Lost a race against a direct submission of the same track.
            // The decision stands and the track is playing either way.
            _ => {
                let data = self.queued_log_entry(slug, &request.track.id).await?;
                Ok(DecisionOutcome::Approved(data))
            }
        }
    }

    pub async fn pending(&self, slug: &str) -> Result<Vec<RequestData>, RequestError> {
        Ok(self.store.pending_requests(slug).await?)
    }

    /// Pushes a track to the provider and records it in the queued-track
    /// log, then refreshes the session so listeners see it right away
    async fn queue_track(
        &self,
        slug: &str,
        track: &Track,
        requested_by_guest: bool,
    ) -> Result<QueueOutcome, RequestError> {
        if !self.playback.enqueue(slug, &track.id).await {
            return Err(RequestError::ProviderUnavailable);
        }

        let data = match self
            .store
            .insert_queued_track(slug, &track.id, requested_by_guest)
            .await
        {
            Ok(data) => data,
            Err(SessionStoreError::Conflict { .. }) => {
                warn!(
                    "Track {} was queued concurrently in session {}",
                    track.id, slug
                );
                return Ok(QueueOutcome::AlreadyQueued);
            }
            Err(e) => return Err(e.into()),
        };

        self.sync.refresh_session(slug).await;

        let status = self.sync.status(slug).unwrap_or_default();

        self.listeners.broadcast(
            slug,
            SessionEvent::QueuedTrack {
                id: track.id.clone(),
                queued_at: data.queued_at,
                current: status.current,
                queue: status.queue,
            },
        );

        info!("Queued track {} in session {}", track.id, slug);

        Ok(QueueOutcome::Queued(data))
    }

    async fn queued_log_entry(
        &self,
        slug: &str,
        track_id: &str,
    ) -> Result<QueuedTrackData, RequestError> {
        self.store
            .queued_tracks(slug)
            .await?
            .into_iter()
            .find(|q| q.track_id == track_id)
            .ok_or(RequestError::Store(SessionStoreError::NotFound {
                resource: "queued track",
                identifier: "track_id",
            }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        Album, Artist, Config, MemorySessionStore, NewSession, Playlist, PlaylistOverview,
        PlayingStatus, ProviderError, ProviderUserData, TokenCache, TokenData,
    };
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;

    /// Records every enqueue it receives
    #[derive(Default)]
    struct RecordingProvider {
        enqueued: Mutex<Vec<String>>,
        unreachable: Mutex<bool>,
    }

    impl RecordingProvider {
        fn enqueued(&self) -> Vec<String> {
            self.enqueued.lock().clone()
        }

        fn go_offline(&self) {
            *self.unreachable.lock() = true;
        }
    }

    #[async_trait]
    impl PlaybackProvider for RecordingProvider {
        async fn exchange_code(&self, _code: &str) -> Result<TokenData, ProviderError> {
            unimplemented!()
        }

        async fn refresh_tokens(&self, _refresh: &str) -> Result<TokenData, ProviderError> {
            unimplemented!()
        }

        async fn profile(&self, _access: &str) -> Result<ProviderUserData, ProviderError> {
            unimplemented!()
        }

        async fn playback_snapshot(&self, _access: &str) -> Result<PlayingStatus, ProviderError> {
            Ok(PlayingStatus::default())
        }

        async fn enqueue(&self, _access: &str, track_id: &str) -> Result<(), ProviderError> {
            if *self.unreachable.lock() {
                return Err(ProviderError::Unavailable("offline".to_string()));
            }

            self.enqueued.lock().push(track_id.to_string());
            Ok(())
        }

        async fn search_tracks(
            &self,
            _access: &str,
            _query: &str,
        ) -> Result<Vec<Track>, ProviderError> {
            unimplemented!()
        }

        async fn playlists(&self, _access: &str) -> Result<Vec<PlaylistOverview>, ProviderError> {
            unimplemented!()
        }

        async fn playlist_details(
            &self,
            _access: &str,
            _playlist_id: &str,
        ) -> Result<Playlist, ProviderError> {
            unimplemented!()
        }
    }

    struct Setup {
        store: Arc<MemorySessionStore>,
        provider: Arc<RecordingProvider>,
        listeners: Arc<ListenerRegistry>,
        workflow: RequestWorkflow<MemorySessionStore, RecordingProvider>,
    }

    async fn setup(approval_required: bool) -> Setup {
        let store = Arc::new(MemorySessionStore::new());
        let provider = Arc::new(RecordingProvider::default());
        let config = Config::default();

        store
            .create_session(NewSession {
                slug: "bobs-party".to_string(),
                name: "Bob's Party".to_string(),
                host: "Bob".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        store
            .set_approval_required("bobs-party", approval_required)
            .await
            .unwrap();

        store
            .update_tokens(
                "bobs-party",
                &TokenData {
                    access: "access".to_string(),
                    refresh: "refresh".to_string(),
                    expires_at: Utc::now() + Duration::hours(1),
                },
            )
            .await
            .unwrap();

        let tokens = Arc::new(TokenCache::new(&store, &provider, &config));
        let playback = Arc::new(PlaybackClient::new(&tokens, &provider));
        let listeners = ListenerRegistry::new();
        let sync = Arc::new(PlaybackSynchronizer::new(&playback, &listeners));

        let workflow = RequestWorkflow::new(&store, &playback, &sync, &listeners);

        Setup {
            store,
            provider,
            listeners,
            workflow,
        }
    }

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
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

    #[tokio::test]
    async fn test_guest_submission_queues_directly_without_moderation() {
        let setup = setup(false).await;

        let outcome = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        assert!(matches!(outcome, QueueOutcome::Queued(_)));
        assert_eq!(setup.provider.enqueued(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_repeat_submission_is_dropped() {
        let setup = setup(false).await;

        setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        let outcome = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        assert!(matches!(outcome, QueueOutcome::AlreadyQueued));
        assert_eq!(setup.provider.enqueued().len(), 1);
    }

    #[tokio::test]
    async fn test_moderated_guest_submission_becomes_a_request() {
        let setup = setup(true).await;

        let outcome = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        assert!(matches!(outcome, QueueOutcome::Requested(_)));
        assert!(setup.provider.enqueued().is_empty());
        assert_eq!(setup.workflow.pending("bobs-party").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admins_bypass_moderation() {
        let setup = setup(true).await;

        let outcome = setup
            .workflow
            .submit("bobs-party", track("a"), true)
            .await
            .unwrap();

        assert!(matches!(outcome, QueueOutcome::Queued(_)));
        assert_eq!(setup.provider.enqueued(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_pending_submission_is_deduplicated() {
        let setup = setup(true).await;

        let first = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        let QueueOutcome::Requested(id) = first else {
            panic!("expected a request");
        };

        let second = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        assert!(matches!(second, QueueOutcome::AlreadyRequested(other) if other == id));
        assert_eq!(setup.workflow.pending("bobs-party").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approval_queues_the_track() {
        let setup = setup(true).await;

        let QueueOutcome::Requested(id) = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap()
        else {
            panic!("expected a request");
        };

        let outcome = setup.workflow.decide("bobs-party", id, true).await.unwrap();

        assert!(matches!(outcome, DecisionOutcome::Approved(_)));
        assert_eq!(setup.provider.enqueued(), vec!["a".to_string()]);
        assert!(setup.workflow.pending("bobs-party").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_never_touches_the_queue() {
        let setup = setup(true).await;

        let QueueOutcome::Requested(id) = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap()
        else {
            panic!("expected a request");
        };

        let outcome = setup.workflow.decide("bobs-party", id, false).await.unwrap();

        assert!(matches!(outcome, DecisionOutcome::Rejected));
        assert!(setup.provider.enqueued().is_empty());
    }

    #[tokio::test]
    async fn test_first_decision_wins() {
        let setup = setup(true).await;

        let QueueOutcome::Requested(id) = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap()
        else {
            panic!("expected a request");
        };

        let first = setup.workflow.decide("bobs-party", id, false).await.unwrap();
        let second = setup.workflow.decide("bobs-party", id, true).await.unwrap();

        assert!(matches!(first, DecisionOutcome::Rejected));
        assert!(matches!(second, DecisionOutcome::AlreadyDecided));
        assert!(setup.provider.enqueued().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_decisions_apply_exactly_once() {
        let setup = setup(true).await;
        let setup = Arc::new(setup);

        let QueueOutcome::Requested(id) = setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap()
        else {
            panic!("expected a request");
        };

        let mut handles = vec![];

        for approve in [true, false, true, false] {
            let setup = setup.clone();

            handles.push(tokio::spawn(async move {
                setup.workflow.decide("bobs-party", id, approve).await.unwrap()
            }));
        }

        let mut applied = 0;

        for handle in handles {
            match handle.await.unwrap() {
                DecisionOutcome::AlreadyDecided => {}
                _ => applied += 1,
            }
        }

        assert_eq!(applied, 1);
        assert!(setup.provider.enqueued().len() <= 1);
    }

    #[tokio::test]
    async fn test_unreachable_provider_keeps_the_submission_retryable() {
        let setup = setup(false).await;
        setup.provider.go_offline();

        let result = setup.workflow.submit("bobs-party", track("a"), false).await;
        assert!(matches!(result, Err(RequestError::ProviderUnavailable)));

        // Nothing was logged, so a retry can succeed
        assert!(setup
            .store
            .queued_tracks("bobs-party")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_request_events_reach_admins_only() {
        let setup = setup(true).await;

        let admin = setup.listeners.connect();
        let guest = setup.listeners.connect();

        setup.listeners.join(admin.id(), "bobs-party");
        setup.listeners.join(guest.id(), "bobs-party");
        setup.listeners.authenticate_as_admin(admin.id(), "bobs-party");

        setup
            .workflow
            .submit("bobs-party", track("a"), false)
            .await
            .unwrap();

        // Welcome plus the request notification
        assert_eq!(admin.pending_len(), 2);
        assert_eq!(guest.pending_len(), 1);
    }
}
