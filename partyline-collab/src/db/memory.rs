use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::Track;

use super::{
    NewSession, PrimaryKey, ProviderUserData, QueuedTrackData, RequestData, Result, SessionData,
    SessionStore, SessionStoreError, TokenData,
};

/// An in-memory session store, used by tests and local experimentation
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    next_id: AtomicI32,
}

struct StoredSession {
    data: SessionData,
    password_hash: String,
    tokens: Option<TokenData>,
    queued: Vec<QueuedTrackData>,
    requests: Vec<RequestData>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> PrimaryKey {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn with_session<T>(
        &self,
        slug: &str,
        f: impl FnOnce(&mut StoredSession) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.lock();

        let session = sessions.get_mut(slug).ok_or(SessionStoreError::NotFound {
            resource: "session",
            identifier: "slug",
        })?;

        f(session)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut sessions = self.sessions.lock();

        if sessions.contains_key(&new_session.slug) {
            return Err(SessionStoreError::Conflict {
                resource: "session",
                field: "slug",
                value: new_session.slug,
            });
        }

        let data = SessionData {
            id: self.next_id(),
            slug: new_session.slug.clone(),
            name: new_session.name,
            host: new_session.host,
            playlist_id: None,
            approval_required: false,
            provider_user: None,
        };

        sessions.insert(
            new_session.slug,
            StoredSession {
                data: data.clone(),
                password_hash: new_session.password_hash,
                tokens: None,
                queued: vec![],
                requests: vec![],
            },
        );

        Ok(data)
    }

    async fn session_by_slug(&self, slug: &str) -> Result<SessionData> {
        self.with_session(slug, |s| Ok(s.data.clone()))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionData>> {
        Ok(self
            .sessions
            .lock()
            .values()
            .map(|s| s.data.clone())
            .collect())
    }

    async fn delete_session(&self, slug: &str) -> Result<()> {
        self.sessions
            .lock()
            .remove(slug)
            .map(|_| ())
            .ok_or(SessionStoreError::NotFound {
                resource: "session",
                identifier: "slug",
            })
    }

    async fn set_playlist(&self, slug: &str, playlist_id: &str) -> Result<()> {
        self.with_session(slug, |s| {
            s.data.playlist_id = Some(playlist_id.to_string());
            Ok(())
        })
    }

    async fn remove_playlist(&self, slug: &str) -> Result<()> {
        self.with_session(slug, |s| {
            s.data.playlist_id = None;
            Ok(())
        })
    }

    async fn set_approval_required(&self, slug: &str, required: bool) -> Result<()> {
        self.with_session(slug, |s| {
            s.data.approval_required = required;
            Ok(())
        })
    }

    async fn set_provider_user(&self, slug: &str, user: Option<&ProviderUserData>) -> Result<()> {
        self.with_session(slug, |s| {
            s.data.provider_user = user.cloned();
            Ok(())
        })
    }

    async fn password_hash(&self, slug: &str) -> Result<String> {
        self.with_session(slug, |s| Ok(s.password_hash.clone()))
    }

    async fn queued_tracks(&self, slug: &str) -> Result<Vec<QueuedTrackData>> {
        self.with_session(slug, |s| Ok(s.queued.clone()))
    }

    async fn insert_queued_track(
        &self,
        slug: &str,
        track_id: &str,
        requested_by_guest: bool,
    ) -> Result<QueuedTrackData> {
        self.with_session(slug, |s| {
            if s.queued.iter().any(|q| q.track_id == track_id) {
                return Err(SessionStoreError::Conflict {
                    resource: "queued track",
                    field: "track_id",
                    value: track_id.to_string(),
                });
            }

            let entry = QueuedTrackData {
                track_id: track_id.to_string(),
                queued_at: Utc::now(),
                requested_by_guest,
            };

            s.queued.push(entry.clone());
            Ok(entry)
        })
    }

    async fn insert_request(&self, slug: &str, track: &Track) -> Result<RequestData> {
        let id = self.next_id();

        self.with_session(slug, |s| {
            let request = RequestData {
                id,
                session_slug: slug.to_string(),
                track: track.clone(),
                decision: None,
                decided_at: None,
            };

            s.requests.push(request.clone());
            Ok(request)
        })
    }

    async fn request_by_id(&self, slug: &str, request_id: PrimaryKey) -> Result<RequestData> {
        self.with_session(slug, |s| {
            s.requests
                .iter()
                .find(|r| r.id == request_id)
                .cloned()
                .ok_or(SessionStoreError::NotFound {
                    resource: "request",
                    identifier: "id",
                })
        })
    }

    async fn pending_requests(&self, slug: &str) -> Result<Vec<RequestData>> {
        self.with_session(slug, |s| {
            Ok(s.requests
                .iter()
                .filter(|r| !r.is_decided())
                .cloned()
                .collect())
        })
    }

    async fn update_request_decision(
        &self,
        slug: &str,
        request_id: PrimaryKey,
        approved: bool,
    ) -> Result<bool> {
        self.with_session(slug, |s| {
            let request = s
                .requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or(SessionStoreError::NotFound {
                    resource: "request",
                    identifier: "id",
                })?;

            if request.is_decided() {
                return Ok(false);
            }

            request.decision = Some(approved);
            request.decided_at = Some(Utc::now());
            Ok(true)
        })
    }

    async fn tokens(&self, slug: &str) -> Result<Option<TokenData>> {
        self.with_session(slug, |s| Ok(s.tokens.clone()))
    }

    async fn update_tokens(&self, slug: &str, tokens: &TokenData) -> Result<()> {
        self.with_session(slug, |s| {
            s.tokens = Some(tokens.clone());
            Ok(())
        })
    }

    async fn discard_tokens(&self, slug: &str) -> Result<()> {
        self.with_session(slug, |s| {
            s.tokens = None;
            Ok(())
        })
    }
}
