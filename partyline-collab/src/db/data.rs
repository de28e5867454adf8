use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Track, TrackId};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// One party's playback-control context
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// A URL-safe slug used to identify the session, unique and immutable
    pub slug: String,
    pub name: String,
    /// Display name of whoever is throwing the party
    pub host: String,
    /// The playlist currently bound to the session, if any
    pub playlist_id: Option<String>,
    /// Whether guest submissions need an admin decision before they are queued
    pub approval_required: bool,
    /// The provider account linked to the session, if any
    pub provider_user: Option<ProviderUserData>,
}

/// The provider account a session plays through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderUserData {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

/// An OAuth token pair scoped to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    pub access: String,
    pub refresh: String,
    /// Expiry of the access token
    pub expires_at: DateTime<Utc>,
}

/// An entry in a session's append-only queued-track log
#[derive(Debug, Clone, Serialize)]
pub struct QueuedTrackData {
    pub track_id: TrackId,
    pub queued_at: DateTime<Utc>,
    pub requested_by_guest: bool,
}

/// A guest's track submission awaiting or past an admin decision
#[derive(Debug, Clone)]
pub struct RequestData {
    pub id: PrimaryKey,
    pub session_slug: String,
    pub track: Track,
    /// `Some(true)` is approved, `Some(false)` is rejected, `None` is pending
    pub decision: Option<bool>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl RequestData {
    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }
}

#[derive(Debug)]
pub struct NewSession {
    pub slug: String,
    pub name: String,
    pub host: String,
    pub password_hash: String,
}
