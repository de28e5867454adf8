//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use chrono::{DateTime, Utc};
use partyline_collab::{
    AdminToken, Album as CollabAlbum, Artist as CollabArtist, DecisionOutcome,
    Playlist as CollabPlaylist, PlaylistOverview as CollabPlaylistOverview, PlayingStatus,
    ProviderUserData, QueueOutcome, QueuedTrackData, RequestData, SessionData,
    Track as CollabTrack,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Session {
    slug: String,
    name: String,
    host: String,
    playlist_id: Option<String>,
    approval_required: bool,
    provider_user: Option<ProviderUser>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderUser {
    id: String,
    name: String,
    image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Artist {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Album {
    id: String,
    name: String,
    artists: Vec<Artist>,
    art: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Track {
    id: String,
    name: String,
    album: Album,
    artists: Vec<Artist>,
    duration_ms: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaylistOverview {
    id: String,
    url: String,
    name: String,
    art: String,
    track_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Playlist {
    id: String,
    url: String,
    name: String,
    art: String,
    tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayingState {
    current: Option<Track>,
    queue: Vec<Track>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueuedTrack {
    track_id: String,
    queued_at: DateTime<Utc>,
    requested_by_guest: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackRequest {
    id: i32,
    track: Track,
}

/// What happened to a submitted track
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SubmissionResult {
    Queued { queued_at: DateTime<Utc> },
    Requested { request_id: i32 },
    AlreadyQueued,
    AlreadyRequested { request_id: i32 },
}

/// What happened to an admin's decision
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DecisionResult {
    Approved { queued_at: DateTime<Utc> },
    Rejected,
    AlreadyDecided,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<ProviderUser> for ProviderUserData {
    fn to_serialized(&self) -> ProviderUser {
        ProviderUser {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }
}

impl ToSerialized<Session> for SessionData {
    fn to_serialized(&self) -> Session {
        Session {
            slug: self.slug.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            playlist_id: self.playlist_id.clone(),
            approval_required: self.approval_required,
            provider_user: self.provider_user.to_serialized(),
        }
    }
}

impl ToSerialized<LoginResult> for AdminToken {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl ToSerialized<Artist> for CollabArtist {
    fn to_serialized(&self) -> Artist {
        Artist {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

impl ToSerialized<Album> for CollabAlbum {
    fn to_serialized(&self) -> Album {
        Album {
            id: self.id.clone(),
            name: self.name.clone(),
            artists: self.artists.to_serialized(),
            art: self.art.clone(),
        }
    }
}

impl ToSerialized<Track> for CollabTrack {
    fn to_serialized(&self) -> Track {
        Track {
            id: self.id.clone(),
            name: self.name.clone(),
            album: self.album.to_serialized(),
            artists: self.artists.to_serialized(),
            duration_ms: self.duration_ms,
        }
    }
}

impl ToSerialized<PlaylistOverview> for CollabPlaylistOverview {
    fn to_serialized(&self) -> PlaylistOverview {
        PlaylistOverview {
            id: self.id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
            art: self.art.clone(),
            track_count: self.track_count,
        }
    }
}

impl ToSerialized<Playlist> for CollabPlaylist {
    fn to_serialized(&self) -> Playlist {
        Playlist {
            id: self.id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
            art: self.art.clone(),
            tracks: self.tracks.to_serialized(),
        }
    }
}

impl ToSerialized<PlayingState> for PlayingStatus {
    fn to_serialized(&self) -> PlayingState {
        PlayingState {
            current: self.current.to_serialized(),
            queue: self.queue.to_serialized(),
        }
    }
}

impl ToSerialized<QueuedTrack> for QueuedTrackData {
    fn to_serialized(&self) -> QueuedTrack {
        QueuedTrack {
            track_id: self.track_id.clone(),
            queued_at: self.queued_at,
            requested_by_guest: self.requested_by_guest,
        }
    }
}

impl ToSerialized<TrackRequest> for RequestData {
    fn to_serialized(&self) -> TrackRequest {
        TrackRequest {
            id: self.id,
            track: self.track.to_serialized(),
        }
    }
}

impl ToSerialized<SubmissionResult> for QueueOutcome {
    fn to_serialized(&self) -> SubmissionResult {
        match self {
            QueueOutcome::Queued(data) => SubmissionResult::Queued {
                queued_at: data.queued_at,
            },
            QueueOutcome::Requested(id) => SubmissionResult::Requested { request_id: *id },
            QueueOutcome::AlreadyQueued => SubmissionResult::AlreadyQueued,
            QueueOutcome::AlreadyRequested(id) => {
                SubmissionResult::AlreadyRequested { request_id: *id }
            }
        }
    }
}

impl ToSerialized<DecisionResult> for DecisionOutcome {
    fn to_serialized(&self) -> DecisionResult {
        match self {
            DecisionOutcome::Approved(data) => DecisionResult::Approved {
                queued_at: data.queued_at,
            },
            DecisionOutcome::Rejected => DecisionResult::Rejected,
            DecisionOutcome::AlreadyDecided => DecisionResult::AlreadyDecided,
        }
    }
}
