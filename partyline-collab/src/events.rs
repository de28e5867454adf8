use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{ListenerId, PlaylistOverview, PrimaryKey, Track, TrackId};

/// Events emitted to the listeners of a session room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SessionEvent {
    /// Sent once when a listener connects, so it can address itself
    /// in later commands
    Welcome { listener_id: ListenerId },
    /// The playback state of the session meaningfully changed
    Playback {
        current: Option<Track>,
        queue: Vec<Track>,
    },
    /// A track was added to the session's queue
    QueuedTrack {
        id: TrackId,
        queued_at: DateTime<Utc>,
        current: Option<Track>,
        queue: Vec<Track>,
    },
    /// A guest submitted a track that awaits an admin decision.
    /// Only sent to admin listeners.
    NewRequest { request_id: PrimaryKey, track: Track },
    /// A playlist was bound to the session
    NewPlaylist { playlist: PlaylistOverview },
    /// The session's playlist was unbound
    PlaylistRemoved,
}
