use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use futures_util::Stream;
use partyline_collab::{events::SessionEvent, ListenerHandle, ListenerId};
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use utoipa::ToSchema;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{JoinSchema, TokenSchema, ValidatedJson},
    serialized::{PlaylistOverview, ToSerialized, Track},
    Router,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerEvent {
    /// Sent once when a listener connects, so it can address itself
    /// in later commands
    Welcome { listener_id: u64 },
    /// The playback state of the session meaningfully changed
    Playback {
        current: Option<Track>,
        queue: Vec<Track>,
    },
    /// A track was added to the session's queue
    QueuedTrack {
        id: String,
        queued_at: DateTime<Utc>,
        current: Option<Track>,
        queue: Vec<Track>,
    },
    /// A guest submitted a track that awaits an admin decision
    NewRequest { request_id: i32, track: Track },
    /// A playlist was bound to the session
    NewPlaylist { playlist: PlaylistOverview },
    /// The session's playlist was unbound
    PlaylistRemoved,
}

impl From<SessionEvent> for ServerEvent {
    fn from(value: SessionEvent) -> Self {
        match value {
            SessionEvent::Welcome { listener_id } => Self::Welcome {
                listener_id: listener_id.value(),
            },
            SessionEvent::Playback { current, queue } => Self::Playback {
                current: current.to_serialized(),
                queue: queue.to_serialized(),
            },
            SessionEvent::QueuedTrack {
                id,
                queued_at,
                current,
                queue,
            } => Self::QueuedTrack {
                id,
                queued_at,
                current: current.to_serialized(),
                queue: queue.to_serialized(),
            },
            SessionEvent::NewRequest { request_id, track } => Self::NewRequest {
                request_id,
                track: track.to_serialized(),
            },
            SessionEvent::NewPlaylist { playlist } => Self::NewPlaylist {
                playlist: playlist.to_serialized(),
            },
            SessionEvent::PlaylistRemoved => Self::PlaylistRemoved,
        }
    }
}

/// Adapts a [ListenerHandle] to the SSE wire format
pub struct EventStream {
    handle: ListenerHandle,
}

impl Stream for EventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.handle).poll_next(cx) {
            Poll::Ready(Some(event)) => {
                let server_event: ServerEvent = event.into();
                let data = serde_json::to_string(&server_event).expect("serializes properly");

                Poll::Ready(Some(Ok(Event::default().data(data))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from partyline",
            body = ServerEvent
        )
    )
)]
pub async fn event_stream(State(context): State<ServerContext>) -> Sse<EventStream> {
    let handle = context.partyline.listeners.connect();

    Sse::new(EventStream { handle }).keep_alive(KeepAlive::default())
}

#[utoipa::path(
    post,
    path = "/v1/events/{listener_id}/join",
    tag = "events",
    request_body = JoinSchema,
    responses(
        (status = 200, description = "Listener was tuned to the session")
    )
)]
pub async fn join(
    State(context): State<ServerContext>,
    Path(listener_id): Path<u64>,
    ValidatedJson(body): ValidatedJson<JoinSchema>,
) -> ServerResult<()> {
    context
        .partyline
        .join_session(ListenerId::from(listener_id), &body.slug)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/events/{listener_id}/leave",
    tag = "events",
    responses(
        (status = 200, description = "Listener left its session")
    )
)]
pub async fn leave(State(context): State<ServerContext>, Path(listener_id): Path<u64>) {
    context.partyline.leave_session(ListenerId::from(listener_id));
}

#[utoipa::path(
    post,
    path = "/v1/events/{listener_id}/token",
    tag = "events",
    request_body = TokenSchema,
    responses(
        (status = 200, description = "Listener now receives admin events for its session")
    )
)]
pub async fn authenticate(
    State(context): State<ServerContext>,
    Path(listener_id): Path<u64>,
    ValidatedJson(body): ValidatedJson<TokenSchema>,
) -> ServerResult<()> {
    context
        .partyline
        .authenticate_listener(ListenerId::from(listener_id), &body.token)?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(event_stream))
        .route("/:listener_id/join", post(join))
        .route("/:listener_id/leave", post(leave))
        .route("/:listener_id/token", post(authenticate))
}
