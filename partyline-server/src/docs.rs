use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{schemas, serialized, sessions, sse};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "partyline-server exposes endpoints to interact with this partyline instance"
    ),
    paths(
        sessions::create_session,
        sessions::list_sessions,
        sessions::session,
        sessions::delete_session,
        sessions::login,
        sessions::playing,
        sessions::search,
        sessions::playlists,
        sessions::bind_playlist,
        sessions::unbind_playlist,
        sessions::set_approval,
        sessions::submit_track,
        sessions::pending_requests,
        sessions::decide_request,
        sessions::link_provider,
        sessions::unlink_provider,
        sse::event_stream,
        sse::join,
        sse::leave,
        sse::authenticate,
    ),
    components(schemas(
        schemas::NewSessionSchema,
        schemas::LoginSchema,
        schemas::BindPlaylistSchema,
        schemas::ExchangeCodeSchema,
        schemas::ApprovalSchema,
        schemas::DecisionSchema,
        schemas::JoinSchema,
        schemas::TokenSchema,
        schemas::TrackSchema,
        schemas::AlbumSchema,
        schemas::ArtistSchema,
        schemas::SubmitTrackSchema,
        serialized::Session,
        serialized::ProviderUser,
        serialized::LoginResult,
        serialized::Artist,
        serialized::Album,
        serialized::Track,
        serialized::PlaylistOverview,
        serialized::Playlist,
        serialized::PlayingState,
        serialized::QueuedTrack,
        serialized::TrackRequest,
        serialized::SubmissionResult,
        serialized::DecisionResult,
        sse::ServerEvent,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
