use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Admin,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        ApprovalSchema, BindPlaylistSchema, DecisionSchema, ExchangeCodeSchema, LoginSchema,
        NewSessionSchema, SubmitTrackSchema, ValidatedJson,
    },
    serialized::{
        DecisionResult, LoginResult, PlayingState, Playlist, PlaylistOverview, Session,
        SubmissionResult, ToSerialized, Track, TrackRequest,
    },
    Router,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    query: String,
}

#[utoipa::path(
    post,
    path = "/v1/sessions",
    tag = "sessions",
    request_body = NewSessionSchema,
    responses(
        (status = 200, body = Session)
    )
)]
pub async fn create_session(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewSessionSchema>,
) -> ServerResult<Json<Session>> {
    let session = context
        .partyline
        .sessions
        .create_session(&body.name, &body.host, &body.password)
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions",
    tag = "sessions",
    responses(
        (status = 200, body = Vec<Session>)
    )
)]
pub async fn list_sessions(State(context): State<ServerContext>) -> ServerResult<Json<Vec<Session>>> {
    let sessions = context.partyline.sessions.list_sessions().await?;

    Ok(Json(sessions.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{slug}",
    tag = "sessions",
    responses(
        (status = 200, body = Session)
    )
)]
pub async fn session(
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<Json<Session>> {
    let session = context.partyline.sessions.session(&slug).await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{slug}",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session and its history were deleted")
    )
)]
pub async fn delete_session(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<()> {
    admin.ensure(&slug)?;
    context.partyline.sessions.delete_session(&slug).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{slug}/token",
    tag = "sessions",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
pub async fn login(
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let token = context
        .partyline
        .auth
        .authenticate(&slug, &body.password)
        .await?;

    Ok(Json(token.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{slug}/playing",
    tag = "sessions",
    responses(
        (status = 200, body = PlayingState)
    )
)]
pub async fn playing(
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<Json<PlayingState>> {
    context.partyline.sessions.session(&slug).await?;

    let status = context.partyline.sync.status(&slug).unwrap_or_default();

    Ok(Json(status.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{slug}/search",
    tag = "sessions",
    params(SearchQuery),
    responses(
        (status = 200, body = Vec<Track>)
    )
)]
pub async fn search(
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
    Query(params): Query<SearchQuery>,
) -> ServerResult<Json<Vec<Track>>> {
    context.partyline.sessions.session(&slug).await?;

    let tracks = context.partyline.playback.search(&slug, &params.query).await;

    Ok(Json(tracks.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{slug}/playlists",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<PlaylistOverview>)
    )
)]
pub async fn playlists(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<Json<Vec<PlaylistOverview>>> {
    admin.ensure(&slug)?;

    let playlists = context.partyline.playback.playlists(&slug).await?;

    Ok(Json(playlists.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{slug}/playlist",
    tag = "sessions",
    request_body = BindPlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playlist)
    )
)]
pub async fn bind_playlist(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
    ValidatedJson(body): ValidatedJson<BindPlaylistSchema>,
) -> ServerResult<Json<Playlist>> {
    admin.ensure(&slug)?;

    let playlist = context
        .partyline
        .sessions
        .bind_playlist(&slug, &body.playlist_id)
        .await?;

    Ok(Json(playlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{slug}/playlist",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Playlist was unbound from the session")
    )
)]
pub async fn unbind_playlist(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<()> {
    admin.ensure(&slug)?;
    context.partyline.sessions.unbind_playlist(&slug).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{slug}/approval",
    tag = "sessions",
    request_body = ApprovalSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Moderation setting was updated")
    )
)]
pub async fn set_approval(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
    ValidatedJson(body): ValidatedJson<ApprovalSchema>,
) -> ServerResult<()> {
    admin.ensure(&slug)?;

    context
        .partyline
        .sessions
        .set_approval_required(&slug, body.required)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{slug}/queue",
    tag = "sessions",
    request_body = SubmitTrackSchema,
    responses(
        (status = 200, body = SubmissionResult)
    )
)]
pub async fn submit_track(
    admin: Option<Admin>,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
    ValidatedJson(body): ValidatedJson<SubmitTrackSchema>,
) -> ServerResult<Json<SubmissionResult>> {
    let is_admin = admin.map(|a| a.ensure(&slug).is_ok()).unwrap_or(false);

    let outcome = context
        .partyline
        .requests
        .submit(&slug, body.track.into(), is_admin)
        .await?;

    Ok(Json(outcome.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/{slug}/requests",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<TrackRequest>)
    )
)]
pub async fn pending_requests(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<Json<Vec<TrackRequest>>> {
    admin.ensure(&slug)?;

    let requests = context.partyline.requests.pending(&slug).await?;

    Ok(Json(requests.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{slug}/requests/{id}/decision",
    tag = "sessions",
    request_body = DecisionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = DecisionResult)
    )
)]
pub async fn decide_request(
    admin: Admin,
    State(context): State<ServerContext>,
    Path((slug, request_id)): Path<(String, i32)>,
    ValidatedJson(body): ValidatedJson<DecisionSchema>,
) -> ServerResult<Json<DecisionResult>> {
    admin.ensure(&slug)?;

    let outcome = context
        .partyline
        .requests
        .decide(&slug, request_id, body.approve)
        .await?;

    Ok(Json(outcome.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{slug}/spotify",
    tag = "sessions",
    request_body = ExchangeCodeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Session)
    )
)]
pub async fn link_provider(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
    ValidatedJson(body): ValidatedJson<ExchangeCodeSchema>,
) -> ServerResult<Json<Session>> {
    admin.ensure(&slug)?;

    let session = context
        .partyline
        .sessions
        .link_provider(&slug, &body.code)
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/sessions/{slug}/spotify",
    tag = "sessions",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Provider account was unlinked and its tokens discarded")
    )
)]
pub async fn unlink_provider(
    admin: Admin,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<()> {
    admin.ensure(&slug)?;
    context.partyline.sessions.unlink_provider(&slug).await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_session))
        .route("/", get(list_sessions))
        .route("/:slug", get(session))
        .route("/:slug", delete(delete_session))
        .route("/:slug/token", post(login))
        .route("/:slug/playing", get(playing))
        .route("/:slug/search", get(search))
        .route("/:slug/playlists", get(playlists))
        .route("/:slug/playlist", post(bind_playlist))
        .route("/:slug/playlist", delete(unbind_playlist))
        .route("/:slug/approval", post(set_approval))
        .route("/:slug/queue", post(submit_track))
        .route("/:slug/requests", get(pending_requests))
        .route("/:slug/requests/:id/decision", post(decide_request))
        .route("/:slug/spotify", post(link_provider))
        .route("/:slug/spotify", delete(unlink_provider))
}
