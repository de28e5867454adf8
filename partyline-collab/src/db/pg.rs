use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, query, Error as SqlxError, PgPool, Row};

use crate::Track;

use super::{
    IntoStoreError, NewSession, PrimaryKey, ProviderUserData, QueuedTrackData, RequestData, Result,
    SessionData, SessionStore, SessionStoreError, TokenData,
};

/// A postgres session store for partyline
pub struct PgSessionStore {
    pool: PgPool,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id SERIAL PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        host TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        playlist_id TEXT,
        approval_required BOOLEAN NOT NULL DEFAULT FALSE,
        provider_user_id TEXT,
        provider_user_name TEXT,
        provider_user_image TEXT,
        access_token TEXT,
        refresh_token TEXT,
        expires_at TIMESTAMPTZ
    );

    CREATE TABLE IF NOT EXISTS queued_tracks (
        session_slug TEXT NOT NULL REFERENCES sessions (slug) ON DELETE CASCADE,
        track_id TEXT NOT NULL,
        queued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        requested_by_guest BOOLEAN NOT NULL,
        PRIMARY KEY (session_slug, track_id)
    );

    CREATE TABLE IF NOT EXISTS requests (
        id SERIAL PRIMARY KEY,
        session_slug TEXT NOT NULL REFERENCES sessions (slug) ON DELETE CASCADE,
        track TEXT NOT NULL,
        decision BOOLEAN,
        decided_at TIMESTAMPTZ
    );
";

impl PgSessionStore {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| SessionStoreError::Internal(Box::new(e)))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| e.any())?;

        Ok(Self { pool })
    }

    fn session_from_row(row: &sqlx::postgres::PgRow) -> Result<SessionData> {
        let provider_user_id: Option<String> =
            row.try_get("provider_user_id").map_err(|e| e.any())?;

        let provider_user = match provider_user_id {
            Some(id) => Some(ProviderUserData {
                id,
                name: row.try_get("provider_user_name").map_err(|e| e.any())?,
                image: row.try_get("provider_user_image").map_err(|e| e.any())?,
            }),
            None => None,
        };

        Ok(SessionData {
            id: row.try_get("id").map_err(|e| e.any())?,
            slug: row.try_get("slug").map_err(|e| e.any())?,
            name: row.try_get("name").map_err(|e| e.any())?,
            host: row.try_get("host").map_err(|e| e.any())?,
            playlist_id: row.try_get("playlist_id").map_err(|e| e.any())?,
            approval_required: row.try_get("approval_required").map_err(|e| e.any())?,
            provider_user,
        })
    }

    fn request_from_row(row: &sqlx::postgres::PgRow) -> Result<RequestData> {
        let track_json: String = row.try_get("track").map_err(|e| e.any())?;
        let track: Track = serde_json::from_str(&track_json)
            .map_err(|e| SessionStoreError::Internal(Box::new(e)))?;

        Ok(RequestData {
            id: row.try_get("id").map_err(|e| e.any())?,
            session_slug: row.try_get("session_slug").map_err(|e| e.any())?,
            track,
            decision: row.try_get("decision").map_err(|e| e.any())?,
            decided_at: row.try_get("decided_at").map_err(|e| e.any())?,
        })
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let row = query(
            "INSERT INTO sessions (slug, name, host, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(&new_session.slug)
        .bind(&new_session.name)
        .bind(&new_session.host)
        .bind(&new_session.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("session", "slug", &new_session.slug))?;

        Self::session_from_row(&row)
    }

    async fn session_by_slug(&self, slug: &str) -> Result<SessionData> {
        let row = query("SELECT * FROM sessions WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "slug"))?;

        Self::session_from_row(&row)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionData>> {
        let rows = query("SELECT * FROM sessions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        rows.iter().map(Self::session_from_row).collect()
    }

    async fn delete_session(&self, slug: &str) -> Result<()> {
        let result = query("DELETE FROM sessions WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(SessionStoreError::NotFound {
                resource: "session",
                identifier: "slug",
            });
        }

        Ok(())
    }

    async fn set_playlist(&self, slug: &str, playlist_id: &str) -> Result<()> {
        query("UPDATE sessions SET playlist_id = $1 WHERE slug = $2")
            .bind(playlist_id)
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn remove_playlist(&self, slug: &str) -> Result<()> {
        query("UPDATE sessions SET playlist_id = NULL WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn set_approval_required(&self, slug: &str, required: bool) -> Result<()> {
        query("UPDATE sessions SET approval_required = $1 WHERE slug = $2")
            .bind(required)
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn set_provider_user(&self, slug: &str, user: Option<&ProviderUserData>) -> Result<()> {
        query(
            "UPDATE sessions SET
                provider_user_id = $1,
                provider_user_name = $2,
                provider_user_image = $3
             WHERE slug = $4",
        )
        .bind(user.map(|u| u.id.clone()))
        .bind(user.map(|u| u.name.clone()))
        .bind(user.and_then(|u| u.image.clone()))
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn password_hash(&self, slug: &str) -> Result<String> {
        let row = query("SELECT password_hash FROM sessions WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "slug"))?;

        row.try_get("password_hash").map_err(|e| e.any())
    }

    async fn queued_tracks(&self, slug: &str) -> Result<Vec<QueuedTrackData>> {
        let rows = query(
            "SELECT track_id, queued_at, requested_by_guest
             FROM queued_tracks
             WHERE session_slug = $1
             ORDER BY queued_at",
        )
        .bind(slug)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.into_iter()
            .map(|row| {
                Ok(QueuedTrackData {
                    track_id: row.try_get("track_id").map_err(|e| e.any())?,
                    queued_at: row.try_get("queued_at").map_err(|e| e.any())?,
                    requested_by_guest: row.try_get("requested_by_guest").map_err(|e| e.any())?,
                })
            })
            .collect()
    }

    async fn insert_queued_track(
        &self,
        slug: &str,
        track_id: &str,
        requested_by_guest: bool,
    ) -> Result<QueuedTrackData> {
        let row = query(
            "INSERT INTO queued_tracks (session_slug, track_id, requested_by_guest)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING
             RETURNING queued_at",
        )
        .bind(slug)
        .bind(track_id)
        .bind(requested_by_guest)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())?;

        // No returned row means the conflict clause kicked in
        let row = row.ok_or(SessionStoreError::Conflict {
            resource: "queued track",
            field: "track_id",
            value: track_id.to_string(),
        })?;

        let queued_at: DateTime<Utc> = row.try_get("queued_at").map_err(|e| e.any())?;

        Ok(QueuedTrackData {
            track_id: track_id.to_string(),
            queued_at,
            requested_by_guest,
        })
    }

    async fn insert_request(&self, slug: &str, track: &Track) -> Result<RequestData> {
        let track_json = serde_json::to_string(track)
            .map_err(|e| SessionStoreError::Internal(Box::new(e)))?;

        let row = query(
            "INSERT INTO requests (session_slug, track)
             VALUES ($1, $2)
             RETURNING *",
        )
        .bind(slug)
        .bind(track_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Self::request_from_row(&row)
    }

    async fn request_by_id(&self, slug: &str, request_id: PrimaryKey) -> Result<RequestData> {
        let row = query("SELECT * FROM requests WHERE id = $1 AND session_slug = $2")
            .bind(request_id)
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("request", "id"))?;

        Self::request_from_row(&row)
    }

    async fn pending_requests(&self, slug: &str) -> Result<Vec<RequestData>> {
        let rows = query(
            "SELECT * FROM requests
             WHERE session_slug = $1 AND decision IS NULL
             ORDER BY id",
        )
        .bind(slug)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        rows.iter().map(Self::request_from_row).collect()
    }

    async fn update_request_decision(
        &self,
        slug: &str,
        request_id: PrimaryKey,
        approved: bool,
    ) -> Result<bool> {
        // The decision IS NULL filter makes the first decision win, even
        // under concurrent duplicate calls
        let result = query(
            "UPDATE requests SET decision = $1, decided_at = now()
             WHERE id = $2 AND session_slug = $3 AND decision IS NULL",
        )
        .bind(approved)
        .bind(request_id)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(result.rows_affected() == 1)
    }

    async fn tokens(&self, slug: &str) -> Result<Option<TokenData>> {
        let row = query(
            "SELECT access_token, refresh_token, expires_at
             FROM sessions
             WHERE slug = $1",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "slug"))?;

        let access: Option<String> = row.try_get("access_token").map_err(|e| e.any())?;
        let refresh: Option<String> = row.try_get("refresh_token").map_err(|e| e.any())?;
        let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at").map_err(|e| e.any())?;

        match (access, refresh, expires_at) {
            (Some(access), Some(refresh), Some(expires_at)) => Ok(Some(TokenData {
                access,
                refresh,
                expires_at,
            })),
            _ => Ok(None),
        }
    }

    async fn update_tokens(&self, slug: &str, tokens: &TokenData) -> Result<()> {
        query(
            "UPDATE sessions SET
                access_token = $1,
                refresh_token = $2,
                expires_at = $3
             WHERE slug = $4",
        )
        .bind(&tokens.access)
        .bind(&tokens.refresh)
        .bind(tokens.expires_at)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn discard_tokens(&self, slug: &str) -> Result<()> {
        query(
            "UPDATE sessions SET
                access_token = NULL,
                refresh_token = NULL,
                expires_at = NULL
             WHERE slug = $1",
        )
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }
}

trait ConflictOrAny {
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> SessionStoreError;
}

impl ConflictOrAny for SqlxError {
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> SessionStoreError {
        match &self {
            SqlxError::Database(e) if e.is_unique_violation() => SessionStoreError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            _ => self.any(),
        }
    }
}

impl IntoStoreError for SqlxError {
    fn any(self) -> SessionStoreError {
        SessionStoreError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> SessionStoreError {
        match self {
            SqlxError::RowNotFound => SessionStoreError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
