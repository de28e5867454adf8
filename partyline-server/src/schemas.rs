use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use partyline_collab::{Album, Artist, Track};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSessionSchema {
    #[validate(length(min = 2, max = 128))]
    pub name: String,
    #[validate(length(min = 1, max = 128))]
    pub host: String,
    #[validate(length(min = 4, max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BindPlaylistSchema {
    #[validate(length(min = 1, max = 128))]
    pub playlist_id: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExchangeCodeSchema {
    #[validate(length(min = 1))]
    pub code: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApprovalSchema {
    pub required: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecisionSchema {
    pub approve: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinSchema {
    #[validate(length(min = 1, max = 128))]
    pub slug: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenSchema {
    #[validate(length(min = 1))]
    pub token: String,
}

/// A track as submitted by a client, usually straight from search results
#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrackSchema {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    pub name: String,
    pub album: AlbumSchema,
    pub artists: Vec<ArtistSchema>,
    pub duration_ms: u32,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlbumSchema {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistSchema>,
    pub art: String,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArtistSchema {
    pub id: String,
    pub name: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitTrackSchema {
    #[validate(nested)]
    pub track: TrackSchema,
}

impl From<ArtistSchema> for Artist {
    fn from(schema: ArtistSchema) -> Self {
        Self {
            id: schema.id,
            name: schema.name,
        }
    }
}

impl From<AlbumSchema> for Album {
    fn from(schema: AlbumSchema) -> Self {
        Self {
            id: schema.id,
            name: schema.name,
            artists: schema.artists.into_iter().map(Into::into).collect(),
            art: schema.art,
        }
    }
}

impl From<TrackSchema> for Track {
    fn from(schema: TrackSchema) -> Self {
        Self {
            id: schema.id,
            name: schema.name,
            album: schema.album.into(),
            artists: schema.artists.into_iter().map(Into::into).collect(),
            duration_ms: schema.duration_ms,
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
