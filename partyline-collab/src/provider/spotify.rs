use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::warn;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;

use crate::{
    sanitise_name, Album, Artist, Config, Playlist, PlaylistOverview, ProviderUserData, TokenData,
    Track,
};

use super::{PlaybackProvider, PlayingStatus, ProviderError};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// The Spotify Web API as a playback provider
pub struct Spotify {
    client: Client,
    config: Config,
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawArtist {
    #[serde(default)]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<RawImage>,
    #[serde(default)]
    artists: Vec<RawArtist>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    id: String,
    name: String,
    album: RawAlbum,
    artists: Vec<RawArtist>,
    duration_ms: u32,
}

#[derive(Debug, Deserialize)]
struct RawQueue {
    currently_playing: Option<RawTrack>,
    #[serde(default)]
    queue: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    id: String,
    display_name: String,
    #[serde(default)]
    images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawExternalUrls {
    #[serde(default)]
    spotify: String,
}

#[derive(Debug, Deserialize)]
struct RawPage<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistOverview {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<RawImage>,
    external_urls: RawExternalUrls,
    tracks: RawPlaylistTracksRef,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistTracksRef {
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistDetails {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<RawImage>,
    external_urls: RawExternalUrls,
    tracks: RawPage<RawPlaylistItem>,
}

/// A playlist entry. The track can be null for removed or local items.
#[derive(Debug, Deserialize)]
struct RawPlaylistItem {
    track: Option<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResults {
    tracks: RawPage<RawTrack>,
}

impl From<RawArtist> for Artist {
    fn from(raw: RawArtist) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
        }
    }
}

impl From<RawAlbum> for Album {
    fn from(raw: RawAlbum) -> Self {
        Self {
            id: raw.id,
            name: sanitise_name(&raw.name),
            art: raw.images.first().map(|i| i.url.clone()).unwrap_or_default(),
            artists: raw.artists.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        Self {
            id: raw.id,
            name: sanitise_name(&raw.name),
            album: raw.album.into(),
            artists: raw.artists.into_iter().map(Into::into).collect(),
            duration_ms: raw.duration_ms,
        }
    }
}

impl Spotify {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .expect("http client is built");

        Self {
            client,
            config: config.clone(),
        }
    }

    async fn get_json<T>(&self, url: &str, access: &str) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .bearer_auth(access)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<TokenData, ProviderError> {
        let now = Utc::now();

        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(
                &self.config.provider_client_id,
                Some(&self.config.provider_client_secret),
            )
            .form(params)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            // A 400 or 401 from the token endpoint means this grant is
            // burned for good
            if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
                return Err(ProviderError::AuthExpired);
            }

            return Err(handle_unsuccessful_request(response, status).await);
        }

        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        // The refresh endpoint may omit the refresh token, in which case the
        // previous one stays valid
        let refresh = raw
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or_else(|| {
                ProviderError::ParseError("token response carried no refresh token".to_string())
            })?;

        Ok(TokenData {
            access: raw.access_token,
            refresh,
            expires_at: now + Duration::seconds(raw.expires_in),
        })
    }
}

#[async_trait]
impl PlaybackProvider for Spotify {
    async fn exchange_code(&self, code: &str) -> Result<TokenData, ProviderError> {
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.provider_redirect_uri),
            ],
            None,
        )
        .await
    }

    async fn refresh_tokens(&self, refresh: &str) -> Result<TokenData, ProviderError> {
        self.token_request(
            &[("grant_type", "refresh_token"), ("refresh_token", refresh)],
            Some(refresh),
        )
        .await
    }

    async fn profile(&self, access: &str) -> Result<ProviderUserData, ProviderError> {
        let raw: RawProfile = self.get_json(&format!("{}/me", API_BASE), access).await?;

        Ok(ProviderUserData {
            id: raw.id,
            name: raw.display_name,
            image: raw.images.first().map(|i| i.url.clone()),
        })
    }

    async fn playback_snapshot(&self, access: &str) -> Result<PlayingStatus, ProviderError> {
        let raw: RawQueue = self
            .get_json(&format!("{}/me/player/queue", API_BASE), access)
            .await?;

        Ok(PlayingStatus {
            current: raw.currently_playing.map(Into::into),
            queue: raw.queue.into_iter().map(Into::into).collect(),
        })
    }

    async fn enqueue(&self, access: &str, track_id: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(format!("{}/me/player/queue", API_BASE))
            .bearer_auth(access)
            .query(&[("uri", format!("spotify:track:{}", track_id))])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        Ok(())
    }

    async fn search_tracks(
        &self,
        access: &str,
        query: &str,
    ) -> Result<Vec<Track>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/search", API_BASE))
            .bearer_auth(access)
            .query(&[("q", query), ("type", "track"), ("limit", "50")])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();

        // A rejected query is an empty result, not a failure
        if status == StatusCode::BAD_REQUEST {
            return Ok(vec![]);
        }

        if !status.is_success() {
            return Err(handle_unsuccessful_request(response, status).await);
        }

        let raw: RawSearchResults = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(raw.tracks.items.into_iter().map(Into::into).collect())
    }

    async fn playlists(&self, access: &str) -> Result<Vec<PlaylistOverview>, ProviderError> {
        let first: RawPage<RawPlaylistOverview> = self
            .get_json(&format!("{}/me/playlists?limit=50", API_BASE), access)
            .await?;

        let items = follow_pages(first, self.config.max_pages, |url| async move {
            self.get_json(&url, access).await
        })
        .await?;

        Ok(items
            .into_iter()
            .map(|raw| PlaylistOverview {
                id: raw.id,
                url: raw.external_urls.spotify,
                name: raw.name,
                art: raw.images.first().map(|i| i.url.clone()).unwrap_or_default(),
                track_count: raw.tracks.total,
            })
            .collect())
    }

    async fn playlist_details(
        &self,
        access: &str,
        playlist_id: &str,
    ) -> Result<Playlist, ProviderError> {
        let first: RawPlaylistDetails = self
            .get_json(&format!("{}/playlists/{}", API_BASE, playlist_id), access)
            .await?;

        // Remaining pages come from the cursor embedded in the first response
        let items = follow_pages(first.tracks, self.config.max_pages, |url| async move {
            self.get_json(&url, access).await
        })
        .await?;

        Ok(Playlist {
            id: first.id,
            url: first.external_urls.spotify,
            name: first.name,
            art: first.images.first().map(|i| i.url.clone()).unwrap_or_default(),
            tracks: items
                .into_iter()
                .filter_map(|item| item.track.map(Into::into))
                .collect(),
        })
    }
}

/// Follows `next` cursors from an already fetched page and collects every
/// item. Bounded by `max_pages` in case the provider never reports the end.
async fn follow_pages<T, F, Fut>(
    first: RawPage<T>,
    max_pages: usize,
    fetch: F,
) -> Result<Vec<T>, ProviderError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<RawPage<T>, ProviderError>>,
{
    let mut items = first.items;
    let mut next = first.next;
    let mut pages = 1;

    while let Some(url) = next {
        if pages >= max_pages {
            warn!("Pagination exceeded {} pages, stopping", pages);
            break;
        }

        let page = fetch(url).await?;
        items.extend(page.items);
        next = page.next;
        pages += 1;
    }

    Ok(items)
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const TRACK_FIXTURE: &str = r#"{
        "id": "4uLU6hMCjMI75M1A2tKUQC",
        "name": "Never Gonna Give You Up - 2022 Remaster",
        "duration_ms": 213573,
        "album": {
            "id": "6eUW0wxWtzkFdaEFsTJto6",
            "name": "Whenever You Need Somebody",
            "images": [{ "url": "https://i.scdn.co/image/abc" }],
            "artists": [{ "id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley" }]
        },
        "artists": [{ "id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley" }]
    }"#;

    #[test]
    fn test_track_mapping_strips_suffixes() {
        let raw: RawTrack = serde_json::from_str(TRACK_FIXTURE).unwrap();
        let track: Track = raw.into();

        assert_eq!(track.name, "Never Gonna Give You Up");
        assert_eq!(track.album.art, "https://i.scdn.co/image/abc");
        assert_eq!(track.artists[0].name, "Rick Astley");
        assert_eq!(track.duration_ms, 213573);
    }

    #[test]
    fn test_queue_tolerates_nothing_playing() {
        let raw: RawQueue =
            serde_json::from_str(r#"{ "currently_playing": null, "queue": [] }"#).unwrap();

        assert!(raw.currently_playing.is_none());
        assert!(raw.queue.is_empty());
    }

    #[test]
    fn test_playlist_items_skip_null_tracks() {
        let raw: RawPage<RawPlaylistItem> = serde_json::from_str(&format!(
            r#"{{ "items": [{{ "track": null }}, {{ "track": {} }}], "next": null }}"#,
            TRACK_FIXTURE
        ))
        .unwrap();

        let tracks: Vec<Track> = raw
            .items
            .into_iter()
            .filter_map(|item| item.track.map(Into::into))
            .collect();

        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_refresh_response_may_omit_refresh_token() {
        let raw: RawTokenResponse = serde_json::from_str(
            r#"{ "access_token": "new-access", "expires_in": 3600 }"#,
        )
        .unwrap();

        assert!(raw.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_pagination_follows_cursors_until_the_end() {
        let first = RawPage {
            items: vec!["a".to_string()],
            next: Some("page-2".to_string()),
        };

        let items = follow_pages(first, 50, |url| async move {
            assert_eq!(url, "page-2");

            Ok(RawPage {
                items: vec!["b".to_string()],
                next: None,
            })
        })
        .await
        .unwrap();

        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_pagination_stops_at_the_page_cap() {
        let fetches = AtomicUsize::new(0);

        let first = RawPage {
            items: vec!["a".to_string(), "b".to_string()],
            next: Some("page-2".to_string()),
        };

        // Every fetched page claims there is another one
        let items = follow_pages(first, 3, |_url| {
            fetches.fetch_add(1, Ordering::SeqCst);

            async {
                Ok(RawPage {
                    items: vec!["more".to_string()],
                    next: Some("again".to_string()),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(items.len(), 4);
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(e.to_string())
}

async fn handle_unsuccessful_request(response: Response, status: StatusCode) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED => ProviderError::AuthExpired,
        StatusCode::NOT_FOUND => ProviderError::NotFound,
        // A duplicate rejection, callers treat the request as carried out
        StatusCode::CONFLICT => ProviderError::Conflict,
        _ => {
            let text = response.text().await.unwrap_or_default();
            ProviderError::Unavailable(format!("{}: {}", status, text))
        }
    }
}
