use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The provider-side identifier of a track
pub type TrackId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artists: Vec<Artist>,
    /// URL of the album artwork, if any
    pub art: String,
}

/// A single track as mirrored from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub album: Album,
    pub artists: Vec<Artist>,
    pub duration_ms: u32,
}

/// A playlist without its tracks, as shown when picking one for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistOverview {
    pub id: String,
    pub url: String,
    pub name: String,
    pub art: String,
    pub track_count: usize,
}

/// A playlist with its full track listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub url: String,
    pub name: String,
    pub art: String,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn overview(&self) -> PlaylistOverview {
        PlaylistOverview {
            id: self.id.clone(),
            url: self.url.clone(),
            name: self.name.clone(),
            art: self.art.clone(),
            track_count: self.tracks.len(),
        }
    }
}

lazy_static! {
    static ref SUFFIX_REGEX: Regex = Regex::new(
        r"(?i)^(.+?) - (?:\d{4} )?(?:remaster(?:ed)?(?: version)?|radio edit|radio mix|full length version|deluxe edition)"
    )
    .expect("suffix regex compiles");
}

/// Strips "Remastered"-style suffixes the provider appends to track and
/// album names
pub fn sanitise_name(name: &str) -> String {
    match SUFFIX_REGEX.captures(name) {
        Some(captures) => captures[1].to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::sanitise_name;

    #[test]
    fn test_suffixes_are_stripped() {
        assert_eq!(sanitise_name("Africa - 1999 Remaster"), "Africa");
        assert_eq!(sanitise_name("Africa - Remastered"), "Africa");
        assert_eq!(sanitise_name("Blue Monday - Radio Edit"), "Blue Monday");
        assert_eq!(
            sanitise_name("Heroes - 2017 Remastered Version"),
            "Heroes"
        );
    }

    #[test]
    fn test_plain_names_are_untouched() {
        assert_eq!(sanitise_name("Africa"), "Africa");
        assert_eq!(sanitise_name("Wake Up - Boom"), "Wake Up - Boom");
    }
}
