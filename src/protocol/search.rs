//! Search results and keyword suggestions.
//!
//! Songs and playlists are searched through the mobile client's resource
//! endpoints, which answer with a list of typed `resources`. Other kinds go
//! through the classic endpoint, which answers with a `result` object keyed
//! by kind. [`SearchResults`] accepts both.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DefaultOnNull, DisplayFromStr, PickFirst};

use super::{
    playlist::Playlist,
    song::{Album, Artist, Song},
};
use crate::error::Error;

/// What to search for. The discriminant is the classic endpoint's `type`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u32)]
pub enum SearchKind {
    #[default]
    Song = 1,
    Album = 10,
    Artist = 100,
    Playlist = 1000,
    Radio = 2000,
}

impl SearchKind {
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Song => write!(f, "song"),
            Self::Album => write!(f, "album"),
            Self::Artist => write!(f, "artist"),
            Self::Playlist => write!(f, "playlist"),
            Self::Radio => write!(f, "radio"),
        }
    }
}

impl FromStr for SearchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "song" | "1" => Self::Song,
            "album" | "10" => Self::Album,
            "artist" | "100" => Self::Artist,
            "playlist" | "1000" => Self::Playlist,
            "radio" | "sound" | "2000" => Self::Radio,
            _ => return Err(Error::invalid_argument(format!("unknown search kind \"{s}\""))),
        };
        Ok(kind)
    }
}

/// Payload of every search endpoint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchResults {
    /// Resource endpoints.
    #[serde(default)]
    pub data: Option<ResourceResults>,

    /// Classic endpoint.
    #[serde(default)]
    pub result: Option<ClassicResults>,
}

impl SearchResults {
    /// Songs from whichever shape the endpoint answered with.
    #[must_use]
    pub fn songs(&self) -> Vec<&Song> {
        let resources = self
            .data
            .iter()
            .flat_map(|data| &data.resources)
            .filter_map(|resource| resource.song.as_ref());
        let classic = self.result.iter().flat_map(|result| &result.songs);
        resources.chain(classic).collect()
    }

    /// Playlists from whichever shape the endpoint answered with.
    #[must_use]
    pub fn playlists(&self) -> Vec<&Playlist> {
        let resources = self
            .data
            .iter()
            .flat_map(|data| &data.resources)
            .filter_map(|resource| resource.playlist.as_ref());
        let classic = self.result.iter().flat_map(|result| &result.playlists);
        resources.chain(classic).collect()
    }

    /// Whether another page exists.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.data.as_ref().is_some_and(|data| data.more)
            || self.result.as_ref().is_some_and(|result| result.has_more)
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceResults {
    #[serde_as(as = "DefaultOnNull")]
    pub resources: Vec<SearchResource>,
    pub more: bool,
    pub total_count: u64,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResource {
    pub resource_type: String,
    /// `0` if the service sent something that is not a number.
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub resource_id: u64,
    pub song: Option<Song>,
    pub album: Option<Album>,
    pub artist: Option<Artist>,
    pub playlist: Option<Playlist>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassicResults {
    #[serde_as(as = "DefaultOnNull")]
    pub songs: Vec<Song>,
    pub song_count: u64,

    #[serde_as(as = "DefaultOnNull")]
    pub albums: Vec<Album>,
    pub album_count: u64,

    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,
    pub artist_count: u64,

    #[serde_as(as = "DefaultOnNull")]
    pub playlists: Vec<Playlist>,
    pub playlist_count: u64,

    #[serde_as(as = "DefaultOnNull")]
    pub dj_radios: Vec<Radio>,
    pub dj_radios_count: u64,

    pub has_more: bool,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Radio {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub name: String,

    #[serde(default)]
    pub pic_url: Option<String>,
}

/// Payload of the suggestion endpoint. Older servers answer with `result`,
/// newer ones with `data`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Suggestions {
    #[serde(default)]
    data: Option<SuggestData>,

    #[serde(default)]
    result: Option<SuggestResult>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
struct SuggestData {
    #[serde_as(as = "DefaultOnNull")]
    suggests: Vec<Keyword>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
struct SuggestResult {
    #[serde_as(as = "DefaultOnNull")]
    all_match: Vec<Keyword>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
struct Keyword {
    keyword: String,
}

impl Suggestions {
    /// Suggested keywords, most relevant first, without duplicates.
    #[must_use]
    pub fn keywords(&self) -> Vec<&str> {
        let data = self.data.iter().flat_map(|data| &data.suggests);
        let result = self.result.iter().flat_map(|result| &result.all_match);

        let mut keywords: Vec<&str> = Vec::new();
        for keyword in data.chain(result) {
            if !keywords.contains(&keyword.keyword.as_str()) {
                keywords.push(&keyword.keyword);
            }
        }
        keywords
    }
}
