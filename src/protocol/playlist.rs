//! Playlist details.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, DisplayFromStr, PickFirst};

use super::{comment::User, song::Song};

/// Payload of the playlist detail endpoint.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PlaylistDetail {
    pub playlist: Playlist,

    /// Playability of each track, in track order.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub privileges: Vec<Privilege>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub name: String,

    /// Detail endpoints call it `coverImgUrl`, search endpoints `picUrl`.
    #[serde(default, alias = "picUrl")]
    pub cover_img_url: Option<String>,

    #[serde(default)]
    pub creator: Option<User>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub track_count: u64,

    /// Every track id, even if `tracks` was truncated.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub track_ids: Vec<TrackId>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub tracks: Vec<Song>,

    /// Reported as a float by some endpoints.
    #[serde(default)]
    pub play_count: f64,

    #[serde(default)]
    pub subscribed_count: u64,

    #[serde(default)]
    pub comment_count: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub subscribed: bool,

    /// Milliseconds since epoch.
    #[serde(default)]
    pub update_time: i64,
}

#[serde_as]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TrackId {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Privilege {
    pub id: u64,

    #[serde(default)]
    pub fee: i64,

    /// Highest playable bit rate, `0` if unplayable.
    #[serde(default)]
    pub pl: u64,

    /// Highest downloadable bit rate.
    #[serde(default)]
    pub dl: u64,

    #[serde(default)]
    pub maxbr: u64,

    /// Negative if the track is unavailable in the region.
    #[serde(default)]
    pub st: i64,
}

impl Privilege {
    #[must_use]
    pub fn is_playable(&self) -> bool {
        self.st >= 0 && self.pl > 0
    }
}
