//! Songs, playback URLs and lyrics.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, DisplayFromStr, DurationMilliSeconds, PickFirst};

use crate::error::Error;

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Song {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub name: String,

    /// Detail endpoints call it `ar`, search endpoints `artists`.
    #[serde(default, rename = "ar", alias = "artists")]
    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,

    #[serde(default, rename = "al", alias = "album")]
    #[serde_as(as = "DefaultOnNull")]
    pub album: Album,

    #[serde(default, rename = "dt", alias = "duration")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,

    /// Licensing class; `1` and `4` need a subscription or purchase.
    #[serde(default)]
    pub fee: i64,

    /// Id of the music video, `0` without one.
    #[serde(default)]
    pub mv: u64,
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let artists: Vec<&str> = self.artists.iter().map(|a| a.name.as_str()).collect();
        if artists.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} - {}", artists.join(" / "), self.name)
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub name: String,

    #[serde(default)]
    pub pic_url: Option<String>,

    #[serde(default, alias = "alia")]
    #[serde_as(as = "DefaultOnNull")]
    pub alias: Vec<String>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(default)]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub name: String,

    #[serde(default)]
    pub pic_url: Option<String>,

    /// Milliseconds since epoch.
    #[serde(default)]
    pub publish_time: i64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,
}

/// Audio quality of a playback URL.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SongLevel {
    #[default]
    Standard,
    Higher,
    ExHigh,
    Lossless,
    HiRes,
    /// Immersive surround.
    Sky,
    JyEffect,
    JyMaster,
}

impl SongLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Higher => "higher",
            Self::ExHigh => "exhigh",
            Self::Lossless => "lossless",
            Self::HiRes => "hires",
            Self::Sky => "sky",
            Self::JyEffect => "jyeffect",
            Self::JyMaster => "jymaster",
        }
    }
}

impl fmt::Display for SongLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SongLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_ascii_lowercase().as_str() {
            "standard" => Self::Standard,
            "higher" => Self::Higher,
            "exhigh" => Self::ExHigh,
            "lossless" => Self::Lossless,
            "hires" => Self::HiRes,
            "sky" => Self::Sky,
            "jyeffect" => Self::JyEffect,
            "jymaster" => Self::JyMaster,
            _ => return Err(Error::invalid_argument(format!("unknown level \"{s}\""))),
        };
        Ok(level)
    }
}

/// Payload of the playback URL endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SongUrls {
    #[serde(default)]
    pub data: Vec<SongUrl>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongUrl {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    /// `None` if the song cannot be played with the current account.
    #[serde(default)]
    pub url: Option<String>,

    /// Bit rate in bits per second.
    #[serde(default)]
    pub br: u64,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub md5: Option<String>,

    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub encode_type: Option<String>,

    /// Per-URL status, `200` if playable.
    #[serde(default)]
    pub code: i64,

    /// Validity of the URL in seconds.
    #[serde(default)]
    pub expi: u64,
}

/// Payload of the lyric endpoint. Every variant is optional: instrumentals
/// have none, most songs lack translations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Lyrics {
    /// Line-synced original lyrics.
    #[serde(default)]
    pub lrc: Option<LyricData>,

    /// Word-synced karaoke lyrics.
    #[serde(default)]
    pub klyric: Option<LyricData>,

    /// Translation.
    #[serde(default)]
    pub tlyric: Option<LyricData>,

    /// Romanization.
    #[serde(default)]
    pub romalrc: Option<LyricData>,

    /// Word-synced original, newer format.
    #[serde(default)]
    pub yrc: Option<LyricData>,

    #[serde(default)]
    pub ytlrc: Option<LyricData>,

    #[serde(default)]
    pub yromalrc: Option<LyricData>,

    /// Set for songs without lyrics.
    #[serde(default)]
    pub nolyric: bool,

    /// Set for instrumentals.
    #[serde(default)]
    pub uncollected: bool,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LyricData {
    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub lyric: String,
}

impl Lyrics {
    /// Non-empty line-synced lyrics, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.lrc
            .as_ref()
            .map(|lrc| lrc.lyric.as_str())
            .filter(|lyric| !lyric.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;

    #[test]
    fn songs_from_detail_and_search_shapes() {
        let detail: Song = serde_json::from_str(
            r#"{"id":186016,"name":"晴天","ar":[{"id":6452,"name":"周杰伦"}],"al":{"id":18905,"name":"叶惠美"},"dt":269000}"#,
        )
        .unwrap();
        let search: Song = serde_json::from_str(
            r#"{"id":"186016","name":"晴天","artists":[{"id":6452,"name":"周杰伦","alias":null}],"album":{"id":18905,"name":"叶惠美"},"duration":269000}"#,
        )
        .unwrap();
        assert_eq!(detail, search);
        assert_eq!(detail.duration, Duration::from_secs(269));
        assert_eq!(detail.to_string(), "周杰伦 - 晴天");
    }

    #[test]
    fn song_urls() {
        let body = r#"{"code":200,"data":[{"id":186016,"url":null,"br":0,"size":0,"code":404,"freeTrialInfo":null}]}"#;
        let urls = protocol::json::<SongUrls>(body, "url").unwrap();
        assert_eq!(urls.data[0].url, None);
        assert_eq!(urls.data[0].code, 404);
    }

    #[test]
    fn lyrics() {
        let body = r#"{"code":200,"lrc":{"version":3,"lyric":"[00:00.00]x"},"tlyric":{"version":0,"lyric":""}}"#;
        let lyrics = protocol::json::<Lyrics>(body, "lyric").unwrap();
        assert_eq!(lyrics.text(), Some("[00:00.00]x"));
        assert_eq!(lyrics.tlyric.unwrap().lyric, "");

        let lyrics = protocol::json::<Lyrics>(r#"{"code":200,"nolyric":true}"#, "lyric").unwrap();
        assert!(lyrics.nolyric);
        assert_eq!(lyrics.text(), None);
    }

    #[test]
    fn levels() {
        assert_eq!("HiRes".parse::<SongLevel>().unwrap(), SongLevel::HiRes);
        assert_eq!(SongLevel::ExHigh.to_string(), "exhigh");
        assert!("ultra".parse::<SongLevel>().is_err());
    }
}
