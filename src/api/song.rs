use super::Api;
use crate::{
    crypto::CryptoMode,
    error::Result,
    protocol::{
        song::{Lyrics, SongLevel, SongUrls},
        Request,
    },
};

fn song_url_request(id: u64, level: SongLevel) -> Request {
    let request = Request::post("/api/song/enhance/player/url/v1", CryptoMode::Weapi)
        .param("ids", format!("[{id}]"))
        .param("level", level.as_str())
        .param("encodeType", "flac");

    match level {
        SongLevel::Sky => request.param("immerseType", "c51"),
        _ => request,
    }
}

fn lyric_request(id: u64) -> Request {
    Request::post("/api/song/lyric", CryptoMode::Weapi)
        .param("id", id)
        .param("lv", -1)
        .param("tv", -1)
        .param("rv", -1)
        .param("kv", -1)
        .param("_nmclfl", 1)
}

impl Api {
    /// Playback URL of a song at the given quality.
    ///
    /// The service may answer with a lower quality than asked for, or no
    /// URL at all; check [`crate::protocol::song::SongUrl::url`].
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn song_url(&self, id: u64, level: SongLevel) -> Result<SongUrls> {
        let urls: SongUrls = self.request(&song_url_request(id, level)).await?;
        if let Some(url) = urls.data.first() {
            debug!(
                "song {id} at {level}: code {}, {}",
                url.code,
                if url.url.is_some() { "url present" } else { "no url" }
            );
        }
        Ok(urls)
    }

    /// Lyrics of a song with all translations.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn lyric(&self, id: u64) -> Result<Lyrics> {
        self.request(&lyric_request(id)).await
    }
}
