use super::Api;
use crate::{
    crypto::CryptoMode,
    error::Result,
    protocol::{playlist::PlaylistDetail, Request},
};

fn playlist_request(id: u64) -> Request {
    Request::post("/api/v6/playlist/detail", CryptoMode::Weapi)
        .param("id", id.to_string())
        .param("n", "100000")
        .param("s", "8")
}

impl Api {
    /// A playlist with its tracks and their playability.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn playlist_detail(&self, id: u64) -> Result<PlaylistDetail> {
        debug!("requesting playlist {id}");
        self.request(&playlist_request(id)).await
    }
}
