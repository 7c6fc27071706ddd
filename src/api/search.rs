use super::Api;
use crate::{
    crypto::CryptoMode,
    error::Result,
    protocol::{
        search::{SearchKind, SearchResults, Suggestions},
        Request,
    },
};

/// Songs and playlists are searched like the mobile client does; the
/// classic endpoint returns poorer results for them.
fn search_request(keyword: &str, kind: SearchKind, limit: u32, offset: u32) -> Request {
    let resource_path = match kind {
        SearchKind::Song => Some("/api/search/resource/horizontal/song"),
        SearchKind::Playlist => Some("/api/search/multi/terminal/playlist/get"),
        SearchKind::Album | SearchKind::Artist | SearchKind::Radio => None,
    };

    match resource_path {
        Some(path) => Request::post(path, CryptoMode::Eapi)
            .param("offset", offset.to_string())
            .param("limit", limit.to_string())
            .param("keyword", keyword)
            .param("header", "{}")
            .param("e_r", false),
        None => Request::post("/api/search/get", CryptoMode::Weapi)
            .param("s", keyword)
            .param("type", kind.code())
            .param("limit", limit)
            .param("offset", offset),
    }
}

fn suggest_request(keyword: &str) -> Request {
    Request::post("/api/search/suggest/web", CryptoMode::Weapi).param("s", keyword)
}

impl Api {
    /// Searches for `keyword`, `limit` results starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn search(
        &self,
        keyword: &str,
        kind: SearchKind,
        limit: u32,
        offset: u32,
    ) -> Result<SearchResults> {
        self.request(&search_request(keyword, kind, limit, offset)).await
    }

    /// Keywords to complete a partially typed search.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn search_suggest(&self, keyword: &str) -> Result<Suggestions> {
        self.request(&suggest_request(keyword)).await
    }
}
