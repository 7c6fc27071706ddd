//! Typed endpoints of the music service.
//!
//! [`Api`] wraps a [`Transport`] and offers one method per endpoint. Each
//! method builds a fresh [`Request`], sends it and decodes the response.
//! Methods never retry and never touch the session themselves.
//!
//! # Example
//!
//! ```rust
//! use ncmapi::{api::Api, config::Config, protocol::song::SongLevel};
//!
//! let api = Api::new(&Config::default())?;
//! let lyrics = api.lyric(186_016).await?;
//! let urls = api.song_url(186_016, SongLevel::ExHigh).await?;
//! ```

mod comment;
mod playlist;
mod search;
mod song;
mod user;

use std::{fmt::Debug, sync::Arc};

use serde::Deserialize;

use crate::{
    config::Config,
    error::Result,
    protocol::Request,
    session::Session,
    transport::Transport,
};

pub struct Api {
    transport: Transport,
}

impl Api {
    /// Creates a client with a new session built from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_session(config, Arc::new(Session::from_config(config)))
    }

    /// Creates a client that shares `session` with other clients.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn with_session(config: &Config, session: Arc<Session>) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config, session)?,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        self.transport.session()
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Sends any request and decodes its response, for endpoints without a
    /// dedicated method.
    ///
    /// # Errors
    ///
    /// See [`Transport::request_json`].
    pub async fn request<T>(&self, request: &Request) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        self.transport.request_json(request).await
    }
}
