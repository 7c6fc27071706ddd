//! Client for the NetEase Cloud Music web API.
//!
//! The service only answers requests that look like they came from one of
//! its official clients. This crate takes care of that:
//!
//! * [`crypto`] signs request bodies the way the web, Linux and mobile
//!   clients do
//! * [`session`] generates and remembers the device and visitor identity
//!   those clients send as cookies
//! * [`transport`] routes, signs and sends requests and decodes whatever
//!   comes back
//! * [`api`] offers typed methods for comments, search, songs and playlists
//! * [`comments`] pages through comment threads and their replies, with
//!   optimistic likes
//!
//! # Example
//!
//! ```rust
//! use ncmapi::{
//!     api::Api,
//!     comments::{CommentController, Resource, ResourceType},
//!     config::Config,
//! };
//!
//! let config = Config::default();
//! let controller = CommentController::from_config(Api::new(&config)?, &config);
//! controller
//!     .load_comments(Resource::new(ResourceType::Song, 186_016), false)
//!     .await;
//! for comment in &controller.state().thread.comments {
//!     println!("{}: {}", comment.user.nickname, comment.content);
//! }
//! ```
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod comments;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod protocol;
pub mod rand;
pub mod session;
pub mod transport;
pub mod util;
