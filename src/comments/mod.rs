//! Comment threads: addressing, sort orders, cursors and the pagination
//! controller.
//!
//! A thread is addressed by a [`ThreadId`], the resource's type prefix glued
//! to its numeric id. Top-level comments are paged by page number and a
//! cursor whose construction depends on the [`SortType`]; replies to a
//! comment (its "floor") are paged by the timestamp of the last reply.
//!
//! The network side is abstracted as [`CommentService`], which
//! [`crate::api::Api`] implements. [`CommentController`] folds its results
//! into observable state.

mod controller;

pub use controller::{CommentController, CommentState, FloorState, ProfileState, ThreadState};

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    error::Result,
    protocol::{comment::CommentPage, user::UserDetail},
};

/// Kind of resource a comment thread belongs to.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ResourceType {
    #[default]
    Song,
    MusicVideo,
    Playlist,
    Album,
    DjProgram,
    Video,
}

impl ResourceType {
    /// Literal the service prepends to resource ids.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Song => "R_SO_4_",
            Self::MusicVideo => "R_MV_5_",
            Self::Playlist => "A_PL_0_",
            Self::Album => "R_AL_3_",
            Self::DjProgram => "A_DJ_1_",
            Self::Video => "R_VI_62_",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Song => write!(f, "song"),
            Self::MusicVideo => write!(f, "mv"),
            Self::Playlist => write!(f, "playlist"),
            Self::Album => write!(f, "album"),
            Self::DjProgram => write!(f, "program"),
            Self::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for ResourceType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "song" => Ok(Self::Song),
            "mv" => Ok(Self::MusicVideo),
            "playlist" => Ok(Self::Playlist),
            "album" => Ok(Self::Album),
            "program" | "dj" => Ok(Self::DjProgram),
            "video" => Ok(Self::Video),
            _ => Err(crate::error::Error::invalid_argument(format!(
                "unknown resource type \"{s}\""
            ))),
        }
    }
}

/// A resource whose comments are shown.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Resource {
    pub kind: ResourceType,
    pub id: u64,
}

impl Resource {
    #[must_use]
    pub const fn new(kind: ResourceType, id: u64) -> Self {
        Self { kind, id }
    }

    #[must_use]
    pub fn thread_id(self) -> ThreadId {
        ThreadId::new(self.kind, self.id)
    }
}

/// Thread identifier as the service expects it, e.g. `R_SO_4_186016`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    #[must_use]
    pub fn new(kind: ResourceType, id: u64) -> Self {
        Self(format!("{}{id}", kind.prefix()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order of top-level comments.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum SortType {
    #[default]
    Recommended = 99,
    Hot = 2,
    Time = 3,
}

impl SortType {
    /// Cursor to send for `page` (1-based).
    ///
    /// Recommended and hot orders are offsets the client computes; the
    /// service does not return a usable cursor for them. Time order echoes
    /// whatever token the previous page returned.
    #[must_use]
    pub fn cursor(self, page: u32, page_size: u32, previous: Option<&Cursor>) -> Cursor {
        let offset = u64::from(page.saturating_sub(1)) * u64::from(page_size);
        match self {
            Self::Recommended => Cursor::from(offset.to_string()),
            Self::Hot => Cursor::from(format!("normalHot#{offset}")),
            Self::Time => match previous {
                Some(cursor) if page > 1 => cursor.clone(),
                _ => Cursor::from("0"),
            },
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recommended => write!(f, "recommended"),
            Self::Hot => write!(f, "hot"),
            Self::Time => write!(f, "time"),
        }
    }
}

impl std::str::FromStr for SortType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "recommended" | "99" => Ok(Self::Recommended),
            "hot" | "2" => Ok(Self::Hot),
            "time" | "3" => Ok(Self::Time),
            _ => Err(crate::error::Error::invalid_argument(format!(
                "unknown sort type \"{s}\""
            ))),
        }
    }
}

/// Opaque pagination token.
///
/// Sent as a string. The service returns it as either a string or a number
/// depending on endpoint and mood; both are accepted.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(from = "CursorRepr", into = "String")]
pub struct Cursor(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum CursorRepr {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<CursorRepr> for Cursor {
    fn from(repr: CursorRepr) -> Self {
        match repr {
            CursorRepr::Text(s) => Self(s),
            CursorRepr::Signed(n) => Self(n.to_string()),
            CursorRepr::Unsigned(n) => Self(n.to_string()),
        }
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.0
    }
}

impl Cursor {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token as a timestamp, for floor paging.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One page of top-level comments.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CommentQuery {
    pub thread_id: ThreadId,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub sort: SortType,
    pub cursor: Cursor,
}

/// One page of replies to a comment.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FloorQuery {
    pub parent_comment_id: u64,
    pub thread_id: ThreadId,
    /// Timestamp of the last reply seen, `-1` for the first page.
    pub time: i64,
    pub limit: u32,
}

impl FloorQuery {
    /// Sentinel `time` of the first page.
    pub const FIRST_PAGE: i64 = -1;
}

/// Network side of the comment controller.
pub trait CommentService: Send + Sync {
    fn comments(&self, query: CommentQuery) -> impl Future<Output = Result<CommentPage>> + Send;

    fn floor(&self, query: FloorQuery) -> impl Future<Output = Result<CommentPage>> + Send;

    /// Likes the comment, or removes the like if `like` is `false`.
    fn like(
        &self,
        thread_id: ThreadId,
        comment_id: u64,
        like: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Profile of a comment author.
    fn user_detail(&self, user_id: u64) -> impl Future<Output = Result<UserDetail>> + Send;
}
