//! Comment thread responses.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "code": 200,
//!     "data": {
//!         "totalCount": 14012,
//!         "hasMore": true,
//!         "cursor": "1700000000000",
//!         "comments": [
//!             {
//!                 "commentId": 6182361,
//!                 "user": { "userId": 1, "nickname": "n", "avatarUrl": "https://..." },
//!                 "content": "...",
//!                 "time": 1700000000000,
//!                 "likedCount": 5,
//!                 "liked": false,
//!                 "replyCount": 2,
//!                 "beReplied": [],
//!                 "ipLocation": { "location": "..." },
//!                 "parentCommentId": 0
//!             }
//!         ]
//!     }
//! }
//! ```
//!
//! Floor responses carry the paging timestamp as `time` instead of `cursor`
//! on some server versions; [`CommentPage::next_cursor`] looks at both.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, DisplayFromStr, PickFirst};

use crate::comments::Cursor;

/// Payload of the comment and floor endpoints.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct CommentData {
    #[serde(default)]
    pub data: CommentPage,
}

/// One page of a thread.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentPage {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub total_count: u64,

    pub has_more: bool,

    pub cursor: Option<Cursor>,

    pub time: Option<Cursor>,

    #[serde_as(as = "DefaultOnNull")]
    pub comments: Vec<Comment>,
}

impl CommentPage {
    /// Token for the next page, wherever the server put it.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref().or(self.time.as_ref())
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(rename = "commentId")]
    pub id: u64,

    pub user: User,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub content: String,

    /// Milliseconds since epoch.
    #[serde(default)]
    pub time: i64,

    #[serde(default)]
    pub liked_count: u64,

    #[serde(default)]
    pub liked: bool,

    #[serde(default)]
    pub reply_count: u64,

    /// `0` for top-level comments.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull<PickFirst<(_, DisplayFromStr)>>")]
    pub parent_comment_id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub be_replied: Vec<QuotedReply>,

    #[serde(default)]
    pub ip_location: Option<IpLocation>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub user_id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub nickname: String,

    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The comment a reply answers to.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedReply {
    pub user: User,

    /// `None` if the quoted comment was deleted.
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull<PickFirst<(_, DisplayFromStr)>>")]
    pub be_replied_comment_id: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IpLocation {
    #[serde(default)]
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{self, Response};

    const PAGE: &str = r#"{
        "code": 200,
        "data": {
            "totalCount": 2,
            "hasMore": false,
            "cursor": 1700000000000,
            "sortType": 3,
            "comments": [
                {
                    "commentId": 11,
                    "user": { "userId": 1, "nickname": "a", "avatarUrl": "https://p.music/1.jpg", "vipType": 11 },
                    "content": "first",
                    "time": 1700000000001,
                    "likedCount": 5,
                    "liked": false,
                    "replyCount": 1,
                    "beReplied": null,
                    "ipLocation": { "location": "Shanghai" },
                    "parentCommentId": 0
                },
                {
                    "commentId": "12",
                    "user": { "userId": "2", "nickname": null, "avatarUrl": null },
                    "content": "reply",
                    "time": 1700000000002,
                    "beReplied": [
                        { "user": { "userId": 1, "nickname": "a" }, "content": null, "beRepliedCommentId": 11 }
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn parses_drifting_comment_pages() {
        let page = protocol::json::<CommentData>(PAGE, "comments").unwrap().data;
        assert_eq!(page.total_count, 2);
        assert!(!page.has_more);
        assert_eq!(page.next_cursor().unwrap().as_str(), "1700000000000");

        let first = &page.comments[0];
        assert_eq!(first.id, 11);
        assert_eq!(first.liked_count, 5);
        assert!(first.be_replied.is_empty());
        assert_eq!(
            first.ip_location.as_ref().and_then(|ip| ip.location.as_deref()),
            Some("Shanghai")
        );

        let second = &page.comments[1];
        assert_eq!(second.id, 12);
        assert_eq!(second.user.user_id, 2);
        assert_eq!(second.user.nickname, "");
        assert_eq!(second.be_replied[0].be_replied_comment_id, 11);
        assert_eq!(second.be_replied[0].content, None);
    }

    #[test]
    fn floor_pages_use_time() {
        let body = r#"{"code":200,"data":{"hasMore":true,"time":1699999999999,"comments":[]}}"#;
        let page = protocol::json::<CommentData>(body, "floor").unwrap().data;
        assert!(page.has_more);
        assert_eq!(page.next_cursor().and_then(Cursor::as_i64), Some(1_699_999_999_999));
    }

    #[test]
    fn missing_data_is_an_empty_page() {
        let response: Response<CommentData> = serde_json::from_str(r#"{"code":200}"#).unwrap();
        assert_eq!(response.payload.data, CommentPage::default());
    }
}
