use super::Api;
use crate::{
    comments::{CommentQuery, CommentService, FloorQuery, ThreadId},
    crypto::CryptoMode,
    error::Result,
    protocol::{
        comment::{CommentData, CommentPage},
        user::UserDetail,
        Ack, Request,
    },
};

fn comments_request(query: &CommentQuery) -> Request {
    Request::post("/api/v2/resource/comments", CryptoMode::Weapi)
        .param("threadId", query.thread_id.as_str())
        .param("pageNo", query.page)
        .param("showInner", true)
        .param("pageSize", query.page_size)
        .param("cursor", query.cursor.as_str())
        .param("sortType", query.sort as u8)
}

fn floor_request(query: &FloorQuery) -> Request {
    Request::post("/api/resource/comment/floor/get", CryptoMode::Weapi)
        .param("parentCommentId", query.parent_comment_id)
        .param("threadId", query.thread_id.as_str())
        .param("time", query.time)
        .param("limit", query.limit)
}

fn like_request(thread_id: &ThreadId, comment_id: u64, like: bool) -> Request {
    let action = if like { "like" } else { "unlike" };
    Request::post(format!("/api/v1/comment/{action}"), CryptoMode::Weapi)
        .param("threadId", thread_id.as_str())
        .param("commentId", comment_id)
}

impl Api {
    /// One page of top-level comments.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn resource_comments(&self, query: &CommentQuery) -> Result<CommentPage> {
        let data: CommentData = self.request(&comments_request(query)).await?;
        Ok(data.data)
    }

    /// One page of replies to a comment.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn floor_comments(&self, query: &FloorQuery) -> Result<CommentPage> {
        let data: CommentData = self.request(&floor_request(query)).await?;
        Ok(data.data)
    }

    /// Likes a comment, or removes the like if `like` is `false`. Needs a
    /// logged in session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn like_comment(&self, thread_id: &ThreadId, comment_id: u64, like: bool) -> Result<()> {
        self.request::<Ack>(&like_request(thread_id, comment_id, like))
            .await
            .map(|_| ())
    }
}

impl CommentService for Api {
    async fn comments(&self, query: CommentQuery) -> Result<CommentPage> {
        self.resource_comments(&query).await
    }

    async fn floor(&self, query: FloorQuery) -> Result<CommentPage> {
        self.floor_comments(&query).await
    }

    async fn like(&self, thread_id: ThreadId, comment_id: u64, like: bool) -> Result<()> {
        self.like_comment(&thread_id, comment_id, like).await
    }

    async fn user_detail(&self, user_id: u64) -> Result<UserDetail> {
        Api::user_detail(self, user_id).await
    }
}
