use super::Api;
use crate::{
    crypto::CryptoMode,
    error::Result,
    protocol::{user::UserDetail, Request},
};

fn user_detail_request(user_id: u64) -> Request {
    Request::post(format!("/api/v1/user/detail/{user_id}"), CryptoMode::Weapi)
}

impl Api {
    /// Profile and listening level of a user.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    pub async fn user_detail(&self, user_id: u64) -> Result<UserDetail> {
        debug!("requesting profile of user {user_id}");
        self.request(&user_detail_request(user_id)).await
    }
}
