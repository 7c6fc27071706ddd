//! User profiles, as shown when tapping a comment author.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, DisplayFromStr, PickFirst};

/// Payload of the user detail endpoint.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub level: u32,

    /// Songs played over the account's lifetime.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub listen_songs: u64,

    /// `None` for closed or deleted accounts.
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub user_id: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub nickname: String,

    #[serde(default)]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub signature: Option<String>,

    #[serde(default)]
    pub background_url: Option<String>,

    /// `0` without a subscription.
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub vip_type: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;

    #[test]
    fn user_detail() {
        let body = r#"{
            "code": 200,
            "level": 9,
            "listenSongs": 12345,
            "profile": {
                "userId": "32953014",
                "nickname": "rain",
                "avatarUrl": "https://p.music/a.jpg",
                "signature": null,
                "vipType": 11,
                "followeds": 3
            }
        }"#;
        let detail = protocol::json::<UserDetail>(body, "user").unwrap();
        assert_eq!(detail.level, 9);
        assert_eq!(detail.listen_songs, 12_345);
        let profile = detail.profile.unwrap();
        assert_eq!(profile.user_id, 32_953_014);
        assert_eq!(profile.nickname, "rain");
        assert_eq!(profile.signature, None);
        assert_eq!(profile.vip_type, 11);
    }

    #[test]
    fn closed_account() {
        let detail = protocol::json::<UserDetail>(r#"{"code":200,"level":null}"#, "user").unwrap();
        assert_eq!(detail, UserDetail::default());
    }
}
