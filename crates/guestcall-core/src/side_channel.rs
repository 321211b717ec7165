//! Auxiliary REST calls on the conversation's member sub-resource.
//!
//! These are triggered by roster transitions but are not part of the
//! event stream itself. All three operations are fire-and-forget:
//! failures are logged and absorbed, never returned to the caller.

use reqwest::StatusCode;
use serde::Serialize;

use crate::events::MemberRecord;
use crate::roster::Member;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoticePayload<'a> {
    body: &'a str,
    body_type: &'a str,
}

pub struct SideChannelClient {
    http: reqwest::Client,
    api_base: String,
    conversation_id: String,
    member_id: String,
    access_token: String,
}

impl SideChannelClient {
    pub fn new(
        api_base: String,
        conversation_id: String,
        member_id: String,
        access_token: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            conversation_id,
            member_id,
            access_token,
        }
    }

    fn member_url(&self, member_id: &str) -> String {
        format!(
            "{}/api/v2/webchat/guest/conversations/{}/members/{}",
            self.api_base, self.conversation_id, member_id
        )
    }

    /// Fetch the full profile of a conversation member. `None` on any
    /// failure; the roster keeps whatever it already has.
    pub async fn hydrate_member(&self, member_id: &str) -> Option<Member> {
        let url = self.member_url(member_id);

        let response = match self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("member info request failed: {e}");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!(
                "member info request failed: status code {}",
                response.status().as_u16()
            );
            return None;
        }

        match response.json::<MemberRecord>().await {
            Ok(record) => Some(Member::from(record)),
            Err(e) => {
                tracing::warn!("member info response parse error: {e}");
                None
            }
        }
    }

    /// Post a notice message to the conversation as the local customer.
    pub async fn send_notice(&self, text: &str) {
        let url = format!("{}/messages", self.member_url(&self.member_id));
        let payload = NoticePayload {
            body: text,
            body_type: "notice",
        };

        match self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status() != StatusCode::OK => {
                tracing::warn!(
                    "chat notice failed: status code {}",
                    response.status().as_u16()
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("chat notice failed: {e}"),
        }
    }

    /// Delete the local customer's own membership. Invoked once during
    /// teardown; 200 and 204 both count as success.
    pub async fn remove_membership(&self) {
        let url = self.member_url(&self.member_id);

        match self
            .http
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
                    tracing::warn!("member delete failed: status code {}", status.as_u16());
                }
            }
            Err(e) => tracing::warn!("member delete failed: {e}"),
        }
    }
}
