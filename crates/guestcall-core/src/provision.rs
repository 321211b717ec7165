//! Guest conversation provisioning.
//!
//! One request/response call creates the conversation and returns the
//! credentials every later REST and stream operation runs on.

use std::collections::HashMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::errors::ChatError;
use crate::settings::Settings;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingTarget {
    pub target_type: String,
    pub target_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    organization_id: String,
    deployment_id: String,
    routing_target: RoutingTarget,
    member_info: MemberInfo,
}

/// Everything needed to create a guest conversation. Supplied by the
/// configuration layer; values are passed through as-is.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Base URL of the contact-center API, e.g. `https://api.mypurecloud.com`.
    pub api_base: String,
    pub organization_id: String,
    pub deployment_id: String,
    pub routing_target: RoutingTarget,
    pub member_info: MemberInfo,
}

impl ProvisionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut custom_fields = HashMap::new();
        custom_fields.insert(
            "origin.widget.videoCall".to_string(),
            "guest app".to_string(),
        );
        custom_fields.insert(
            "origin.widget.conversation.type".to_string(),
            "video".to_string(),
        );

        Self {
            api_base: settings.api_base(),
            organization_id: settings.organization_id.clone(),
            deployment_id: settings.deployment_id.clone(),
            routing_target: RoutingTarget {
                target_type: settings.target_type.clone(),
                target_address: settings.target_address.clone(),
            },
            member_info: MemberInfo {
                display_name: settings.display_name.clone(),
                avatar_image_url: settings.avatar_image_url.clone(),
                last_name: settings.last_name.clone(),
                first_name: settings.first_name.clone(),
                email: settings.email.clone(),
                phone_number: settings.phone_number.clone(),
                custom_fields: Some(custom_fields),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionedMember {
    pub id: String,
}

/// Session credentials returned by provisioning. Immutable for the life
/// of the session; the access token authorizes every subsequent REST and
/// stream operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCredentials {
    /// Conversation id.
    pub id: String,
    pub access_token: String,
    #[serde(rename = "eventStreamURI")]
    pub event_stream_uri: String,
    /// The local customer's own membership.
    pub member: ProvisionedMember,
}

/// Creates the guest conversation over the request/response API.
pub struct ChatProvisioner;

impl ChatProvisioner {
    /// Issue the one-shot chat request. Success is exactly an HTTP 200
    /// with a decodable body; anything else is terminal, with no retry.
    pub async fn provision(config: &ProvisionConfig) -> Result<ChatCredentials, ChatError> {
        let url = format!("{}/api/v2/webchat/guest/conversations", config.api_base);

        let request = ChatRequest {
            organization_id: config.organization_id.clone(),
            deployment_id: config.deployment_id.clone(),
            routing_target: config.routing_target.clone(),
            member_info: config.member_info.clone(),
        };

        tracing::info!("creating guest conversation at {url}");

        let response = reqwest::Client::new()
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Provision(format!("chat request failed: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(ChatError::Provision(format!(
                "chat request failed: status code {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<ChatCredentials>()
            .await
            .map_err(|e| ChatError::Provision(format!("chat response parse error: {e}")))
    }
}
