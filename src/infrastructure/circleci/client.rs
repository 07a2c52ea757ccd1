use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{CiClient, CiUser, HeadType, InvalidToken, PipelineRequest, TriggeredPipeline};

pub const DEFAULT_API_URL: &str = "https://circleci.com/api/v2";

#[derive(Debug, Serialize, PartialEq)]
struct TriggerPipelineBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

impl TriggerPipelineBody {
    fn from_request(request: &PipelineRequest) -> Self {
        match request.head_type {
            HeadType::Branch => Self {
                branch: Some(request.head.clone()),
                tag: None,
            },
            HeadType::Tag => Self {
                branch: None,
                tag: Some(request.head.clone()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: String,
    #[serde(default)]
    login: String,
    #[serde(default)]
    name: String,
}

/// CircleCI v2 API client; every call carries the caller's personal token
#[derive(Clone)]
pub struct CircleCiClient {
    client: reqwest::Client,
    api_url: String,
}

impl CircleCiClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn pipeline_url(&self, request: &PipelineRequest) -> String {
        format!("{}/project/{}/pipeline", self.api_url, request.project_slug())
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return InvalidToken.into();
    }
    anyhow!("CircleCI API error ({}): {}", status, body)
}

#[async_trait]
impl CiClient for CircleCiClient {
    async fn me(&self, token: &str) -> Result<CiUser> {
        let response = self
            .client
            .get(format!("{}/me", self.api_url))
            .header("Circle-Token", token)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach CircleCI")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let me: MeResponse = response.json().await.context("Invalid CircleCI /me response")?;
        Ok(CiUser {
            id: me.id,
            login: me.login,
            name: me.name,
        })
    }

    async fn trigger_pipeline(&self, token: &str, request: &PipelineRequest) -> Result<TriggeredPipeline> {
        let response = self
            .client
            .post(self.pipeline_url(request))
            .header("Circle-Token", token)
            .header("Accept", "application/json")
            .json(&TriggerPipelineBody::from_request(request))
            .send()
            .await
            .context("Failed to reach CircleCI")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        response.json().await.context("Invalid CircleCI pipeline response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VcsKind;

    fn request(head_type: HeadType) -> PipelineRequest {
        PipelineRequest {
            vcs_kind: VcsKind::Bitbucket,
            org_name: "acme".to_string(),
            repo_name: "widgets".to_string(),
            head_type,
            head: "v1.2.0".to_string(),
        }
    }

    #[test]
    fn test_pipeline_url_uses_project_slug() {
        let client = CircleCiClient::new("https://circleci.com/api/v2/").unwrap();
        assert_eq!(
            client.pipeline_url(&request(HeadType::Tag)),
            "https://circleci.com/api/v2/project/bb/acme/widgets/pipeline"
        );
    }

    #[test]
    fn test_trigger_body_carries_branch_or_tag() {
        let tag = serde_json::to_value(TriggerPipelineBody::from_request(&request(HeadType::Tag))).unwrap();
        assert_eq!(tag, serde_json::json!({"tag": "v1.2.0"}));

        let branch = serde_json::to_value(TriggerPipelineBody::from_request(&request(HeadType::Branch))).unwrap();
        assert_eq!(branch, serde_json::json!({"branch": "v1.2.0"}));
    }

    #[test]
    fn test_unauthorized_is_an_invalid_token() {
        let err = api_error(reqwest::StatusCode::UNAUTHORIZED, r#"{"message":"You must log in first."}"#);
        assert!(err.downcast_ref::<InvalidToken>().is_some());

        let err = api_error(reqwest::StatusCode::NOT_FOUND, r#"{"message":"Project not found"}"#);
        assert!(err.downcast_ref::<InvalidToken>().is_none());
        assert!(err.to_string().contains("Project not found"));
    }
}
