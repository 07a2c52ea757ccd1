use async_trait::async_trait;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{Post, VcsKind};

/// Creates posts in chat channels
#[async_trait]
pub trait PostSink: Send + Sync {
    async fn create_post(&self, post: &Post) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CiUser {
    pub id: String,
    pub login: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadType {
    Branch,
    Tag,
}

impl std::str::FromStr for HeadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(HeadType::Branch),
            "tag" => Ok(HeadType::Tag),
            _ => Err(format!("Invalid head type: {}. Use `branch` or `tag`.", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub vcs_kind: VcsKind,
    pub org_name: String,
    pub repo_name: String,
    pub head_type: HeadType,
    pub head: String,
}

impl PipelineRequest {
    pub fn project_slug(&self) -> String {
        format!("{}/{}/{}", self.vcs_kind.slug_prefix(), self.org_name, self.repo_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggeredPipeline {
    pub id: String,
    pub number: i64,
    pub state: String,
}

/// CircleCI answered 401 for the caller's token
#[derive(Debug, thiserror::Error)]
#[error("CircleCI rejected the API token")]
pub struct InvalidToken;

/// CircleCI API calls the command layer needs
#[async_trait]
pub trait CiClient: Send + Sync {
    /// User owning the token. A refused token fails with [`InvalidToken`].
    async fn me(&self, token: &str) -> Result<CiUser>;

    async fn trigger_pipeline(&self, token: &str, request: &PipelineRequest) -> Result<TriggeredPipeline>;
}
