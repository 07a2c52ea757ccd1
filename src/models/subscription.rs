use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use super::vcs::{VcsIdentity, VcsKind};
use crate::error::{BridgeError, Result};

/// "Notify this channel when this org/repo on this VCS posts a build result"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Subscription {
    #[serde(rename = "vcsType", alias = "vcsKind")]
    pub vcs_kind: String,
    #[serde(rename = "baseURL", default)]
    pub base_url: String,
    #[serde(rename = "orgName")]
    pub org_name: String,
    #[serde(rename = "repoName")]
    pub repo_name: String,
    #[serde(rename = "channelID", default)]
    pub channel_id: String,
}

impl Subscription {
    pub fn new(vcs: &VcsIdentity, org_name: &str, repo_name: &str, channel_id: &str) -> Self {
        Self {
            vcs_kind: vcs.kind.as_str().to_string(),
            base_url: vcs.base_url.clone(),
            org_name: org_name.to_string(),
            repo_name: repo_name.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.vcs_kind.parse::<VcsKind>().is_err() {
            return Err(BridgeError::Validation("vcs type is invalid".to_string()));
        }

        // blank base url is allowed
        if !self.base_url.trim().is_empty() {
            Url::parse(self.base_url.trim())
                .map_err(|e| BridgeError::Validation(format!("base url is invalid: {}", e)))?;
        }

        if self.org_name.trim().is_empty() {
            return Err(BridgeError::Validation("org name cannot be empty".to_string()));
        }

        if self.repo_name.trim().is_empty() {
            return Err(BridgeError::Validation("repo name cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Host part of the base URL; empty when the URL is blank or unparseable
    pub fn hostname(&self) -> String {
        Url::parse(self.base_url.trim())
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Hash of (vcs kind, hostname, org, repo). The channel does not take part.
    pub fn key(&self) -> String {
        let raw = [
            self.vcs_kind.as_str(),
            self.hostname().as_str(),
            self.org_name.as_str(),
            self.repo_name.as_str(),
        ]
        .join("_");
        hex::encode(Sha256::digest(raw.as_bytes()))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.org_name, self.repo_name)
    }
}
