use serde::{Deserialize, Serialize};

use super::subscription::Subscription;
use super::vcs::{builtin_vcs, VcsIdentity, VcsKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "success"),
            BuildStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Build result posted by the CircleCI notify step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildEvent {
    pub status: BuildStatus,
    #[serde(default)]
    pub build_num: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub build_url: String,
    #[serde(default)]
    pub compare_url: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub pull_request: String,
    #[serde(default)]
    pub pipeline_number: String,
    #[serde(default)]
    pub job_name: String,
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub vcs_type: Option<VcsKind>,
    #[serde(default)]
    pub vcs_base_url: Option<String>,
}

impl BuildEvent {
    /// VCS the build ran against. Explicit `vcs_type` wins; otherwise the
    /// repository URL decides between the GitHub and Bitbucket built-ins.
    pub fn vcs(&self) -> VcsIdentity {
        match self.vcs_type {
            Some(kind) => {
                let builtin = builtin_vcs(kind.as_str());
                let base_url = self
                    .vcs_base_url
                    .clone()
                    .filter(|url| !url.trim().is_empty())
                    .or_else(|| builtin.as_ref().map(|vcs| vcs.base_url.clone()))
                    .unwrap_or_default();
                VcsIdentity::new(kind.as_str(), kind, base_url)
            }
            None => {
                let alias = if self.repo_url.starts_with("git@github.com")
                    || self.repo_url.starts_with("https://github.com")
                {
                    "github"
                } else {
                    "bitbucket"
                };
                builtin_vcs(alias).unwrap_or_else(|| VcsIdentity::new(alias, VcsKind::Bitbucket, ""))
            }
        }
    }

    /// Lookup subscription carrying only the repository identity
    pub fn subscription(&self) -> Subscription {
        Subscription::new(&self.vcs(), &self.org_name, &self.repo_name, "")
    }

    pub fn short_commit(&self) -> &str {
        self.commit.get(..7).unwrap_or(&self.commit)
    }
}
