use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Github,
    Bitbucket,
}

impl VcsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Github => "github",
            VcsKind::Bitbucket => "bitbucket",
        }
    }

    /// Short form CircleCI uses in project slugs (`gh/org/repo`)
    pub fn slug_prefix(&self) -> &'static str {
        match self {
            VcsKind::Github => "gh",
            VcsKind::Bitbucket => "bb",
        }
    }
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VcsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(VcsKind::Github),
            "bitbucket" => Ok(VcsKind::Bitbucket),
            _ => Err(format!("Invalid VCS type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcsIdentity {
    pub alias: String,
    #[serde(rename = "type")]
    pub kind: VcsKind,
    pub base_url: String,
}

impl VcsIdentity {
    pub fn new(alias: impl Into<String>, kind: VcsKind, base_url: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            kind,
            base_url: base_url.into(),
        }
    }
}

pub const GITHUB_BASE_URL: &str = "https://github.com";
pub const BITBUCKET_BASE_URL: &str = "https://bitbucket.org";

/// Built-in identities, always present and never shadowed by custom ones
pub fn builtin_vcs(alias: &str) -> Option<VcsIdentity> {
    match alias {
        "github" => Some(VcsIdentity::new("github", VcsKind::Github, GITHUB_BASE_URL)),
        "bitbucket" => Some(VcsIdentity::new("bitbucket", VcsKind::Bitbucket, BITBUCKET_BASE_URL)),
        _ => None,
    }
}

pub fn builtin_vcs_list() -> Vec<VcsIdentity> {
    ["github", "bitbucket"]
        .iter()
        .filter_map(|alias| builtin_vcs(alias))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let github = builtin_vcs("github").unwrap();
        assert_eq!(github.kind, VcsKind::Github);
        assert_eq!(github.base_url, GITHUB_BASE_URL);
        assert!(builtin_vcs("gitlab").is_none());
        assert_eq!(builtin_vcs_list().len(), 2);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("bitbucket".parse::<VcsKind>().unwrap(), VcsKind::Bitbucket);
        assert!("GitHub".parse::<VcsKind>().is_err());
        assert_eq!(VcsKind::Github.slug_prefix(), "gh");
    }

    #[test]
    fn test_identity_wire_shape() {
        let vcs = VcsIdentity::new("ghe", VcsKind::Github, "https://git.acme.io");
        let json = serde_json::to_value(&vcs).unwrap();
        assert_eq!(json["alias"], "ghe");
        assert_eq!(json["type"], "github");
        assert_eq!(json["base_url"], "https://git.acme.io");
    }
}
