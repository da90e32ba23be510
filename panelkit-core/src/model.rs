//! Entity records delivered by the host through data slices.
//!
//! GitHub records keep the field names of the GitHub REST API; records that
//! originate in the host application use camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::filter::Searchable;
use crate::resolve::Keyed;

/// Absolute filesystem path of a local repository
pub type RepositoryPath = String;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GithubOwner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A repository as returned by the GitHub API (starred, user or org repos)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GithubRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: GithubOwner,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
}

impl GithubRepository {
    pub fn owner_login(&self) -> &str {
        &self.owner.login
    }

    /// Most recent activity timestamp: last push, else last update
    pub fn last_activity(&self) -> Option<&str> {
        self.pushed_at.as_deref().or(self.updated_at.as_deref())
    }
}

/// Remote metadata attached to a local repository.
///
/// Any part may be missing when the repository was registered before the
/// remote was known.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubMetadata {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stars: Option<u64>,
}

/// How a local repository came to be listed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSource {
    /// Explicitly registered by the user
    #[default]
    Tracked,
    /// Found by scanning the filesystem
    Discovered,
}

impl ProjectSource {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectSource::Tracked => "tracked",
            ProjectSource::Discovered => "discovered",
        }
    }
}

/// A repository cloned on this machine
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRepository {
    pub name: String,
    pub path: RepositoryPath,
    #[serde(default)]
    pub github: Option<GithubMetadata>,
    #[serde(default)]
    pub last_opened: Option<String>,
    #[serde(default)]
    pub source: ProjectSource,
}

impl LocalRepository {
    /// `owner/name` of the remote, when both parts are known
    pub fn remote_full_name(&self) -> Option<String> {
        let github = self.github.as_ref()?;
        match (&github.owner, &github.name) {
            (Some(owner), Some(name)) => Some(format!("{}/{}", owner, name)),
            _ => None,
        }
    }

    pub fn remote_id(&self) -> Option<u64> {
        self.github.as_ref().and_then(|g| g.id)
    }

    pub fn language(&self) -> Option<&str> {
        self.github.as_ref().and_then(|g| g.language.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub repository_count: usize,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A user-curated collection of repositories (identified by full name)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub login: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// ============================================================================
// Search haystacks
// ============================================================================

impl Searchable for GithubRepository {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            &self.name,
            &self.full_name,
            &self.owner.login,
            self.description.as_deref().unwrap_or(""),
            self.language.as_deref().unwrap_or(""),
        ]
    }
}

impl Searchable for LocalRepository {
    fn search_fields(&self) -> Vec<&str> {
        let github = self.github.as_ref();
        vec![
            &self.name,
            &self.path,
            github.and_then(|g| g.owner.as_deref()).unwrap_or(""),
            github.and_then(|g| g.name.as_deref()).unwrap_or(""),
            github.and_then(|g| g.description.as_deref()).unwrap_or(""),
            github.and_then(|g| g.language.as_deref()).unwrap_or(""),
        ]
    }
}

impl Searchable for Workspace {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name, self.description.as_deref().unwrap_or("")]
    }
}

impl Searchable for Collection {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name, self.description.as_deref().unwrap_or("")]
    }
}

impl Searchable for Organization {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.login, self.description.as_deref().unwrap_or("")]
    }
}

// ============================================================================
// Identity keys
// ============================================================================

impl Keyed for GithubRepository {
    fn key(&self) -> &str {
        &self.full_name
    }

    fn alternate_keys(&self) -> Vec<&str> {
        vec![&self.name]
    }

    fn folded_keys(&self) -> Vec<&str> {
        vec![&self.full_name, &self.name]
    }
}

impl Keyed for LocalRepository {
    fn key(&self) -> &str {
        &self.path
    }

    fn alternate_keys(&self) -> Vec<&str> {
        vec![&self.name]
    }
}

impl Keyed for Workspace {
    fn key(&self) -> &str {
        &self.id
    }

    fn alternate_keys(&self) -> Vec<&str> {
        vec![&self.name]
    }
}

impl Keyed for Collection {
    fn key(&self) -> &str {
        &self.id
    }

    fn alternate_keys(&self) -> Vec<&str> {
        vec![&self.name]
    }
}

impl Keyed for Organization {
    fn key(&self) -> &str {
        &self.login
    }

    fn folded_keys(&self) -> Vec<&str> {
        vec![&self.login]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_repository_deserializes_api_shape() {
        let json = r#"{
            "id": 42,
            "name": "tokio",
            "full_name": "tokio-rs/tokio",
            "owner": { "login": "tokio-rs" },
            "stargazers_count": 25000,
            "html_url": "https://github.com/tokio-rs/tokio",
            "pushed_at": "2024-05-01T10:00:00Z"
        }"#;
        let repo: GithubRepository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.owner_login(), "tokio-rs");
        assert_eq!(repo.description, None);
        assert_eq!(repo.last_activity(), Some("2024-05-01T10:00:00Z"));
        assert!(!repo.fork);
    }

    #[test]
    fn test_remote_full_name_requires_both_parts() {
        let mut local = LocalRepository {
            name: "tokio".into(),
            path: "/code/tokio".into(),
            github: Some(GithubMetadata {
                owner: Some("tokio-rs".into()),
                ..Default::default()
            }),
            last_opened: None,
            source: ProjectSource::Tracked,
        };
        assert_eq!(local.remote_full_name(), None);

        if let Some(github) = local.github.as_mut() {
            github.name = Some("tokio".into());
        }
        assert_eq!(local.remote_full_name(), Some("tokio-rs/tokio".to_string()));
    }

    #[test]
    fn test_local_repository_camel_case_wire_format() {
        let json = r#"{
            "name": "panelkit",
            "path": "/code/panelkit",
            "lastOpened": "2024-01-01T00:00:00Z",
            "source": "discovered"
        }"#;
        let local: LocalRepository = serde_json::from_str(json).unwrap();
        assert_eq!(local.source, ProjectSource::Discovered);
        assert_eq!(local.last_opened.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(local.github.is_none());
    }

    #[test]
    fn test_missing_optional_fields_are_empty_in_haystack() {
        let org = Organization {
            login: "rust-lang".into(),
            description: None,
            avatar_url: None,
        };
        assert_eq!(org.haystack(), "rust-lang ");
    }
}
