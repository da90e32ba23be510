//! Cross-slice join between remote GitHub repositories and local clones.
//!
//! Each local entry is registered under up to three keys, in order: its
//! remote id, its `owner/name`, and its bare local name. A later entry
//! overwrites an earlier one on the same key, so two differently-owned
//! repositories sharing a bare name resolve to whichever was registered
//! last.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::model::{GithubRepository, LocalRepository};

/// Lookup from remote identity to local clone, built once per version of
/// the local list
#[derive(Clone, Debug, Default)]
pub struct LocalIndex {
    version: u64,
    entries: Vec<LocalRepository>,
    by_key: HashMap<String, usize>,
}

fn remote_id_key(id: u64) -> String {
    format!("#{}", id)
}

/// Content stamp of a local list; equal lists give equal stamps
pub fn version_of(locals: &[LocalRepository]) -> u64 {
    let mut hasher = DefaultHasher::new();
    locals.hash(&mut hasher);
    hasher.finish()
}

impl LocalIndex {
    pub fn build(locals: &[LocalRepository]) -> Self {
        let mut by_key = HashMap::new();

        for (idx, local) in locals.iter().enumerate() {
            if let Some(id) = local.remote_id() {
                by_key.insert(remote_id_key(id), idx);
            }
            if let Some(full_name) = local.remote_full_name() {
                by_key.insert(full_name, idx);
            }
            by_key.insert(local.name.clone(), idx);
        }

        Self {
            version: version_of(locals),
            entries: locals.to_vec(),
            by_key,
        }
    }

    /// Rebuild only if `locals` differs from the indexed list.
    /// Returns true when a rebuild happened.
    pub fn refresh(&mut self, locals: &[LocalRepository]) -> bool {
        if !self.entries.is_empty() && self.version == version_of(locals) {
            return false;
        }
        if self.entries.is_empty() && locals.is_empty() {
            return false;
        }
        *self = Self::build(locals);
        true
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw lookup by `owner/name`, bare name, or remote id
    pub fn lookup(&self, key: &str) -> Option<&LocalRepository> {
        self.by_key.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn lookup_id(&self, id: u64) -> Option<&LocalRepository> {
        self.lookup(&remote_id_key(id))
    }

    /// Local clone of `repo`: full name first, then remote id, then bare name
    pub fn lookup_remote(&self, repo: &GithubRepository) -> Option<&LocalRepository> {
        self.lookup(&repo.full_name)
            .or_else(|| self.lookup_id(repo.id))
            .or_else(|| self.lookup(&repo.name))
    }

    pub fn is_cloned(&self, repo: &GithubRepository) -> bool {
        self.lookup_remote(repo).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GithubMetadata, GithubOwner, ProjectSource};

    fn local(name: &str, path: &str, github: Option<GithubMetadata>) -> LocalRepository {
        LocalRepository {
            name: name.into(),
            path: path.into(),
            github,
            last_opened: None,
            source: ProjectSource::Tracked,
        }
    }

    fn meta(id: Option<u64>, owner: &str, name: &str) -> GithubMetadata {
        GithubMetadata {
            id,
            owner: Some(owner.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn remote(id: u64, owner: &str, name: &str) -> GithubRepository {
        GithubRepository {
            id,
            name: name.into(),
            full_name: format!("{}/{}", owner, name),
            owner: GithubOwner {
                login: owner.into(),
                avatar_url: None,
            },
            description: None,
            language: None,
            stargazers_count: 0,
            html_url: String::new(),
            clone_url: None,
            default_branch: None,
            updated_at: None,
            pushed_at: None,
            private: false,
            fork: false,
        }
    }

    #[test]
    fn test_all_tiers_resolve_to_same_entry() {
        let locals = vec![local("tokio", "/code/tokio", Some(meta(Some(7), "tokio-rs", "tokio")))];
        let index = LocalIndex::build(&locals);

        let by_id = index.lookup_id(7).unwrap();
        let by_full = index.lookup("tokio-rs/tokio").unwrap();
        let by_name = index.lookup("tokio").unwrap();
        assert_eq!(by_id.path, "/code/tokio");
        assert_eq!(by_full, by_id);
        assert_eq!(by_name, by_id);
    }

    #[test]
    fn test_bare_name_collision_is_last_write_wins() {
        let locals = vec![
            local("utils", "/code/a/utils", None),
            local("utils", "/code/b/utils", None),
        ];
        let index = LocalIndex::build(&locals);
        assert_eq!(index.lookup("utils").unwrap().path, "/code/b/utils");
    }

    #[test]
    fn test_lookup_remote_falls_back_through_tiers() {
        let locals = vec![
            local("serde", "/code/serde", Some(meta(None, "serde-rs", "serde"))),
            local("renamed", "/code/renamed", Some(GithubMetadata {
                id: Some(99),
                ..Default::default()
            })),
            local("anyhow", "/code/anyhow", None),
        ];
        let index = LocalIndex::build(&locals);

        assert_eq!(index.lookup_remote(&remote(1, "serde-rs", "serde")).unwrap().path, "/code/serde");
        assert_eq!(index.lookup_remote(&remote(99, "someone", "original")).unwrap().path, "/code/renamed");
        assert_eq!(index.lookup_remote(&remote(3, "dtolnay", "anyhow")).unwrap().path, "/code/anyhow");
        assert!(!index.is_cloned(&remote(4, "dtolnay", "thiserror")));
    }

    #[test]
    fn test_refresh_rebuilds_only_on_change() {
        let mut locals = vec![local("tokio", "/code/tokio", None)];
        let mut index = LocalIndex::default();
        assert!(index.refresh(&locals));
        let version = index.version();
        assert!(!index.refresh(&locals));
        assert_eq!(index.version(), version);

        locals.push(local("serde", "/code/serde", None));
        assert!(index.refresh(&locals));
        assert_eq!(index.len(), 2);
        assert!(index.lookup("serde").is_some());
    }
}
