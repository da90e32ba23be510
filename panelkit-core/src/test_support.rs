//! Fixtures and drivers shared by the unit tests.

use serde_json::Value;

use crate::model::{
    Collection, GithubMetadata, GithubOwner, GithubRepository, LocalRepository, Organization, ProjectSource,
    Workspace,
};
use crate::runtime::{Effect, Effects, Panel};
use crate::slice::{CurrentScope, HostSlices, PanelContext, SliceKey, SliceSet};

pub fn github_repo(owner: &str, name: &str, pushed_at: Option<&str>) -> GithubRepository {
    GithubRepository {
        id: fake_id(owner, name),
        name: name.into(),
        full_name: format!("{}/{}", owner, name),
        owner: GithubOwner {
            login: owner.into(),
            avatar_url: None,
        },
        description: None,
        language: None,
        stargazers_count: 0,
        html_url: format!("https://github.com/{}/{}", owner, name),
        clone_url: None,
        default_branch: Some("main".into()),
        updated_at: None,
        pushed_at: pushed_at.map(String::from),
        private: false,
        fork: false,
    }
}

fn fake_id(owner: &str, name: &str) -> u64 {
    owner.len() as u64 * 1_000 + name.len() as u64
}

pub fn local_repo(name: &str, path: &str) -> LocalRepository {
    LocalRepository {
        name: name.into(),
        path: path.into(),
        github: None,
        last_opened: None,
        source: ProjectSource::Tracked,
    }
}

/// A local clone carrying `owner/name` remote metadata
pub fn cloned_repo(owner: &str, name: &str, path: &str) -> LocalRepository {
    LocalRepository {
        github: Some(GithubMetadata {
            owner: Some(owner.into()),
            name: Some(name.into()),
            ..Default::default()
        }),
        ..local_repo(name, path)
    }
}

pub fn workspace(id: &str, name: &str, is_default: bool) -> Workspace {
    Workspace {
        id: id.into(),
        name: name.into(),
        description: None,
        is_default,
        repository_count: 0,
        created_at: None,
        updated_at: None,
    }
}

pub fn collection(id: &str, name: &str) -> Collection {
    Collection {
        id: id.into(),
        name: name.into(),
        description: None,
        repositories: Vec::new(),
        updated_at: None,
    }
}

pub fn organization(login: &str) -> Organization {
    Organization {
        login: login.into(),
        description: None,
        avatar_url: None,
    }
}

/// Host slices holding `slices`, and a context reading them
pub fn context(scope: CurrentScope, slices: Vec<(SliceKey, Value)>) -> (HostSlices, PanelContext) {
    let host = HostSlices::new(SliceSet::new());
    for (key, data) in slices {
        host.publish(key, &data).unwrap();
    }
    let context = PanelContext::new(scope, host.subscribe(), None);
    (host, context)
}

/// Drive `effects` to completion the way the runtime would, awaiting each
/// host future in turn. Returns every notification emitted, in order.
pub async fn drain<P: Panel>(panel: &mut P, effects: Effects<P::Completion>) -> Vec<(String, Value)> {
    let mut emitted = Vec::new();
    let mut queue = vec![effects];

    while let Some(effects) = queue.pop() {
        for effect in effects.into_effects() {
            match effect {
                Effect::Emit { event_type, payload } => emitted.push((event_type.to_string(), payload)),
                Effect::Spawn(future) => {
                    let completion = future.await;
                    let mut next = Effects::new();
                    panel.complete(completion, &mut next);
                    queue.push(next);
                }
                Effect::Refresh { .. } => {}
            }
        }
    }
    emitted
}

/// Handle one command and drive it to completion
pub async fn run<P: Panel>(panel: &mut P, command: P::Command) -> Vec<(String, Value)> {
    let mut effects = Effects::new();
    panel.handle(command, &mut effects);
    drain(panel, effects).await
}

pub fn event_types(emitted: &[(String, Value)]) -> Vec<&str> {
    emitted.iter().map(|(t, _)| t.as_str()).collect()
}
