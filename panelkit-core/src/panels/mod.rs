//! The panel catalogue.
//!
//! Each panel module defines its command enum, capability set, panel
//! state and tool descriptors over the shared list machinery.

pub mod github;
pub mod github_projects;
pub mod github_starred;
pub mod local_projects;
pub mod user_collections;
pub mod user_profile;
pub mod workspace_repositories;
pub mod workspaces;

use serde::Serialize;
use serde_json::{Value, json};

use crate::runtime::Effects;
use crate::slice::SliceKey;
use crate::tool::ToolRegistry;

/// Slice names published by the host
pub mod slices {
    pub const LOCAL_REPOSITORIES: &str = "localRepositories";
    pub const WORKSPACES: &str = "workspaces";
    pub const WORKSPACE_REPOSITORIES: &str = "workspaceRepositories";
    pub const GITHUB_STARRED: &str = "githubStarred";
    pub const GITHUB_REPOSITORIES: &str = "githubRepositories";
    pub const USER_PROFILE: &str = "userProfile";
    pub const USER_ORGANIZATIONS: &str = "userOrganizations";
    pub const USER_COLLECTIONS: &str = "userCollections";
}

#[derive(Clone, Debug, Serialize)]
pub struct PanelMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Icon name understood by the host
    pub icon: &'static str,
    pub version: &'static str,
    pub slices: Vec<SliceKey>,
    /// Optional host capabilities the panel can use
    pub capabilities: &'static [&'static str],
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn catalog() -> Vec<PanelMetadata> {
    vec![
        local_projects::metadata(),
        workspaces::metadata(),
        workspace_repositories::metadata(),
        github_starred::metadata(),
        github_projects::metadata(),
        user_profile::metadata(),
        user_collections::metadata(),
    ]
}

pub fn find(id: &str) -> Option<PanelMetadata> {
    catalog().into_iter().find(|m| m.id == id)
}

/// Every panel's tools
pub fn tool_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(local_projects::PANEL_ID, local_projects::tools());
    registry.register(workspaces::PANEL_ID, workspaces::tools());
    registry.register(workspace_repositories::PANEL_ID, workspace_repositories::tools());
    registry.register(github_starred::PANEL_ID, github_starred::tools());
    registry.register(github_projects::PANEL_ID, github_projects::tools());
    registry.register(user_profile::PANEL_ID, user_profile::tools());
    registry.register(user_collections::PANEL_ID, user_collections::tools());
    registry
}

/// Inbound event types of panel `id`
pub fn event_types(id: &str) -> &'static [&'static str] {
    use crate::command::PanelCommand;

    match id {
        local_projects::PANEL_ID => local_projects::LocalProjectsCommand::EVENT_TYPES,
        workspaces::PANEL_ID => workspaces::WorkspacesCommand::EVENT_TYPES,
        workspace_repositories::PANEL_ID => workspace_repositories::WorkspaceRepositoriesCommand::EVENT_TYPES,
        github_starred::PANEL_ID => github_starred::GithubStarredCommand::EVENT_TYPES,
        github_projects::PANEL_ID => github_projects::GithubProjectsCommand::EVENT_TYPES,
        user_profile::PANEL_ID => user_profile::UserProfileCommand::EVENT_TYPES,
        user_collections::PANEL_ID => user_collections::UserCollectionsCommand::EVENT_TYPES,
        _ => &[],
    }
}

pub(crate) fn refresh_all<C>(effects: &mut Effects<C>, keys: &[SliceKey]) {
    for key in keys {
        effects.refresh(key);
    }
}

pub(crate) fn filter_payload(filter: &str) -> Value {
    json!({ "filter": filter })
}

pub(crate) fn identifier_payload(identifier: &str) -> Value {
    json!({ "identifier": identifier })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::PanelCommand;
    use crate::tool::ToolDescriptor;
    use std::collections::BTreeSet;

    fn sample_args(tool: &ToolDescriptor) -> Value {
        let mut args = serde_json::Map::new();
        for name in tool.required_inputs() {
            args.insert(name.to_string(), Value::String("sample".into()));
        }
        Value::Object(args)
    }

    /// Every tool triggers a command of its panel, and every command has a tool
    fn assert_tools_in_sync<C: PanelCommand>(panel: &str) {
        let registry = tool_registry();
        let mut covered = BTreeSet::new();

        for tool in registry.for_panel(panel) {
            let event = registry.invoke(&tool.name, sample_args(tool)).unwrap();
            if let Err(err) = C::from_event(&event) {
                panic!("tool {} does not parse: {}", tool.name, err);
            }
            covered.insert(event.event_type);
        }

        let expected: BTreeSet<String> = C::EVENT_TYPES.iter().map(|t| t.to_string()).collect();
        assert_eq!(covered, expected, "tools of {} out of sync", panel);
    }

    #[test]
    fn test_tool_tables_match_commands() {
        assert_tools_in_sync::<local_projects::LocalProjectsCommand>(local_projects::PANEL_ID);
        assert_tools_in_sync::<workspaces::WorkspacesCommand>(workspaces::PANEL_ID);
        assert_tools_in_sync::<workspace_repositories::WorkspaceRepositoriesCommand>(
            workspace_repositories::PANEL_ID,
        );
        assert_tools_in_sync::<github_starred::GithubStarredCommand>(github_starred::PANEL_ID);
        assert_tools_in_sync::<github_projects::GithubProjectsCommand>(github_projects::PANEL_ID);
        assert_tools_in_sync::<user_profile::UserProfileCommand>(user_profile::PANEL_ID);
        assert_tools_in_sync::<user_collections::UserCollectionsCommand>(user_collections::PANEL_ID);
    }

    #[test]
    fn test_catalog_ids_are_event_namespaces() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 7);
        for meta in &catalog {
            let types = event_types(meta.id);
            assert!(!types.is_empty(), "{} has no commands", meta.id);
            for t in types {
                assert!(t.starts_with(&format!("{}:", meta.id)), "{} outside namespace", t);
            }
        }
        assert!(find("github-starred").is_some());
        assert!(find("nope").is_none());
    }

    #[test]
    fn test_tool_names_are_unique() {
        let total: usize = catalog()
            .iter()
            .map(|m| match m.id {
                local_projects::PANEL_ID => local_projects::tools().len(),
                workspaces::PANEL_ID => workspaces::tools().len(),
                workspace_repositories::PANEL_ID => workspace_repositories::tools().len(),
                github_starred::PANEL_ID => github_starred::tools().len(),
                github_projects::PANEL_ID => github_projects::tools().len(),
                user_profile::PANEL_ID => user_profile::tools().len(),
                user_collections::PANEL_ID => user_collections::tools().len(),
                _ => 0,
            })
            .sum();
        assert_eq!(tool_registry().len(), total);
    }
}
