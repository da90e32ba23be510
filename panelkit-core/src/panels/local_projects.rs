//! Repositories tracked or discovered on this machine.

use std::fmt;
use std::future::Future;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::slices::LOCAL_REPOSITORIES;
use super::{PanelMetadata, VERSION, filter_payload, identifier_payload, refresh_all};
use crate::actions::{ActionError, BaseActions, HostAction, host_action};
use crate::command::{CommandError, FilterPayload, IdentifierPayload, PanelCommand, decode, unknown};
use crate::model::{LocalRepository, ProjectSource, RepositoryPath};
use crate::reducer::{StateAction, reduce};
use crate::resolve::resolve;
use crate::runtime::{Effects, Panel, Settled, invoke, settle, to_payload};
use crate::slice::{DataSlice, PanelContext, SliceKey};
use crate::sort::{filtered_sorted, local_projects_order};
use crate::state::{ActionKind, ListState, OperationState};
use crate::tool::ToolDescriptor;
use crate::view::{Control, ControlKind, PanelStatus, PanelView, Row, Section};

pub const PANEL_ID: &str = "local-projects";

/// In-flight target of a directory pick, which has no entity yet
const PICK_TARGET: &str = "*";

pub mod events {
    pub const FILTER: &str = "local-projects:filter";
    pub const SELECT_REPOSITORY: &str = "local-projects:select-repository";
    pub const OPEN_REPOSITORY: &str = "local-projects:open-repository";
    pub const REMOVE_REPOSITORY: &str = "local-projects:remove-repository";
    pub const ADD_REPOSITORY: &str = "local-projects:add-repository";
    pub const REFRESH: &str = "local-projects:refresh";

    pub const REPOSITORY_SELECTED: &str = "local-projects:repository:selected";
    pub const REPOSITORY_OPENED: &str = "local-projects:repository:opened";
    pub const REPOSITORY_REMOVED: &str = "local-projects:repository:removed";
    pub const REPOSITORY_ADDED: &str = "local-projects:repository:added";
}

pub const CAPABILITIES: &[&str] = &[
    "open_repository",
    "remove_repository",
    "select_directory",
    "register_repository",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalProjectsCommand {
    Filter { filter: String },
    SelectRepository { identifier: String },
    OpenRepository { identifier: String },
    RemoveRepository { identifier: String },
    /// Register `path`, or ask the host for a directory when absent
    AddRepository { path: Option<String> },
    Refresh,
}

#[derive(Deserialize)]
struct AddPayload {
    #[serde(default)]
    path: Option<String>,
}

impl PanelCommand for LocalProjectsCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_REPOSITORY,
        events::OPEN_REPOSITORY,
        events::REMOVE_REPOSITORY,
        events::ADD_REPOSITORY,
        events::REFRESH,
    ];

    fn parse(event_type: &str, payload: &Value) -> Result<Self, CommandError> {
        let identifier = || decode::<IdentifierPayload>(event_type, payload).map(|p| p.identifier);
        match event_type {
            events::FILTER => Ok(Self::Filter {
                filter: decode::<FilterPayload>(event_type, payload)?.filter,
            }),
            events::SELECT_REPOSITORY => Ok(Self::SelectRepository { identifier: identifier()? }),
            events::OPEN_REPOSITORY => Ok(Self::OpenRepository { identifier: identifier()? }),
            events::REMOVE_REPOSITORY => Ok(Self::RemoveRepository { identifier: identifier()? }),
            events::ADD_REPOSITORY => Ok(Self::AddRepository {
                path: decode::<AddPayload>(event_type, payload)?.path,
            }),
            events::REFRESH => Ok(Self::Refresh),
            other => Err(unknown(other)),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Filter { .. } => events::FILTER,
            Self::SelectRepository { .. } => events::SELECT_REPOSITORY,
            Self::OpenRepository { .. } => events::OPEN_REPOSITORY,
            Self::RemoveRepository { .. } => events::REMOVE_REPOSITORY,
            Self::AddRepository { .. } => events::ADD_REPOSITORY,
            Self::Refresh => events::REFRESH,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Filter { filter } => filter_payload(filter),
            Self::SelectRepository { identifier }
            | Self::OpenRepository { identifier }
            | Self::RemoveRepository { identifier } => identifier_payload(identifier),
            Self::AddRepository { path: Some(path) } => json!({ "path": path }),
            Self::AddRepository { path: None } | Self::Refresh => Value::Null,
        }
    }
}

#[derive(Clone, Default)]
pub struct LocalProjectsCapabilities {
    pub base: BaseActions,
    pub open_repository: Option<HostAction<RepositoryPath, ()>>,
    /// Stop tracking a repository (the directory is left alone)
    pub remove_repository: Option<HostAction<RepositoryPath, ()>>,
    /// Native directory picker; `None` when the user cancels
    pub select_directory: Option<HostAction<(), Option<RepositoryPath>>>,
    pub register_repository: Option<HostAction<RepositoryPath, LocalRepository>>,
}

impl LocalProjectsCapabilities {
    pub fn with_base(mut self, base: BaseActions) -> Self {
        self.base = base;
        self
    }

    pub fn with_open_repository<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RepositoryPath) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.open_repository = Some(host_action(f));
        self
    }

    pub fn with_remove_repository<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RepositoryPath) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.remove_repository = Some(host_action(f));
        self
    }

    pub fn with_select_directory<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(()) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<RepositoryPath>, ActionError>> + Send + 'static,
    {
        self.select_directory = Some(host_action(f));
        self
    }

    pub fn with_register_repository<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RepositoryPath) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LocalRepository, ActionError>> + Send + 'static,
    {
        self.register_repository = Some(host_action(f));
        self
    }

    pub fn available(&self) -> Vec<&'static str> {
        let mut names = self.base.available();
        if self.open_repository.is_some() {
            names.push("open_repository");
        }
        if self.remove_repository.is_some() {
            names.push("remove_repository");
        }
        if self.select_directory.is_some() {
            names.push("select_directory");
        }
        if self.register_repository.is_some() {
            names.push("register_repository");
        }
        names
    }

    /// The add control needs both the picker and registration
    fn can_add(&self) -> bool {
        self.select_directory.is_some() && self.register_repository.is_some()
    }
}

impl fmt::Debug for LocalProjectsCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProjectsCapabilities")
            .field("available", &self.available())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LocalProjectsOutcome {
    Opened(LocalRepository),
    Removed(LocalRepository),
    DirectoryPicked(Option<RepositoryPath>),
    Registered(LocalRepository),
}

pub type LocalProjectsCompletion = Settled<LocalProjectsOutcome>;

pub struct LocalProjectsPanel {
    capabilities: LocalProjectsCapabilities,
    state: ListState,
    slice: Option<DataSlice<Vec<LocalRepository>>>,
}

impl LocalProjectsPanel {
    pub fn new(capabilities: LocalProjectsCapabilities) -> Self {
        Self {
            capabilities,
            state: ListState::new(),
            slice: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn repositories(&self) -> &[LocalRepository] {
        self.slice.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn visible(&self) -> Vec<&LocalRepository> {
        filtered_sorted(self.repositories(), &self.state.filter, local_projects_order)
    }

    pub fn selected_repository(&self) -> Option<&LocalRepository> {
        let key = self.state.selected.as_deref()?;
        self.repositories().iter().find(|r| r.path == key)
    }

    fn find(&self, identifier: &str) -> Option<LocalRepository> {
        let found = resolve(self.repositories(), identifier).cloned();
        if found.is_none() {
            debug!(panel = PANEL_ID, identifier, "no repository matches identifier");
        }
        found
    }

    fn select(&mut self, repository: &LocalRepository, effects: &mut Effects<LocalProjectsCompletion>) {
        reduce(
            &mut self.state,
            &StateAction::Select {
                key: repository.path.clone(),
            },
        );
        effects.emit(events::REPOSITORY_SELECTED, json!({ "repository": to_payload(repository) }));
    }

    fn open(&mut self, identifier: &str, effects: &mut Effects<LocalProjectsCompletion>) {
        let Some(repository) = self.find(identifier) else {
            return;
        };
        self.select(&repository, effects);
        let Some(open) = self.capabilities.open_repository.clone() else {
            debug!(panel = PANEL_ID, "open_repository not provided");
            return;
        };
        let path = repository.path.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Open,
            &path,
            &open,
            path.clone(),
            move |()| LocalProjectsOutcome::Opened(repository),
        );
    }

    fn remove(&mut self, identifier: &str, effects: &mut Effects<LocalProjectsCompletion>) {
        let Some(repository) = self.find(identifier) else {
            return;
        };
        let Some(remove) = self.capabilities.remove_repository.clone() else {
            debug!(panel = PANEL_ID, "remove_repository not provided");
            return;
        };
        let path = repository.path.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Remove,
            &path,
            &remove,
            path.clone(),
            move |()| LocalProjectsOutcome::Removed(repository),
        );
    }

    fn add(&mut self, path: Option<String>, effects: &mut Effects<LocalProjectsCompletion>) {
        match path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) {
            Some(path) => self.register(path, effects),
            None => {
                let Some(pick) = self.capabilities.select_directory.clone() else {
                    debug!(panel = PANEL_ID, "select_directory not provided");
                    return;
                };
                invoke(
                    PANEL_ID,
                    &mut self.state,
                    effects,
                    ActionKind::Add,
                    PICK_TARGET,
                    &pick,
                    (),
                    LocalProjectsOutcome::DirectoryPicked,
                );
            }
        }
    }

    fn register(&mut self, path: RepositoryPath, effects: &mut Effects<LocalProjectsCompletion>) {
        let Some(register) = self.capabilities.register_repository.clone() else {
            debug!(panel = PANEL_ID, "register_repository not provided");
            return;
        };
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Add,
            &path.clone(),
            &register,
            path,
            LocalProjectsOutcome::Registered,
        );
    }

    fn row(&self, repository: &LocalRepository) -> Row {
        let key = repository.path.as_str();
        let mut row = Row::new(key, repository.name.as_str())
            .subtitle(Some(key))
            .selected(self.state.is_selected(key));
        if repository.source == ProjectSource::Discovered {
            row = row.badge(repository.source.label());
        }
        if let Some(language) = repository.language() {
            row = row.badge(language);
        }
        if let Some(full_name) = repository.remote_full_name() {
            row = row.badge(full_name);
        }

        if self.capabilities.open_repository.is_some() {
            let opening = self.state.operation(key) == OperationState::Opening;
            row = row.control(Control::new(ControlKind::Open).busy_when(opening));
        }
        if self.capabilities.remove_repository.is_some() {
            let removing = self.state.is_in_flight(ActionKind::Remove, key);
            row = row.control(Control::new(ControlKind::Remove).busy_when(removing));
        }
        row
    }
}

impl Panel for LocalProjectsPanel {
    type Command = LocalProjectsCommand;
    type Completion = LocalProjectsCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        vec![SliceKey::global(LOCAL_REPOSITORIES)]
    }

    fn sync(&mut self, context: &PanelContext) {
        self.slice = context.get_slice(LOCAL_REPOSITORIES);
    }

    fn handle(&mut self, command: LocalProjectsCommand, effects: &mut Effects<LocalProjectsCompletion>) {
        match command {
            LocalProjectsCommand::Filter { filter } => {
                reduce(&mut self.state, &StateAction::SetFilter { filter });
            }
            LocalProjectsCommand::SelectRepository { identifier } => {
                if let Some(repository) = self.find(&identifier) {
                    self.select(&repository, effects);
                }
            }
            LocalProjectsCommand::OpenRepository { identifier } => self.open(&identifier, effects),
            LocalProjectsCommand::RemoveRepository { identifier } => self.remove(&identifier, effects),
            LocalProjectsCommand::AddRepository { path } => self.add(path, effects),
            LocalProjectsCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(&mut self, completion: LocalProjectsCompletion, effects: &mut Effects<LocalProjectsCompletion>) {
        let Some((_, outcome)) = settle(PANEL_ID, &mut self.state, completion) else {
            return;
        };
        match outcome {
            LocalProjectsOutcome::Opened(repository) => {
                effects.emit(events::REPOSITORY_OPENED, json!({ "repository": to_payload(&repository) }));
            }
            LocalProjectsOutcome::Removed(repository) => {
                effects.emit(events::REPOSITORY_REMOVED, json!({ "repository": to_payload(&repository) }));
            }
            LocalProjectsOutcome::DirectoryPicked(Some(path)) => self.register(path, effects),
            LocalProjectsOutcome::DirectoryPicked(None) => {
                debug!(panel = PANEL_ID, "directory selection cancelled");
            }
            LocalProjectsOutcome::Registered(repository) => {
                effects.emit(events::REPOSITORY_ADDED, json!({ "repository": to_payload(&repository) }));
            }
        }
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.state);
        view.status = PanelStatus::of_list(self.slice.as_ref());
        if self.capabilities.can_add() {
            let adding = self.state.any_in_flight(ActionKind::Add);
            view.toolbar.push(Control::new(ControlKind::Add).busy_when(adding));
        }
        let rows = self.visible().into_iter().map(|r| self.row(r)).collect();
        view.sections.push(Section::flat(rows));
        view.with_slice_error(self.slice.as_ref().and_then(|s| s.error.as_deref()))
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "Local Projects",
        description: "Repositories on this machine, tracked ones first",
        icon: "folder-git",
        version: VERSION,
        slices: vec![SliceKey::global(LOCAL_REPOSITORIES)],
        capabilities: CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    let repository = "Repository path or name";
    vec![
        ToolDescriptor::new(
            "filter_local_projects",
            "Filter the local projects list by a search term",
            events::FILTER,
        )
        .input("filter", "string", "Search text; empty clears the filter")
        .tags(&["local", "search"]),
        ToolDescriptor::new(
            "select_local_project",
            "Select a local repository",
            events::SELECT_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The selected repository")
        .tags(&["local"]),
        ToolDescriptor::new(
            "open_local_project",
            "Open a local repository",
            events::OPEN_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The opened repository")
        .tags(&["local", "open"]),
        ToolDescriptor::new(
            "remove_local_project",
            "Stop tracking a local repository",
            events::REMOVE_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The removed repository")
        .tags(&["local", "remove"]),
        ToolDescriptor::new(
            "add_local_project",
            "Track a repository directory; without a path the host asks for one",
            events::ADD_REPOSITORY,
        )
        .optional_input("path", "string", "Absolute path of the repository")
        .output("repository", "object", "The registered repository")
        .tags(&["local", "add"]),
        ToolDescriptor::new(
            "refresh_local_projects",
            "Rescan local repositories",
            events::REFRESH,
        )
        .tags(&["local"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GithubMetadata;
    use crate::slice::CurrentScope;
    use crate::test_support::{context, event_types, local_repo, run};
    use std::sync::{Arc, Mutex};

    fn repositories() -> Vec<LocalRepository> {
        let mut scratch = local_repo("scratch", "/tmp/scratch");
        scratch.source = ProjectSource::Discovered;
        scratch.last_opened = Some("2024-06-01T00:00:00Z".into());

        let mut alpha = local_repo("alpha", "/code/alpha");
        alpha.last_opened = Some("2024-01-01T00:00:00Z".into());
        alpha.github = Some(GithubMetadata {
            owner: Some("octo".into()),
            name: Some("alpha".into()),
            language: Some("Rust".into()),
            ..Default::default()
        });

        let mut beta = local_repo("Beta", "/code/beta");
        beta.last_opened = Some("2024-05-01T00:00:00Z".into());

        vec![scratch, alpha, beta]
    }

    fn panel(capabilities: LocalProjectsCapabilities) -> LocalProjectsPanel {
        let (_host, context) = context(
            CurrentScope::default(),
            vec![(SliceKey::global(LOCAL_REPOSITORIES), json!(repositories()))],
        );
        let mut panel = LocalProjectsPanel::new(capabilities);
        panel.sync(&context);
        panel
    }

    fn all_capabilities() -> LocalProjectsCapabilities {
        LocalProjectsCapabilities::default()
            .with_open_repository(|_| async { Ok(()) })
            .with_remove_repository(|_| async { Ok(()) })
            .with_select_directory(|()| async { Ok(Some("/code/new".to_string())) })
            .with_register_repository(|path: String| async move { Ok(local_repo("new", &path)) })
    }

    #[test]
    fn test_tracked_first_then_recent() {
        let panel = panel(LocalProjectsCapabilities::default());
        let names: Vec<&str> = panel.visible().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "alpha", "scratch"]);
    }

    #[tokio::test]
    async fn test_filter_matches_remote_metadata() {
        let mut panel = panel(LocalProjectsCapabilities::default());
        run(&mut panel, LocalProjectsCommand::Filter { filter: "  RUST ".into() }).await;
        assert_eq!(panel.view().row_titles(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn test_open_moves_through_operation_states() {
        let mut panel = panel(all_capabilities());
        let mut effects = Effects::new();
        panel.handle(
            LocalProjectsCommand::OpenRepository {
                identifier: "ALPHA".into(),
            },
            &mut effects,
        );
        assert_eq!(panel.state().operation("/code/alpha"), OperationState::Opening);
        let view = panel.view();
        let open = view.row("/code/alpha").unwrap().controls[0].clone();
        assert!(open.busy && !open.enabled);

        let emitted = crate::test_support::drain(&mut panel, effects).await;
        assert_eq!(
            event_types(&emitted),
            vec![events::REPOSITORY_SELECTED, events::REPOSITORY_OPENED]
        );
        assert_eq!(panel.state().operation("/code/alpha"), OperationState::Ready);
    }

    #[tokio::test]
    async fn test_failed_open_reverts_to_closed() {
        let capabilities = LocalProjectsCapabilities::default()
            .with_open_repository(|_| async { Err(ActionError::rejected("open", "window limit")) });
        let mut panel = panel(capabilities);
        let emitted = run(&mut panel, LocalProjectsCommand::OpenRepository { identifier: "Beta".into() }).await;

        assert_eq!(event_types(&emitted), vec![events::REPOSITORY_SELECTED]);
        assert_eq!(panel.state().operation("/code/beta"), OperationState::Closed);
        assert!(panel.view().banner.unwrap().contains("window limit"));
    }

    #[tokio::test]
    async fn test_add_without_path_uses_picker() {
        let registered = Arc::new(Mutex::new(Vec::new()));
        let seen = registered.clone();
        let capabilities = all_capabilities().with_register_repository(move |path: String| {
            seen.lock().unwrap().push(path.clone());
            async move { Ok(local_repo("new", &path)) }
        });
        let mut panel = panel(capabilities);

        let emitted = run(&mut panel, LocalProjectsCommand::AddRepository { path: None }).await;
        assert_eq!(event_types(&emitted), vec![events::REPOSITORY_ADDED]);
        assert_eq!(emitted[0].1["repository"]["path"], "/code/new");
        assert_eq!(*registered.lock().unwrap(), vec!["/code/new".to_string()]);
        assert!(panel.state().in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_picker_emits_nothing() {
        let capabilities = all_capabilities().with_select_directory(|()| async { Ok(None) });
        let mut panel = panel(capabilities);
        let emitted = run(&mut panel, LocalProjectsCommand::AddRepository { path: None }).await;
        assert!(emitted.is_empty());
        assert!(panel.state().banner.is_none());
        assert!(panel.state().in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_remove_emits_removed() {
        let mut panel = panel(all_capabilities());
        let emitted = run(
            &mut panel,
            LocalProjectsCommand::RemoveRepository {
                identifier: "/tmp/scratch".into(),
            },
        )
        .await;
        assert_eq!(event_types(&emitted), vec![events::REPOSITORY_REMOVED]);
        assert_eq!(emitted[0].1["repository"]["name"], "scratch");
    }

    #[test]
    fn test_controls_follow_capabilities() {
        let bare = panel(LocalProjectsCapabilities::default()).view();
        for kind in [ControlKind::Open, ControlKind::Remove, ControlKind::Add] {
            assert!(!bare.has_control(kind));
        }

        // registration alone is not enough to offer the add button
        let register_only = panel(
            LocalProjectsCapabilities::default().with_register_repository(|p: String| async move { Ok(local_repo("x", &p)) }),
        )
        .view();
        assert!(!register_only.has_control(ControlKind::Add));

        let full = panel(all_capabilities()).view();
        for kind in [ControlKind::Open, ControlKind::Remove, ControlKind::Add] {
            assert!(full.has_control(kind));
        }
    }

    #[test]
    fn test_add_payload_is_optional() {
        assert_eq!(
            LocalProjectsCommand::parse(events::ADD_REPOSITORY, &Value::Null).unwrap(),
            LocalProjectsCommand::AddRepository { path: None }
        );
        assert_eq!(
            LocalProjectsCommand::parse(events::ADD_REPOSITORY, &json!({ "path": "/x" })).unwrap(),
            LocalProjectsCommand::AddRepository {
                path: Some("/x".into())
            }
        );
    }
}
