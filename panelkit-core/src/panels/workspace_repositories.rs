//! Repositories of the current workspace.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::slices::{WORKSPACE_REPOSITORIES, WORKSPACES};
use super::{PanelMetadata, VERSION, filter_payload, identifier_payload, refresh_all};
use crate::actions::{ActionError, BaseActions, HostAction, host_action};
use crate::command::{CommandError, FilterPayload, IdentifierPayload, PanelCommand, decode, first_present, unknown};
use crate::model::{LocalRepository, RepositoryPath, Workspace};
use crate::reducer::{StateAction, reduce};
use crate::resolve::resolve;
use crate::runtime::{Effects, Panel, Settled, invoke, settle, to_payload};
use crate::slice::{DataSlice, PanelContext, SliceKey};
use crate::sort::{filtered_sorted, local_repositories_by_name};
use crate::state::{ActionKind, ListState, OperationState};
use crate::tool::ToolDescriptor;
use crate::view::{Control, ControlKind, PanelStatus, PanelView, Row, Section};

pub const PANEL_ID: &str = "workspace-repositories";

pub mod events {
    pub const FILTER: &str = "workspace-repositories:filter";
    pub const SELECT_REPOSITORY: &str = "workspace-repositories:select-repository";
    pub const OPEN_REPOSITORY: &str = "workspace-repositories:open-repository";
    pub const MOVE_REPOSITORY: &str = "workspace-repositories:move-repository";
    pub const REFRESH: &str = "workspace-repositories:refresh";

    pub const REPOSITORY_SELECTED: &str = "workspace-repositories:repository:selected";
    pub const REPOSITORY_OPENED: &str = "workspace-repositories:repository:opened";
    pub const REPOSITORY_MOVED: &str = "workspace-repositories:repository:moved";
}

pub const CAPABILITIES: &[&str] = &["open_repository", "move_repository"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceRepositoriesCommand {
    Filter { filter: String },
    SelectRepository { identifier: String },
    OpenRepository { identifier: String },
    /// Move a repository to another workspace (id or name)
    MoveRepository { identifier: String, workspace: String },
    Refresh,
}

#[derive(Deserialize)]
#[serde(try_from = "MoveFields")]
struct MovePayload {
    identifier: String,
    workspace: String,
}

#[derive(Deserialize)]
struct MoveFields {
    #[serde(flatten)]
    repository: IdentifierPayload,
    workspace: Option<String>,
    #[serde(rename = "workspaceId")]
    workspace_id: Option<String>,
    target: Option<String>,
}

impl TryFrom<MoveFields> for MovePayload {
    type Error = String;

    fn try_from(fields: MoveFields) -> Result<Self, Self::Error> {
        Ok(Self {
            identifier: fields.repository.identifier,
            workspace: first_present("workspace", [fields.workspace, fields.workspace_id, fields.target])?,
        })
    }
}

impl PanelCommand for WorkspaceRepositoriesCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_REPOSITORY,
        events::OPEN_REPOSITORY,
        events::MOVE_REPOSITORY,
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
            events::MOVE_REPOSITORY => {
                let MovePayload { identifier, workspace } = decode(event_type, payload)?;
                Ok(Self::MoveRepository { identifier, workspace })
            }
            events::REFRESH => Ok(Self::Refresh),
            other => Err(unknown(other)),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Filter { .. } => events::FILTER,
            Self::SelectRepository { .. } => events::SELECT_REPOSITORY,
            Self::OpenRepository { .. } => events::OPEN_REPOSITORY,
            Self::MoveRepository { .. } => events::MOVE_REPOSITORY,
            Self::Refresh => events::REFRESH,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Filter { filter } => filter_payload(filter),
            Self::SelectRepository { identifier } | Self::OpenRepository { identifier } => {
                identifier_payload(identifier)
            }
            Self::MoveRepository { identifier, workspace } => {
                json!({ "identifier": identifier, "workspace": workspace })
            }
            Self::Refresh => Value::Null,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub path: RepositoryPath,
    pub workspace_id: String,
}

#[derive(Clone, Default)]
pub struct WorkspaceRepositoriesCapabilities {
    pub base: BaseActions,
    pub open_repository: Option<HostAction<RepositoryPath, ()>>,
    pub move_repository: Option<HostAction<MoveRequest, ()>>,
}

impl WorkspaceRepositoriesCapabilities {
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

    pub fn with_move_repository<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(MoveRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.move_repository = Some(host_action(f));
        self
    }

    pub fn available(&self) -> Vec<&'static str> {
        let mut names = self.base.available();
        if self.open_repository.is_some() {
            names.push("open_repository");
        }
        if self.move_repository.is_some() {
            names.push("move_repository");
        }
        names
    }
}

impl fmt::Debug for WorkspaceRepositoriesCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceRepositoriesCapabilities")
            .field("available", &self.available())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkspaceRepositoriesOutcome {
    Opened(LocalRepository),
    Moved {
        repository: LocalRepository,
        workspace: Workspace,
    },
}

pub type WorkspaceRepositoriesCompletion = Settled<WorkspaceRepositoriesOutcome>;

pub struct WorkspaceRepositoriesPanel {
    capabilities: WorkspaceRepositoriesCapabilities,
    state: ListState,
    slice: Option<DataSlice<Vec<LocalRepository>>>,
    workspaces: Vec<Workspace>,
    current: Option<String>,
}

impl WorkspaceRepositoriesPanel {
    pub fn new(capabilities: WorkspaceRepositoriesCapabilities) -> Self {
        Self {
            capabilities,
            state: ListState::new(),
            slice: None,
            workspaces: Vec::new(),
            current: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn repositories(&self) -> &[LocalRepository] {
        self.slice.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn visible(&self) -> Vec<&LocalRepository> {
        filtered_sorted(self.repositories(), &self.state.filter, local_repositories_by_name)
    }

    pub fn current_workspace(&self) -> Option<&Workspace> {
        let id = self.current.as_deref()?;
        self.workspaces.iter().find(|w| w.id == id)
    }

    /// Workspaces a repository can be moved to
    pub fn move_targets(&self) -> Vec<&Workspace> {
        self.workspaces
            .iter()
            .filter(|w| Some(w.id.as_str()) != self.current.as_deref())
            .collect()
    }

    fn find(&self, identifier: &str) -> Option<LocalRepository> {
        let found = resolve(self.repositories(), identifier).cloned();
        if found.is_none() {
            debug!(panel = PANEL_ID, identifier, "no repository matches identifier");
        }
        found
    }

    fn select(&mut self, repository: &LocalRepository, effects: &mut Effects<WorkspaceRepositoriesCompletion>) {
        reduce(
            &mut self.state,
            &StateAction::Select {
                key: repository.path.clone(),
            },
        );
        effects.emit(events::REPOSITORY_SELECTED, json!({ "repository": to_payload(repository) }));
    }

    fn open(&mut self, identifier: &str, effects: &mut Effects<WorkspaceRepositoriesCompletion>) {
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
            move |()| WorkspaceRepositoriesOutcome::Opened(repository),
        );
    }

    fn move_to(&mut self, identifier: &str, target: &str, effects: &mut Effects<WorkspaceRepositoriesCompletion>) {
        let Some(repository) = self.find(identifier) else {
            return;
        };
        let Some(workspace) = resolve(&self.workspaces, target).cloned() else {
            debug!(panel = PANEL_ID, workspace = target, "no workspace matches move target");
            return;
        };
        if self.current.as_deref() == Some(workspace.id.as_str()) {
            debug!(panel = PANEL_ID, workspace = %workspace.id, "repository already in workspace");
            return;
        }
        let Some(move_repository) = self.capabilities.move_repository.clone() else {
            debug!(panel = PANEL_ID, "move_repository not provided");
            return;
        };

        let request = MoveRequest {
            path: repository.path.clone(),
            workspace_id: workspace.id.clone(),
        };
        let path = repository.path.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Move,
            &path,
            &move_repository,
            request,
            move |()| WorkspaceRepositoriesOutcome::Moved { repository, workspace },
        );
    }

    fn row(&self, repository: &LocalRepository, can_move: bool) -> Row {
        let key = repository.path.as_str();
        let mut row = Row::new(key, repository.name.as_str())
            .subtitle(Some(key))
            .selected(self.state.is_selected(key));
        if let Some(language) = repository.language() {
            row = row.badge(language);
        }

        if self.capabilities.open_repository.is_some() {
            let opening = self.state.operation(key) == OperationState::Opening;
            row = row.control(Control::new(ControlKind::Open).busy_when(opening));
        }
        if can_move {
            let moving = self.state.is_in_flight(ActionKind::Move, key);
            row = row.control(Control::new(ControlKind::Move).busy_when(moving));
        }
        row
    }
}

impl Panel for WorkspaceRepositoriesPanel {
    type Command = WorkspaceRepositoriesCommand;
    type Completion = WorkspaceRepositoriesCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        vec![SliceKey::workspace(WORKSPACE_REPOSITORIES), SliceKey::global(WORKSPACES)]
    }

    fn sync(&mut self, context: &PanelContext) {
        self.slice = context.get_workspace_slice(WORKSPACE_REPOSITORIES);
        self.workspaces = context
            .get_slice::<Vec<Workspace>>(WORKSPACES)
            .map(|s| s.data)
            .unwrap_or_default();
        self.current = context.current_scope().workspace_id.clone();
    }

    fn handle(&mut self, command: WorkspaceRepositoriesCommand, effects: &mut Effects<WorkspaceRepositoriesCompletion>) {
        match command {
            WorkspaceRepositoriesCommand::Filter { filter } => {
                reduce(&mut self.state, &StateAction::SetFilter { filter });
            }
            WorkspaceRepositoriesCommand::SelectRepository { identifier } => {
                if let Some(repository) = self.find(&identifier) {
                    self.select(&repository, effects);
                }
            }
            WorkspaceRepositoriesCommand::OpenRepository { identifier } => self.open(&identifier, effects),
            WorkspaceRepositoriesCommand::MoveRepository { identifier, workspace } => {
                self.move_to(&identifier, &workspace, effects)
            }
            WorkspaceRepositoriesCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(
        &mut self,
        completion: WorkspaceRepositoriesCompletion,
        effects: &mut Effects<WorkspaceRepositoriesCompletion>,
    ) {
        let Some((_, outcome)) = settle(PANEL_ID, &mut self.state, completion) else {
            return;
        };
        match outcome {
            WorkspaceRepositoriesOutcome::Opened(repository) => {
                effects.emit(events::REPOSITORY_OPENED, json!({ "repository": to_payload(&repository) }));
            }
            WorkspaceRepositoriesOutcome::Moved { repository, workspace } => effects.emit(
                events::REPOSITORY_MOVED,
                json!({ "repository": to_payload(&repository), "workspace": to_payload(&workspace) }),
            ),
        }
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.state);
        view.status = PanelStatus::of_list(self.slice.as_ref());
        view.header = self
            .current_workspace()
            .map(|w| Row::new(w.id.as_str(), w.name.as_str()).subtitle(w.description.as_deref()));

        let can_move = self.capabilities.move_repository.is_some() && !self.move_targets().is_empty();
        let rows = self.visible().into_iter().map(|r| self.row(r, can_move)).collect();
        view.sections.push(Section::flat(rows));
        view.with_slice_error(self.slice.as_ref().and_then(|s| s.error.as_deref()))
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "Workspace Repositories",
        description: "Repositories in the current workspace",
        icon: "folder-tree",
        version: VERSION,
        slices: vec![SliceKey::workspace(WORKSPACE_REPOSITORIES), SliceKey::global(WORKSPACES)],
        capabilities: CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    let repository = "Repository path or name";
    vec![
        ToolDescriptor::new(
            "filter_workspace_repositories",
            "Filter the repositories of the current workspace",
            events::FILTER,
        )
        .input("filter", "string", "Search text; empty clears the filter")
        .tags(&["workspaces", "repositories", "search"]),
        ToolDescriptor::new(
            "select_workspace_repository",
            "Select a repository of the current workspace",
            events::SELECT_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The selected repository")
        .tags(&["workspaces", "repositories"]),
        ToolDescriptor::new(
            "open_workspace_repository",
            "Open a repository of the current workspace",
            events::OPEN_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The opened repository")
        .tags(&["workspaces", "repositories", "open"]),
        ToolDescriptor::new(
            "move_workspace_repository",
            "Move a repository to another workspace",
            events::MOVE_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .input("workspace", "string", "Target workspace id or name")
        .output("workspace", "object", "The workspace the repository moved to")
        .tags(&["workspaces", "repositories", "move"]),
        ToolDescriptor::new(
            "refresh_workspace_repositories",
            "Reload the repositories of the current workspace",
            events::REFRESH,
        )
        .tags(&["workspaces", "repositories"]),
    ]
}
