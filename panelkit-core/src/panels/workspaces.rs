//! Workspaces, the default one first.

use std::fmt;
use std::future::Future;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::slices::WORKSPACES;
use super::{PanelMetadata, VERSION, filter_payload, identifier_payload, refresh_all};
use crate::actions::{ActionError, BaseActions, HostAction, host_action};
use crate::command::{CommandError, CreatePayload, FilterPayload, IdentifierPayload, PanelCommand, decode, unknown};
use crate::model::Workspace;
use crate::reducer::{StateAction, reduce};
use crate::resolve::resolve;
use crate::runtime::{Effects, Panel, Settled, invoke, settle, to_payload};
use crate::slice::{DataSlice, PanelContext, SliceKey};
use crate::sort::{filtered_sorted, workspaces_order};
use crate::state::{ActionKind, ListState, OperationState};
use crate::tool::ToolDescriptor;
use crate::view::{Control, ControlKind, PanelStatus, PanelView, Row, Section};

pub const PANEL_ID: &str = "workspaces";

pub mod events {
    pub const FILTER: &str = "workspaces:filter";
    pub const SELECT_WORKSPACE: &str = "workspaces:select-workspace";
    pub const OPEN_WORKSPACE: &str = "workspaces:open-workspace";
    pub const CREATE_WORKSPACE: &str = "workspaces:create-workspace";
    pub const DELETE_WORKSPACE: &str = "workspaces:delete-workspace";
    pub const REFRESH: &str = "workspaces:refresh";

    pub const WORKSPACE_SELECTED: &str = "workspaces:workspace:selected";
    pub const WORKSPACE_OPENED: &str = "workspaces:workspace:opened";
    pub const WORKSPACE_CREATED: &str = "workspaces:workspace:created";
    pub const WORKSPACE_DELETED: &str = "workspaces:workspace:deleted";
}

pub const CAPABILITIES: &[&str] = &["open_workspace", "create_workspace", "delete_workspace"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspacesCommand {
    Filter { filter: String },
    SelectWorkspace { identifier: String },
    OpenWorkspace { identifier: String },
    CreateWorkspace { name: String, description: Option<String> },
    DeleteWorkspace { identifier: String },
    Refresh,
}

impl PanelCommand for WorkspacesCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_WORKSPACE,
        events::OPEN_WORKSPACE,
        events::CREATE_WORKSPACE,
        events::DELETE_WORKSPACE,
        events::REFRESH,
    ];

    fn parse(event_type: &str, payload: &Value) -> Result<Self, CommandError> {
        let identifier = || decode::<IdentifierPayload>(event_type, payload).map(|p| p.identifier);
        match event_type {
            events::FILTER => Ok(Self::Filter {
                filter: decode::<FilterPayload>(event_type, payload)?.filter,
            }),
            events::SELECT_WORKSPACE => Ok(Self::SelectWorkspace { identifier: identifier()? }),
            events::OPEN_WORKSPACE => Ok(Self::OpenWorkspace { identifier: identifier()? }),
            events::CREATE_WORKSPACE => {
                let CreatePayload { name, description } = decode(event_type, payload)?;
                Ok(Self::CreateWorkspace { name, description })
            }
            events::DELETE_WORKSPACE => Ok(Self::DeleteWorkspace { identifier: identifier()? }),
            events::REFRESH => Ok(Self::Refresh),
            other => Err(unknown(other)),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Filter { .. } => events::FILTER,
            Self::SelectWorkspace { .. } => events::SELECT_WORKSPACE,
            Self::OpenWorkspace { .. } => events::OPEN_WORKSPACE,
            Self::CreateWorkspace { .. } => events::CREATE_WORKSPACE,
            Self::DeleteWorkspace { .. } => events::DELETE_WORKSPACE,
            Self::Refresh => events::REFRESH,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Filter { filter } => filter_payload(filter),
            Self::SelectWorkspace { identifier }
            | Self::OpenWorkspace { identifier }
            | Self::DeleteWorkspace { identifier } => identifier_payload(identifier),
            Self::CreateWorkspace { name, description } => json!({ "name": name, "description": description }),
            Self::Refresh => Value::Null,
        }
    }
}

#[derive(Clone, Default)]
pub struct WorkspacesCapabilities {
    pub base: BaseActions,
    /// Switch the host to a workspace by id
    pub open_workspace: Option<HostAction<String, ()>>,
    pub create_workspace: Option<HostAction<CreatePayload, Workspace>>,
    pub delete_workspace: Option<HostAction<String, ()>>,
}

impl WorkspacesCapabilities {
    pub fn with_base(mut self, base: BaseActions) -> Self {
        self.base = base;
        self
    }

    pub fn with_open_workspace<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.open_workspace = Some(host_action(f));
        self
    }

    pub fn with_create_workspace<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CreatePayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Workspace, ActionError>> + Send + 'static,
    {
        self.create_workspace = Some(host_action(f));
        self
    }

    pub fn with_delete_workspace<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.delete_workspace = Some(host_action(f));
        self
    }

    pub fn available(&self) -> Vec<&'static str> {
        let mut names = self.base.available();
        if self.open_workspace.is_some() {
            names.push("open_workspace");
        }
        if self.create_workspace.is_some() {
            names.push("create_workspace");
        }
        if self.delete_workspace.is_some() {
            names.push("delete_workspace");
        }
        names
    }
}

impl fmt::Debug for WorkspacesCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspacesCapabilities")
            .field("available", &self.available())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkspacesOutcome {
    Opened(Workspace),
    Created(Workspace),
    Deleted(Workspace),
}

pub type WorkspacesCompletion = Settled<WorkspacesOutcome>;

pub struct WorkspacesPanel {
    capabilities: WorkspacesCapabilities,
    state: ListState,
    slice: Option<DataSlice<Vec<Workspace>>>,
    /// Workspace the host currently shows
    current: Option<String>,
}

impl WorkspacesPanel {
    pub fn new(capabilities: WorkspacesCapabilities) -> Self {
        Self {
            capabilities,
            state: ListState::new(),
            slice: None,
            current: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn workspaces(&self) -> &[Workspace] {
        self.slice.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn visible(&self) -> Vec<&Workspace> {
        filtered_sorted(self.workspaces(), &self.state.filter, workspaces_order)
    }

    pub fn selected_workspace(&self) -> Option<&Workspace> {
        let key = self.state.selected.as_deref()?;
        self.workspaces().iter().find(|w| w.id == key)
    }

    fn find(&self, identifier: &str) -> Option<Workspace> {
        let found = resolve(self.workspaces(), identifier).cloned();
        if found.is_none() {
            debug!(panel = PANEL_ID, identifier, "no workspace matches identifier");
        }
        found
    }

    fn select(&mut self, workspace: &Workspace, effects: &mut Effects<WorkspacesCompletion>) {
        reduce(
            &mut self.state,
            &StateAction::Select {
                key: workspace.id.clone(),
            },
        );
        effects.emit(events::WORKSPACE_SELECTED, json!({ "workspace": to_payload(workspace) }));
    }

    fn open(&mut self, identifier: &str, effects: &mut Effects<WorkspacesCompletion>) {
        let Some(workspace) = self.find(identifier) else {
            return;
        };
        self.select(&workspace, effects);
        let Some(open) = self.capabilities.open_workspace.clone() else {
            debug!(panel = PANEL_ID, "open_workspace not provided");
            return;
        };
        let id = workspace.id.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Open,
            &id,
            &open,
            id.clone(),
            move |()| WorkspacesOutcome::Opened(workspace),
        );
    }

    fn create(&mut self, name: String, description: Option<String>, effects: &mut Effects<WorkspacesCompletion>) {
        let Some(create) = self.capabilities.create_workspace.clone() else {
            debug!(panel = PANEL_ID, "create_workspace not provided");
            return;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            reduce(
                &mut self.state,
                &StateAction::Fail {
                    action: ActionKind::Create,
                    target: String::new(),
                    message: "Workspace name cannot be empty".into(),
                },
            );
            return;
        }
        let description = description.filter(|d| !d.trim().is_empty());
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Create,
            &name.clone(),
            &create,
            CreatePayload { name, description },
            WorkspacesOutcome::Created,
        );
    }

    fn delete(&mut self, identifier: &str, effects: &mut Effects<WorkspacesCompletion>) {
        let Some(workspace) = self.find(identifier) else {
            return;
        };
        if workspace.is_default {
            warn!(panel = PANEL_ID, workspace = %workspace.name, "refusing to delete the default workspace");
            return;
        }
        let Some(delete) = self.capabilities.delete_workspace.clone() else {
            debug!(panel = PANEL_ID, "delete_workspace not provided");
            return;
        };
        let id = workspace.id.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Delete,
            &id,
            &delete,
            id.clone(),
            move |()| WorkspacesOutcome::Deleted(workspace),
        );
    }

    fn row(&self, workspace: &Workspace) -> Row {
        let key = workspace.id.as_str();
        let mut row = Row::new(key, workspace.name.as_str())
            .subtitle(workspace.description.as_deref())
            .selected(self.state.is_selected(key))
            .badge(format!("{} repositories", workspace.repository_count));
        if workspace.is_default {
            row = row.badge("default");
        }
        if self.current.as_deref() == Some(key) {
            row = row.badge("current");
        }

        if self.capabilities.open_workspace.is_some() {
            let opening = self.state.operation(key) == OperationState::Opening;
            row = row.control(Control::new(ControlKind::Open).busy_when(opening));
        }
        if self.capabilities.delete_workspace.is_some() && !workspace.is_default {
            let deleting = self.state.is_in_flight(ActionKind::Delete, key);
            row = row.control(Control::new(ControlKind::Delete).busy_when(deleting));
        }
        row
    }
}

impl Panel for WorkspacesPanel {
    type Command = WorkspacesCommand;
    type Completion = WorkspacesCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        vec![SliceKey::global(WORKSPACES)]
    }

    fn sync(&mut self, context: &PanelContext) {
        self.slice = context.get_slice(WORKSPACES);
        self.current = context.current_scope().workspace_id.clone();
    }

    fn handle(&mut self, command: WorkspacesCommand, effects: &mut Effects<WorkspacesCompletion>) {
        match command {
            WorkspacesCommand::Filter { filter } => {
                reduce(&mut self.state, &StateAction::SetFilter { filter });
            }
            WorkspacesCommand::SelectWorkspace { identifier } => {
                if let Some(workspace) = self.find(&identifier) {
                    self.select(&workspace, effects);
                }
            }
            WorkspacesCommand::OpenWorkspace { identifier } => self.open(&identifier, effects),
            WorkspacesCommand::CreateWorkspace { name, description } => self.create(name, description, effects),
            WorkspacesCommand::DeleteWorkspace { identifier } => self.delete(&identifier, effects),
            WorkspacesCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(&mut self, completion: WorkspacesCompletion, effects: &mut Effects<WorkspacesCompletion>) {
        let Some((_, outcome)) = settle(PANEL_ID, &mut self.state, completion) else {
            return;
        };
        let (event_type, workspace) = match outcome {
            WorkspacesOutcome::Opened(workspace) => (events::WORKSPACE_OPENED, workspace),
            WorkspacesOutcome::Created(workspace) => (events::WORKSPACE_CREATED, workspace),
            WorkspacesOutcome::Deleted(workspace) => (events::WORKSPACE_DELETED, workspace),
        };
        effects.emit(event_type, json!({ "workspace": to_payload(&workspace) }));
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.state);
        view.status = PanelStatus::of_list(self.slice.as_ref());
        if self.capabilities.create_workspace.is_some() {
            let creating = self.state.any_in_flight(ActionKind::Create);
            view.toolbar.push(Control::new(ControlKind::Create).busy_when(creating));
        }
        let rows = self.visible().into_iter().map(|w| self.row(w)).collect();
        view.sections.push(Section::flat(rows));
        view.with_slice_error(self.slice.as_ref().and_then(|s| s.error.as_deref()))
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "Workspaces",
        description: "Switch between, create and delete workspaces",
        icon: "layers",
        version: VERSION,
        slices: vec![SliceKey::global(WORKSPACES)],
        capabilities: CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    let workspace = "Workspace id or name";
    vec![
        ToolDescriptor::new("filter_workspaces", "Filter the workspace list by a search term", events::FILTER)
            .input("filter", "string", "Search text; empty clears the filter")
            .tags(&["workspaces", "search"]),
        ToolDescriptor::new("select_workspace", "Select a workspace", events::SELECT_WORKSPACE)
            .input("identifier", "string", workspace)
            .output("workspace", "object", "The selected workspace")
            .tags(&["workspaces"]),
        ToolDescriptor::new("open_workspace", "Switch to a workspace", events::OPEN_WORKSPACE)
            .input("identifier", "string", workspace)
            .output("workspace", "object", "The opened workspace")
            .tags(&["workspaces", "open"]),
        ToolDescriptor::new("create_workspace", "Create a workspace", events::CREATE_WORKSPACE)
            .input("name", "string", "Workspace name")
            .optional_input("description", "string", "Optional description")
            .output("workspace", "object", "The created workspace")
            .tags(&["workspaces", "create"]),
        ToolDescriptor::new(
            "delete_workspace",
            "Delete a workspace; the default workspace cannot be deleted",
            events::DELETE_WORKSPACE,
        )
        .input("identifier", "string", workspace)
        .output("workspace", "object", "The deleted workspace")
        .tags(&["workspaces", "delete"]),
        ToolDescriptor::new("refresh_workspaces", "Reload the workspace list", events::REFRESH)
            .tags(&["workspaces"]),
    ]
}
