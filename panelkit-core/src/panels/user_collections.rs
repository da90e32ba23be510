//! Collections of repositories curated by the user.

use std::fmt;
use std::future::Future;

use serde_json::{Value, json};
use tracing::debug;

use super::slices::USER_COLLECTIONS;
use super::{PanelMetadata, VERSION, filter_payload, identifier_payload, refresh_all};
use crate::actions::{ActionError, BaseActions, HostAction, host_action};
use crate::command::{CommandError, CreatePayload, FilterPayload, IdentifierPayload, PanelCommand, decode, unknown};
use crate::model::Collection;
use crate::reducer::{StateAction, reduce};
use crate::resolve::resolve;
use crate::runtime::{Effects, Panel, Settled, invoke, settle, to_payload};
use crate::slice::{DataSlice, PanelContext, SliceKey};
use crate::sort::{collections_by_name, filtered_sorted};
use crate::state::{ActionKind, ListState};
use crate::tool::ToolDescriptor;
use crate::view::{Control, ControlKind, PanelStatus, PanelView, Row, Section};

pub const PANEL_ID: &str = "user-collections";

pub mod events {
    pub const FILTER: &str = "user-collections:filter";
    pub const SELECT_COLLECTION: &str = "user-collections:select-collection";
    pub const CREATE_COLLECTION: &str = "user-collections:create-collection";
    pub const DELETE_COLLECTION: &str = "user-collections:delete-collection";
    pub const TOGGLE_SEARCH: &str = "user-collections:toggle-search";
    pub const REFRESH: &str = "user-collections:refresh";

    pub const COLLECTION_SELECTED: &str = "user-collections:collection:selected";
    pub const COLLECTION_CREATED: &str = "user-collections:collection:created";
    pub const COLLECTION_DELETED: &str = "user-collections:collection:deleted";
    pub const SEARCH_TOGGLED: &str = "user-collections:search-toggled";
}

pub const CAPABILITIES: &[&str] = &["create_collection", "delete_collection"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserCollectionsCommand {
    Filter { filter: String },
    SelectCollection { identifier: String },
    CreateCollection { name: String, description: Option<String> },
    DeleteCollection { identifier: String },
    ToggleSearch,
    Refresh,
}

impl PanelCommand for UserCollectionsCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_COLLECTION,
        events::CREATE_COLLECTION,
        events::DELETE_COLLECTION,
        events::TOGGLE_SEARCH,
        events::REFRESH,
    ];

    fn parse(event_type: &str, payload: &Value) -> Result<Self, CommandError> {
        let identifier = || decode::<IdentifierPayload>(event_type, payload).map(|p| p.identifier);
        match event_type {
            events::FILTER => Ok(Self::Filter {
                filter: decode::<FilterPayload>(event_type, payload)?.filter,
            }),
            events::SELECT_COLLECTION => Ok(Self::SelectCollection { identifier: identifier()? }),
            events::CREATE_COLLECTION => {
                let CreatePayload { name, description } = decode(event_type, payload)?;
                Ok(Self::CreateCollection { name, description })
            }
            events::DELETE_COLLECTION => Ok(Self::DeleteCollection { identifier: identifier()? }),
            events::TOGGLE_SEARCH => Ok(Self::ToggleSearch),
            events::REFRESH => Ok(Self::Refresh),
            other => Err(unknown(other)),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Filter { .. } => events::FILTER,
            Self::SelectCollection { .. } => events::SELECT_COLLECTION,
            Self::CreateCollection { .. } => events::CREATE_COLLECTION,
            Self::DeleteCollection { .. } => events::DELETE_COLLECTION,
            Self::ToggleSearch => events::TOGGLE_SEARCH,
            Self::Refresh => events::REFRESH,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Filter { filter } => filter_payload(filter),
            Self::SelectCollection { identifier } | Self::DeleteCollection { identifier } => {
                identifier_payload(identifier)
            }
            Self::CreateCollection { name, description } => json!({ "name": name, "description": description }),
            Self::ToggleSearch | Self::Refresh => Value::Null,
        }
    }
}

#[derive(Clone, Default)]
pub struct UserCollectionsCapabilities {
    pub base: BaseActions,
    pub create_collection: Option<HostAction<CreatePayload, Collection>>,
    /// Delete a collection by id
    pub delete_collection: Option<HostAction<String, ()>>,
}

impl UserCollectionsCapabilities {
    pub fn with_base(mut self, base: BaseActions) -> Self {
        self.base = base;
        self
    }

    pub fn with_create_collection<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CreatePayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Collection, ActionError>> + Send + 'static,
    {
        self.create_collection = Some(host_action(f));
        self
    }

    pub fn with_delete_collection<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.delete_collection = Some(host_action(f));
        self
    }

    pub fn available(&self) -> Vec<&'static str> {
        let mut names = self.base.available();
        if self.create_collection.is_some() {
            names.push("create_collection");
        }
        if self.delete_collection.is_some() {
            names.push("delete_collection");
        }
        names
    }
}

impl fmt::Debug for UserCollectionsCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCollectionsCapabilities")
            .field("available", &self.available())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UserCollectionsOutcome {
    Created(Collection),
    Deleted(Collection),
}

pub type UserCollectionsCompletion = Settled<UserCollectionsOutcome>;

pub struct UserCollectionsPanel {
    capabilities: UserCollectionsCapabilities,
    state: ListState,
    slice: Option<DataSlice<Vec<Collection>>>,
}

impl UserCollectionsPanel {
    pub fn new(capabilities: UserCollectionsCapabilities) -> Self {
        Self {
            capabilities,
            state: ListState::new(),
            slice: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn collections(&self) -> &[Collection] {
        self.slice.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn visible(&self) -> Vec<&Collection> {
        filtered_sorted(self.collections(), &self.state.filter, collections_by_name)
    }

    fn find(&self, identifier: &str) -> Option<Collection> {
        let found = resolve(self.collections(), identifier).cloned();
        if found.is_none() {
            debug!(panel = PANEL_ID, identifier, "no collection matches identifier");
        }
        found
    }

    fn create(&mut self, name: String, description: Option<String>, effects: &mut Effects<UserCollectionsCompletion>) {
        let Some(create) = self.capabilities.create_collection.clone() else {
            debug!(panel = PANEL_ID, "create_collection not provided");
            return;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            reduce(
                &mut self.state,
                &StateAction::Fail {
                    action: ActionKind::Create,
                    target: String::new(),
                    message: "Collection name cannot be empty".into(),
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
            UserCollectionsOutcome::Created,
        );
    }

    fn delete(&mut self, identifier: &str, effects: &mut Effects<UserCollectionsCompletion>) {
        let Some(collection) = self.find(identifier) else {
            return;
        };
        let Some(delete) = self.capabilities.delete_collection.clone() else {
            debug!(panel = PANEL_ID, "delete_collection not provided");
            return;
        };
        let id = collection.id.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Delete,
            &id,
            &delete,
            id.clone(),
            move |()| UserCollectionsOutcome::Deleted(collection),
        );
    }

    fn row(&self, collection: &Collection) -> Row {
        let key = collection.id.as_str();
        let count = collection.repositories.len();
        let mut row = Row::new(key, collection.name.as_str())
            .subtitle(collection.description.as_deref())
            .selected(self.state.is_selected(key))
            .badge(if count == 1 {
                "1 repository".to_string()
            } else {
                format!("{} repositories", count)
            });
        if self.capabilities.delete_collection.is_some() {
            let deleting = self.state.is_in_flight(ActionKind::Delete, key);
            row = row.control(Control::new(ControlKind::Delete).busy_when(deleting));
        }
        row
    }
}

impl Panel for UserCollectionsPanel {
    type Command = UserCollectionsCommand;
    type Completion = UserCollectionsCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        vec![SliceKey::global(USER_COLLECTIONS)]
    }

    fn sync(&mut self, context: &PanelContext) {
        self.slice = context.get_slice(USER_COLLECTIONS);
    }

    fn handle(&mut self, command: UserCollectionsCommand, effects: &mut Effects<UserCollectionsCompletion>) {
        match command {
            UserCollectionsCommand::Filter { filter } => {
                reduce(&mut self.state, &StateAction::SetFilter { filter });
            }
            UserCollectionsCommand::SelectCollection { identifier } => {
                if let Some(collection) = self.find(&identifier) {
                    reduce(
                        &mut self.state,
                        &StateAction::Select {
                            key: collection.id.clone(),
                        },
                    );
                    effects.emit(events::COLLECTION_SELECTED, json!({ "collection": to_payload(&collection) }));
                }
            }
            UserCollectionsCommand::CreateCollection { name, description } => self.create(name, description, effects),
            UserCollectionsCommand::DeleteCollection { identifier } => self.delete(&identifier, effects),
            UserCollectionsCommand::ToggleSearch => {
                reduce(&mut self.state, &StateAction::ToggleSearch);
                effects.emit(events::SEARCH_TOGGLED, json!({ "visible": self.state.search_visible }));
            }
            UserCollectionsCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(&mut self, completion: UserCollectionsCompletion, effects: &mut Effects<UserCollectionsCompletion>) {
        let Some((_, outcome)) = settle(PANEL_ID, &mut self.state, completion) else {
            return;
        };
        let (event_type, collection) = match outcome {
            UserCollectionsOutcome::Created(collection) => (events::COLLECTION_CREATED, collection),
            UserCollectionsOutcome::Deleted(collection) => (events::COLLECTION_DELETED, collection),
        };
        effects.emit(event_type, json!({ "collection": to_payload(&collection) }));
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.state);
        view.status = PanelStatus::of_list(self.slice.as_ref());
        view.toolbar.push(Control::new(ControlKind::ToggleSearch));
        if self.capabilities.create_collection.is_some() {
            let creating = self.state.any_in_flight(ActionKind::Create);
            view.toolbar.push(Control::new(ControlKind::Create).busy_when(creating));
        }
        let rows = self.visible().into_iter().map(|c| self.row(c)).collect();
        view.sections.push(Section::flat(rows));
        view.with_slice_error(self.slice.as_ref().and_then(|s| s.error.as_deref()))
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "User Collections",
        description: "Collections of repositories you curate",
        icon: "bookmark",
        version: VERSION,
        slices: vec![SliceKey::global(USER_COLLECTIONS)],
        capabilities: CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    let collection = "Collection id or name";
    vec![
        ToolDescriptor::new("filter_collections", "Filter your collections by a search term", events::FILTER)
            .input("filter", "string", "Search text; empty clears the filter")
            .tags(&["collections", "search"]),
        ToolDescriptor::new("select_collection", "Select a collection", events::SELECT_COLLECTION)
            .input("identifier", "string", collection)
            .output("collection", "object", "The selected collection")
            .tags(&["collections"]),
        ToolDescriptor::new("create_collection", "Create a collection", events::CREATE_COLLECTION)
            .input("name", "string", "Collection name")
            .optional_input("description", "string", "Optional description")
            .output("collection", "object", "The created collection")
            .tags(&["collections", "create"]),
        ToolDescriptor::new("delete_collection", "Delete a collection", events::DELETE_COLLECTION)
            .input("identifier", "string", collection)
            .output("collection", "object", "The deleted collection")
            .tags(&["collections", "delete"]),
        ToolDescriptor::new(
            "toggle_collection_search",
            "Show or hide the collection search box; hiding it clears the filter",
            events::TOGGLE_SEARCH,
        )
        .output("visible", "boolean", "Whether the search box is now shown")
        .tags(&["collections", "search"]),
        ToolDescriptor::new("refresh_collections", "Reload your collections", events::REFRESH).tags(&["collections"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::CurrentScope;
    use crate::test_support::{collection, context, event_types, run};

    fn panel(capabilities: UserCollectionsCapabilities) -> UserCollectionsPanel {
        let mut reading = collection("c-2", "reading list");
        reading.repositories = vec!["tokio-rs/tokio".into()];
        let (_host, context) = context(
            CurrentScope::default(),
            vec![(
                SliceKey::global(USER_COLLECTIONS),
                json!([collection("c-1", "Tools"), reading, collection("c-3", "async")]),
            )],
        );
        let mut panel = UserCollectionsPanel::new(capabilities);
        panel.sync(&context);
        panel
    }

    #[test]
    fn test_collections_sorted_by_name() {
        let view = panel(UserCollectionsCapabilities::default()).view();
        assert_eq!(view.row_titles(), vec!["async", "reading list", "Tools"]);
        assert_eq!(view.row("c-2").unwrap().badges, vec!["1 repository"]);
    }

    #[tokio::test]
    async fn test_toggle_search_reports_visibility_and_clears_filter() {
        let mut panel = panel(UserCollectionsCapabilities::default());
        let shown = run(&mut panel, UserCollectionsCommand::ToggleSearch).await;
        assert_eq!(shown, vec![(events::SEARCH_TOGGLED.to_string(), json!({ "visible": true }))]);

        run(&mut panel, UserCollectionsCommand::Filter { filter: "tools".into() }).await;
        assert_eq!(panel.view().row_titles(), vec!["Tools"]);

        let hidden = run(&mut panel, UserCollectionsCommand::ToggleSearch).await;
        assert_eq!(hidden[0].1, json!({ "visible": false }));
        assert_eq!(panel.state().filter, "");
        assert_eq!(panel.view().row_titles().len(), 3);
    }

    #[tokio::test]
    async fn test_select_resolves_name_case_insensitively() {
        let mut panel = panel(UserCollectionsCapabilities::default());
        let emitted = run(
            &mut panel,
            UserCollectionsCommand::SelectCollection {
                identifier: "TOOLS".into(),
            },
        )
        .await;
        assert_eq!(event_types(&emitted), vec![events::COLLECTION_SELECTED]);
        assert_eq!(emitted[0].1["collection"]["id"], "c-1");
        assert_eq!(panel.view().selected_row().unwrap().key, "c-1");
    }

    #[tokio::test]
    async fn test_create_and_delete_round_trip() {
        let capabilities = UserCollectionsCapabilities::default()
            .with_create_collection(|payload: CreatePayload| async move {
                Ok(Collection {
                    id: "c-9".into(),
                    name: payload.name,
                    description: payload.description,
                    repositories: Vec::new(),
                    updated_at: None,
                })
            })
            .with_delete_collection(|_| async { Ok(()) });
        let mut panel = panel(capabilities);

        let created = run(
            &mut panel,
            UserCollectionsCommand::CreateCollection {
                name: " Rust ".into(),
                description: None,
            },
        )
        .await;
        assert_eq!(event_types(&created), vec![events::COLLECTION_CREATED]);
        assert_eq!(created[0].1["collection"]["name"], "Rust");

        let deleted = run(
            &mut panel,
            UserCollectionsCommand::DeleteCollection {
                identifier: "async".into(),
            },
        )
        .await;
        assert_eq!(deleted[0].1["collection"]["id"], "c-3");
    }

    #[tokio::test]
    async fn test_failed_delete_sets_banner() {
        let capabilities = UserCollectionsCapabilities::default()
            .with_delete_collection(|_| async { Err(ActionError::rejected("delete_collection", "forbidden")) });
        let mut panel = panel(capabilities);
        let emitted = run(
            &mut panel,
            UserCollectionsCommand::DeleteCollection {
                identifier: "c-1".into(),
            },
        )
        .await;
        assert!(emitted.is_empty());
        assert_eq!(
            panel.view().banner.as_deref(),
            Some("delete_collection failed: forbidden")
        );
    }

    #[test]
    fn test_toolbar_always_offers_search() {
        let view = panel(UserCollectionsCapabilities::default()).view();
        assert!(view.has_control(ControlKind::ToggleSearch));
        assert!(!view.has_control(ControlKind::Create));
        assert!(!view.has_control(ControlKind::Delete));
    }
}
