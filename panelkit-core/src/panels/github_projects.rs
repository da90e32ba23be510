//! GitHub repositories of the user and their organizations, grouped by
//! owner with collapsible sections.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::debug;

use super::github::{self, GithubCapabilities, GithubCompletion, GithubList, Notifications};
use super::slices::{GITHUB_REPOSITORIES, LOCAL_REPOSITORIES};
use super::{PanelMetadata, VERSION, filter_payload, identifier_payload, refresh_all};
use crate::command::{CommandError, FilterPayload, IdentifierPayload, PanelCommand, decode, first_present, unknown};
use crate::model::GithubRepository;
use crate::reducer::{StateAction, reduce};
use crate::runtime::{Effects, Panel};
use crate::slice::{PanelContext, SliceKey};
use crate::sort::{alphabetical, github_by_name};
use crate::state::ListState;
use crate::tool::ToolDescriptor;
use crate::view::{PanelView, Section};

pub const PANEL_ID: &str = "github-projects";

pub mod events {
    pub const FILTER: &str = "github-projects:filter";
    pub const SELECT_REPOSITORY: &str = "github-projects:select-repository";
    pub const OPEN_REPOSITORY: &str = "github-projects:open-repository";
    pub const CLONE_REPOSITORY: &str = "github-projects:clone-repository";
    pub const VIEW_IN_BROWSER: &str = "github-projects:view-in-browser";
    pub const TOGGLE_SECTION: &str = "github-projects:toggle-section";
    pub const REFRESH: &str = "github-projects:refresh";

    pub const REPOSITORY_SELECTED: &str = "github-projects:repository-selected";
    pub const REPOSITORY_OPENED: &str = "github-projects:repository-opened";
    pub const REPOSITORY_CLONED: &str = "github-projects:repository-cloned";
    pub const REPOSITORY_VIEWED: &str = "github-projects:repository-viewed";
    pub const SECTION_TOGGLED: &str = "github-projects:section-toggled";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GithubProjectsCommand {
    Filter { filter: String },
    SelectRepository { identifier: String },
    OpenRepository { identifier: String },
    CloneRepository { identifier: String },
    ViewInBrowser { identifier: String },
    ToggleSection { owner: String },
    Refresh,
}

#[derive(serde::Deserialize)]
#[serde(try_from = "OwnerFields")]
struct OwnerPayload {
    owner: String,
}

#[derive(serde::Deserialize)]
struct OwnerFields {
    owner: Option<String>,
    login: Option<String>,
    section: Option<String>,
}

impl TryFrom<OwnerFields> for OwnerPayload {
    type Error = String;

    fn try_from(fields: OwnerFields) -> Result<Self, Self::Error> {
        let owner = first_present("owner", [fields.owner, fields.login, fields.section])?;
        Ok(Self { owner })
    }
}

impl PanelCommand for GithubProjectsCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_REPOSITORY,
        events::OPEN_REPOSITORY,
        events::CLONE_REPOSITORY,
        events::VIEW_IN_BROWSER,
        events::TOGGLE_SECTION,
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
            events::CLONE_REPOSITORY => Ok(Self::CloneRepository { identifier: identifier()? }),
            events::VIEW_IN_BROWSER => Ok(Self::ViewInBrowser { identifier: identifier()? }),
            events::TOGGLE_SECTION => Ok(Self::ToggleSection {
                owner: decode::<OwnerPayload>(event_type, payload)?.owner,
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
            Self::CloneRepository { .. } => events::CLONE_REPOSITORY,
            Self::ViewInBrowser { .. } => events::VIEW_IN_BROWSER,
            Self::ToggleSection { .. } => events::TOGGLE_SECTION,
            Self::Refresh => events::REFRESH,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Filter { filter } => filter_payload(filter),
            Self::SelectRepository { identifier }
            | Self::OpenRepository { identifier }
            | Self::CloneRepository { identifier }
            | Self::ViewInBrowser { identifier } => identifier_payload(identifier),
            Self::ToggleSection { owner } => json!({ "owner": owner }),
            Self::Refresh => Value::Null,
        }
    }
}

const NOTIFICATIONS: Notifications = Notifications {
    selected: events::REPOSITORY_SELECTED,
    opened: events::REPOSITORY_OPENED,
    cloned: events::REPOSITORY_CLONED,
    viewed: events::REPOSITORY_VIEWED,
};

pub struct GithubProjectsPanel {
    list: GithubList,
}

impl GithubProjectsPanel {
    pub fn new(capabilities: GithubCapabilities) -> Self {
        Self {
            list: GithubList::new(
                PANEL_ID,
                NOTIFICATIONS,
                SliceKey::global(GITHUB_REPOSITORIES),
                capabilities,
            ),
        }
    }

    pub fn state(&self) -> &ListState {
        &self.list.state
    }

    pub fn selected_repository(&self) -> Option<&GithubRepository> {
        self.list.selected()
    }

    /// Matching repositories grouped by owner login. Owners are ordered
    /// alphabetically, and so are the repositories of each owner.
    pub fn groups(&self) -> Vec<(&str, Vec<&GithubRepository>)> {
        let mut groups: BTreeMap<String, (&str, Vec<&GithubRepository>)> = BTreeMap::new();
        for repository in self.list.visible(github_by_name) {
            let login = repository.owner_login();
            groups
                .entry(login.to_lowercase())
                .or_insert_with(|| (login, Vec::new()))
                .1
                .push(repository);
        }
        let mut groups: Vec<_> = groups.into_values().collect();
        groups.sort_by(|a, b| alphabetical(a.0, b.0));
        groups
    }

    fn toggle_section(&mut self, owner: &str, effects: &mut Effects<GithubCompletion>) {
        let lower = owner.trim().to_lowercase();
        let Some(login) = self
            .list
            .repositories()
            .iter()
            .map(|r| r.owner_login())
            .find(|login| login.to_lowercase() == lower)
            .map(String::from)
        else {
            debug!(panel = PANEL_ID, owner, "no section for owner");
            return;
        };

        reduce(&mut self.list.state, &StateAction::ToggleSection { key: login.clone() });
        let collapsed = self.list.state.is_collapsed(&login);
        effects.emit(
            events::SECTION_TOGGLED,
            json!({ "owner": login, "collapsed": collapsed }),
        );
    }
}

impl Panel for GithubProjectsPanel {
    type Command = GithubProjectsCommand;
    type Completion = GithubCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        self.list.required_slices()
    }

    fn sync(&mut self, context: &PanelContext) {
        self.list.sync(context);
    }

    fn handle(&mut self, command: GithubProjectsCommand, effects: &mut Effects<GithubCompletion>) {
        match command {
            GithubProjectsCommand::Filter { filter } => self.list.set_filter(filter),
            GithubProjectsCommand::SelectRepository { identifier } => self.list.select(&identifier, effects),
            GithubProjectsCommand::OpenRepository { identifier } => self.list.open(&identifier, effects),
            GithubProjectsCommand::CloneRepository { identifier } => self.list.clone_repository(&identifier, effects),
            GithubProjectsCommand::ViewInBrowser { identifier } => self.list.view_in_browser(&identifier, effects),
            GithubProjectsCommand::ToggleSection { owner } => self.toggle_section(&owner, effects),
            GithubProjectsCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(&mut self, completion: GithubCompletion, effects: &mut Effects<GithubCompletion>) {
        self.list.complete(completion, effects);
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.list.state);
        view.status = self.list.status();
        for (owner, repositories) in self.groups() {
            let collapsed = self.list.state.is_collapsed(owner);
            let rows = if collapsed {
                Vec::new()
            } else {
                repositories.iter().map(|r| self.list.row(r)).collect()
            };
            view.sections.push(Section {
                key: Some(owner.to_string()),
                title: Some(owner.to_string()),
                collapsed,
                count: repositories.len(),
                rows,
            });
        }
        view.with_slice_error(self.list.slice_error())
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "GitHub Projects",
        description: "Your repositories and your organizations' repositories, grouped by owner",
        icon: "repo",
        version: VERSION,
        slices: vec![
            SliceKey::global(GITHUB_REPOSITORIES),
            SliceKey::global(LOCAL_REPOSITORIES),
        ],
        capabilities: github::CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    let repository = "Repository full name (owner/repo) or name";
    vec![
        ToolDescriptor::new(
            "filter_github_projects",
            "Filter the GitHub projects list by a search term",
            events::FILTER,
        )
        .input("filter", "string", "Search text; empty clears the filter")
        .tags(&["github", "projects", "search"]),
        ToolDescriptor::new(
            "select_github_project",
            "Select a GitHub repository",
            events::SELECT_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The selected repository")
        .tags(&["github", "projects"]),
        ToolDescriptor::new(
            "open_github_project",
            "Open the local clone of a GitHub repository",
            events::OPEN_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("localPath", "string", "Path of the opened clone")
        .tags(&["github", "projects", "open"]),
        ToolDescriptor::new(
            "clone_github_project",
            "Clone a GitHub repository to this machine",
            events::CLONE_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("localPath", "string", "Where the repository was cloned")
        .tags(&["github", "projects", "clone"]),
        ToolDescriptor::new(
            "view_github_project",
            "Open a GitHub repository on github.com",
            events::VIEW_IN_BROWSER,
        )
        .input("identifier", "string", repository)
        .tags(&["github", "projects", "browser"]),
        ToolDescriptor::new(
            "toggle_github_owner_section",
            "Collapse or expand the section of one owner",
            events::TOGGLE_SECTION,
        )
        .input("owner", "string", "Owner login of the section")
        .output("collapsed", "boolean", "Whether the section is now collapsed")
        .tags(&["github", "projects", "layout"]),
        ToolDescriptor::new(
            "refresh_github_projects",
            "Reload the GitHub repositories",
            events::REFRESH,
        )
        .tags(&["github", "projects"]),
    ]
}
