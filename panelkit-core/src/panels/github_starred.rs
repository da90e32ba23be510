//! Starred GitHub repositories, most recently pushed first.

use serde_json::Value;

use super::github::{self, GithubCapabilities, GithubCompletion, GithubList, Notifications};
use super::slices::GITHUB_STARRED;
use super::{PanelMetadata, VERSION, filter_payload, identifier_payload, refresh_all};
use crate::command::{CommandError, FilterPayload, IdentifierPayload, PanelCommand, decode, unknown};
use crate::model::GithubRepository;
use crate::runtime::{Effects, Panel};
use crate::slice::{PanelContext, SliceKey};
use crate::sort::github_by_recency;
use crate::tool::ToolDescriptor;
use crate::view::{PanelView, Section};

pub const PANEL_ID: &str = "github-starred";

pub mod events {
    pub const FILTER: &str = "github-starred:filter";
    pub const SELECT_REPOSITORY: &str = "github-starred:select-repository";
    pub const OPEN_REPOSITORY: &str = "github-starred:open-repository";
    pub const CLONE_REPOSITORY: &str = "github-starred:clone-repository";
    pub const VIEW_IN_BROWSER: &str = "github-starred:view-in-browser";
    pub const REFRESH: &str = "github-starred:refresh";

    pub const REPOSITORY_SELECTED: &str = "github-starred:repository-selected";
    pub const REPOSITORY_OPENED: &str = "github-starred:repository-opened";
    pub const REPOSITORY_CLONED: &str = "github-starred:repository-cloned";
    pub const REPOSITORY_VIEWED: &str = "github-starred:repository-viewed";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GithubStarredCommand {
    Filter { filter: String },
    SelectRepository { identifier: String },
    OpenRepository { identifier: String },
    CloneRepository { identifier: String },
    ViewInBrowser { identifier: String },
    Refresh,
}

impl PanelCommand for GithubStarredCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_REPOSITORY,
        events::OPEN_REPOSITORY,
        events::CLONE_REPOSITORY,
        events::VIEW_IN_BROWSER,
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

pub struct GithubStarredPanel {
    list: GithubList,
}

impl GithubStarredPanel {
    pub fn new(capabilities: GithubCapabilities) -> Self {
        Self {
            list: GithubList::new(PANEL_ID, NOTIFICATIONS, SliceKey::global(GITHUB_STARRED), capabilities),
        }
    }

    pub fn state(&self) -> &crate::state::ListState {
        &self.list.state
    }

    pub fn selected_repository(&self) -> Option<&GithubRepository> {
        self.list.selected()
    }

    /// Repositories as displayed: filtered, most recent push first
    pub fn visible(&self) -> Vec<&GithubRepository> {
        self.list.visible(github_by_recency)
    }
}

impl Panel for GithubStarredPanel {
    type Command = GithubStarredCommand;
    type Completion = GithubCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        self.list.required_slices()
    }

    fn sync(&mut self, context: &PanelContext) {
        self.list.sync(context);
    }

    fn handle(&mut self, command: GithubStarredCommand, effects: &mut Effects<GithubCompletion>) {
        match command {
            GithubStarredCommand::Filter { filter } => self.list.set_filter(filter),
            GithubStarredCommand::SelectRepository { identifier } => self.list.select(&identifier, effects),
            GithubStarredCommand::OpenRepository { identifier } => self.list.open(&identifier, effects),
            GithubStarredCommand::CloneRepository { identifier } => self.list.clone_repository(&identifier, effects),
            GithubStarredCommand::ViewInBrowser { identifier } => self.list.view_in_browser(&identifier, effects),
            GithubStarredCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(&mut self, completion: GithubCompletion, effects: &mut Effects<GithubCompletion>) {
        self.list.complete(completion, effects);
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.list.state);
        view.status = self.list.status();
        let rows = self.visible().into_iter().map(|r| self.list.row(r)).collect();
        view.sections.push(Section::flat(rows));
        view.with_slice_error(self.list.slice_error())
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "GitHub Starred",
        description: "Repositories you starred on GitHub, with clone and open shortcuts",
        icon: "star",
        version: VERSION,
        slices: vec![
            SliceKey::global(GITHUB_STARRED),
            SliceKey::global(super::slices::LOCAL_REPOSITORIES),
        ],
        capabilities: github::CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    let repository = "Repository full name (owner/repo) or name";
    vec![
        ToolDescriptor::new(
            "filter_starred_repositories",
            "Filter the starred repositories list by a search term",
            events::FILTER,
        )
        .input("filter", "string", "Search text; empty clears the filter")
        .tags(&["github", "starred", "search"]),
        ToolDescriptor::new(
            "select_starred_repository",
            "Select a starred repository",
            events::SELECT_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("repository", "object", "The selected repository")
        .tags(&["github", "starred"]),
        ToolDescriptor::new(
            "open_starred_repository",
            "Open the local clone of a starred repository",
            events::OPEN_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("localPath", "string", "Path of the opened clone")
        .tags(&["github", "starred", "open"]),
        ToolDescriptor::new(
            "clone_starred_repository",
            "Clone a starred repository to this machine",
            events::CLONE_REPOSITORY,
        )
        .input("identifier", "string", repository)
        .output("localPath", "string", "Where the repository was cloned")
        .tags(&["github", "starred", "clone"]),
        ToolDescriptor::new(
            "view_starred_repository",
            "Open a starred repository on github.com",
            events::VIEW_IN_BROWSER,
        )
        .input("identifier", "string", repository)
        .tags(&["github", "starred", "browser"]),
        ToolDescriptor::new(
            "refresh_starred_repositories",
            "Reload the starred repositories",
            events::REFRESH,
        )
        .tags(&["github", "starred"]),
    ]
}
