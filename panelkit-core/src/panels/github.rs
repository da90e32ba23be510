//! Shared machinery of the GitHub repository panels (starred and
//! projects): capabilities, the cross-slice join with local clones, and
//! the open / clone / view-in-browser flows.

use std::fmt;
use std::future::Future;

use serde_json::json;
use tracing::debug;

use super::slices::LOCAL_REPOSITORIES;
use crate::actions::{ActionError, BaseActions, HostAction, host_action};
use crate::local_index::LocalIndex;
use crate::model::{GithubRepository, LocalRepository, RepositoryPath};
use crate::reducer::{StateAction, reduce};
use crate::resolve::resolve;
use crate::runtime::{Effects, Settled, invoke, settle, to_payload};
use crate::slice::{DataSlice, PanelContext, SliceKey};
use crate::sort::{Comparator, filtered_sorted};
use crate::state::{ActionKind, ListState, OperationState};
use crate::view::{Control, ControlKind, PanelStatus, Row};

pub const CAPABILITIES: &[&str] = &["open_repository", "clone_repository", "view_in_browser"];

#[derive(Clone, Default)]
pub struct GithubCapabilities {
    pub base: BaseActions,
    /// Open a local clone by path
    pub open_repository: Option<HostAction<RepositoryPath, ()>>,
    /// Clone a repository, resolving to the local path
    pub clone_repository: Option<HostAction<GithubRepository, RepositoryPath>>,
    /// Open a URL in the browser
    pub view_in_browser: Option<HostAction<String, ()>>,
}

impl GithubCapabilities {
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

    pub fn with_clone_repository<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(GithubRepository) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RepositoryPath, ActionError>> + Send + 'static,
    {
        self.clone_repository = Some(host_action(f));
        self
    }

    pub fn with_view_in_browser<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.view_in_browser = Some(host_action(f));
        self
    }

    pub fn available(&self) -> Vec<&'static str> {
        let mut names = self.base.available();
        if self.open_repository.is_some() {
            names.push("open_repository");
        }
        if self.clone_repository.is_some() {
            names.push("clone_repository");
        }
        if self.view_in_browser.is_some() {
            names.push("view_in_browser");
        }
        names
    }
}

impl fmt::Debug for GithubCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubCapabilities")
            .field("available", &self.available())
            .finish()
    }
}

/// Outbound notification names of one GitHub panel
#[derive(Clone, Copy, Debug)]
pub struct Notifications {
    pub selected: &'static str,
    pub opened: &'static str,
    pub cloned: &'static str,
    pub viewed: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GithubOutcome {
    Opened {
        repository: GithubRepository,
        local_path: RepositoryPath,
    },
    Cloned {
        repository: GithubRepository,
        local_path: RepositoryPath,
    },
    Viewed {
        repository: GithubRepository,
    },
}

pub type GithubCompletion = Settled<GithubOutcome>;

/// A list of GitHub repositories joined with the local clones
pub struct GithubList {
    panel: &'static str,
    notifications: Notifications,
    repositories_key: SliceKey,
    pub capabilities: GithubCapabilities,
    pub state: ListState,
    slice: Option<DataSlice<Vec<GithubRepository>>>,
    index: LocalIndex,
}

impl GithubList {
    pub fn new(
        panel: &'static str,
        notifications: Notifications,
        repositories_key: SliceKey,
        capabilities: GithubCapabilities,
    ) -> Self {
        Self {
            panel,
            notifications,
            repositories_key,
            capabilities,
            state: ListState::new(),
            slice: None,
            index: LocalIndex::default(),
        }
    }

    pub fn required_slices(&self) -> Vec<SliceKey> {
        vec![self.repositories_key.clone(), SliceKey::global(LOCAL_REPOSITORIES)]
    }

    pub fn sync(&mut self, context: &PanelContext) {
        self.slice = context.slice(&self.repositories_key);
        let locals: Vec<LocalRepository> = context
            .get_slice(LOCAL_REPOSITORIES)
            .map(|s| s.data)
            .unwrap_or_default();
        if self.index.refresh(&locals) {
            debug!(panel = self.panel, locals = self.index.len(), "local index rebuilt");
        }
    }

    pub fn repositories(&self) -> &[GithubRepository] {
        self.slice.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn index(&self) -> &LocalIndex {
        &self.index
    }

    pub fn status(&self) -> PanelStatus {
        PanelStatus::of_list(self.slice.as_ref())
    }

    pub fn slice_error(&self) -> Option<&str> {
        self.slice.as_ref().and_then(|s| s.error.as_deref())
    }

    /// Filtered repositories ordered by `compare`
    pub fn visible(&self, compare: Comparator<GithubRepository>) -> Vec<&GithubRepository> {
        filtered_sorted(self.repositories(), &self.state.filter, compare)
    }

    /// The selected repository, if it is still in the list
    pub fn selected(&self) -> Option<&GithubRepository> {
        let key = self.state.selected.as_deref()?;
        self.repositories().iter().find(|r| r.full_name == key)
    }

    fn find(&self, identifier: &str) -> Option<GithubRepository> {
        let found = resolve(self.repositories(), identifier).cloned();
        if found.is_none() {
            debug!(panel = self.panel, identifier, "no repository matches identifier");
        }
        found
    }

    pub fn set_filter(&mut self, filter: String) {
        reduce(&mut self.state, &StateAction::SetFilter { filter });
    }

    pub fn select(&mut self, identifier: &str, effects: &mut Effects<GithubCompletion>) {
        if let Some(repository) = self.find(identifier) {
            self.select_repository(&repository, effects);
        }
    }

    fn select_repository(&mut self, repository: &GithubRepository, effects: &mut Effects<GithubCompletion>) {
        reduce(
            &mut self.state,
            &StateAction::Select {
                key: repository.full_name.clone(),
            },
        );
        effects.emit(self.notifications.selected, json!({ "repository": to_payload(repository) }));
    }

    /// Open the local clone of a repository; repositories without one are
    /// ignored
    pub fn open(&mut self, identifier: &str, effects: &mut Effects<GithubCompletion>) {
        let Some(repository) = self.find(identifier) else {
            return;
        };
        let Some(local_path) = self.index.lookup_remote(&repository).map(|l| l.path.clone()) else {
            debug!(panel = self.panel, repository = %repository.full_name, "not cloned, ignoring open");
            return;
        };
        let Some(open) = self.capabilities.open_repository.clone() else {
            debug!(panel = self.panel, "open_repository not provided");
            return;
        };

        self.select_repository(&repository, effects);
        let target = repository.full_name.clone();
        invoke(
            self.panel,
            &mut self.state,
            effects,
            ActionKind::Open,
            &target,
            &open,
            local_path.clone(),
            move |()| GithubOutcome::Opened { repository, local_path },
        );
    }

    /// Clone a repository; already cloned repositories are ignored
    pub fn clone_repository(&mut self, identifier: &str, effects: &mut Effects<GithubCompletion>) {
        let Some(repository) = self.find(identifier) else {
            return;
        };
        if self.index.is_cloned(&repository) {
            debug!(panel = self.panel, repository = %repository.full_name, "already cloned");
            return;
        }
        let Some(clone) = self.capabilities.clone_repository.clone() else {
            debug!(panel = self.panel, "clone_repository not provided");
            return;
        };

        let target = repository.full_name.clone();
        let outcome_repository = repository.clone();
        invoke(
            self.panel,
            &mut self.state,
            effects,
            ActionKind::Clone,
            &target,
            &clone,
            repository,
            move |local_path| GithubOutcome::Cloned {
                repository: outcome_repository,
                local_path,
            },
        );
    }

    pub fn view_in_browser(&mut self, identifier: &str, effects: &mut Effects<GithubCompletion>) {
        let Some(repository) = self.find(identifier) else {
            return;
        };
        let Some(view) = self.capabilities.view_in_browser.clone() else {
            debug!(panel = self.panel, "view_in_browser not provided");
            return;
        };

        let target = repository.full_name.clone();
        let url = repository.html_url.clone();
        invoke(
            self.panel,
            &mut self.state,
            effects,
            ActionKind::View,
            &target,
            &view,
            url,
            move |()| GithubOutcome::Viewed { repository },
        );
    }

    pub fn complete(&mut self, completion: GithubCompletion, effects: &mut Effects<GithubCompletion>) {
        let Some((_, outcome)) = settle(self.panel, &mut self.state, completion) else {
            return;
        };
        match outcome {
            GithubOutcome::Opened { repository, local_path } => effects.emit(
                self.notifications.opened,
                json!({ "repository": to_payload(&repository), "localPath": local_path }),
            ),
            GithubOutcome::Cloned { repository, local_path } => effects.emit(
                self.notifications.cloned,
                json!({ "repository": to_payload(&repository), "localPath": local_path }),
            ),
            GithubOutcome::Viewed { repository } => {
                effects.emit(self.notifications.viewed, json!({ "repository": to_payload(&repository) }))
            }
        }
    }

    pub fn row(&self, repository: &GithubRepository) -> Row {
        let key = repository.full_name.as_str();
        let local = self.index.lookup_remote(repository);

        let mut row = Row::new(key, key)
            .subtitle(repository.description.as_deref())
            .selected(self.state.is_selected(key));
        if let Some(language) = &repository.language {
            row = row.badge(language);
        }
        if repository.stargazers_count > 0 {
            row = row.badge(format!("{} stars", repository.stargazers_count));
        }
        if repository.private {
            row = row.badge("private");
        }

        match local {
            Some(_) => {
                row = row.badge("cloned");
                if self.capabilities.open_repository.is_some() {
                    let opening = self.state.operation(key) == OperationState::Opening;
                    row = row.control(Control::new(ControlKind::Open).busy_when(opening));
                }
            }
            None => {
                if self.capabilities.clone_repository.is_some() {
                    let cloning = self.state.is_in_flight(ActionKind::Clone, key);
                    row = row.control(Control::new(ControlKind::Clone).busy_when(cloning));
                }
            }
        }
        if self.capabilities.view_in_browser.is_some() {
            row = row.control(Control::new(ControlKind::ViewInBrowser));
        }
        row
    }
}
