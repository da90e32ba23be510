use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use panelkit_core::actions::{ActionError, ActionFuture, BaseActions};
use panelkit_core::command::CreatePayload;
use panelkit_core::config::PanelkitConfig;
use panelkit_core::model::{Collection, GithubMetadata, GithubRepository, LocalRepository, ProjectSource, Workspace};
use panelkit_core::panels::github::GithubCapabilities;
use panelkit_core::panels::local_projects::{self, LocalProjectsCapabilities};
use panelkit_core::panels::slices::{LOCAL_REPOSITORIES, USER_COLLECTIONS, WORKSPACE_REPOSITORIES, WORKSPACES};
use panelkit_core::panels::user_collections::{self, UserCollectionsCapabilities};
use panelkit_core::panels::user_profile::{self, UserProfileCapabilities};
use panelkit_core::panels::workspace_repositories::{self, MoveRequest, WorkspaceRepositoriesCapabilities};
use panelkit_core::panels::workspaces::{self, WorkspacesCapabilities};
use panelkit_core::slice::{HostSlices, PanelContext, SliceKey, SliceScope, SliceSource};

const DEFAULT_CLONE_ROOT: &str = "repos";

/// A host backed by `panelkit.yaml`: publishes the configured slices and
/// answers host actions after the configured latency, mutating its slices
/// the way a real host would.
#[derive(Clone)]
pub struct FakeHost {
    config: Arc<PanelkitConfig>,
    slices: HostSlices,
}

impl FakeHost {
    pub fn new(config: PanelkitConfig) -> Self {
        let slices = HostSlices::new(config.to_slice_set());
        Self {
            config: Arc::new(config),
            slices,
        }
    }

    pub fn slices(&self) -> &HostSlices {
        &self.slices
    }

    pub fn context(&self) -> PanelContext {
        PanelContext::new(
            self.config.scope.clone(),
            self.slices.subscribe(),
            Some(Arc::new(self.clone())),
        )
    }

    fn offers(&self, panel: &str, capability: &str) -> bool {
        self.config.enabled(panel, capability)
    }

    async fn round_trip(&self, capability: &'static str) -> Result<(), ActionError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        if self.config.fails(capability) {
            return Err(ActionError::rejected(capability, "rejected by fixture host"));
        }
        Ok(())
    }

    /// Edit a list slice in place, creating the list if the slice is empty
    fn edit_list(&self, key: &SliceKey, edit: impl FnOnce(&mut Vec<Value>)) {
        self.slices.update(key, |data| {
            if !data.is_array() {
                *data = Value::Array(Vec::new());
            }
            if let Value::Array(items) = data {
                edit(items);
            }
        });
    }

    fn push<T: serde::Serialize>(&self, key: &SliceKey, item: &T) {
        if let Ok(value) = serde_json::to_value(item) {
            self.edit_list(key, |items| items.push(value));
        }
    }

    fn remove_where(&self, key: &SliceKey, field: &str, value: &str) {
        self.edit_list(key, |items| items.retain(|item| item[field] != value));
    }

    pub fn base(&self, panel: &'static str) -> BaseActions {
        let mut base = BaseActions::default();
        if self.offers(panel, "open_file") {
            let host = self.clone();
            base = base.with_open_file(move |path| {
                let host = host.clone();
                async move {
                    host.round_trip("open_file").await?;
                    info!(panel, %path, "open file");
                    Ok(())
                }
            });
        }
        if self.offers(panel, "open_git_diff") {
            let host = self.clone();
            base = base.with_open_git_diff(move |request| {
                let host = host.clone();
                async move {
                    host.round_trip("open_git_diff").await?;
                    info!(panel, path = %request.path, staged = request.staged, "open git diff");
                    Ok(())
                }
            });
        }
        if self.offers(panel, "navigate_to_panel") {
            let host = self.clone();
            base = base.with_navigate_to_panel(move |request| {
                let host = host.clone();
                async move {
                    host.round_trip("navigate_to_panel").await?;
                    info!(panel, target = %request.panel_id, payload = %request.payload, "navigate to panel");
                    Ok(())
                }
            });
        }
        if self.offers(panel, "notify_panels") {
            let host = self.clone();
            base = base.with_notify_panels(move |event| {
                let host = host.clone();
                async move {
                    host.round_trip("notify_panels").await?;
                    info!(panel, event_type = %event.event_type, "notify panels");
                    Ok(())
                }
            });
        }
        base
    }

    pub fn local_projects(&self) -> LocalProjectsCapabilities {
        let panel = local_projects::PANEL_ID;
        let mut caps = LocalProjectsCapabilities::default().with_base(self.base(panel));
        let locals = SliceKey::global(LOCAL_REPOSITORIES);

        if self.offers(panel, "open_repository") {
            caps = caps.with_open_repository(self.open_repository(panel));
        }
        if self.offers(panel, "remove_repository") {
            let host = self.clone();
            let locals = locals.clone();
            caps = caps.with_remove_repository(move |path| {
                let host = host.clone();
                let locals = locals.clone();
                async move {
                    host.round_trip("remove_repository").await?;
                    host.remove_where(&locals, "path", &path);
                    info!(%path, "repository removed");
                    Ok(())
                }
            });
        }
        if self.offers(panel, "select_directory") {
            let host = self.clone();
            caps = caps.with_select_directory(move |()| {
                let host = host.clone();
                async move {
                    host.round_trip("select_directory").await?;
                    Ok(host.config.picked_directory.clone())
                }
            });
        }
        if self.offers(panel, "register_repository") {
            let host = self.clone();
            caps = caps.with_register_repository(move |path| {
                let host = host.clone();
                let locals = locals.clone();
                async move {
                    host.round_trip("register_repository").await?;
                    let repository = LocalRepository {
                        name: directory_name(&path),
                        path,
                        github: None,
                        last_opened: None,
                        source: ProjectSource::Tracked,
                    };
                    host.push(&locals, &repository);
                    info!(path = %repository.path, "repository registered");
                    Ok(repository)
                }
            });
        }
        caps
    }

    fn open_repository(
        &self,
        panel: &'static str,
    ) -> impl Fn(String) -> ActionFuture<()> + Send + Sync + 'static {
        let host = self.clone();
        move |path: String| -> ActionFuture<()> {
            let host = host.clone();
            Box::pin(async move {
                host.round_trip("open_repository").await?;
                info!(panel, %path, "repository opened");
                Ok(())
            })
        }
    }

    pub fn workspaces(&self) -> WorkspacesCapabilities {
        let panel = workspaces::PANEL_ID;
        let mut caps = WorkspacesCapabilities::default().with_base(self.base(panel));
        let key = SliceKey::global(WORKSPACES);

        if self.offers(panel, "open_workspace") {
            let host = self.clone();
            caps = caps.with_open_workspace(move |id| {
                let host = host.clone();
                async move {
                    host.round_trip("open_workspace").await?;
                    info!(workspace = %id, "workspace opened");
                    Ok(())
                }
            });
        }
        if self.offers(panel, "create_workspace") {
            let host = self.clone();
            let key = key.clone();
            caps = caps.with_create_workspace(move |request: CreatePayload| {
                let host = host.clone();
                let key = key.clone();
                async move {
                    host.round_trip("create_workspace").await?;
                    let workspace = Workspace {
                        id: Uuid::new_v4().to_string(),
                        name: request.name,
                        description: request.description,
                        is_default: false,
                        repository_count: 0,
                        created_at: None,
                        updated_at: None,
                    };
                    host.push(&key, &workspace);
                    info!(workspace = %workspace.id, name = %workspace.name, "workspace created");
                    Ok(workspace)
                }
            });
        }
        if self.offers(panel, "delete_workspace") {
            let host = self.clone();
            caps = caps.with_delete_workspace(move |id| {
                let host = host.clone();
                let key = key.clone();
                async move {
                    host.round_trip("delete_workspace").await?;
                    host.remove_where(&key, "id", &id);
                    info!(workspace = %id, "workspace deleted");
                    Ok(())
                }
            });
        }
        caps
    }

    pub fn workspace_repositories(&self) -> WorkspaceRepositoriesCapabilities {
        let panel = workspace_repositories::PANEL_ID;
        let mut caps = WorkspaceRepositoriesCapabilities::default().with_base(self.base(panel));

        if self.offers(panel, "open_repository") {
            caps = caps.with_open_repository(self.open_repository(panel));
        }
        if self.offers(panel, "move_repository") {
            let host = self.clone();
            caps = caps.with_move_repository(move |request: MoveRequest| {
                let host = host.clone();
                async move {
                    host.round_trip("move_repository").await?;
                    host.remove_where(&SliceKey::workspace(WORKSPACE_REPOSITORIES), "path", &request.path);
                    host.edit_list(&SliceKey::global(WORKSPACES), |items| {
                        for item in items.iter_mut().filter(|w| w["id"] == request.workspace_id.as_str()) {
                            let count = item["repositoryCount"].as_u64().unwrap_or(0);
                            item["repositoryCount"] = Value::from(count + 1);
                        }
                    });
                    info!(path = %request.path, workspace = %request.workspace_id, "repository moved");
                    Ok(())
                }
            });
        }
        caps
    }

    /// Capabilities shared by both GitHub panels
    pub fn github(&self, panel: &'static str) -> GithubCapabilities {
        let mut caps = GithubCapabilities::default().with_base(self.base(panel));

        if self.offers(panel, "open_repository") {
            caps = caps.with_open_repository(self.open_repository(panel));
        }
        if self.offers(panel, "clone_repository") {
            let host = self.clone();
            caps = caps.with_clone_repository(move |repository: GithubRepository| {
                let host = host.clone();
                async move {
                    host.round_trip("clone_repository").await?;
                    let root = host
                        .config
                        .clone_root
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_CLONE_ROOT));
                    let path = root.join(&repository.name).to_string_lossy().into_owned();
                    let local = LocalRepository {
                        name: repository.name.clone(),
                        path: path.clone(),
                        github: Some(GithubMetadata {
                            id: Some(repository.id),
                            owner: Some(repository.owner_login().to_string()),
                            name: Some(repository.name.clone()),
                            description: repository.description.clone(),
                            language: repository.language.clone(),
                            stars: Some(repository.stargazers_count),
                        }),
                        last_opened: None,
                        source: ProjectSource::Tracked,
                    };
                    host.push(&SliceKey::global(LOCAL_REPOSITORIES), &local);
                    info!(repository = %repository.full_name, %path, "repository cloned");
                    Ok(path)
                }
            });
        }
        if self.offers(panel, "view_in_browser") {
            caps = caps.with_view_in_browser(self.view_in_browser(panel));
        }
        caps
    }

    fn view_in_browser(
        &self,
        panel: &'static str,
    ) -> impl Fn(String) -> ActionFuture<()> + Send + Sync + 'static {
        let host = self.clone();
        move |url: String| -> ActionFuture<()> {
            let host = host.clone();
            Box::pin(async move {
                host.round_trip("view_in_browser").await?;
                info!(panel, %url, "view in browser");
                Ok(())
            })
        }
    }

    pub fn user_profile(&self) -> UserProfileCapabilities {
        let panel = user_profile::PANEL_ID;
        let mut caps = UserProfileCapabilities::default().with_base(self.base(panel));
        if self.offers(panel, "view_in_browser") {
            caps = caps.with_view_in_browser(self.view_in_browser(panel));
        }
        caps
    }

    pub fn user_collections(&self) -> UserCollectionsCapabilities {
        let panel = user_collections::PANEL_ID;
        let mut caps = UserCollectionsCapabilities::default().with_base(self.base(panel));
        let key = SliceKey::global(USER_COLLECTIONS);

        if self.offers(panel, "create_collection") {
            let host = self.clone();
            let key = key.clone();
            caps = caps.with_create_collection(move |request: CreatePayload| {
                let host = host.clone();
                let key = key.clone();
                async move {
                    host.round_trip("create_collection").await?;
                    let collection = Collection {
                        id: Uuid::new_v4().to_string(),
                        name: request.name,
                        description: request.description,
                        repositories: Vec::new(),
                        updated_at: None,
                    };
                    host.push(&key, &collection);
                    info!(collection = %collection.id, name = %collection.name, "collection created");
                    Ok(collection)
                }
            });
        }
        if self.offers(panel, "delete_collection") {
            let host = self.clone();
            caps = caps.with_delete_collection(move |id| {
                let host = host.clone();
                let key = key.clone();
                async move {
                    host.round_trip("delete_collection").await?;
                    host.remove_where(&key, "id", &id);
                    info!(collection = %id, "collection deleted");
                    Ok(())
                }
            });
        }
        caps
    }
}

#[async_trait]
impl SliceSource for FakeHost {
    async fn refresh(&self, scope: Option<SliceScope>, name: Option<&str>) -> Result<(), ActionError> {
        let keys: Vec<SliceKey> = self
            .config
            .slices
            .iter()
            .map(|f| f.key())
            .filter(|k| scope.is_none_or(|s| k.scope == s) && name.is_none_or(|n| k.name == n))
            .collect();

        for key in &keys {
            self.slices.set_loading(key, true);
        }
        self.round_trip("refresh").await?;
        for key in &keys {
            self.slices.set_loading(key, false);
        }
        info!(slices = keys.len(), "slices refreshed");
        Ok(())
    }
}

fn directory_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
