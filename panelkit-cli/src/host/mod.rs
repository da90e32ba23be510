mod fake;

pub use fake::FakeHost;

use async_trait::async_trait;

use panelkit_core::event::EventBus;
use panelkit_core::panels::github_projects::{self, GithubProjectsPanel};
use panelkit_core::panels::github_starred::{self, GithubStarredPanel};
use panelkit_core::panels::local_projects::{self, LocalProjectsPanel};
use panelkit_core::panels::user_collections::{self, UserCollectionsPanel};
use panelkit_core::panels::user_profile::{self, UserProfilePanel};
use panelkit_core::panels::workspace_repositories::{self, WorkspaceRepositoriesPanel};
use panelkit_core::panels::workspaces::{self, WorkspacesPanel};
use panelkit_core::runtime::{MountedPanel, Panel, mount};
use panelkit_core::view::PanelView;

/// A mounted panel of any type
#[async_trait]
pub trait Mounted: Send + Sync {
    fn id(&self) -> &'static str;
    fn view(&self) -> PanelView;
    async fn idle(&self);
}

#[async_trait]
impl<P: Panel> Mounted for MountedPanel<P> {
    fn id(&self) -> &'static str {
        MountedPanel::id(self)
    }

    fn view(&self) -> PanelView {
        MountedPanel::view(self)
    }

    async fn idle(&self) {
        MountedPanel::idle(self).await
    }
}

/// Mount panel `id` against `host`, with the capabilities the host offers it
pub fn mount_panel(id: &str, host: &FakeHost, bus: &EventBus) -> Option<Box<dyn Mounted>> {
    let context = host.context();
    let mounted: Box<dyn Mounted> = match id {
        local_projects::PANEL_ID => Box::new(mount(LocalProjectsPanel::new(host.local_projects()), bus, context)),
        workspaces::PANEL_ID => Box::new(mount(WorkspacesPanel::new(host.workspaces()), bus, context)),
        workspace_repositories::PANEL_ID => Box::new(mount(
            WorkspaceRepositoriesPanel::new(host.workspace_repositories()),
            bus,
            context,
        )),
        github_starred::PANEL_ID => Box::new(mount(
            GithubStarredPanel::new(host.github(github_starred::PANEL_ID)),
            bus,
            context,
        )),
        github_projects::PANEL_ID => Box::new(mount(
            GithubProjectsPanel::new(host.github(github_projects::PANEL_ID)),
            bus,
            context,
        )),
        user_profile::PANEL_ID => Box::new(mount(UserProfilePanel::new(host.user_profile()), bus, context)),
        user_collections::PANEL_ID => Box::new(mount(UserCollectionsPanel::new(host.user_collections()), bus, context)),
        _ => return None,
    };
    Some(mounted)
}
