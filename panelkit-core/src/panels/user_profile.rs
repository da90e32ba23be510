//! The signed-in GitHub user and the organizations they belong to.

use std::fmt;
use std::future::Future;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::slices::{USER_ORGANIZATIONS, USER_PROFILE};
use super::{PanelMetadata, VERSION, filter_payload, github_projects, refresh_all};
use crate::actions::{ActionError, BaseActions, HostAction, NavigateRequest, host_action};
use crate::command::{CommandError, FilterPayload, PanelCommand, decode, first_present, unknown};
use crate::model::{Organization, UserProfile};
use crate::reducer::{StateAction, reduce};
use crate::resolve::resolve;
use crate::runtime::{Effects, Panel, Settled, invoke, settle, to_payload};
use crate::slice::{DataSlice, PanelContext, SliceKey};
use crate::sort::{filtered_sorted, organizations_by_login};
use crate::state::{ActionKind, ListState};
use crate::tool::ToolDescriptor;
use crate::view::{Control, ControlKind, PanelStatus, PanelView, Row, Section};

pub const PANEL_ID: &str = "user-profile";

pub mod events {
    pub const FILTER: &str = "user-profile:filter";
    pub const SELECT_ORGANIZATION: &str = "user-profile:select-organization";
    pub const VIEW_PROFILE: &str = "user-profile:view-profile";
    pub const OPEN_ORGANIZATION: &str = "user-profile:open-organization";
    pub const REFRESH: &str = "user-profile:refresh";

    pub const ORGANIZATION_SELECTED: &str = "user-profile:organization-selected";
    pub const PROFILE_VIEWED: &str = "user-profile:profile-viewed";
    pub const ORGANIZATION_OPENED: &str = "user-profile:organization-opened";
}

pub const CAPABILITIES: &[&str] = &["view_in_browser", "navigate_to_panel"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserProfileCommand {
    Filter { filter: String },
    SelectOrganization { login: String },
    ViewProfile,
    /// Show the organization's repositories in the github-projects panel
    OpenOrganization { login: String },
    Refresh,
}

#[derive(Deserialize)]
#[serde(try_from = "LoginFields")]
struct LoginPayload {
    login: String,
}

#[derive(Deserialize)]
struct LoginFields {
    login: Option<String>,
    organization: Option<String>,
    identifier: Option<String>,
}

impl TryFrom<LoginFields> for LoginPayload {
    type Error = String;

    fn try_from(fields: LoginFields) -> Result<Self, Self::Error> {
        let login = first_present("login", [fields.login, fields.organization, fields.identifier])?;
        Ok(Self { login })
    }
}

impl PanelCommand for UserProfileCommand {
    const EVENT_TYPES: &'static [&'static str] = &[
        events::FILTER,
        events::SELECT_ORGANIZATION,
        events::VIEW_PROFILE,
        events::OPEN_ORGANIZATION,
        events::REFRESH,
    ];

    fn parse(event_type: &str, payload: &Value) -> Result<Self, CommandError> {
        let login = || decode::<LoginPayload>(event_type, payload).map(|p| p.login);
        match event_type {
            events::FILTER => Ok(Self::Filter {
                filter: decode::<FilterPayload>(event_type, payload)?.filter,
            }),
            events::SELECT_ORGANIZATION => Ok(Self::SelectOrganization { login: login()? }),
            events::VIEW_PROFILE => Ok(Self::ViewProfile),
            events::OPEN_ORGANIZATION => Ok(Self::OpenOrganization { login: login()? }),
            events::REFRESH => Ok(Self::Refresh),
            other => Err(unknown(other)),
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Filter { .. } => events::FILTER,
            Self::SelectOrganization { .. } => events::SELECT_ORGANIZATION,
            Self::ViewProfile => events::VIEW_PROFILE,
            Self::OpenOrganization { .. } => events::OPEN_ORGANIZATION,
            Self::Refresh => events::REFRESH,
        }
    }

    fn payload(&self) -> Value {
        match self {
            Self::Filter { filter } => filter_payload(filter),
            Self::SelectOrganization { login } | Self::OpenOrganization { login } => json!({ "login": login }),
            Self::ViewProfile | Self::Refresh => Value::Null,
        }
    }
}

#[derive(Clone, Default)]
pub struct UserProfileCapabilities {
    pub base: BaseActions,
    pub view_in_browser: Option<HostAction<String, ()>>,
}

impl UserProfileCapabilities {
    pub fn with_base(mut self, base: BaseActions) -> Self {
        self.base = base;
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
        if self.view_in_browser.is_some() {
            names.push("view_in_browser");
        }
        names
    }
}

impl fmt::Debug for UserProfileCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfileCapabilities")
            .field("available", &self.available())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UserProfileOutcome {
    ProfileViewed(UserProfile),
    OrganizationOpened(Organization),
}

pub type UserProfileCompletion = Settled<UserProfileOutcome>;

pub struct UserProfilePanel {
    capabilities: UserProfileCapabilities,
    state: ListState,
    profile: Option<DataSlice<Option<UserProfile>>>,
    organizations: Option<DataSlice<Vec<Organization>>>,
}

impl UserProfilePanel {
    pub fn new(capabilities: UserProfileCapabilities) -> Self {
        Self {
            capabilities,
            state: ListState::new(),
            profile: None,
            organizations: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref().and_then(|s| s.data.as_ref())
    }

    pub fn organizations(&self) -> &[Organization] {
        self.organizations.as_ref().map(|s| s.data.as_slice()).unwrap_or(&[])
    }

    pub fn visible(&self) -> Vec<&Organization> {
        filtered_sorted(self.organizations(), &self.state.filter, organizations_by_login)
    }

    fn find(&self, login: &str) -> Option<Organization> {
        let found = resolve(self.organizations(), login).cloned();
        if found.is_none() {
            debug!(panel = PANEL_ID, login, "no organization matches login");
        }
        found
    }

    fn select(&mut self, organization: &Organization, effects: &mut Effects<UserProfileCompletion>) {
        reduce(
            &mut self.state,
            &StateAction::Select {
                key: organization.login.clone(),
            },
        );
        effects.emit(
            events::ORGANIZATION_SELECTED,
            json!({ "organization": to_payload(organization) }),
        );
    }

    fn view_profile(&mut self, effects: &mut Effects<UserProfileCompletion>) {
        let Some(profile) = self.profile().cloned() else {
            debug!(panel = PANEL_ID, "no profile loaded");
            return;
        };
        let Some(view) = self.capabilities.view_in_browser.clone() else {
            debug!(panel = PANEL_ID, "view_in_browser not provided");
            return;
        };
        let url = profile
            .html_url
            .clone()
            .unwrap_or_else(|| format!("https://github.com/{}", profile.login));
        let login = profile.login.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::View,
            &login,
            &view,
            url,
            move |()| UserProfileOutcome::ProfileViewed(profile),
        );
    }

    fn open_organization(&mut self, login: &str, effects: &mut Effects<UserProfileCompletion>) {
        let Some(organization) = self.find(login) else {
            return;
        };
        self.select(&organization, effects);
        let Some(navigate) = self.capabilities.base.navigate_to_panel.clone() else {
            debug!(panel = PANEL_ID, "navigate_to_panel not provided");
            return;
        };
        let request = NavigateRequest {
            panel_id: github_projects::PANEL_ID.to_string(),
            payload: filter_payload(&organization.login),
        };
        let login = organization.login.clone();
        invoke(
            PANEL_ID,
            &mut self.state,
            effects,
            ActionKind::Navigate,
            &login,
            &navigate,
            request,
            move |()| UserProfileOutcome::OrganizationOpened(organization),
        );
    }

    fn header(&self, profile: &UserProfile) -> Row {
        let mut header = Row::new(profile.login.as_str(), profile.name.as_deref().unwrap_or(&profile.login))
            .subtitle(profile.bio.as_deref())
            .badge(format!("{} repositories", profile.public_repos))
            .badge(format!("{} followers", profile.followers));
        if let Some(company) = &profile.company {
            header = header.badge(company.as_str());
        }
        if let Some(location) = &profile.location {
            header = header.badge(location.as_str());
        }
        if self.capabilities.view_in_browser.is_some() {
            let viewing = self.state.is_in_flight(ActionKind::View, &profile.login);
            header = header.control(Control::new(ControlKind::ViewInBrowser).busy_when(viewing));
        }
        header
    }

    fn row(&self, organization: &Organization) -> Row {
        let key = organization.login.as_str();
        let mut row = Row::new(key, key)
            .subtitle(organization.description.as_deref())
            .selected(self.state.is_selected(key));
        if self.capabilities.base.navigate_to_panel.is_some() {
            let navigating = self.state.is_in_flight(ActionKind::Navigate, key);
            row = row.control(Control::new(ControlKind::Navigate).busy_when(navigating));
        }
        row
    }
}

impl Panel for UserProfilePanel {
    type Command = UserProfileCommand;
    type Completion = UserProfileCompletion;
    const ID: &'static str = PANEL_ID;

    fn required_slices(&self) -> Vec<SliceKey> {
        vec![SliceKey::global(USER_PROFILE), SliceKey::global(USER_ORGANIZATIONS)]
    }

    fn sync(&mut self, context: &PanelContext) {
        self.profile = context.get_slice(USER_PROFILE);
        self.organizations = context.get_slice(USER_ORGANIZATIONS);
    }

    fn handle(&mut self, command: UserProfileCommand, effects: &mut Effects<UserProfileCompletion>) {
        match command {
            UserProfileCommand::Filter { filter } => {
                reduce(&mut self.state, &StateAction::SetFilter { filter });
            }
            UserProfileCommand::SelectOrganization { login } => {
                if let Some(organization) = self.find(&login) {
                    self.select(&organization, effects);
                }
            }
            UserProfileCommand::ViewProfile => self.view_profile(effects),
            UserProfileCommand::OpenOrganization { login } => self.open_organization(&login, effects),
            UserProfileCommand::Refresh => refresh_all(effects, &self.required_slices()),
        }
    }

    fn complete(&mut self, completion: UserProfileCompletion, effects: &mut Effects<UserProfileCompletion>) {
        let Some((_, outcome)) = settle(PANEL_ID, &mut self.state, completion) else {
            return;
        };
        match outcome {
            UserProfileOutcome::ProfileViewed(profile) => {
                effects.emit(events::PROFILE_VIEWED, json!({ "profile": to_payload(&profile) }))
            }
            UserProfileOutcome::OrganizationOpened(organization) => effects.emit(
                events::ORGANIZATION_OPENED,
                json!({ "organization": to_payload(&organization), "panelId": github_projects::PANEL_ID }),
            ),
        }
    }

    fn view(&self) -> PanelView {
        let mut view = PanelView::new(PANEL_ID, &self.state);

        let loading = self.profile.as_ref().is_none_or(|s| s.loading)
            || self.organizations.as_ref().is_none_or(|s| s.loading);
        let error = self
            .profile
            .as_ref()
            .and_then(|s| s.error.as_deref())
            .or_else(|| self.organizations.as_ref().and_then(|s| s.error.as_deref()));
        let has_data = self.profile().is_some() || !self.organizations().is_empty();
        view.status = PanelStatus::derive(loading, error, has_data);

        view.header = self.profile().map(|p| self.header(p));
        let rows = self.visible().into_iter().map(|o| self.row(o)).collect();
        view.sections.push(Section::flat(rows));
        view.with_slice_error(error)
    }
}

pub fn metadata() -> PanelMetadata {
    PanelMetadata {
        id: PANEL_ID,
        name: "User Profile",
        description: "Your GitHub profile and organizations",
        icon: "user",
        version: VERSION,
        slices: vec![SliceKey::global(USER_PROFILE), SliceKey::global(USER_ORGANIZATIONS)],
        capabilities: CAPABILITIES,
    }
}

pub fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("filter_organizations", "Filter your organizations by a search term", events::FILTER)
            .input("filter", "string", "Search text; empty clears the filter")
            .tags(&["profile", "organizations", "search"]),
        ToolDescriptor::new("select_organization", "Select one of your organizations", events::SELECT_ORGANIZATION)
            .input("login", "string", "Organization login")
            .output("organization", "object", "The selected organization")
            .tags(&["profile", "organizations"]),
        ToolDescriptor::new("view_profile", "Open your GitHub profile in the browser", events::VIEW_PROFILE)
            .output("profile", "object", "The viewed profile")
            .tags(&["profile", "browser"]),
        ToolDescriptor::new(
            "open_organization",
            "Show an organization's repositories in the GitHub projects panel",
            events::OPEN_ORGANIZATION,
        )
        .input("login", "string", "Organization login")
        .output("organization", "object", "The opened organization")
        .tags(&["profile", "organizations", "navigate"]),
        ToolDescriptor::new("refresh_profile", "Reload your profile and organizations", events::REFRESH)
            .tags(&["profile"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::CurrentScope;
    use crate::test_support::{context, event_types, organization, run};
    use std::sync::{Arc, Mutex};

    fn octocat() -> UserProfile {
        UserProfile {
            login: "octocat".into(),
            name: Some("The Octocat".into()),
            public_repos: 8,
            followers: 20,
            ..Default::default()
        }
    }

    fn panel(capabilities: UserProfileCapabilities, profile: Value) -> UserProfilePanel {
        let (_host, context) = context(
            CurrentScope::default(),
            vec![
                (SliceKey::global(USER_PROFILE), profile),
                (
                    SliceKey::global(USER_ORGANIZATIONS),
                    json!([organization("tokio-rs"), organization("Rust-Lang")]),
                ),
            ],
        );
        let mut panel = UserProfilePanel::new(capabilities);
        panel.sync(&context);
        panel
    }

    #[test]
    fn test_profile_header_and_sorted_organizations() {
        let view = panel(UserProfileCapabilities::default(), json!(octocat())).view();
        assert_eq!(view.status, PanelStatus::Ready);
        let header = view.header.as_ref().unwrap();
        assert_eq!(header.title, "The Octocat");
        assert!(header.badges.contains(&"8 repositories".to_string()));
        assert_eq!(view.row_titles(), vec!["Rust-Lang", "tokio-rs"]);
    }

    #[test]
    fn test_organizations_without_profile() {
        let view = panel(UserProfileCapabilities::default(), Value::Null).view();
        assert!(view.header.is_none());
        assert_eq!(view.status, PanelStatus::Ready);
    }

    #[tokio::test]
    async fn test_open_organization_navigates_to_github_projects() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let base = BaseActions::default().with_navigate_to_panel(move |req| {
            seen.lock().unwrap().push(req);
            async { Ok(()) }
        });
        let mut panel = panel(UserProfileCapabilities::default().with_base(base), json!(octocat()));

        let emitted = run(&mut panel, UserProfileCommand::OpenOrganization { login: "TOKIO-RS".into() }).await;
        assert_eq!(
            event_types(&emitted),
            vec![events::ORGANIZATION_SELECTED, events::ORGANIZATION_OPENED]
        );
        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].panel_id, "github-projects");
        assert_eq!(requests[0].payload, json!({ "filter": "tokio-rs" }));
    }

    #[tokio::test]
    async fn test_view_profile_falls_back_to_github_url() {
        let urls = Arc::new(Mutex::new(Vec::new()));
        let seen = urls.clone();
        let capabilities = UserProfileCapabilities::default().with_view_in_browser(move |url| {
            seen.lock().unwrap().push(url);
            async { Ok(()) }
        });
        let mut panel = panel(capabilities, json!(octocat()));

        let emitted = run(&mut panel, UserProfileCommand::ViewProfile).await;
        assert_eq!(event_types(&emitted), vec![events::PROFILE_VIEWED]);
        assert_eq!(*urls.lock().unwrap(), vec!["https://github.com/octocat".to_string()]);
    }

    #[tokio::test]
    async fn test_actions_without_capabilities_only_select() {
        let mut panel = panel(UserProfileCapabilities::default(), json!(octocat()));
        assert!(run(&mut panel, UserProfileCommand::ViewProfile).await.is_empty());

        let emitted = run(&mut panel, UserProfileCommand::OpenOrganization { login: "tokio-rs".into() }).await;
        assert_eq!(event_types(&emitted), vec![events::ORGANIZATION_SELECTED]);
        assert!(!panel.view().has_control(ControlKind::Navigate));
    }

    #[test]
    fn test_parse_accepts_organization_alias() {
        let command =
            UserProfileCommand::parse(events::SELECT_ORGANIZATION, &json!({ "organization": "tokio-rs" })).unwrap();
        assert_eq!(command, UserProfileCommand::SelectOrganization { login: "tokio-rs".into() });
        let command = UserProfileCommand::parse(
            events::OPEN_ORGANIZATION,
            &json!({ "identifier": "rust-lang", "login": "tokio-rs" }),
        )
        .unwrap();
        assert_eq!(command, UserProfileCommand::OpenOrganization { login: "tokio-rs".into() });
        assert_eq!(
            UserProfileCommand::parse(events::VIEW_PROFILE, &Value::Null).unwrap(),
            UserProfileCommand::ViewProfile
        );
    }
}
