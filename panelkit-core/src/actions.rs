//! Optional host capabilities.
//!
//! Every host action is an `Option<HostAction<A, T>>`. `None` means the
//! host does not offer the capability: the panel omits the control and
//! ignores commands that need it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::PanelEvent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionError {
    /// The host rejected the action
    Rejected { action: String, message: String },
    /// The capability is not provided by the host
    Unavailable { action: String },
}

impl ActionError {
    pub fn rejected(action: impl Into<String>, message: impl Into<String>) -> Self {
        ActionError::Rejected {
            action: action.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Rejected { action, message } => write!(f, "{} failed: {}", action, message),
            ActionError::Unavailable { action } => write!(f, "{} is not available", action),
        }
    }
}

impl std::error::Error for ActionError {}

pub type ActionFuture<T> = Pin<Box<dyn Future<Output = Result<T, ActionError>> + Send + 'static>>;

/// An async host callback taking `A` and resolving to `T`
pub type HostAction<A, T> = Arc<dyn Fn(A) -> ActionFuture<T> + Send + Sync>;

/// Wrap an async closure as a [`HostAction`]
pub fn host_action<A, T, F, Fut>(f: F) -> HostAction<A, T>
where
    A: 'static,
    T: 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
{
    Arc::new(move |args: A| -> ActionFuture<T> { Box::pin(f(args)) })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitDiffRequest {
    pub path: String,
    #[serde(default)]
    pub staged: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateRequest {
    pub panel_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Capabilities every host may offer to every panel
#[derive(Clone, Default)]
pub struct BaseActions {
    pub open_file: Option<HostAction<String, ()>>,
    pub open_git_diff: Option<HostAction<GitDiffRequest, ()>>,
    pub navigate_to_panel: Option<HostAction<NavigateRequest, ()>>,
    pub notify_panels: Option<HostAction<PanelEvent, ()>>,
}

impl BaseActions {
    pub fn with_open_file<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.open_file = Some(host_action(f));
        self
    }

    pub fn with_open_git_diff<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(GitDiffRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.open_git_diff = Some(host_action(f));
        self
    }

    pub fn with_navigate_to_panel<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(NavigateRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.navigate_to_panel = Some(host_action(f));
        self
    }

    pub fn with_notify_panels<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PanelEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.notify_panels = Some(host_action(f));
        self
    }

    /// Names of the capabilities present
    pub fn available(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.open_file.is_some() {
            names.push("open_file");
        }
        if self.open_git_diff.is_some() {
            names.push("open_git_diff");
        }
        if self.navigate_to_panel.is_some() {
            names.push("navigate_to_panel");
        }
        if self.notify_panels.is_some() {
            names.push("notify_panels");
        }
        names
    }
}

impl fmt::Debug for BaseActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseActions")
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_action_wraps_async_closure() {
        let double = host_action(|n: u32| async move { Ok::<_, ActionError>(n * 2) });
        assert_eq!(double(21).await, Ok(42));

        let reject = host_action(|_: ()| async { Err::<(), _>(ActionError::rejected("clone", "offline")) });
        assert_eq!(reject(()).await.unwrap_err().to_string(), "clone failed: offline");
    }

    #[test]
    fn test_base_actions_report_available() {
        let base = BaseActions::default().with_navigate_to_panel(|_| async { Ok(()) });
        assert_eq!(base.available(), vec!["navigate_to_panel"]);
        assert!(base.open_file.is_none());
    }
}
