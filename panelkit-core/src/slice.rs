//! Host-owned data slices and the context panels read them through.
//!
//! The host publishes a [`SliceSet`] over a `watch` channel ([`HostSlices`]);
//! each mounted panel holds a [`PanelContext`] with a receiver and re-reads
//! its slices whenever the host publishes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

use crate::actions::ActionError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceScope {
    Workspace,
    Repository,
    #[default]
    Global,
}

impl SliceScope {
    pub fn label(&self) -> &'static str {
        match self {
            SliceScope::Workspace => "workspace",
            SliceScope::Repository => "repository",
            SliceScope::Global => "global",
        }
    }
}

impl std::fmt::Display for SliceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SliceKey {
    pub scope: SliceScope,
    pub name: String,
}

impl SliceKey {
    pub fn new(scope: SliceScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new(SliceScope::Global, name)
    }

    pub fn workspace(name: impl Into<String>) -> Self {
        Self::new(SliceScope::Workspace, name)
    }
}

impl std::fmt::Display for SliceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// Untyped slice as stored in the set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSlice {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// A typed view of one slice
#[derive(Clone, Debug, PartialEq)]
pub struct DataSlice<T> {
    pub scope: SliceScope,
    pub name: String,
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> DataSlice<T> {
    pub fn key(&self) -> SliceKey {
        SliceKey::new(self.scope, self.name.clone())
    }
}

/// All slices currently published by the host
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SliceSet {
    slices: BTreeMap<SliceKey, RawSlice>,
}

impl SliceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SliceKey, slice: RawSlice) {
        self.slices.insert(key, slice);
    }

    pub fn remove(&mut self, key: &SliceKey) -> Option<RawSlice> {
        self.slices.remove(key)
    }

    pub fn get(&self, key: &SliceKey) -> Option<&RawSlice> {
        self.slices.get(key)
    }

    pub fn get_mut(&mut self, key: &SliceKey) -> Option<&mut RawSlice> {
        self.slices.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SliceKey> {
        self.slices.keys()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// First slice named `name`, in scope order workspace, repository, global
    pub fn find(&self, name: &str) -> Option<(&SliceKey, &RawSlice)> {
        self.slices.iter().find(|(key, _)| key.name == name)
    }

    /// Decode the slice at `key`.
    ///
    /// Null data (a slice that has not loaded yet) decodes as `T::default()`.
    /// Data of the wrong shape also yields `T::default()`, with the decode
    /// error reported in the slice's `error`.
    pub fn typed<T>(&self, key: &SliceKey) -> Option<DataSlice<T>>
    where
        T: DeserializeOwned + Default,
    {
        let raw = self.slices.get(key)?;
        let mut error = raw.error.clone();
        let data = if raw.data.is_null() {
            T::default()
        } else {
            match serde_json::from_value(raw.data.clone()) {
                Ok(data) => data,
                Err(err) => {
                    warn!(slice = %key, %err, "slice data has an unexpected shape");
                    error.get_or_insert_with(|| format!("invalid {} data: {}", key.name, err));
                    T::default()
                }
            }
        };

        Some(DataSlice {
            scope: key.scope,
            name: key.name.clone(),
            data,
            loading: raw.loading,
            error,
        })
    }
}

/// Which workspace or repository the host is currently showing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentScope {
    #[serde(default)]
    pub scope: SliceScope,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub repository_path: Option<String>,
}

/// Host hook that reloads slices on request
#[async_trait]
pub trait SliceSource: Send + Sync {
    /// Refresh one slice, every slice of a scope, or (both `None`) everything
    async fn refresh(&self, scope: Option<SliceScope>, name: Option<&str>) -> Result<(), ActionError>;
}

/// Host-side publisher of the slice set
#[derive(Clone)]
pub struct HostSlices {
    tx: Arc<watch::Sender<SliceSet>>,
}

impl HostSlices {
    pub fn new(initial: SliceSet) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<SliceSet> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SliceSet {
        self.tx.borrow().clone()
    }

    /// Replace the data of a slice, clearing its loading and error flags
    pub fn publish<T: Serialize>(&self, key: SliceKey, data: &T) -> Result<(), serde_json::Error> {
        let data = serde_json::to_value(data)?;
        self.tx.send_modify(|set| {
            set.insert(
                key,
                RawSlice {
                    data,
                    loading: false,
                    error: None,
                },
            )
        });
        Ok(())
    }

    pub fn set_loading(&self, key: &SliceKey, loading: bool) {
        self.tx.send_modify(|set| {
            if let Some(slice) = set.get_mut(key) {
                slice.loading = loading;
            }
        });
    }

    pub fn set_error(&self, key: &SliceKey, error: Option<String>) {
        self.tx.send_modify(|set| {
            if let Some(slice) = set.get_mut(key) {
                slice.error = error;
                slice.loading = false;
            }
        });
    }

    /// Edit the data of an existing slice in place
    pub fn update(&self, key: &SliceKey, edit: impl FnOnce(&mut Value)) {
        self.tx.send_modify(|set| {
            if let Some(slice) = set.get_mut(key) {
                edit(&mut slice.data);
            }
        });
    }
}

/// What a mounted panel sees of the host
#[derive(Clone)]
pub struct PanelContext {
    current_scope: CurrentScope,
    slices: watch::Receiver<SliceSet>,
    source: Option<Arc<dyn SliceSource>>,
}

impl PanelContext {
    pub fn new(
        current_scope: CurrentScope,
        slices: watch::Receiver<SliceSet>,
        source: Option<Arc<dyn SliceSource>>,
    ) -> Self {
        Self {
            current_scope,
            slices,
            source,
        }
    }

    pub fn current_scope(&self) -> &CurrentScope {
        &self.current_scope
    }

    pub fn slices(&self) -> SliceSet {
        self.slices.borrow().clone()
    }

    /// A fresh receiver for change notifications
    pub fn watch(&self) -> watch::Receiver<SliceSet> {
        self.slices.clone()
    }

    pub fn slice<T>(&self, key: &SliceKey) -> Option<DataSlice<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.slices.borrow().typed(key)
    }

    pub fn get_slice<T>(&self, name: &str) -> Option<DataSlice<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.slice(&SliceKey::global(name))
    }

    pub fn get_workspace_slice<T>(&self, name: &str) -> Option<DataSlice<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.slice(&SliceKey::workspace(name))
    }

    pub fn get_repository_slice<T>(&self, name: &str) -> Option<DataSlice<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.slice(&SliceKey::new(SliceScope::Repository, name))
    }

    /// Whether a slice named `name` exists in any scope
    pub fn has_slice(&self, name: &str) -> bool {
        self.slices.borrow().find(name).is_some()
    }

    pub fn is_slice_loading(&self, name: &str) -> bool {
        self.slices
            .borrow()
            .find(name)
            .map(|(_, slice)| slice.loading)
            .unwrap_or(false)
    }

    pub async fn refresh(&self, scope: Option<SliceScope>, name: Option<&str>) -> Result<(), ActionError> {
        match &self.source {
            Some(source) => source.refresh(scope, name).await,
            None => Err(ActionError::Unavailable {
                action: "refresh".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_slice_decodes_and_defaults() {
        let mut set = SliceSet::new();
        set.insert(
            SliceKey::global("names"),
            RawSlice {
                data: json!(["a", "b"]),
                ..Default::default()
            },
        );
        set.insert(
            SliceKey::global("pending"),
            RawSlice {
                data: Value::Null,
                loading: true,
                error: None,
            },
        );

        let names: DataSlice<Vec<String>> = set.typed(&SliceKey::global("names")).unwrap();
        assert_eq!(names.data, vec!["a", "b"]);

        let pending: DataSlice<Vec<String>> = set.typed(&SliceKey::global("pending")).unwrap();
        assert!(pending.loading);
        assert!(pending.data.is_empty());

        assert!(set.typed::<Vec<String>>(&SliceKey::workspace("names")).is_none());
    }

    #[test]
    fn test_wrong_shape_surfaces_as_slice_error() {
        let mut set = SliceSet::new();
        set.insert(
            SliceKey::global("names"),
            RawSlice {
                data: json!({ "not": "a list" }),
                ..Default::default()
            },
        );
        let slice: DataSlice<Vec<String>> = set.typed(&SliceKey::global("names")).unwrap();
        assert!(slice.data.is_empty());
        assert!(slice.error.unwrap().starts_with("invalid names data"));
    }

    #[tokio::test]
    async fn test_context_sees_host_updates() {
        let host = HostSlices::new(SliceSet::new());
        let context = PanelContext::new(CurrentScope::default(), host.subscribe(), None);
        assert!(!context.has_slice("workspaces"));

        let mut changes = context.watch();
        host.publish(SliceKey::global("workspaces"), &json!([])).unwrap();
        changes.changed().await.unwrap();
        assert!(context.has_slice("workspaces"));
        assert!(!context.is_slice_loading("workspaces"));

        host.set_loading(&SliceKey::global("workspaces"), true);
        assert!(context.is_slice_loading("workspaces"));

        let err = context.refresh(None, None).await.unwrap_err();
        assert_eq!(err, ActionError::Unavailable { action: "refresh".into() });
    }
}
