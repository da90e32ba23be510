use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Per-entity state of an open-style action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    #[default]
    Closed,
    Opening,
    Ready,
}

impl OperationState {
    pub fn label(&self) -> &'static str {
        match self {
            OperationState::Closed => "closed",
            OperationState::Opening => "opening",
            OperationState::Ready => "ready",
        }
    }
}

/// Kind of host action tracked by the in-flight set
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Open,
    Clone,
    Add,
    Remove,
    Create,
    Delete,
    Move,
    View,
    Navigate,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InFlightKey {
    pub action: ActionKind,
    pub target: String,
}

impl InFlightKey {
    pub fn new(action: ActionKind, target: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
        }
    }
}

/// All transient UI state of one panel instance.
///
/// Discarded on unmount; everything persistent lives in host slices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListState {
    /// Raw filter text as typed or received
    pub filter: String,
    /// Identity key of the selected entity
    pub selected: Option<String>,
    /// Keys of collapsed sections (owner logins)
    pub collapsed: BTreeSet<String>,
    /// Open state per entity key
    pub operations: BTreeMap<String, OperationState>,
    pub in_flight: BTreeSet<InFlightKey>,
    pub search_visible: bool,
    /// Message of the last failed host action
    pub banner: Option<String>,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.as_deref() == Some(key)
    }

    pub fn is_collapsed(&self, key: &str) -> bool {
        self.collapsed.contains(key)
    }

    pub fn operation(&self, key: &str) -> OperationState {
        self.operations.get(key).copied().unwrap_or_default()
    }

    pub fn is_in_flight(&self, action: ActionKind, target: &str) -> bool {
        self.in_flight.contains(&InFlightKey::new(action, target))
    }

    pub fn any_in_flight(&self, action: ActionKind) -> bool {
        self.in_flight.iter().any(|k| k.action == action)
    }
}
