use serde::{Deserialize, Serialize};

use crate::state::{ActionKind, InFlightKey, ListState, OperationState};

/// Transitions of a panel's [`ListState`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StateAction {
    SetFilter { filter: String },
    Select { key: String },
    ToggleSection { key: String },
    ToggleSearch,
    /// A host action is about to be invoked
    Begin { action: ActionKind, target: String },
    /// The host action resolved
    Succeed { action: ActionKind, target: String },
    /// The host action rejected
    Fail {
        action: ActionKind,
        target: String,
        message: String,
    },
    DismissBanner,
}

/// Apply `action` to `state`.
///
/// Returns false when the transition was refused, which only happens for a
/// `Begin` whose (action, target) is already in flight.
pub fn reduce(state: &mut ListState, action: &StateAction) -> bool {
    match action {
        StateAction::SetFilter { filter } => {
            state.filter = filter.clone();
        }
        StateAction::Select { key } => {
            state.selected = Some(key.clone());
        }
        StateAction::ToggleSection { key } => {
            if !state.collapsed.remove(key) {
                state.collapsed.insert(key.clone());
            }
        }
        StateAction::ToggleSearch => {
            state.search_visible = !state.search_visible;
            if !state.search_visible {
                state.filter.clear();
            }
        }
        StateAction::Begin { action, target } => {
            if !state.in_flight.insert(InFlightKey::new(*action, target.clone())) {
                return false;
            }
            if *action == ActionKind::Open {
                state.operations.insert(target.clone(), OperationState::Opening);
            }
        }
        StateAction::Succeed { action, target } => {
            state.in_flight.remove(&InFlightKey::new(*action, target.clone()));
            if *action == ActionKind::Open {
                state.operations.insert(target.clone(), OperationState::Ready);
            }
            state.banner = None;
        }
        StateAction::Fail {
            action,
            target,
            message,
        } => {
            state.in_flight.remove(&InFlightKey::new(*action, target.clone()));
            if *action == ActionKind::Open {
                state.operations.insert(target.clone(), OperationState::Closed);
            }
            state.banner = Some(message.clone());
        }
        StateAction::DismissBanner => {
            state.banner = None;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(action: ActionKind, target: &str) -> StateAction {
        StateAction::Begin {
            action,
            target: target.into(),
        }
    }

    #[test]
    fn test_toggle_section_twice_restores_membership() {
        let mut state = ListState::new();
        state.collapsed.insert("rust-lang".into());
        let before = state.collapsed.clone();

        let toggle = StateAction::ToggleSection { key: "tokio-rs".into() };
        reduce(&mut state, &toggle);
        assert!(state.is_collapsed("tokio-rs"));
        reduce(&mut state, &toggle);
        assert_eq!(state.collapsed, before);
    }

    #[test]
    fn test_open_lifecycle_success() {
        let mut state = ListState::new();
        assert_eq!(state.operation("/code/a"), OperationState::Closed);

        assert!(reduce(&mut state, &begin(ActionKind::Open, "/code/a")));
        assert_eq!(state.operation("/code/a"), OperationState::Opening);
        assert!(state.is_in_flight(ActionKind::Open, "/code/a"));

        reduce(
            &mut state,
            &StateAction::Succeed {
                action: ActionKind::Open,
                target: "/code/a".into(),
            },
        );
        assert_eq!(state.operation("/code/a"), OperationState::Ready);
        assert!(state.in_flight.is_empty());
    }

    #[test]
    fn test_open_failure_reverts_and_sets_banner() {
        let mut state = ListState::new();
        reduce(&mut state, &begin(ActionKind::Open, "/code/a"));
        reduce(
            &mut state,
            &StateAction::Fail {
                action: ActionKind::Open,
                target: "/code/a".into(),
                message: "window failed".into(),
            },
        );
        assert_eq!(state.operation("/code/a"), OperationState::Closed);
        assert_eq!(state.banner.as_deref(), Some("window failed"));
        assert!(!state.is_in_flight(ActionKind::Open, "/code/a"));
    }

    #[test]
    fn test_duplicate_begin_is_refused() {
        let mut state = ListState::new();
        assert!(reduce(&mut state, &begin(ActionKind::Clone, "a/b")));
        assert!(!reduce(&mut state, &begin(ActionKind::Clone, "a/b")));
        assert!(reduce(&mut state, &begin(ActionKind::Clone, "a/c")));
        assert!(reduce(&mut state, &begin(ActionKind::Open, "a/b")));
    }

    #[test]
    fn test_hiding_search_clears_filter() {
        let mut state = ListState::new();
        reduce(&mut state, &StateAction::ToggleSearch);
        reduce(&mut state, &StateAction::SetFilter { filter: "tok".into() });
        assert!(state.search_visible);
        reduce(&mut state, &StateAction::ToggleSearch);
        assert!(!state.search_visible);
        assert_eq!(state.filter, "");
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = ListState::new();
        reduce(&mut state, &StateAction::Select { key: "/code/a".into() });
        reduce(&mut state, &begin(ActionKind::Open, "/code/a"));
        let json = serde_json::to_string(&state).unwrap();
        let back: ListState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
