//! Headless render model.
//!
//! A [`PanelView`] is what a panel would draw: status, toolbar, sections of
//! rows and the controls on them. A control only appears when the host
//! provides the capability it invokes.

use serde::Serialize;

use crate::slice::DataSlice;
use crate::state::ListState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PanelStatus {
    Loading,
    /// No data and the slice reports an error; shown with a retry control
    Failed { message: String },
    Empty,
    Ready,
}

impl PanelStatus {
    /// Derive the status of a list-backed panel from its primary slice
    pub fn of_list<T>(slice: Option<&DataSlice<Vec<T>>>) -> Self {
        match slice {
            None => PanelStatus::Loading,
            Some(slice) => Self::derive(slice.loading, slice.error.as_deref(), !slice.data.is_empty()),
        }
    }

    pub fn derive(loading: bool, error: Option<&str>, has_data: bool) -> Self {
        if has_data {
            return PanelStatus::Ready;
        }
        match error {
            Some(message) => PanelStatus::Failed {
                message: message.to_string(),
            },
            None if loading => PanelStatus::Loading,
            None => PanelStatus::Empty,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PanelStatus::Loading => "loading",
            PanelStatus::Failed { .. } => "failed",
            PanelStatus::Empty => "empty",
            PanelStatus::Ready => "ready",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    Open,
    Clone,
    Add,
    Remove,
    Create,
    Delete,
    Move,
    ViewInBrowser,
    Navigate,
    Retry,
    ToggleSearch,
}

impl ControlKind {
    pub fn label(&self) -> &'static str {
        match self {
            ControlKind::Open => "Open",
            ControlKind::Clone => "Clone",
            ControlKind::Add => "Add",
            ControlKind::Remove => "Remove",
            ControlKind::Create => "New",
            ControlKind::Delete => "Delete",
            ControlKind::Move => "Move",
            ControlKind::ViewInBrowser => "View on GitHub",
            ControlKind::Navigate => "Show",
            ControlKind::Retry => "Try again",
            ControlKind::ToggleSearch => "Search",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Control {
    pub kind: ControlKind,
    pub enabled: bool,
    /// An invocation of this control is in flight
    pub busy: bool,
}

impl Control {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            enabled: true,
            busy: false,
        }
    }

    /// Disabled and marked busy while `busy` holds
    pub fn busy_when(mut self, busy: bool) -> Self {
        self.busy = busy;
        self.enabled = self.enabled && !busy;
        self
    }

    pub fn enabled_when(mut self, enabled: bool) -> Self {
        self.enabled = self.enabled && enabled;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Identity key of the entity
    pub key: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub badges: Vec<String>,
    pub selected: bool,
    pub controls: Vec<Control>,
}

impl Row {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn subtitle(mut self, subtitle: Option<impl Into<String>>) -> Self {
        self.subtitle = subtitle.map(Into::into);
        self
    }

    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badges.push(badge.into());
        self
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Section key (owner login) for grouped panels
    pub key: Option<String>,
    pub title: Option<String>,
    pub collapsed: bool,
    /// Number of matching rows, including hidden ones of a collapsed section
    pub count: usize,
    pub rows: Vec<Row>,
}

impl Section {
    pub fn flat(rows: Vec<Row>) -> Self {
        Self {
            count: rows.len(),
            rows,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub panel: String,
    pub status: PanelStatus,
    pub filter: String,
    pub search_visible: bool,
    pub banner: Option<String>,
    pub header: Option<Row>,
    pub toolbar: Vec<Control>,
    pub sections: Vec<Section>,
}

impl PanelView {
    pub fn new(panel: &str, state: &ListState) -> Self {
        Self {
            panel: panel.to_string(),
            status: PanelStatus::Loading,
            filter: state.filter.clone(),
            search_visible: state.search_visible,
            banner: state.banner.clone(),
            header: None,
            toolbar: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Show the slice error as a banner when rows are still shown
    pub fn with_slice_error(mut self, error: Option<&str>) -> Self {
        if self.banner.is_none() && self.status == PanelStatus::Ready {
            self.banner = error.map(String::from);
        }
        if matches!(self.status, PanelStatus::Failed { .. }) {
            self.toolbar.push(Control::new(ControlKind::Retry));
        }
        self
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.sections.iter().flat_map(|s| s.rows.iter())
    }

    pub fn row_titles(&self) -> Vec<&str> {
        self.rows().map(|r| r.title.as_str()).collect()
    }

    pub fn row(&self, key: &str) -> Option<&Row> {
        self.rows().find(|r| r.key == key)
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows().find(|r| r.selected)
    }

    /// Every control on the toolbar, the header and the rows
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.toolbar
            .iter()
            .chain(self.header.iter().flat_map(|h| h.controls.iter()))
            .chain(self.rows().flat_map(|r| r.controls.iter()))
    }

    pub fn has_control(&self, kind: ControlKind) -> bool {
        self.controls().any(|c| c.kind == kind)
    }
}
