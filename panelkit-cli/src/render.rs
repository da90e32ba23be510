//! Plain-text rendering of headless panel views for the terminal.

use std::fmt::Write;

use serde_json::Value;

use panelkit_core::event::PanelEvent;
use panelkit_core::panels::PanelMetadata;
use panelkit_core::tool::ToolDescriptor;
use panelkit_core::view::{Control, PanelStatus, PanelView, Row};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

pub fn panel_line(meta: &PanelMetadata) -> String {
    let slices: Vec<String> = meta.slices.iter().map(|k| k.to_string()).collect();
    format!(
        "{BOLD}{:<24}{RESET} {}\n  {DIM}slices: {}  capabilities: {}{RESET}",
        meta.id,
        meta.description,
        slices.join(", "),
        meta.capabilities.join(", ")
    )
}

pub fn tool_line(tool: &ToolDescriptor) -> String {
    let mut out = format!("{BOLD}{}{RESET}  {}", tool.name, tool.description);
    let required = tool.required_inputs();
    if let Some(Value::Object(properties)) = tool.inputs.get("properties") {
        for (name, schema) in properties {
            let marker = if required.contains(&name.as_str()) { "*" } else { "" };
            let kind = schema.get("type").and_then(Value::as_str).unwrap_or("any");
            let _ = write!(out, "\n  {DIM}{}{}: {}{RESET}", name, marker, kind);
        }
    }
    let _ = write!(out, "\n  {DIM}-> {}{RESET}", tool.event());
    out
}

pub fn event_line(event: &PanelEvent) -> String {
    format!("{GREEN}{}{RESET} {}", event.event_type, event.payload)
}

fn controls(controls: &[Control]) -> String {
    controls
        .iter()
        .map(|c| {
            if c.busy {
                format!("[{}…]", c.kind.label())
            } else {
                format!("[{}]", c.kind.label())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_line(row: &Row) -> String {
    let marker = if row.selected { ">" } else { " " };
    let mut line = format!("{} {}", marker, row.title);
    if !row.badges.is_empty() {
        let _ = write!(line, " {DIM}({}){RESET}", row.badges.join(", "));
    }
    if let Some(subtitle) = &row.subtitle {
        let _ = write!(line, " {DIM}{}{RESET}", subtitle);
    }
    if !row.controls.is_empty() {
        let _ = write!(line, "  {}", controls(&row.controls));
    }
    line
}

pub fn view(view: &PanelView) -> String {
    let mut out = String::new();
    let _ = write!(out, "{BOLD}{}{RESET} [{}]", view.panel, view.status.label());
    if !view.filter.is_empty() {
        let _ = write!(out, " filter: {:?}", view.filter);
    }
    if !view.toolbar.is_empty() {
        let _ = write!(out, "  {}", controls(&view.toolbar));
    }
    if let Some(header) = &view.header {
        let _ = write!(out, "\n{}", row_line(header));
    }
    if let Some(banner) = &view.banner {
        let _ = write!(out, "\n{YELLOW}! {}{RESET}", banner);
    }

    match &view.status {
        PanelStatus::Loading => out.push_str("\n  loading…"),
        PanelStatus::Failed { message } => {
            let _ = write!(out, "\n{RED}  {}{RESET}", message);
        }
        PanelStatus::Empty => out.push_str("\n  (empty)"),
        PanelStatus::Ready => {}
    }

    for section in &view.sections {
        if let Some(title) = &section.title {
            let arrow = if section.collapsed { "▸" } else { "▾" };
            let _ = write!(out, "\n{BOLD}{} {}{RESET} {DIM}{}{RESET}", arrow, title, section.count);
        }
        for row in &section.rows {
            let _ = write!(out, "\n{}", row_line(row));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelkit_core::state::ListState;
    use panelkit_core::view::{ControlKind, Section};

    #[test]
    fn test_view_marks_selection_and_controls() {
        let mut state = ListState::new();
        state.filter = "api".into();
        let mut view = PanelView::new("local-projects", &state);
        view.status = PanelStatus::Ready;
        view.sections.push(Section::flat(vec![
            Row::new("/code/api", "api")
                .selected(true)
                .control(Control::new(ControlKind::Open).busy_when(true)),
        ]));

        let text = super::view(&view);
        assert!(text.contains("[ready]"));
        assert!(text.contains("filter: \"api\""));
        assert!(text.contains("> api"));
        assert!(text.contains("…]"));
    }

    #[test]
    fn test_tool_line_marks_required_inputs() {
        let tool = ToolDescriptor::new("create_workspace", "Create a workspace", "workspaces:create-workspace")
            .input("name", "string", "Workspace name")
            .optional_input("description", "string", "Optional description");
        let text = tool_line(&tool);
        assert!(text.contains("name*: string"));
        assert!(text.contains("description: string"));
        assert!(text.contains("-> workspaces:create-workspace"));
    }
}
