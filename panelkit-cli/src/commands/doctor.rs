use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;

use panelkit_core::config::PanelkitConfig;
use panelkit_core::model::{Collection, GithubRepository, LocalRepository, Organization, UserProfile, Workspace};
use panelkit_core::panels::{self, slices};
use panelkit_core::slice::SliceKey;

#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl Check {
    fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            hint: None,
        }
    }

    fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn run_doctor(explicit: Option<PathBuf>) -> Result<(), String> {
    println!("panelkit doctor\n");

    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current directory: {}", e))?;
    let explicit = explicit.or_else(|| std::env::var_os(panelkit_core::config::CONFIG_ENV).map(PathBuf::from));
    let (path, config) = match PanelkitConfig::discover_from(&cwd, explicit) {
        Ok(found) => found,
        Err(e) => {
            print_check(&Check::fail("config", e.to_string()).with_hint("Run `panelkit init` to create one"));
            return Ok(());
        }
    };
    println!("Configuration: {}\n", path.display());

    let slice_checks = check_slices(&config);
    println!("Slices:");
    for check in &slice_checks {
        print_check(check);
    }
    println!();

    let panel_checks = check_panels(&config);
    println!("Panels:");
    for check in &panel_checks {
        print_check(check);
    }
    println!();

    let failed: Vec<_> = slice_checks.iter().chain(&panel_checks).filter(|c| !c.passed).collect();
    if failed.is_empty() {
        println!("All checks passed!");
    } else {
        println!("Issues found:");
        for check in &failed {
            println!("  - {}: {}", check.name, check.message);
            if let Some(hint) = &check.hint {
                println!("    Hint: {}", hint);
            }
        }
    }

    Ok(())
}

fn print_check(check: &Check) {
    let icon = if check.passed { "✓" } else { "✗" };
    let color = if check.passed { "\x1b[32m" } else { "\x1b[31m" };
    let reset = "\x1b[0m";

    println!("  {}{}{} {}: {}", color, icon, reset, check.name, check.message);

    if let Some(hint) = &check.hint {
        println!("    └─ {}", hint);
    }
}

fn shape_error<T: DeserializeOwned>(data: &Value) -> Option<String> {
    if data.is_null() {
        return None;
    }
    serde_json::from_value::<T>(data.clone()).err().map(|e| e.to_string())
}

/// Decode error of a slice's data against the type its panels expect
fn decode_slice(name: &str, data: &Value) -> Option<String> {
    match name {
        slices::LOCAL_REPOSITORIES | slices::WORKSPACE_REPOSITORIES => shape_error::<Vec<LocalRepository>>(data),
        slices::WORKSPACES => shape_error::<Vec<Workspace>>(data),
        slices::GITHUB_STARRED | slices::GITHUB_REPOSITORIES => shape_error::<Vec<GithubRepository>>(data),
        slices::USER_PROFILE => shape_error::<UserProfile>(data),
        slices::USER_ORGANIZATIONS => shape_error::<Vec<Organization>>(data),
        slices::USER_COLLECTIONS => shape_error::<Vec<Collection>>(data),
        _ => None,
    }
}

fn check_slices(config: &PanelkitConfig) -> Vec<Check> {
    let used: Vec<SliceKey> = panels::catalog().into_iter().flat_map(|m| m.slices).collect();

    config
        .slices
        .iter()
        .map(|fixture| {
            let key = fixture.key();
            let name = key.to_string();
            if !used.contains(&key) {
                return Check::fail(name, "no panel reads this slice").with_hint("Check the slice name and scope");
            }
            if let Some(err) = decode_slice(&fixture.name, &fixture.data) {
                return Check::fail(name, format!("unexpected data: {}", err));
            }
            let count = fixture.data.as_array().map(Vec::len);
            let mut message = match count {
                Some(n) => format!("{} entries", n),
                None if fixture.data.is_null() => "no data".to_string(),
                None => "ok".to_string(),
            };
            if fixture.loading {
                message.push_str(" [loading]");
            }
            if let Some(error) = &fixture.error {
                message.push_str(&format!(" [error: {}]", error));
            }
            Check::ok(name, message)
        })
        .collect()
}

fn check_panels(config: &PanelkitConfig) -> Vec<Check> {
    panels::catalog()
        .into_iter()
        .map(|meta| {
            let missing: Vec<String> = meta
                .slices
                .iter()
                .filter(|key| config.slice(key).is_none())
                .map(|key| key.to_string())
                .collect();
            if !missing.is_empty() {
                return Check::fail(meta.id, format!("missing slices: {}", missing.join(", ")))
                    .with_hint("The panel renders as loading until the host publishes them");
            }

            let enabled: Vec<&str> = meta
                .capabilities
                .iter()
                .copied()
                .filter(|c| config.enabled(meta.id, c))
                .collect();
            let failing: Vec<&str> = enabled.iter().copied().filter(|c| config.fails(c)).collect();
            let mut message = format!("{}/{} capabilities", enabled.len(), meta.capabilities.len());
            if !failing.is_empty() {
                message.push_str(&format!(", failing: {}", failing.join(", ")));
            }
            Check::ok(meta.id, message)
        })
        .collect()
}
