use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::panels;
use crate::slice::{CurrentScope, RawSlice, SliceKey, SliceScope, SliceSet};

/// Capabilities every host may offer regardless of panel
pub const BASE_CAPABILITIES: &[&str] = &["open_file", "open_git_diff", "navigate_to_panel", "notify_panels"];

pub const CONFIG_ENV: &str = "PANELKIT_CONFIG";

const CONFIG_NAMES: &[&str] = &["panelkit.yaml", "panelkit.yml", ".panelkit.yaml", ".panelkit.yml"];

/// One slice the fixture host publishes
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SliceFixture {
    #[serde(default)]
    pub scope: SliceScope,
    pub name: String,

    /// Publish the slice as still loading
    #[serde(default)]
    pub loading: bool,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub data: Value,
}

impl SliceFixture {
    pub fn key(&self) -> SliceKey {
        SliceKey::new(self.scope, self.name.clone())
    }
}

/// Root of `panelkit.yaml`: a fixture host for driving panels from the CLI
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PanelkitConfig {
    #[serde(default = "default_version")]
    pub version: String,

    /// Workspace or repository the host is showing
    #[serde(default)]
    pub scope: CurrentScope,

    /// Simulated latency of every host action
    #[serde(default)]
    pub latency_ms: u64,

    #[serde(default)]
    pub slices: Vec<SliceFixture>,

    /// Capabilities offered per panel id
    #[serde(default)]
    pub capabilities: BTreeMap<String, Vec<String>>,

    /// Capabilities whose host action rejects
    #[serde(default)]
    pub failures: BTreeSet<String>,

    /// Directory clones are placed under
    #[serde(default)]
    pub clone_root: Option<PathBuf>,

    /// What the directory picker returns; unset means the user cancels
    #[serde(default)]
    pub picked_directory: Option<String>,
}

fn default_version() -> String {
    "1".into()
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    DuplicateSlice { key: SliceKey },
    UnknownPanel { panel: String },
    UnknownCapability { panel: String, capability: String },
    NotFound { searched: Vec<PathBuf> },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Yaml(e) => write!(f, "YAML parse error: {}", e),
            Self::DuplicateSlice { key } => write!(f, "slice '{}' is defined more than once", key),
            Self::UnknownPanel { panel } => write!(f, "unknown panel '{}'", panel),
            Self::UnknownCapability { panel, capability } => {
                write!(f, "panel '{}' has no capability '{}'", panel, capability)
            }
            Self::NotFound { searched } => {
                write!(f, "no config file found, searched: {:?}", searched)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl PanelkitConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: PanelkitConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search for the config file: `PANELKIT_CONFIG` first, then
    /// `start_dir` and its parents
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::discover_from(start_dir, from_env)
    }

    pub fn discover_from(start_dir: &Path, explicit: Option<PathBuf>) -> Result<(PathBuf, Self), ConfigError> {
        let mut searched = Vec::new();

        if let Some(path) = explicit {
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((path, config));
            }
            searched.push(path);
        }

        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in CONFIG_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let config = Self::load(&path)?;
                    return Ok((path, config));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for fixture in &self.slices {
            let key = fixture.key();
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateSlice { key });
            }
        }

        let mut known = BTreeSet::new();
        known.extend(BASE_CAPABILITIES.iter().copied());
        for (panel, capabilities) in &self.capabilities {
            let Some(meta) = panels::find(panel) else {
                return Err(ConfigError::UnknownPanel { panel: panel.clone() });
            };
            for capability in capabilities {
                let offered = meta.capabilities.contains(&capability.as_str())
                    || BASE_CAPABILITIES.contains(&capability.as_str());
                if !offered {
                    return Err(ConfigError::UnknownCapability {
                        panel: panel.clone(),
                        capability: capability.clone(),
                    });
                }
            }
        }

        for meta in panels::catalog() {
            known.extend(meta.capabilities.iter().copied());
        }
        for capability in &self.failures {
            if !known.contains(capability.as_str()) {
                return Err(ConfigError::UnknownCapability {
                    panel: "*".into(),
                    capability: capability.clone(),
                });
            }
        }

        Ok(())
    }

    /// Whether the host offers `capability` to `panel`
    pub fn enabled(&self, panel: &str, capability: &str) -> bool {
        self.capabilities
            .get(panel)
            .is_some_and(|caps| caps.iter().any(|c| c == capability))
    }

    pub fn fails(&self, capability: &str) -> bool {
        self.failures.contains(capability)
    }

    pub fn slice(&self, key: &SliceKey) -> Option<&SliceFixture> {
        self.slices.iter().find(|f| &f.key() == key)
    }

    /// The slices as the host publishes them at startup
    pub fn to_slice_set(&self) -> SliceSet {
        let mut set = SliceSet::new();
        for fixture in &self.slices {
            set.insert(
                fixture.key(),
                RawSlice {
                    data: fixture.data.clone(),
                    loading: fixture.loading,
                    error: fixture.error.clone(),
                },
            );
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "1"
scope:
  scope: workspace
  workspaceId: ws-1
latency_ms: 50
slices:
  - name: workspaces
    data:
      - { id: ws-1, name: Personal, isDefault: true }
  - scope: workspace
    name: workspaceRepositories
    loading: true
capabilities:
  workspaces: [open_workspace, create_workspace]
  user-profile: [view_in_browser, navigate_to_panel]
failures: [create_workspace]
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = PanelkitConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.scope.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(config.latency_ms, 50);
        assert!(config.enabled("workspaces", "open_workspace"));
        assert!(!config.enabled("workspaces", "delete_workspace"));
        assert!(!config.enabled("local-projects", "open_repository"));
        assert!(config.fails("create_workspace"));

        let set = config.to_slice_set();
        assert_eq!(set.len(), 2);
        assert!(set.get(&SliceKey::workspace("workspaceRepositories")).unwrap().loading);
        assert!(set.get(&SliceKey::global("workspaces")).unwrap().data.is_array());
    }

    #[test]
    fn test_duplicate_slice_rejected() {
        let yaml = r#"
slices:
  - name: userCollections
  - name: userCollections
    scope: global
"#;
        let result = PanelkitConfig::parse(yaml);
        assert!(matches!(result, Err(ConfigError::DuplicateSlice { .. })));

        let distinct_scopes = r#"
slices:
  - name: repositories
  - name: repositories
    scope: workspace
"#;
        assert!(PanelkitConfig::parse(distinct_scopes).is_ok());
    }

    #[test]
    fn test_unknown_panel_and_capability_rejected() {
        let unknown_panel = "capabilities:\n  github-issues: [open_file]\n";
        assert!(matches!(
            PanelkitConfig::parse(unknown_panel),
            Err(ConfigError::UnknownPanel { panel }) if panel == "github-issues"
        ));

        let unknown_capability = "capabilities:\n  workspaces: [clone_repository]\n";
        assert!(matches!(
            PanelkitConfig::parse(unknown_capability),
            Err(ConfigError::UnknownCapability { .. })
        ));

        let unknown_failure = "failures: [launch_rockets]\n";
        assert!(matches!(
            PanelkitConfig::parse(unknown_failure),
            Err(ConfigError::UnknownCapability { .. })
        ));
    }

    #[test]
    fn test_discover_walks_up_parents() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join(".panelkit.yml"), "latency_ms: 5\n").unwrap();

        let (path, config) = PanelkitConfig::discover_from(&nested, None).unwrap();
        assert_eq!(path, root.path().join(".panelkit.yml"));
        assert_eq!(config.latency_ms, 5);
    }

    #[test]
    fn test_explicit_path_wins_and_missing_reports_searched() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("custom.yaml");
        std::fs::write(&explicit, "version: \"2\"\n").unwrap();
        std::fs::write(dir.path().join("panelkit.yaml"), "version: \"1\"\n").unwrap();

        let (path, config) = PanelkitConfig::discover_from(dir.path(), Some(explicit.clone())).unwrap();
        assert_eq!(path, explicit);
        assert_eq!(config.version, "2");

        let empty = tempfile::tempdir().unwrap();
        let missing = empty.path().join("nope.yaml");
        match PanelkitConfig::discover_from(empty.path(), Some(missing.clone())) {
            Err(ConfigError::NotFound { searched }) => {
                assert_eq!(searched[0], missing);
                assert!(searched.contains(&empty.path().join("panelkit.yaml")));
            }
            other => panic!("expected NotFound, got {:?}", other.map(|(path, _)| path)),
        }
    }
}
