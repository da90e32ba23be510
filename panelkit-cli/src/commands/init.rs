use std::fs;
use std::path::Path;

/// Config names `init` refuses to overwrite without `--yes`
const CONFIG_NAMES: &[&str] = &["panelkit.yaml", "panelkit.yml", ".panelkit.yaml", ".panelkit.yml"];

/// Starter fixture host: one entry per slice and every capability enabled
pub const SAMPLE_CONFIG: &str = r#"# panelkit fixture host
version: "1"

# What the host is currently showing
scope:
  scope: workspace
  workspaceId: ws-personal

# Simulated latency of every host action
latency_ms: 150

slices:
  - name: localRepositories
    data:
      - name: panelkit
        path: ~/code/panelkit
        lastOpened: "2024-05-02T09:30:00Z"
        github: { id: 1001, owner: panelkit, name: panelkit, language: Rust, stars: 12 }
      - name: notes
        path: ~/code/notes
        source: discovered

  - name: workspaces
    data:
      - { id: ws-personal, name: Personal, isDefault: true, repositoryCount: 2 }
      - { id: ws-work, name: Work, description: Day job, repositoryCount: 0 }

  - scope: workspace
    name: workspaceRepositories
    data:
      - { name: panelkit, path: ~/code/panelkit }
      - { name: notes, path: ~/code/notes }

  - name: githubStarred
    data:
      - id: 2001
        name: tokio
        full_name: tokio-rs/tokio
        owner: { login: tokio-rs }
        html_url: https://github.com/tokio-rs/tokio
        language: Rust
        stargazers_count: 27000
        pushed_at: "2024-05-01T12:00:00Z"
      - id: 1001
        name: panelkit
        full_name: panelkit/panelkit
        owner: { login: panelkit }
        html_url: https://github.com/panelkit/panelkit
        language: Rust
        pushed_at: "2024-04-20T08:00:00Z"

  - name: githubRepositories
    data:
      - id: 1001
        name: panelkit
        full_name: panelkit/panelkit
        owner: { login: panelkit }
        html_url: https://github.com/panelkit/panelkit
      - id: 3001
        name: website
        full_name: panelkit/website
        owner: { login: panelkit }
        html_url: https://github.com/panelkit/website
        private: true

  - name: userProfile
    data:
      login: octocat
      name: The Octocat
      bio: Panels all the way down
      publicRepos: 8
      followers: 20

  - name: userOrganizations
    data:
      - { login: panelkit, description: Panels for repository browsing }
      - { login: tokio-rs }

  - name: userCollections
    data:
      - { id: col-async, name: Async, repositories: [tokio-rs/tokio] }

capabilities:
  local-projects: [open_repository, remove_repository, select_directory, register_repository]
  workspaces: [open_workspace, create_workspace, delete_workspace]
  workspace-repositories: [open_repository, move_repository]
  github-starred: [open_repository, clone_repository, view_in_browser]
  github-projects: [open_repository, clone_repository, view_in_browser]
  user-profile: [view_in_browser, navigate_to_panel]
  user-collections: [create_collection, delete_collection]

# Capabilities whose host action rejects
failures: []

clone_root: ~/code
picked_directory: ~/code/scratch
"#;

/// Run the init command
pub fn run_init(yes: bool) -> Result<(), String> {
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current directory: {}", e))?;
    let output_path = write_config(&cwd, yes)?;

    println!("Created: {}\n", output_path.display());
    println!("Next steps:");
    println!("  1. Review and customize {}", output_path.display());
    println!("  2. Run `panelkit doctor` to validate it");
    println!("  3. Run `panelkit view local-projects` to render a panel");

    Ok(())
}

fn write_config(dir: &Path, yes: bool) -> Result<std::path::PathBuf, String> {
    for name in CONFIG_NAMES {
        let path = dir.join(name);
        if path.exists() {
            if !yes {
                return Err(format!(
                    "Config file {} already exists. Use --yes to overwrite.",
                    path.display()
                ));
            }
            println!("Overwriting existing config: {}", path.display());
        }
    }

    let output_path = dir.join("panelkit.yaml");
    fs::write(&output_path, SAMPLE_CONFIG).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(output_path)
}
