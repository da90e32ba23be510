mod commands;
mod host;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use panelkit_core::config::PanelkitConfig;
use panelkit_core::event::{EventBus, PanelEvent};
use panelkit_core::panels;

use host::{FakeHost, mount_panel};

/// Env var holding the log filter; falls back to `RUST_LOG`
const LOG_ENV: &str = "PANELKIT_LOG";

/// Emitter recorded on events injected from the command line
const CLI_SOURCE: &str = "cli";

#[derive(Parser)]
#[command(name = "panelkit")]
#[command(about = "Browse repository panels headlessly and drive them through their tools", long_about = None)]
struct Cli {
    /// Fixture host config (defaults to PANELKIT_CONFIG, then panelkit.yaml in this directory or above)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter panelkit.yaml
    Init {
        #[arg(short, long)]
        yes: bool,
    },
    /// Validate the fixture host config
    Doctor,
    /// List the panel catalogue
    Panels {
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List agent-facing tools
    Tools {
        #[arg(long)]
        panel: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Mount a panel against the fixture host and print its view
    View {
        panel: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Call a tool and print the notifications its panel emits
    Invoke {
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
        /// Extra time to wait for slice refreshes to settle
        #[arg(long, default_value_t = 0)]
        wait_ms: u64,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

impl Format {
    /// Serialize `value` for json/yaml; `None` for text
    fn structured<T: Serialize>(self, value: &T) -> Result<Option<String>, String> {
        match self {
            Format::Text => Ok(None),
            Format::Json => serde_json::to_string_pretty(value).map(Some).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::to_string(value).map(Some).map_err(|e| e.to_string()),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Init { yes } => commands::run_init(yes),
        Commands::Doctor => commands::run_doctor(cli.config),
        Commands::Panels { format } => run_panels(format),
        Commands::Tools { panel, format } => run_tools(panel.as_deref(), format),
        Commands::View { panel, filter, format } => run_view(cli.config, &panel, filter, format).await,
        Commands::Invoke {
            tool,
            args,
            wait_ms,
            format,
        } => run_invoke(cli.config, &tool, args.as_deref(), wait_ms, format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<PanelkitConfig, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current directory: {}", e))?;
    let explicit = explicit.or_else(|| std::env::var_os(panelkit_core::config::CONFIG_ENV).map(PathBuf::from));
    let (path, config) = PanelkitConfig::discover_from(&cwd, explicit).map_err(|e| e.to_string())?;
    debug!(config = %path.display(), "loaded fixture host");
    Ok(config)
}

fn run_panels(format: Format) -> Result<(), String> {
    let catalog = panels::catalog();
    if let Some(out) = format.structured(&catalog)? {
        println!("{}", out);
        return Ok(());
    }
    for meta in &catalog {
        println!("{}", render::panel_line(meta));
    }
    Ok(())
}

fn run_tools(panel: Option<&str>, format: Format) -> Result<(), String> {
    let registry = panels::tool_registry();
    let tools: Vec<_> = match panel {
        Some(id) => {
            if panels::find(id).is_none() {
                return Err(format!("unknown panel '{}'", id));
            }
            registry.for_panel(id).cloned().collect()
        }
        None => registry.iter().cloned().collect(),
    };

    if let Some(out) = format.structured(&tools)? {
        println!("{}", out);
        return Ok(());
    }
    for tool in &tools {
        println!("{}", render::tool_line(tool));
    }
    Ok(())
}

async fn run_view(config: Option<PathBuf>, panel: &str, filter: Option<String>, format: Format) -> Result<(), String> {
    let host = FakeHost::new(load_config(config)?);
    let bus = EventBus::new();
    let mounted = mount_panel(panel, &host, &bus).ok_or_else(|| format!("unknown panel '{}'", panel))?;

    if let Some(filter) = filter {
        bus.emit(PanelEvent::new(
            format!("{}:filter", panel),
            CLI_SOURCE,
            json!({ "filter": filter }),
        ));
    }
    mounted.idle().await;

    let view = mounted.view();
    match format.structured(&view)? {
        Some(out) => println!("{}", out),
        None => println!("{}", render::view(&view)),
    }
    Ok(())
}

async fn run_invoke(
    config: Option<PathBuf>,
    tool: &str,
    args: Option<&str>,
    wait_ms: u64,
    format: Format,
) -> Result<(), String> {
    let args: Value = match args {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("invalid --args: {}", e))?,
        None => Value::Null,
    };
    let registry = panels::tool_registry();
    let event = registry.invoke(tool, args).map_err(|e| e.to_string())?;
    let panel = registry
        .panel_of(tool)
        .ok_or_else(|| format!("unknown tool '{}'", tool))?;

    let host = FakeHost::new(load_config(config)?);
    let bus = EventBus::new();
    let mut tap = bus.subscribe_all();
    let mounted = mount_panel(panel, &host, &bus).ok_or_else(|| format!("unknown panel '{}'", panel))?;

    bus.emit(event);
    mounted.idle().await;
    if wait_ms > 0 {
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        mounted.idle().await;
    }

    let mut notifications = Vec::new();
    loop {
        match tap.try_recv() {
            Ok(event) if event.source == panel => notifications.push(event),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    let view = mounted.view();
    let report = json!({ "notifications": notifications, "view": view });
    if let Some(out) = format.structured(&report)? {
        println!("{}", out);
        return Ok(());
    }

    if notifications.is_empty() {
        println!("(no notifications)");
    }
    for event in &notifications {
        println!("{}", render::event_line(event));
    }
    println!("\n{}", render::view(&view));
    Ok(())
}
