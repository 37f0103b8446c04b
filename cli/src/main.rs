//! lumen: headless runner for projected AR scenes.
//!
//! - `check` validates a project file
//! - `run` loads a project and replays a recorded sensor session through the
//!   live runtime, printing every dispatched event as a JSON line
//! - `init-config` writes a default runtime config
//! - `list` shows projects saved in the data directory

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lumen_core::{
    default_config_path, list_projects, load_config, load_or_default, load_project_file, save_config,
    validate_project, Event, EventListener, ProjectModel, Runtime, RuntimeConfig, SceneModel,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

mod logging;
mod session;

#[derive(Parser, Debug)]
#[command(name = "lumen")]
#[command(about = "Run and check lumen interactive scenes", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a project file
    Check {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
    /// Replay a recorded session against a project
    Run {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// JSON-lines session file
        #[arg(short, long, value_name = "FILE")]
        session: PathBuf,

        /// Runtime config (defaults to the user config file if present)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Scene to show first (defaults to the project's first scene)
        #[arg(long)]
        scene: Option<String>,

        /// Time to let in-flight rules finish after the session ends
        #[arg(long, default_value_t = 1000, value_name = "MS")]
        linger_ms: u64,
    },
    /// Write a default runtime config
    InitConfig {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List saved projects
    List,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup(args.verbose, args.log_dir.as_deref());

    match args.command {
        Command::Check { project } => check(&project),
        Command::Run {
            project,
            session,
            config,
            scene,
            linger_ms,
        } => run(&project, &session, config, scene, Duration::from_millis(linger_ms)),
        Command::InitConfig { path, force } => init_config(path, force),
        Command::List => {
            for name in list_projects().context("Failed to list projects")? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn check(path: &Path) -> Result<()> {
    let project = load_project_file(path).with_context(|| format!("Failed to load project {:?}", path))?;
    match validate_project(&project) {
        Ok(()) => {
            println!("{}: ok ({} scenes)", project.name, project.scenes.len());
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("{}", error);
            }
            bail!("{} validation error(s) in {:?}", errors.len(), path)
        }
    }
}

/// Prints each dispatched event as one JSON line on stdout.
struct EventPrinter;

impl EventListener for EventPrinter {
    fn on_event(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to encode event"),
        }
    }
}

fn run(
    project_path: &Path,
    session_path: &Path,
    config_path: Option<PathBuf>,
    scene: Option<String>,
    linger: Duration,
) -> Result<()> {
    let project = load_project_file(project_path)
        .with_context(|| format!("Failed to load project {:?}", project_path))?;
    if let Err(errors) = validate_project(&project) {
        for error in &errors {
            warn!("{}", error);
        }
    }
    let config: RuntimeConfig = match config_path {
        Some(path) => load_config(&path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => load_or_default(default_config_path()),
    };
    let entries = session::load_session(session_path)?;

    let first_scene = scene
        .or_else(|| project.scenes.first().map(|s| s.name.clone()))
        .context("Project has no scenes")?;

    let model = Arc::new(ProjectModel::new(project));
    let runtime = Runtime::new(model, config);
    runtime.events().register_all(Arc::new(EventPrinter));
    let markers = runtime.attach_marker_feed().context("Failed to start selection detector")?;

    runtime
        .show_scene(&first_scene)
        .with_context(|| format!("Failed to show scene {}", first_scene))?;
    session::replay(&runtime, &markers, &entries);

    thread::sleep(linger);
    info!(scene = ?runtime.model().current_scene(), "Replay done");
    runtime.shutdown();
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(default_config_path);
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    save_config(&path, &RuntimeConfig::default())
        .with_context(|| format!("Failed to write config {:?}", path))?;
    println!("Wrote {}", path.display());
    Ok(())
}
