use crate::model::{AppConfig, ScriptDefinition, ScriptStatus, StatusReport, TIMEOUT_MAX, TIMEOUT_MIN};
use crate::registry::{self, Registry};
use crate::supervisor::Supervisor;
use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "script-runner",
    version,
    about = "Register, launch and watch user scripts, with optional TUI"
)]
pub struct Cli {
    /// Path to the script list file (defaults to the per-app data directory)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Print the registered scripts as a table and exit (no TUI)
    #[arg(long)]
    pub list: bool,

    /// Print the registered scripts as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Register a new script and exit (uses --name/--path/--venv/--args/--timeout)
    #[arg(long)]
    pub add: bool,

    /// Launch the named script in the foreground and wait for it to exit
    #[arg(long, value_name = "NAME")]
    pub run: Option<String>,

    /// Script name for --add
    #[arg(long)]
    pub name: Option<String>,

    /// Script path for --add
    #[arg(long)]
    pub path: Option<String>,

    /// Interpreter override for --add (empty means the default interpreter)
    #[arg(long, default_value = "")]
    pub venv: String,

    /// Whitespace-separated argument list for --add
    #[arg(long, default_value = "")]
    pub args: String,

    /// Timeout in seconds stored with the script for --add
    #[arg(
        long,
        default_value_t = 60,
        value_parser = clap::value_parser!(u32).range(i64::from(TIMEOUT_MIN)..=i64::from(TIMEOUT_MAX))
    )]
    pub timeout: u32,

    /// Interpreter used when a script has no override
    #[arg(long, default_value = "python3")]
    pub default_interpreter: String,

    /// Status refresh interval
    #[arg(long, default_value = "1s")]
    pub poll_interval: humantime::Duration,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.add {
        return run_add(&args);
    }
    if let Some(name) = args.run.clone() {
        return run_foreground(&args, &name).await;
    }
    if args.list {
        return run_list(&args);
    }
    if args.json {
        return run_json(&args);
    }

    #[cfg(feature = "tui")]
    return crate::tui::run(args).await;

    #[cfg(not(feature = "tui"))]
    {
        // Fallback when built without TUI support.
        run_list(&args)
    }
}

/// Build an `AppConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> AppConfig {
    AppConfig {
        config_path: args
            .config
            .clone()
            .unwrap_or_else(registry::default_config_path),
        default_interpreter: args.default_interpreter.clone(),
        poll_interval: Duration::from(args.poll_interval),
    }
}

/// Load the registry for the non-interactive modes, downgrading load
/// failures to a warning on stderr and starting empty.
fn load_registry_or_empty(cfg: &AppConfig) -> Registry {
    if !cfg.config_path.exists() {
        return Registry::new();
    }
    match Registry::load(&cfg.config_path) {
        Ok(reg) => reg,
        Err(e) => {
            eprintln!("warning: {:#}", anyhow::Error::new(e));
            Registry::new()
        }
    }
}

fn run_list(args: &Cli) -> Result<()> {
    let cfg = build_config(args);
    let reg = load_registry_or_empty(&cfg);
    if reg.is_empty() {
        println!("No scripts registered ({})", cfg.config_path.display());
        return Ok(());
    }

    println!(
        "{:<20} {:<40} {:<24} {:>7}  ARGS",
        "NAME", "PATH", "INTERPRETER", "TIMEOUT"
    );
    for s in reg.scripts() {
        let interpreter = if s.interpreter.is_empty() {
            "-"
        } else {
            &s.interpreter
        };
        println!(
            "{:<20} {:<40} {:<24} {:>6}s  {}",
            s.name, s.path, interpreter, s.timeout_secs, s.args
        );
    }
    Ok(())
}

fn run_json(args: &Cli) -> Result<()> {
    let cfg = build_config(args);
    let reg = load_registry_or_empty(&cfg);
    let out = serde_json::to_string_pretty(reg.scripts())?;
    println!("{out}");
    Ok(())
}

fn run_add(args: &Cli) -> Result<()> {
    let cfg = build_config(args);
    let mut reg = load_registry_or_empty(&cfg);

    let def = ScriptDefinition {
        name: args.name.clone().unwrap_or_default(),
        path: args.path.clone().unwrap_or_default(),
        interpreter: args.venv.clone(),
        args: args.args.clone(),
        timeout_secs: args.timeout,
    };
    let name = def.name.clone();
    reg.add(def).context("invalid script definition")?;
    reg.save(&cfg.config_path)
        .with_context(|| format!("saving {}", cfg.config_path.display()))?;

    println!(
        "Added '{}' ({} script(s) in {})",
        name,
        reg.len(),
        cfg.config_path.display()
    );
    Ok(())
}

/// Launch `name` and keep polling at the refresh interval until the exit
/// is observed. Ctrl-C sends the stop signal and keeps waiting; the
/// process table entry is only reaped by a poll.
async fn run_foreground(args: &Cli, name: &str) -> Result<()> {
    let cfg = build_config(args);
    let reg = load_registry_or_empty(&cfg);
    let def = reg
        .get(name)
        .with_context(|| format!("no script named '{name}'"))?;

    let mut supervisor = Supervisor::new(cfg.default_interpreter.clone());
    supervisor.start(def)?;
    eprintln!(
        "{}",
        StatusReport::Running {
            name: name.to_string(),
            since: None
        }
        .to_message()
    );

    let mut ticker = tokio::time::interval(cfg.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stop_requested = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match supervisor.poll(name) {
                    ScriptStatus::Running => {}
                    ScriptStatus::JustExited => {
                        println!(
                            "{}",
                            StatusReport::Finished { name: name.to_string() }.to_message()
                        );
                        return Ok(());
                    }
                    ScriptStatus::NotTracked => {
                        println!(
                            "{}",
                            StatusReport::NotRunning { name: name.to_string() }.to_message()
                        );
                        return Ok(());
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if !stop_requested => {
                stop_requested = true;
                supervisor.stop(name)?;
                eprintln!("Stop signal sent to '{name}', waiting for exit");
            }
        }
    }
}
