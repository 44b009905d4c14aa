//! Application controller.
//!
//! Owns the registry and the process supervisor as one explicit context
//! and serializes every mutation through a single task: UI commands
//! arrive on one channel, the fixed-interval status poll runs in the
//! same select loop, and events flow back to the presentation layer.

use crate::model::{AppConfig, AppEvent, InfoEvent, ScriptDefinition, ScriptStatus, StatusReport};
use crate::registry::Registry;
use crate::supervisor::Supervisor;
use anyhow::{Context, Result};
use time::macros::format_description;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Change which script the status poll follows.
    Select(Option<String>),
    Run(String),
    Stop(String),
    Add(ScriptDefinition),
    Quit,
}

/// Load the registry fail-open: an absent file is a normal first start,
/// anything else is reported and the app continues with an empty list.
fn load_registry(cfg: &AppConfig, event_tx: &UnboundedSender<AppEvent>) -> Registry {
    if !cfg.config_path.exists() {
        return Registry::new();
    }
    match Registry::load(&cfg.config_path) {
        Ok(reg) => {
            let _ = event_tx.send(AppEvent::Info(InfoEvent::ConfigLoaded {
                count: reg.len(),
                path: cfg.config_path.display().to_string(),
            }));
            reg
        }
        Err(e) => {
            let _ = event_tx.send(AppEvent::Info(InfoEvent::ConfigLoadFailed {
                message: format!("{:#}", anyhow::Error::new(e)),
            }));
            Registry::new()
        }
    }
}

/// Poll the selected script (if any) and shape the status line payload.
fn status_report(supervisor: &mut Supervisor, selected: Option<&str>) -> StatusReport {
    let Some(name) = selected else {
        return StatusReport::NotSelected;
    };
    match supervisor.poll(name) {
        ScriptStatus::Running => {
            let fmt = format_description!("[hour]:[minute]:[second]");
            let since = supervisor
                .started_at(name)
                .and_then(|t| t.format(&fmt).ok());
            StatusReport::Running {
                name: name.to_string(),
                since,
            }
        }
        ScriptStatus::JustExited => StatusReport::Finished {
            name: name.to_string(),
        },
        ScriptStatus::NotTracked => StatusReport::NotRunning {
            name: name.to_string(),
        },
    }
}

/// Drive registry and supervisor mutations from UI commands and emit
/// events back to the presentation layer. Returns after `Quit` (or the
/// command channel closing), once the registry has been persisted.
pub(crate) async fn run_controller(
    cfg: &AppConfig,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut registry = load_registry(cfg, &event_tx);
    let mut supervisor = Supervisor::new(cfg.default_interpreter.clone());
    let mut selected: Option<String> = None;

    let _ = event_tx.send(AppEvent::Scripts {
        scripts: registry.scripts().to_vec(),
    });

    let mut ticker = tokio::time::interval(cfg.poll_interval);
    // A missed tick (system sleep, stalled terminal) must not burst-fire polls.
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Select(name)) => {
                        selected = name;
                        // Refresh immediately so a selection change does not
                        // sit on a stale status line until the next tick.
                        let _ = event_tx.send(AppEvent::Status(status_report(
                            &mut supervisor,
                            selected.as_deref(),
                        )));
                    }
                    Some(UiCommand::Run(name)) => {
                        let outcome = match registry.get(&name) {
                            Some(def) => Some(supervisor.start(def)),
                            None => None,
                        };
                        let info = match outcome {
                            Some(Ok(())) => InfoEvent::Launched { name },
                            Some(Err(e)) => InfoEvent::LaunchFailed {
                                name,
                                message: format!("{:#}", anyhow::Error::new(e)),
                            },
                            None => InfoEvent::Message(format!("No script named '{name}'")),
                        };
                        let _ = event_tx.send(AppEvent::Info(info));
                    }
                    Some(UiCommand::Stop(name)) => {
                        let info = match supervisor.stop(&name) {
                            Ok(()) => InfoEvent::StopSent { name },
                            Err(e) => InfoEvent::StopFailed {
                                name,
                                message: format!("{:#}", anyhow::Error::new(e)),
                            },
                        };
                        let _ = event_tx.send(AppEvent::Info(info));
                    }
                    Some(UiCommand::Add(def)) => {
                        let name = def.name.clone();
                        match registry.add(def) {
                            Ok(()) => {
                                let _ = event_tx.send(AppEvent::Info(InfoEvent::ScriptAdded {
                                    name,
                                    count: registry.len(),
                                }));
                                let _ = event_tx.send(AppEvent::Scripts {
                                    scripts: registry.scripts().to_vec(),
                                });
                            }
                            Err(e) => {
                                let _ = event_tx.send(AppEvent::Info(InfoEvent::AddRejected {
                                    message: e.to_string(),
                                }));
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            _ = ticker.tick() => {
                let _ = event_tx.send(AppEvent::Status(status_report(
                    &mut supervisor,
                    selected.as_deref(),
                )));
            }
        }
    }

    registry
        .save(&cfg.config_path)
        .with_context(|| format!("saving {}", cfg.config_path.display()))?;
    let _ = event_tx.send(AppEvent::Info(InfoEvent::Saved {
        path: cfg.config_path.display().to_string(),
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn test_config(dir: &tempfile::TempDir) -> AppConfig {
        AppConfig {
            config_path: dir.path().join("scripts_config.json"),
            default_interpreter: "python3".into(),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn demo_def() -> ScriptDefinition {
        ScriptDefinition {
            name: "demo".into(),
            path: "/scripts/demo.py".into(),
            interpreter: String::new(),
            args: "--fast".into(),
            timeout_secs: 30,
        }
    }

    async fn next_status(rx: &mut UnboundedReceiver<AppEvent>) -> StatusReport {
        loop {
            match rx.recv().await.expect("controller closed the event channel") {
                AppEvent::Status(report) => return report,
                _ => {}
            }
        }
    }

    async fn next_info(rx: &mut UnboundedReceiver<AppEvent>) -> InfoEvent {
        loop {
            match rx.recv().await.expect("controller closed the event channel") {
                AppEvent::Info(info) => return info,
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn add_then_quit_persists_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();

        let run_cfg = cfg.clone();
        let handle =
            tokio::spawn(async move { run_controller(&run_cfg, event_tx, cmd_rx).await });

        cmd_tx.send(UiCommand::Add(demo_def())).unwrap();
        let info = next_info(&mut event_rx).await;
        assert!(matches!(info, InfoEvent::ScriptAdded { count: 1, .. }));

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();

        let reg = Registry::load(&cfg.config_path).unwrap();
        assert_eq!(reg.scripts().to_vec(), vec![demo_def()]);
    }

    #[tokio::test]
    async fn invalid_add_is_rejected_and_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();

        let run_cfg = cfg.clone();
        let handle =
            tokio::spawn(async move { run_controller(&run_cfg, event_tx, cmd_rx).await });

        let mut bad = demo_def();
        bad.name.clear();
        cmd_tx.send(UiCommand::Add(bad)).unwrap();
        let info = next_info(&mut event_rx).await;
        assert!(matches!(info, InfoEvent::AddRejected { .. }));

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();

        let reg = Registry::load(&cfg.config_path).unwrap();
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn status_follows_the_selection() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();

        let run_cfg = cfg.clone();
        let handle =
            tokio::spawn(async move { run_controller(&run_cfg, event_tx, cmd_rx).await });

        // Nothing selected yet: ticks report NotSelected.
        let report = next_status(&mut event_rx).await;
        assert!(matches!(report, StatusReport::NotSelected));

        // Selecting a never-started script reports it as not running.
        cmd_tx
            .send(UiCommand::Select(Some("ghost".into())))
            .unwrap();
        let report = loop {
            match next_status(&mut event_rx).await {
                StatusReport::NotSelected => continue,
                other => break other,
            }
        };
        match report {
            StatusReport::NotRunning { name } => assert_eq!(name, "ghost"),
            other => panic!("unexpected report {other:?}"),
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn running_an_unknown_name_only_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(&dir);
        let (event_tx, mut event_rx) = unbounded_channel();
        let (cmd_tx, cmd_rx) = unbounded_channel();

        let run_cfg = cfg.clone();
        let handle =
            tokio::spawn(async move { run_controller(&run_cfg, event_tx, cmd_rx).await });

        cmd_tx.send(UiCommand::Run("ghost".into())).unwrap();
        let info = next_info(&mut event_rx).await;
        assert_eq!(info.to_message(), "No script named 'ghost'");

        cmd_tx.send(UiCommand::Quit).unwrap();
        handle.await.unwrap().unwrap();
    }
}
