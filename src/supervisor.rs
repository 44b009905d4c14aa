//! Child process supervision.
//!
//! Tracks at most one live child process per script name and exposes the
//! start/stop/poll operations the status refresh loop is built on. The
//! supervisor never blocks waiting on a child; liveness is only observed
//! through non-blocking polls.

use crate::error::SupervisorError;
use crate::model::{ScriptDefinition, ScriptStatus};
use std::collections::HashMap;
use std::process::Stdio;
use time::OffsetDateTime;
use tokio::process::{Child, Command};

/// Live reference to a spawned child process.
struct ProcessHandle {
    child: Child,
    started_at: OffsetDateTime,
}

pub struct Supervisor {
    default_interpreter: String,
    handles: HashMap<String, ProcessHandle>,
}

impl Supervisor {
    pub fn new(default_interpreter: impl Into<String>) -> Self {
        Self {
            default_interpreter: default_interpreter.into(),
            handles: HashMap::new(),
        }
    }

    /// Build the launch command: `[interpreter, path, ...args]`. No shell
    /// is involved, so the argument tokens reach the script verbatim.
    fn build_command(&self, def: &ScriptDefinition) -> Command {
        let mut cmd = Command::new(def.interpreter_or(&self.default_interpreter));
        cmd.arg(&def.path);
        cmd.args(def.split_args());
        // Output streams are piped but never read; stdin is closed so a
        // script cannot contend with the UI for terminal input.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW: no console window for the child.
            cmd.creation_flags(0x0800_0000);
        }
        cmd
    }

    /// Spawn `def` and track the handle under its name.
    ///
    /// Fails with `AlreadyRunning` while a live process is tracked for
    /// that name; a tracked-but-exited handle is replaced.
    pub fn start(&mut self, def: &ScriptDefinition) -> Result<(), SupervisorError> {
        if let Some(handle) = self.handles.get_mut(&def.name) {
            match handle.child.try_wait() {
                Ok(Some(_)) => {
                    self.handles.remove(&def.name);
                }
                _ => {
                    return Err(SupervisorError::AlreadyRunning {
                        name: def.name.clone(),
                    });
                }
            }
        }

        let child = self
            .build_command(def)
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                name: def.name.clone(),
                source,
            })?;

        let started_at =
            OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.handles.insert(
            def.name.clone(),
            ProcessHandle { child, started_at },
        );
        Ok(())
    }

    /// Send the kill signal to the tracked process for `name`.
    ///
    /// Best-effort: does not wait for exit, does not escalate, and does
    /// not remove the handle. Removal happens on the next poll that
    /// observes the exit.
    pub fn stop(&mut self, name: &str) -> Result<(), SupervisorError> {
        match self.handles.get_mut(name) {
            Some(handle) => {
                // start_kill errors when the child already exited; the
                // next poll reaps the entry either way.
                let _ = handle.child.start_kill();
                Ok(())
            }
            None => Err(SupervisorError::NotRunning {
                name: name.to_string(),
            }),
        }
    }

    /// Non-blocking check of the tracked process for `name`. The poll
    /// that observes the exit removes the handle, so `JustExited` is
    /// reported at most once per run.
    pub fn poll(&mut self, name: &str) -> ScriptStatus {
        let Some(handle) = self.handles.get_mut(name) else {
            return ScriptStatus::NotTracked;
        };
        match handle.child.try_wait() {
            Ok(Some(_status)) => {
                self.handles.remove(name);
                ScriptStatus::JustExited
            }
            // Err means the child was not reapable on this tick; report
            // it as running and let a later poll settle it.
            Ok(None) | Err(_) => ScriptStatus::Running,
        }
    }

    /// Launch time of the tracked process for `name`, if any.
    pub fn started_at(&self, name: &str) -> Option<OffsetDateTime> {
        self.handles.get(name).map(|h| h.started_at)
    }

    /// Number of tracked handles (live or not yet reaped).
    pub fn tracked(&self) -> usize {
        self.handles.len()
    }
}
