use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings distilled from the CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub default_interpreter: String,
    pub poll_interval: Duration,
}

/// Lower bound for a stored timeout value, in seconds.
pub const TIMEOUT_MIN: u32 = 1;
/// Upper bound for a stored timeout value, in seconds.
pub const TIMEOUT_MAX: u32 = 3600;

fn default_timeout() -> u32 {
    60
}

/// A persisted record describing how to launch one user script.
///
/// On disk the interpreter override is stored under the legacy `venv`
/// key and the timeout under `timeout`, so existing config files keep
/// loading unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDefinition {
    pub name: String,
    pub path: String,
    #[serde(default, rename = "venv")]
    pub interpreter: String,
    #[serde(default)]
    pub args: String,
    #[serde(default = "default_timeout", rename = "timeout")]
    pub timeout_secs: u32,
}

impl ScriptDefinition {
    /// Interpreter to launch with, falling back to `default` when no
    /// per-script override is set.
    pub fn interpreter_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.interpreter.is_empty() {
            default
        } else {
            &self.interpreter
        }
    }

    /// Whitespace-split argument tokens. No shell interpretation and no
    /// quoting support: an argument containing spaces cannot be expressed.
    pub fn split_args(&self) -> impl Iterator<Item = &str> {
        self.args.split_whitespace()
    }
}

/// Result of a non-blocking liveness check for one script name.
///
/// `JustExited` is observed exactly once: the poll that sees the exit
/// also drops the handle, so the next poll reports `NotTracked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    NotTracked,
    Running,
    JustExited,
}

/// Status of the currently selected script, emitted on every refresh tick.
#[derive(Debug, Clone)]
pub enum StatusReport {
    NotSelected,
    Running { name: String, since: Option<String> },
    Finished { name: String },
    NotRunning { name: String },
}

impl StatusReport {
    /// Render the human-readable status line.
    pub fn to_message(&self) -> String {
        match self {
            StatusReport::NotSelected => "Not selected".to_string(),
            StatusReport::Running { name, .. } => format!("Running ({name})"),
            StatusReport::Finished { name } => format!("Finished ({name})"),
            StatusReport::NotRunning { name } => format!("Not running ({name})"),
        }
    }
}

/// Events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Registry snapshot for display; sent at startup and after every add.
    Scripts { scripts: Vec<ScriptDefinition> },
    /// Fixed-interval status of the currently selected script.
    Status(StatusReport),
    Info(InfoEvent),
}

/// Structured info events rendered into the info line or to stderr.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    Launched { name: String },
    LaunchFailed { name: String, message: String },
    StopSent { name: String },
    StopFailed { name: String, message: String },
    ScriptAdded { name: String, count: usize },
    AddRejected { message: String },
    ConfigLoaded { count: usize, path: String },
    ConfigLoadFailed { message: String },
    Saved { path: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Launched { name } => format!("Launched '{name}'"),
            InfoEvent::LaunchFailed { name, message } => {
                format!("Launch of '{name}' failed: {message}")
            }
            InfoEvent::StopSent { name } => format!("Stop signal sent to '{name}'"),
            InfoEvent::StopFailed { name, message } => {
                format!("Stop of '{name}' failed: {message}")
            }
            InfoEvent::ScriptAdded { name, count } => {
                format!("Added '{name}' ({count} script(s) total)")
            }
            InfoEvent::AddRejected { message } => format!("Not added: {message}"),
            InfoEvent::ConfigLoaded { count, path } => {
                format!("Loaded {count} script(s) from {path}")
            }
            InfoEvent::ConfigLoadFailed { message } => {
                format!("Config load failed, starting with an empty list: {message}")
            }
            InfoEvent::Saved { path } => format!("Saved: {path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> ScriptDefinition {
        ScriptDefinition {
            name: "demo".into(),
            path: "/scripts/demo.py".into(),
            interpreter: String::new(),
            args: "--fast".into(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn persisted_field_names_match_config_format() {
        let json = serde_json::to_value(demo()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("venv"));
        assert!(obj.contains_key("timeout"));
        assert!(!obj.contains_key("interpreter"));
        assert!(!obj.contains_key("timeout_secs"));
    }

    #[test]
    fn missing_optional_fields_get_defaults() {
        let def: ScriptDefinition =
            serde_json::from_str(r#"{"name":"a","path":"/a.py"}"#).unwrap();
        assert_eq!(def.interpreter, "");
        assert_eq!(def.args, "");
        assert_eq!(def.timeout_secs, 60);
    }

    #[test]
    fn interpreter_falls_back_to_default() {
        let mut def = demo();
        assert_eq!(def.interpreter_or("python3"), "python3");
        def.interpreter = "/venv/bin/python".into();
        assert_eq!(def.interpreter_or("python3"), "/venv/bin/python");
    }

    #[test]
    fn args_split_on_whitespace_only() {
        let mut def = demo();
        def.args = "  --fast   --out \"a b\" ".into();
        let toks: Vec<&str> = def.split_args().collect();
        // Quotes are not interpreted; they travel with the token.
        assert_eq!(toks, vec!["--fast", "--out", "\"a", "b\""]);
    }

    #[test]
    fn status_line_wording() {
        assert_eq!(StatusReport::NotSelected.to_message(), "Not selected");
        assert_eq!(
            StatusReport::Running {
                name: "demo".into(),
                since: None
            }
            .to_message(),
            "Running (demo)"
        );
        assert_eq!(
            StatusReport::Finished {
                name: "demo".into()
            }
            .to_message(),
            "Finished (demo)"
        );
        assert_eq!(
            StatusReport::NotRunning {
                name: "demo".into()
            }
            .to_message(),
            "Not running (demo)"
        );
    }
}
