//! Script registry persistence.
//!
//! The registry is an ordered list of script definitions loaded from and
//! saved to a pretty-printed JSON array on disk. Loading is fail-open at
//! the call sites: a missing or corrupt file is reported and the app
//! continues with an empty list.

use crate::error::RegistryError;
use crate::model::ScriptDefinition;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the persisted script list.
pub const CONFIG_FILE: &str = "scripts_config.json";

/// Default config file location under the per-application data directory.
pub fn default_config_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("script-runner-cli")
        .join(CONFIG_FILE)
}

/// Ordered list of script definitions. Insertion order is display order.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    scripts: Vec<ScriptDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a registry from `path`. Missing and corrupt files are errors
    /// here; callers downgrade them to a warning and start empty.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let scripts = serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { scripts })
    }

    /// Overwrite `path` with the current list as a pretty-printed JSON
    /// array, creating the parent directory if needed. Not atomic: a
    /// crash mid-write can leave a truncated file.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| RegistryError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.scripts)
            .map_err(|source| RegistryError::Serialize { source })?;
        fs::write(path, raw).map_err(|source| RegistryError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Append a definition after checking the required fields. Name
    /// uniqueness is not enforced; duplicates append.
    pub fn add(&mut self, def: ScriptDefinition) -> Result<(), RegistryError> {
        if def.name.is_empty() {
            return Err(RegistryError::Validation { field: "name" });
        }
        if def.path.is_empty() {
            return Err(RegistryError::Validation { field: "path" });
        }
        self.scripts.push(def);
        Ok(())
    }

    /// First definition registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ScriptDefinition> {
        self.scripts.iter().find(|s| s.name == name)
    }

    pub fn scripts(&self) -> &[ScriptDefinition] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, path: &str) -> ScriptDefinition {
        ScriptDefinition {
            name: name.into(),
            path: path.into(),
            interpreter: String::new(),
            args: String::new(),
            timeout_secs: 60,
        }
    }

    #[test]
    fn add_rejects_empty_name_without_mutating() {
        let mut reg = Registry::new();
        let err = reg.add(def("", "/a.py")).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation { field: "name" }
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn add_rejects_empty_path_without_mutating() {
        let mut reg = Registry::new();
        let err = reg.add(def("a", "")).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation { field: "path" }
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_names_are_appended() {
        let mut reg = Registry::new();
        reg.add(def("a", "/a.py")).unwrap();
        reg.add(def("a", "/other.py")).unwrap();
        assert_eq!(reg.len(), 2);
        // Lookup returns the first registered definition.
        assert_eq!(reg.get("a").unwrap().path, "/a.py");
    }

    #[test]
    fn save_then_load_round_trips_fields_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut reg = Registry::new();
        reg.add(ScriptDefinition {
            name: "demo".into(),
            path: "/scripts/demo.py".into(),
            interpreter: "/venv/bin/python".into(),
            args: "--fast --retries 3".into(),
            timeout_secs: 30,
        })
        .unwrap();
        reg.add(def("second", "/b.py")).unwrap();
        reg.save(&path).unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded.scripts(), reg.scripts());

        // The file itself uses the persisted key names.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"venv\""));
        assert!(raw.contains("\"timeout\""));
    }

    #[test]
    fn save_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app").join(CONFIG_FILE);
        Registry::new().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Registry::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }

    #[test]
    fn load_corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let err = Registry::load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }
}
