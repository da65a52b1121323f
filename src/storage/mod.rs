//! Durable state: variables, selected choices and visited nodes
//!
//! The engine talks to a [`Persistence`] facade over any [`KeyValueStore`].
//! Storage is best effort: read failures fall back to defaults and write
//! failures are logged and dropped, so playback never stops because of it.

use crate::error::PersistenceError;
use crate::types::value::{Value, Variables};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Default prefix for every persisted key
pub const DEFAULT_PREFIX: &str = "tvn:";

const VARIABLES_KEY: &str = "variables";
const SELECTED_CHOICES_KEY: &str = "selected_choices";
const VISITED_KEY: &str = "visited:";

/// String key-value store backing [`Persistence`]
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistenceError>;
    fn keys(&self) -> Result<Vec<String>, PersistenceError>;
}

/// Volatile store, the default when no save file is configured
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Single JSON object file, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open a save file. A missing file starts empty; a corrupt one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(json) if json.trim().is_empty() => BTreeMap::new(),
            Ok(json) => serde_json::from_str(&json)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json).map_err(|source| PersistenceError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistenceError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Store that refuses every operation, e.g. when the host forbids storage
#[derive(Debug, Clone, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn error() -> PersistenceError {
        PersistenceError::Unavailable {
            reason: "storage is disabled".to_string(),
        }
    }
}

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
        Err(Self::error())
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
        Err(Self::error())
    }

    fn remove(&mut self, _key: &str) -> Result<(), PersistenceError> {
        Err(Self::error())
    }

    fn keys(&self) -> Result<Vec<String>, PersistenceError> {
        Err(Self::error())
    }
}

/// Everything restored at engine start
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded {
    pub variables: Variables,
    pub selected_choices: BTreeSet<String>,
    pub visited_nodes: BTreeSet<String>,
}

/// Typed access to the persisted engine state
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Restore persisted state on top of `defaults`
    pub fn load(&self, defaults: &Variables) -> Loaded {
        let mut variables = defaults.clone();
        variables.extend(self.load_variables());

        Loaded {
            variables,
            selected_choices: self.load_selected_choices(),
            visited_nodes: self.load_visited_nodes(),
        }
    }

    fn read(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        match self.store.get(&key) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("failed to read '{}': {}", key, err);
                None
            }
        }
    }

    fn load_variables(&self) -> Variables {
        let Some(json) = self.read(VARIABLES_KEY) else {
            return Variables::new();
        };
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&json) {
            // Non-scalar entries are dropped individually
            Ok(map) => map
                .into_iter()
                .filter_map(|(name, value)| Value::from_json(value).map(|value| (name, value)))
                .collect(),
            Err(err) => {
                log::warn!("stored variables are corrupt, using defaults: {}", err);
                Variables::new()
            }
        }
    }

    fn load_selected_choices(&self) -> BTreeSet<String> {
        let Some(json) = self.read(SELECTED_CHOICES_KEY) else {
            return BTreeSet::new();
        };
        serde_json::from_str(&json).unwrap_or_else(|err| {
            log::warn!("stored choices are corrupt, starting empty: {}", err);
            BTreeSet::new()
        })
    }

    fn load_visited_nodes(&self) -> BTreeSet<String> {
        let visited_prefix = self.key(VISITED_KEY);
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                log::warn!("failed to list stored keys: {}", err);
                return BTreeSet::new();
            }
        };

        keys.iter()
            .filter_map(|key| key.strip_prefix(&visited_prefix))
            .filter(|node| self.read(&format!("{VISITED_KEY}{node}")).as_deref() == Some("true"))
            .map(str::to_string)
            .collect()
    }

    fn write(&mut self, name: &str, value: &str) {
        let key = self.key(name);
        if let Err(err) = self.store.set(&key, value) {
            log::warn!("failed to persist '{}': {}", key, err);
        }
    }

    pub fn save(&mut self, variables: &Variables) {
        match serde_json::to_string(variables) {
            Ok(json) => self.write(VARIABLES_KEY, &json),
            Err(err) => log::warn!("failed to serialize variables: {}", err),
        }
    }

    pub fn save_selected_choices(&mut self, selected: &BTreeSet<String>) {
        match serde_json::to_string(selected) {
            Ok(json) => self.write(SELECTED_CHOICES_KEY, &json),
            Err(err) => log::warn!("failed to serialize selected choices: {}", err),
        }
    }

    pub fn mark_node_visited(&mut self, node: &str) {
        self.write(&format!("{VISITED_KEY}{node}"), "true");
    }

    /// Forget every key under this prefix
    pub fn clear(&mut self) {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                log::warn!("failed to list stored keys: {}", err);
                return;
            }
        };
        let owned: Vec<String> = keys
            .into_iter()
            .filter(|key| key.starts_with(&self.prefix))
            .collect();
        for key in &owned {
            if let Err(err) = self.store.remove(key) {
                log::warn!("failed to remove '{}': {}", key, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Variables {
        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(10.0));
        vars.insert("name".to_string(), Value::from("Vessel"));
        vars
    }

    #[test]
    fn load_from_empty_store_returns_defaults() {
        let persistence = Persistence::new(MemoryStore::new(), DEFAULT_PREFIX);
        let loaded = persistence.load(&defaults());
        assert_eq!(loaded.variables, defaults());
        assert!(loaded.selected_choices.is_empty());
        assert!(loaded.visited_nodes.is_empty());
    }

    #[test]
    fn saved_state_is_restored_over_defaults() {
        let mut persistence = Persistence::new(MemoryStore::new(), DEFAULT_PREFIX);

        let mut vars = Variables::new();
        vars.insert("hp".to_string(), Value::Num(4.0));
        vars.insert("awake".to_string(), Value::Bool(true));
        persistence.save(&vars);
        persistence.save_selected_choices(&BTreeSet::from(["look around".to_string()]));
        persistence.mark_node_visited("start");
        persistence.mark_node_visited("cellar");

        let loaded = persistence.load(&defaults());
        assert_eq!(loaded.variables.get("hp"), Some(&Value::Num(4.0)));
        assert_eq!(loaded.variables.get("name"), Some(&Value::from("Vessel")));
        assert_eq!(loaded.variables.get("awake"), Some(&Value::Bool(true)));
        assert!(loaded.selected_choices.contains("look around"));
        assert_eq!(
            loaded.visited_nodes,
            BTreeSet::from(["cellar".to_string(), "start".to_string()])
        );
    }

    #[test]
    fn keys_follow_the_prefixed_layout() {
        let mut persistence = Persistence::new(MemoryStore::new(), "vn:");
        persistence.save(&defaults());
        persistence.mark_node_visited("attic");

        let store = persistence.store();
        assert_eq!(
            store.get("vn:variables").unwrap().as_deref(),
            Some(r#"{"hp":10.0,"name":"Vessel"}"#)
        );
        assert_eq!(store.get("vn:visited:attic").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn corrupt_entries_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set("tvn:variables", "{not json").unwrap();
        store.set("tvn:selected_choices", "42").unwrap();
        store.set("tvn:visited:start", "maybe").unwrap();

        let loaded = Persistence::new(store, DEFAULT_PREFIX).load(&defaults());
        assert_eq!(loaded.variables, defaults());
        assert!(loaded.selected_choices.is_empty());
        assert!(loaded.visited_nodes.is_empty());
    }

    #[test]
    fn unavailable_store_degrades_silently() {
        let mut persistence = Persistence::new(UnavailableStore, DEFAULT_PREFIX);
        persistence.save(&defaults());
        persistence.mark_node_visited("start");
        persistence.clear();

        let loaded = persistence.load(&defaults());
        assert_eq!(loaded.variables, defaults());
        assert!(loaded.visited_nodes.is_empty());
    }

    #[test]
    fn clear_only_touches_own_prefix() {
        let mut store = MemoryStore::new();
        store.set("other:keep", "1").unwrap();
        let mut persistence = Persistence::new(store, DEFAULT_PREFIX);
        persistence.save(&defaults());
        persistence.mark_node_visited("start");

        persistence.clear();
        assert_eq!(persistence.store().keys().unwrap(), vec!["other:keep".to_string()]);
    }

    #[test]
    fn json_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");

        {
            let mut persistence =
                Persistence::new(JsonFileStore::open(&path).unwrap(), DEFAULT_PREFIX);
            persistence.save(&defaults());
            persistence.mark_node_visited("start");
        }

        let persistence = Persistence::new(JsonFileStore::open(&path).unwrap(), DEFAULT_PREFIX);
        let loaded = persistence.load(&Variables::new());
        assert_eq!(loaded.variables, defaults());
        assert!(loaded.visited_nodes.contains("start"));
    }

    #[test]
    fn json_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(PersistenceError::Serialization(_))
        ));
    }
}
