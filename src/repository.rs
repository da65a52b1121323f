//! Script loading from a directory of `.vn` files

use crate::error::ScriptError;
use crate::parser;
use crate::types::script::Script;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// File extension of script files
pub const SCRIPT_EXTENSION: &str = "vn";

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Script not found: {name}")]
    NotFound { name: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Invalid script '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: ScriptError,
    },
}

/// Source of named scripts
#[async_trait]
pub trait ScriptRepository: Send + Sync {
    /// Raw script text
    async fn load_source(&self, name: &str) -> Result<String, RepositoryError>;

    /// Names of all available scripts, sorted
    async fn list_scripts(&self) -> Result<Vec<String>, RepositoryError>;

    /// Load and parse a script
    async fn load_script(&self, name: &str) -> Result<Script, RepositoryError> {
        let source = self.load_source(name).await?;
        parser::parse(&source).map_err(|source| RepositoryError::Invalid {
            name: name.to_string(),
            source,
        })
    }

    async fn script_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.list_scripts().await?.iter().any(|n| n == name))
    }
}

/// Reads `<dir>/<name>.vn`
pub struct FileSystemScriptRepository {
    base_path: PathBuf,
}

impl FileSystemScriptRepository {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn script_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{name}.{SCRIPT_EXTENSION}"))
    }
}

#[async_trait]
impl ScriptRepository for FileSystemScriptRepository {
    async fn load_source(&self, name: &str) -> Result<String, RepositoryError> {
        let path = self.script_path(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepositoryError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(RepositoryError::Io {
                message: format!("Failed to read script file {}: {}", path.display(), e),
            }),
        }
    }

    async fn list_scripts(&self) -> Result<Vec<String>, RepositoryError> {
        let mut scripts = Vec::new();

        let mut entries =
            tokio::fs::read_dir(&self.base_path)
                .await
                .map_err(|e| RepositoryError::Io {
                    message: format!(
                        "Failed to read directory {}: {}",
                        self.base_path.display(),
                        e
                    ),
                })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| RepositoryError::Io {
            message: format!("Failed to read directory entry: {e}"),
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(SCRIPT_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                scripts.push(stem.to_string());
            }
        }

        scripts.sort();
        Ok(scripts)
    }

    async fn script_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(tokio::fs::try_exists(self.script_path(name))
            .await
            .unwrap_or(false))
    }
}

/// In-memory implementation for testing
#[derive(Debug, Default)]
pub struct InMemoryScriptRepository {
    scripts: BTreeMap<String, String>,
}

impl InMemoryScriptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_script(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.scripts.insert(name.into(), source.into());
    }
}

#[async_trait]
impl ScriptRepository for InMemoryScriptRepository {
    async fn load_source(&self, name: &str) -> Result<String, RepositoryError> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    async fn list_scripts(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.scripts.keys().cloned().collect())
    }
}
