//! Configuration file handling.
//!
//! `.agql_store.json` in the current directory selects the database and
//! the store options. Every section is optional; a missing file means
//! defaults everywhere.
//!
//! ```json
//! {
//!   "database": { "type": "sqlite", "path": "./store.sqlite" },
//!   "store": {
//!     "default_corpus": "demo",
//!     "censorship": { "layer": "topic", "pattern": "private.*" }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cli::resolve_db_path;
use crate::db::{open_db, open_mem_db, Database};
use crate::store::StoreConfig;

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE: &str = ".agql_store.json";

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: Option<DatabaseConfigFile>,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Database backends.
///
/// JSON format uses a "type" field with lowercase variant names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfigFile {
    /// SQLite file
    Sqlite { path: PathBuf },
    /// Private in-memory database, discarded on exit
    #[serde(rename = "memory")]
    Mem,
}

impl ConfigFile {
    /// Load `.agql_store.json` from the current directory, or defaults if
    /// there is none.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load a configuration file, or defaults if `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not
    /// valid JSON for this structure.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        let config: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            format!(
                "Invalid JSON in {}: {}\n\n\
                 Expected for example:\n\
                 {{\n  \
                   \"database\": {{ \"type\": \"sqlite\", \"path\": \"./store.sqlite\" }},\n  \
                   \"store\": {{ \"default_corpus\": \"demo\" }}\n\
                 }}\n",
                path.display(),
                e
            )
        })?;

        if let Some(censorship) = &config.store.censorship {
            censorship
                .compile()
                .map_err(|e| format!("Invalid censorship pattern in {}: {}", path.display(), e))?;
        }

        Ok(config)
    }

    /// Open the database: an explicit `--db` path wins over the
    /// configured backend, which wins over the default locations.
    pub fn open_database(
        &self,
        explicit: Option<PathBuf>,
    ) -> Result<Box<dyn Database>, Box<dyn Error>> {
        let path = match (explicit, &self.database) {
            (Some(path), _) => path,
            (None, Some(DatabaseConfigFile::Mem)) => return Ok(open_mem_db()?),
            (None, Some(DatabaseConfigFile::Sqlite { path })) => path.clone(),
            (None, None) => resolve_db_path(None),
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(open_db(&path)?)
    }
}
