//! Application state: configuration, database and hashing, built once at startup

use std::path::{Path, PathBuf};

use enrol_core::config::data_dir;
use enrol_core::{CodeHasher, Database, EnrolConfig, JoinCodeRegistry, Result, SchemaCapabilities};
use enrol_net::ServerContext;
use tracing::info;

/// Config file looked up in the data directory when none is given
const DEFAULT_CONFIG_FILE: &str = "enrol.toml";

/// Load configuration from `path`, or from the data directory if a file is
/// there, or fall back to defaults
pub fn load_config(path: Option<&Path>) -> Result<EnrolConfig> {
    if let Some(path) = path {
        info!(path = %path.display(), "Loading configuration");
        return EnrolConfig::load(path);
    }

    let fallback = data_dir()?.join(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        info!(path = %fallback.display(), "Loading configuration");
        EnrolConfig::load(&fallback)
    } else {
        Ok(EnrolConfig::default())
    }
}

/// Main application state
pub struct AppState {
    pub config: EnrolConfig,
    pub db_path: PathBuf,
    pub db: Database,
    pub caps: SchemaCapabilities,
    pub hasher: CodeHasher,
}

impl AppState {
    pub fn new(config: EnrolConfig) -> Result<Self> {
        let db_path = config.database.resolved_path()?;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        let caps = db.capabilities()?;
        let hasher = CodeHasher::new(&config.codes)?;

        info!(
            path = %db_path.display(),
            schema_version = db.schema_version(),
            ?caps,
            "Database ready"
        );

        Ok(Self {
            config,
            db_path,
            db,
            caps,
            hasher,
        })
    }

    pub fn registry(&self) -> JoinCodeRegistry<'_> {
        JoinCodeRegistry::new(&self.db, &self.hasher, &self.config.codes)
    }

    pub fn server_context(&self) -> ServerContext {
        ServerContext {
            db_path: self.db_path.clone(),
            busy_timeout: self.config.database.busy_timeout(),
            caps: self.caps,
            join_timeout: self.config.join.timeout(),
        }
    }
}
