//! Runtime configuration
//!
//! Loaded from a TOML file. Every section and field has a default, so an
//! empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [database]
//! path = "/var/lib/enrol/enrol.db"
//! busy_timeout_ms = 5000
//!
//! [server]
//! bind = "127.0.0.1:7341"
//!
//! [codes]
//! retain_member_plaintext = true
//! suffix_len = 6
//!
//! [join]
//! timeout_ms = 10000
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default port for the join server
pub const DEFAULT_PORT: u16 = 7341;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrolConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub codes: CodeConfig,
    pub join: JoinConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to the platform data directory
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Configured path, or `<data dir>/enrol.db`
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("enrol.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
        }
    }
}

/// Join-code generation and hashing policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Keep member codes re-displayable to staff. When off, member codes are
    /// stored hash-only and can only be reissued by rotation.
    pub retain_member_plaintext: bool,
    /// Random characters appended to member codes
    pub suffix_len: usize,
    /// Random characters in supervisor codes
    pub supervisor_len: usize,
    /// Argon2 memory cost in KiB
    pub hash_memory_kib: u32,
    /// Argon2 passes
    pub hash_iterations: u32,
    /// Argon2 lanes
    pub hash_parallelism: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            retain_member_plaintext: true,
            suffix_len: 6,
            supervisor_len: 12,
            hash_memory_kib: 19 * 1024,
            hash_iterations: 2,
            hash_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Upper bound on one join unit of work
    pub timeout_ms: u64,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl JoinConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EnrolConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.codes.suffix_len < 4 {
            return Err(Error::Config(
                "codes.suffix_len must be at least 4".to_string(),
            ));
        }
        if self.codes.supervisor_len < 8 {
            return Err(Error::Config(
                "codes.supervisor_len must be at least 8".to_string(),
            ));
        }
        if self.join.timeout_ms == 0 {
            return Err(Error::Config("join.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Platform data directory for Enrol
pub fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "onyx", "enrol").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })?;

    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EnrolConfig::from_toml_str("").unwrap();
        assert!(config.codes.retain_member_plaintext);
        assert_eq!(config.codes.suffix_len, 6);
        assert_eq!(config.server.bind.port(), DEFAULT_PORT);
        assert_eq!(config.join.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_config() {
        let config = EnrolConfig::from_toml_str(
            r#"
[database]
path = "/tmp/enrol-test.db"

[codes]
retain_member_plaintext = false
hash_memory_kib = 64
"#,
        )
        .unwrap();

        assert_eq!(
            config.database.resolved_path().unwrap(),
            PathBuf::from("/tmp/enrol-test.db")
        );
        assert!(!config.codes.retain_member_plaintext);
        assert_eq!(config.codes.hash_memory_kib, 64);
        assert_eq!(config.codes.hash_iterations, 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            EnrolConfig::from_toml_str("[codes]\nsuffix_len = 2\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EnrolConfig::from_toml_str("[server]\nbind = \"nonsense\"\n"),
            Err(Error::Config(_))
        ));
    }
}
