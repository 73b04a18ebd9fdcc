//! Configuration types shared across crates.

use crate::replica::{Replica, ReplicaType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// One externally configured replica.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicaConfig {
    /// Stable identifier (e.g. "ONE").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Replica kind.
    #[serde(rename = "type")]
    pub replica_type: ReplicaType,
}

impl From<&ReplicaConfig> for Replica {
    fn from(cfg: &ReplicaConfig) -> Self {
        Replica::new(cfg.id.clone(), cfg.name.clone(), cfg.replica_type)
    }
}

/// Backing store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// SQLite database (single writer; small deployments and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer BITPRES_STORE__PASSWORD over storing it in the config file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
    },
    /// Flat-file registry (degraded mode, no relational store).
    File {
        /// Directory holding the registry file and its backups.
        dir: PathBuf,
    },
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/bitpres.db"),
        }
    }
}

impl StoreConfig {
    /// Validate store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Sqlite { path } if path.as_os_str().is_empty() => {
                Err("sqlite store requires a non-empty 'path'".to_string())
            }
            StoreConfig::File { dir } if dir.as_os_str().is_empty() => {
                Err("file store requires a non-empty 'dir'".to_string())
            }
            StoreConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres store requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => Err(
                    "postgres store requires 'database' when using individual fields".to_string(),
                ),
            },
            _ => Ok(()),
        }
    }

    /// Whether this selects a relational backend.
    pub fn is_relational(&self) -> bool {
        !matches!(self, StoreConfig::File { .. })
    }
}

/// Connection pool and retry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Attempts made to obtain a connection before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Maximum pooled connections. SQLite always uses one.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_max_connections() -> u32 {
    10
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("reconnect.max_attempts must be at least 1".to_string());
        }
        if self.max_connections == 0 {
            return Err("reconnect.max_connections must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// The fixed replica set. The store must contain exactly these.
    pub replicas: Vec<ReplicaConfig>,
    /// Backing store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Connection retry discipline.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl AppConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        validate_replicas(&self.replicas)?;
        self.store.validate()?;
        self.reconnect.validate()
    }

    /// Configured replicas as domain values.
    pub fn replica_set(&self) -> Vec<Replica> {
        self.replicas.iter().map(Replica::from).collect()
    }

    /// Create a test configuration with three replicas and a SQLite store.
    ///
    /// **For testing only.**
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            replicas: vec![
                ReplicaConfig {
                    id: "ONE".to_string(),
                    name: "ReplicaOne".to_string(),
                    replica_type: ReplicaType::Bitarchive,
                },
                ReplicaConfig {
                    id: "TWO".to_string(),
                    name: "ReplicaTwo".to_string(),
                    replica_type: ReplicaType::Bitarchive,
                },
                ReplicaConfig {
                    id: "CS".to_string(),
                    name: "ChecksumReplica".to_string(),
                    replica_type: ReplicaType::Checksum,
                },
            ],
            store: StoreConfig::Sqlite { path: path.into() },
            reconnect: ReconnectConfig {
                max_attempts: 2,
                delay_ms: 1,
                max_connections: 1,
            },
        }
    }
}

fn validate_replicas(replicas: &[ReplicaConfig]) -> Result<(), String> {
    if replicas.is_empty() {
        return Err("at least one replica must be configured".to_string());
    }
    let mut seen = HashSet::new();
    for replica in replicas {
        if replica.id.trim().is_empty() {
            return Err("replica id must not be empty".to_string());
        }
        if replica.name.trim().is_empty() {
            return Err(format!("replica '{}' has an empty name", replica.id));
        }
        if !seen.insert(replica.id.as_str()) {
            return Err(format!("replica id '{}' is configured twice", replica.id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_defaults() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize_store_variants() {
        let json = r#"{"type": "postgres", "url": "postgres://localhost/bitpres"}"#;
        let store: StoreConfig = serde_json::from_str(json).unwrap();
        assert!(store.is_relational());
        assert!(store.validate().is_ok());

        let json = r#"{"type": "file", "dir": "/var/lib/bitpres"}"#;
        let store: StoreConfig = serde_json::from_str(json).unwrap();
        assert!(!store.is_relational());
    }

    #[test]
    fn test_postgres_requires_database() {
        let store = StoreConfig::Postgres {
            url: None,
            host: Some("db".to_string()),
            port: None,
            username: None,
            password: None,
            database: None,
        };
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_duplicate_replica_rejected() {
        let mut config = AppConfig::for_testing("/tmp/x.db");
        assert!(config.validate().is_ok());
        config.replicas.push(config.replicas[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.contains("ONE"));
    }

    #[test]
    fn test_app_config_defaults_sections() {
        let json = r#"{"replicas": [{"id": "A", "name": "Alpha", "type": "bitarchive"}]}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.store, StoreConfig::Sqlite { .. }));
        assert_eq!(config.reconnect.max_connections, 10);
        assert_eq!(config.replica_set()[0].replica_type, ReplicaType::Bitarchive);
    }
}
