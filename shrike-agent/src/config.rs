//! Configuration management for the sync agent.
//!
//! Loads configuration from a TOML file with environment variable overrides
//! (`SHRIKE__SECTION__KEY`, e.g. `SHRIKE__AGENT__PORT=7100`).

use crate::models::Destination;
use crate::utils::errors::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const TOKEN_FILE: &str = "webhook-token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub agent: AgentConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Listen address, must be loopback
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// Trigger service port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Working directory for manifests and generated state
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared bearer token; generated into data_dir when empty
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// rsync binary
    #[serde(default = "default_tool")]
    pub tool: PathBuf,

    /// Cloud storage mount point
    pub mount_root: PathBuf,

    /// Folder created under the mount root
    #[serde(default = "default_backup_dir_name")]
    pub backup_dir_name: String,

    /// Explicit per-device folder
    #[serde(default)]
    pub device_subfolder: Option<String>,

    /// Use the host name as device folder when none is configured
    #[serde(default)]
    pub per_device: bool,

    /// Kill rsync after this many seconds (unset = wait forever)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Entry list file (default: <data_dir>/entries.json)
    #[serde(default)]
    pub entries_file: Option<PathBuf>,
}

// Default values
fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    7022
}

fn default_tool() -> PathBuf {
    PathBuf::from("rsync")
}

fn default_backup_dir_name() -> String {
    "ShrikeBackup".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

impl Default for Config {
    fn default() -> Self {
        let home = home_dir();
        Config {
            agent: AgentConfig {
                bind: default_bind(),
                port: default_port(),
                data_dir: home.join(".shrike"),
            },
            auth: AuthConfig {
                token: String::new(),
            },
            sync: SyncConfig {
                tool: default_tool(),
                mount_root: home.join("GoogleDrive"),
                backup_dir_name: default_backup_dir_name(),
                device_subfolder: None,
                per_device: false,
                timeout_secs: None,
            },
            log: LogConfig {
                level: default_log_level(),
            },
            store: StoreConfig { entries_file: None },
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `SHRIKE__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default()).map_err(config_error)?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SHRIKE")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.agent.bind.is_loopback() {
            return Err(SyncError::Config(format!(
                "bind address {} is not a loopback address",
                self.agent.bind
            )));
        }
        if !self.sync.mount_root.is_absolute() {
            return Err(SyncError::Config(format!(
                "mount_root must be absolute: {}",
                self.sync.mount_root.display()
            )));
        }
        if self.sync.backup_dir_name.trim().is_empty() {
            return Err(SyncError::Config("backup_dir_name must not be empty".into()));
        }
        if self.sync.timeout_secs == Some(0) {
            return Err(SyncError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Effective configuration rendered back as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.agent.bind, self.agent.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.sync.timeout_secs.map(Duration::from_secs)
    }

    pub fn entries_file(&self) -> PathBuf {
        self.store
            .entries_file
            .clone()
            .unwrap_or_else(|| self.agent.data_dir.join("entries.json"))
    }

    pub fn destination(&self) -> Destination {
        let dest = Destination::new(&self.sync.mount_root, &self.sync.backup_dir_name);
        let device = self.sync.device_subfolder.clone().or_else(|| {
            self.sync
                .per_device
                .then(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
                .flatten()
        });
        match device {
            Some(device) => dest.with_device(device),
            None => dest,
        }
    }

    /// Fill in `auth.token` from `<data_dir>/webhook-token`, creating it on first run.
    pub fn ensure_token(&mut self) -> Result<()> {
        if !self.auth.token.is_empty() {
            return Ok(());
        }

        let path = self.agent.data_dir.join(TOKEN_FILE);
        match std::fs::read_to_string(&path) {
            Ok(token) if !token.trim().is_empty() => {
                self.auth.token = token.trim().to_string();
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        std::fs::create_dir_all(&self.agent.data_dir)?;
        let token = uuid::Uuid::new_v4().to_string();
        write_private(&path, &token)?;
        info!("Generated webhook token in {}", path.display());
        self.auth.token = token;
        Ok(())
    }
}

fn write_private(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn config_error(e: config::ConfigError) -> SyncError {
    SyncError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_toml(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("shrike.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_loopback() {
        let config = Config::default();
        assert!(config.agent.bind.is_loopback());
        assert_eq!(config.agent.port, 7022);
        assert_eq!(config.sync.backup_dir_name, "ShrikeBackup");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_toml(
            &dir,
            r#"
[agent]
port = 8123
data_dir = "/var/lib/shrike"

[auth]
token = "secret-123"

[sync]
mount_root = "/mnt/gdrive"
device_subfolder = "laptop"
timeout_secs = 600
"#,
        );

        let config = Config::load_with_env(Some(&path), Some(HashMap::new())).unwrap();
        assert_eq!(config.agent.port, 8123);
        assert_eq!(config.auth.token, "secret-123");
        assert_eq!(config.timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.entries_file(), PathBuf::from("/var/lib/shrike/entries.json"));
        assert_eq!(
            config.destination().resolve(),
            PathBuf::from("/mnt/gdrive/ShrikeBackup/laptop")
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_toml(&dir, "[agent]\nport = 8123\ndata_dir = \"/tmp/x\"\n");
        let env = HashMap::from([
            ("SHRIKE__AGENT__PORT".to_string(), "9100".to_string()),
            ("SHRIKE__SYNC__BACKUP_DIR_NAME".to_string(), "Laptop".to_string()),
        ]);

        let config = Config::load_with_env(Some(&path), Some(env)).unwrap();
        assert_eq!(config.agent.port, 9100);
        assert_eq!(config.sync.backup_dir_name, "Laptop");
    }

    #[test]
    fn test_non_loopback_bind_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_toml(&dir, "[agent]\nbind = \"0.0.0.0\"\ndata_dir = \"/tmp/x\"\n");
        let err = Config::load_with_env(Some(&path), Some(HashMap::new())).unwrap_err();
        assert!(matches!(err, SyncError::Config(msg) if msg.contains("loopback")));
    }

    #[test]
    fn test_relative_mount_root_rejected() {
        let mut config = Config::default();
        config.sync.mount_root = PathBuf::from("relative/drive");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ensure_token_generates_once() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.agent.data_dir = dir.path().join("data");

        config.ensure_token().unwrap();
        let first = config.auth.token.clone();
        assert!(!first.is_empty());

        let mut again = Config::default();
        again.agent.data_dir = dir.path().join("data");
        again.ensure_token().unwrap();
        assert_eq!(again.auth.token, first);
    }

    #[test]
    fn test_rendered_toml_loads_back() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.agent.port = 7300;
        config.sync.device_subfolder = Some("desk".into());
        config.sync.timeout_secs = Some(90);

        let path = write_toml(&dir, &config.to_toml().unwrap());
        let loaded = Config::load_with_env(Some(&path), Some(HashMap::new())).unwrap();
        assert_eq!(loaded.agent.port, 7300);
        assert_eq!(loaded.sync.device_subfolder.as_deref(), Some("desk"));
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_configured_token_is_kept() {
        let mut config = Config::default();
        config.auth.token = "configured".into();
        config.agent.data_dir = PathBuf::from("/nonexistent/never-written");
        config.ensure_token().unwrap();
        assert_eq!(config.auth.token, "configured");
    }
}
