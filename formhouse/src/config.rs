//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `FORMHOUSE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `FORMHOUSE_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `FORMHOUSE_STORAGE__PROVIDER=local` sets the `storage.provider` field.
//!
//! ## Configuration Structure
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 3000
//! storage:
//!   provider: local
//!   root: uploads
//! ```
//!
//! The `storage.provider` tag selects the backend: `none` (submissions are
//! rejected with 503), `local`, `drive`, `firebase`, or `cloudinary`. Each
//! provider section carries its own credentials and per-file size ceiling.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FORMHOUSE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Loaded from YAML plus `FORMHOUSE_` environment overrides. All fields have
/// defaults so the server starts with an empty config file (with storage
/// left unconfigured).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Maximum size of a whole submit request body in bytes. Individual file
    /// ceilings are enforced per provider; this bounds the multipart stream
    /// as a whole.
    pub max_request_size: u64,
    /// Storage backend configuration
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_request_size: 64 * MIB,
            storage: StorageConfig::None,
        }
    }
}

/// Which storage backend persists submitted files and metadata.
///
/// Tagged by `provider`; exactly one backend is active per process. The
/// submission handler is identical across providers - only the adapter
/// selected from this enum differs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum StorageConfig {
    /// No backend configured. Health reports "not configured" and
    /// submissions are rejected with 503.
    None,
    /// Local filesystem under a root directory.
    Local(LocalStorageConfig),
    /// Google Drive via a service account, rooted at a shared folder.
    Drive(DriveStorageConfig),
    /// Firebase Storage (Google Cloud Storage bucket).
    Firebase(FirebaseStorageConfig),
    /// Cloudinary signed uploads.
    Cloudinary(CloudinaryStorageConfig),
}

impl StorageConfig {
    /// Provider name as reported by `/api/health`.
    pub fn provider_name(&self) -> Option<&'static str> {
        match self {
            StorageConfig::None => None,
            StorageConfig::Local(_) => Some("local"),
            StorageConfig::Drive(_) => Some("drive"),
            StorageConfig::Firebase(_) => Some("firebase"),
            StorageConfig::Cloudinary(_) => Some("cloudinary"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalStorageConfig {
    /// Directory files are stored under, laid out as `root/service/user/`
    pub root: PathBuf,
    /// Per-file size ceiling in bytes
    pub max_file_size: u64,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            max_file_size: 10 * MIB,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveStorageConfig {
    /// Path to the service-account key JSON (client_email + private_key)
    pub credentials_file: PathBuf,
    /// Trusted root folder: a bare folder ID or a Drive folder URL. When
    /// unset, a folder named "FormHouse" is searched for at startup of each
    /// submission.
    pub root_folder: Option<String>,
    /// Per-file size ceiling in bytes. Drive submissions historically used a
    /// tighter ceiling than the other providers.
    pub max_file_size: u64,
}

impl Default for DriveStorageConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            root_folder: None,
            max_file_size: 5 * MIB,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FirebaseStorageConfig {
    /// Path to the service-account key JSON
    pub credentials_file: PathBuf,
    /// Bucket name; defaults to `<project_id>.appspot.com` from the key file
    pub bucket: Option<String>,
    /// Per-file size ceiling in bytes
    pub max_file_size: u64,
}

impl Default for FirebaseStorageConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("firebase-service-account.json"),
            bucket: None,
            max_file_size: 10 * MIB,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudinaryStorageConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Per-file size ceiling in bytes
    pub max_file_size: u64,
}

impl Default for CloudinaryStorageConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            max_file_size: 10 * MIB,
        }
    }
}

impl CloudinaryStorageConfig {
    /// All three credentials must be present for the adapter to come up.
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.cloud_name, &self.api_key, &self.api_secret) {
            (Some(cloud), Some(key), Some(secret)) => Some((cloud, key, secret)),
            _ => None,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("FORMHOUSE_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_request_size == 0 {
            anyhow::bail!("Config validation: max_request_size must be positive");
        }

        let ceiling = match &self.storage {
            StorageConfig::None => return Ok(()),
            StorageConfig::Local(c) => c.max_file_size,
            StorageConfig::Drive(c) => c.max_file_size,
            StorageConfig::Firebase(c) => c.max_file_size,
            StorageConfig::Cloudinary(c) => c.max_file_size,
        };
        if ceiling == 0 {
            anyhow::bail!("Config validation: storage max_file_size must be positive");
        }
        if ceiling > self.max_request_size {
            anyhow::bail!(
                "Config validation: storage max_file_size ({}) exceeds max_request_size ({})",
                ceiling,
                self.max_request_size
            );
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_to_unconfigured_storage() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "")?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;
            assert!(matches!(config.storage, StorageConfig::None));
            assert_eq!(config.port, 3000);
            Ok(())
        });
    }

    #[test]
    fn local_storage_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
storage:
  provider: local
  root: /var/lib/formhouse
"#,
            )?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;
            assert_eq!(config.port, 8080);
            match config.storage {
                StorageConfig::Local(local) => {
                    assert_eq!(local.root, PathBuf::from("/var/lib/formhouse"));
                    // default ceiling preserved
                    assert_eq!(local.max_file_size, 10 * MIB);
                }
                other => panic!("expected local storage, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn drive_defaults_to_tighter_ceiling() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
storage:
  provider: drive
  root_folder: https://drive.google.com/drive/folders/abc123
"#,
            )?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;
            match config.storage {
                StorageConfig::Drive(drive) => {
                    assert_eq!(drive.max_file_size, 5 * MIB);
                    assert_eq!(
                        drive.root_folder.as_deref(),
                        Some("https://drive.google.com/drive/folders/abc123")
                    );
                }
                other => panic!("expected drive storage, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
host: 0.0.0.0
port: 3000
"#,
            )?;

            jail.set_env("FORMHOUSE_HOST", "127.0.0.1");
            jail.set_env("FORMHOUSE_PORT", "9000");

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            let config = Config::load(&args)?;
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn rejects_ceiling_above_request_size() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
max_request_size: 1024
storage:
  provider: local
"#,
            )?;

            let args = Args {
                config: "test.yaml".to_string(),
                validate: false,
            };

            assert!(Config::load(&args).is_err());
            Ok(())
        });
    }
}
