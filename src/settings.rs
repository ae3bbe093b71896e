//! Job settings
//!
//! Settings come from a dotenv file (`config.env` by default) and the process
//! environment. Environment variables win over the file.
//!
//! Recognized keys:
//! - `ENDPOINT` - `host:port` of the object store (required)
//! - `ACCESSKEYID`, `SECRETACCESSKEY` - static credentials (required)
//! - `USE_SSL` - `true`/`false`, defaults to `false`
//! - `REGION` - signing region
//! - `BUCKET`, `BUCKET_REGION` - bucket the job works in

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::s3::ConnectionConfig;

/// Dotenv file read when no other path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.env";

pub const DEFAULT_BUCKET: &str = "miniotask";

pub const DEFAULT_BUCKET_REGION: &str = "sncr-east-05";

/// Settings for one run of the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub connection: ConnectionConfig,

    pub bucket: String,

    pub bucket_region: Option<String>,
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

impl Settings {
    /// Load settings from a dotenv file and the environment.
    ///
    /// A missing file is not an error; the environment alone may be enough.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = Self::read_env_file(path)?;

        let settings = Self::resolve(&file, |key| std::env::var(key).ok())?;

        tracing::info!(
            "Loaded settings: endpoint={}, ssl={}, bucket={}",
            settings.connection.endpoint,
            settings.connection.use_ssl,
            settings.bucket
        );

        Ok(settings)
    }

    /// Parse a dotenv file without touching the process environment
    fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            tracing::warn!("Config file {:?} not found, using environment only", path);
            return Ok(HashMap::new());
        }

        let mut values = HashMap::new();
        let entries = dotenv::from_path_iter(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Failed to parse config from {:?}", path))?;
            values.insert(key, value);
        }

        tracing::debug!("Read {} keys from {:?}", values.len(), path);

        Ok(values)
    }

    /// Build settings from file values, letting `env` override them
    pub fn resolve<F>(file: &HashMap<String, String>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| -> Option<String> {
            env(key)
                .or_else(|| file.get(key).cloned())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| -> Result<String> {
            lookup(key).with_context(|| format!("Missing required setting {}", key))
        };

        let use_ssl = match lookup("USE_SSL") {
            Some(value) => parse_bool(&value).context("Invalid value for USE_SSL")?,
            None => false,
        };

        let mut connection = ConnectionConfig::new(
            required("ENDPOINT")?,
            required("ACCESSKEYID")?,
            required("SECRETACCESSKEY")?,
        )
        .with_ssl(use_ssl);
        connection.region = lookup("REGION");

        Ok(Self {
            connection,
            bucket: lookup("BUCKET").unwrap_or_else(default_bucket),
            bucket_region: Some(
                lookup("BUCKET_REGION").unwrap_or_else(|| DEFAULT_BUCKET_REGION.to_string()),
            ),
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected true or false, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn file_values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_from_file() {
        let file = file_values(&[
            ("ENDPOINT", "localhost:9000"),
            ("ACCESSKEYID", "minioadmin"),
            ("SECRETACCESSKEY", "minioadmin"),
        ]);
        let settings = Settings::resolve(&file, no_env).unwrap();

        assert_eq!(settings.connection.endpoint, "localhost:9000");
        assert_eq!(settings.connection.access_key_id, "minioadmin");
        assert!(!settings.connection.use_ssl);
        assert!(settings.connection.region.is_none());
        assert_eq!(settings.bucket, DEFAULT_BUCKET);
        assert_eq!(settings.bucket_region.as_deref(), Some(DEFAULT_BUCKET_REGION));
    }

    #[test]
    fn test_resolve_env_overrides_file() {
        let file = file_values(&[
            ("ENDPOINT", "localhost:9000"),
            ("ACCESSKEYID", "file-key"),
            ("SECRETACCESSKEY", "file-secret"),
        ]);
        let settings = Settings::resolve(&file, |key| match key {
            "ACCESSKEYID" => Some("env-key".to_string()),
            "USE_SSL" => Some("true".to_string()),
            "BUCKET" => Some("other-bucket".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(settings.connection.access_key_id, "env-key");
        assert_eq!(settings.connection.secret_access_key, "file-secret");
        assert!(settings.connection.use_ssl);
        assert_eq!(settings.bucket, "other-bucket");
    }

    #[test]
    fn test_resolve_missing_endpoint() {
        let file = file_values(&[("ACCESSKEYID", "ak"), ("SECRETACCESSKEY", "sk")]);
        let err = Settings::resolve(&file, no_env).unwrap_err();
        assert!(err.to_string().contains("ENDPOINT"));
    }

    #[test]
    fn test_resolve_blank_value_counts_as_missing() {
        let file = file_values(&[
            ("ENDPOINT", "localhost:9000"),
            ("ACCESSKEYID", "  "),
            ("SECRETACCESSKEY", "sk"),
        ]);
        let err = Settings::resolve(&file, no_env).unwrap_err();
        assert!(err.to_string().contains("ACCESSKEYID"));
    }

    #[test]
    fn test_resolve_bad_use_ssl() {
        let file = file_values(&[
            ("ENDPOINT", "localhost:9000"),
            ("ACCESSKEYID", "ak"),
            ("SECRETACCESSKEY", "sk"),
            ("USE_SSL", "maybe"),
        ]);
        assert!(Settings::resolve(&file, no_env).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_read_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# MinIO on localhost").unwrap();
        writeln!(file, "ENDPOINT=localhost:9000").unwrap();
        writeln!(file, "ACCESSKEYID=minioadmin").unwrap();
        writeln!(file, "SECRETACCESSKEY=\"minio secret\"").unwrap();
        drop(file);

        let values = Settings::read_env_file(&path).unwrap();
        assert_eq!(values.get("ENDPOINT").map(String::as_str), Some("localhost:9000"));
        assert_eq!(
            values.get("SECRETACCESSKEY").map(String::as_str),
            Some("minio secret")
        );
        assert!(!values.contains_key("#"));
    }

    #[test]
    fn test_read_env_file_missing() {
        let dir = TempDir::new().unwrap();
        let values = Settings::read_env_file(&dir.path().join("absent.env")).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_settings_debug_hides_secret() {
        let file = file_values(&[
            ("ENDPOINT", "localhost:9000"),
            ("ACCESSKEYID", "minioadmin"),
            ("SECRETACCESSKEY", "very-secret-key"),
        ]);
        let settings = Settings::resolve(&file, no_env).unwrap();
        let debug = format!("{:?}", settings);
        assert!(debug.contains("localhost:9000"));
        assert!(!debug.contains("very-secret-key"));
    }
}
