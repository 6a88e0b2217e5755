//! Layered configuration for bkm.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults,
//! 2. `config.toml` then `config.yaml` in the platform config directory
//!    (e.g. `~/.config/bkm/` on Linux),
//! 3. a file given explicitly on the command line (TOML, YAML or JSON),
//! 4. environment variables prefixed with `BKM_`, nested with `__`
//!    (`BKM_RETENTION__KEEP=5`).
//!
//! ```toml
//! bucket_prefix = "bkup-"
//!
//! [store]
//! region = "eu-west-1"
//! endpoint = "https://s3.example.net"
//!
//! [retention]
//! keep = 3
//! max_age = 2592000
//!
//! [schedule]
//! target = 3
//! archive_command = ["/usr/local/bin/run-backup", "--quiet"]
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "BKM_";
const DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    /// Buckets whose name starts with this hold backups.
    pub bucket_prefix: String,
    pub retention: RetentionConfig,
    pub schedule: ScheduleConfig,
    pub restore: RestoreConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            bucket_prefix: "bkup-".to_string(),
            retention: RetentionConfig::default(),
            schedule: ScheduleConfig::default(),
            restore: RestoreConfig::default(),
        }
    }
}

/// Connection details for the S3-compatible store.
///
/// Credentials are usually kept out of config files and supplied as
/// `BKM_STORE__KEY_ID` and `BKM_STORE__KEY_SECRET`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self { region: "us-east-1".to_string(), endpoint: None, key_id: None, key_secret: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Finalized backups per host that are never deleted.
    pub keep: usize,
    /// Seconds after which backups beyond `keep` are deleted.
    pub max_age: u64,
}
impl Default for RetentionConfig {
    fn default() -> Self {
        Self { keep: 3, max_age: 30 * DAY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Number of finalized backups a host should have.
    pub target: usize,
    /// Program and leading arguments; hostnames are appended.
    pub archive_command: Vec<String>,
}
impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { target: 3, archive_command: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Lifetime of download URLs in restore scripts, in seconds.
    pub url_expiry: u64,
}
impl Default for RestoreConfig {
    fn default() -> Self {
        Self { url_expiry: DAY }
    }
}
impl RestoreConfig {
    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry)
    }
}

impl Config {
    /// Load from every source, with the platform config directory looked up
    /// through [`ProjectDirs`].
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "bkm");
        let config_dir = dirs.as_ref().map(ProjectDirs::config_dir);
        Self::from_figment(Self::figment(config_dir, explicit)?)
    }

    /// Every source layered in order, without extracting.
    pub fn figment(config_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(dir) = config_dir {
            tracing::debug!(dir = %dir.display(), "Looking for configuration files");
            figment = figment.merge(Toml::file(dir.join("config.toml"))).merge(Yaml::file(dir.join("config.yaml")));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Self::explicit_file(path)?);
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that apply to every command.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_prefix.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("bucket_prefix must not be empty"));
        }
        if self.restore.url_expiry == 0 {
            exn::bail!(ErrorKind::Invalid("restore.url_expiry must be greater than zero"));
        }
        Ok(())
    }

    /// Checks that only apply when triggering archive runs.
    pub fn validate_schedule(&self) -> Result<()> {
        if self.schedule.archive_command.first().is_none_or(|program| program.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("schedule.archive_command must name a program"));
        }
        Ok(())
    }

    fn explicit_file(path: &Path) -> Result<Figment> {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        let figment = match extension.as_deref() {
            Some("toml") => Figment::from(Toml::file_exact(path)),
            Some("yaml" | "yml") => Figment::from(Yaml::file_exact(path)),
            Some("json") => Figment::from(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(PathBuf::from(path))),
        };
        Ok(figment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_| {
            let config = Config::from_figment(Config::figment(None, None).unwrap()).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.retention.max_age, 30 * DAY);
            assert_eq!(config.restore.url_expiry(), Duration::from_secs(DAY));
            Ok(())
        });
    }

    #[test]
    fn test_layering_order() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "bucket_prefix = \"toml-\"\n[retention]\nkeep = 5\nmax_age = 10\n")?;
            jail.create_file("config.yaml", "retention:\n  keep: 6\n")?;
            jail.create_file("explicit.json", r#"{ "schedule": { "target": 4 }, "retention": { "keep": 7 } }"#)?;
            jail.set_env("BKM_RETENTION__MAX_AGE", "99");
            jail.set_env("BKM_STORE__ENDPOINT", "https://s3.example.net");

            let dir = jail.directory().to_path_buf();
            let figment = Config::figment(Some(&dir), Some(&dir.join("explicit.json"))).unwrap();
            let config = Config::from_figment(figment).unwrap();
            assert_eq!(config.bucket_prefix, "toml-");
            assert_eq!(config.retention.keep, 7);
            assert_eq!(config.retention.max_age, 99);
            assert_eq!(config.schedule.target, 4);
            assert_eq!(config.store.endpoint.as_deref(), Some("https://s3.example.net"));
            assert_eq!(config.store.region, "us-east-1");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "schedule:\n  archive_command: [\"/bin/backup\", \"-q\"]").unwrap();
        let config = Config::from_figment(Config::figment(None, Some(file.path())).unwrap()).unwrap();
        assert_eq!(config.schedule.archive_command, vec!["/bin/backup", "-q"]);
        config.validate_schedule().unwrap();
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::figment(None, Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_explicit_file() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = Config::figment(None, Some(file.path())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[rstest]
    #[case("BKM_BUCKET_PREFIX", "  ")]
    #[case("BKM_RESTORE__URL_EXPIRY", "0")]
    fn test_invalid_values(#[case] var: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            jail.set_env(var, value);
            let err = Config::from_figment(Config::figment(None, None).unwrap()).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case(&[])]
    #[case(&[""])]
    #[case(&[" ", "--flag"])]
    fn test_schedule_requires_program(#[case] command: &[&str]) {
        let mut config = Config::default();
        config.schedule.archive_command = command.iter().map(|s| s.to_string()).collect();
        let err = config.validate_schedule().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }
}
