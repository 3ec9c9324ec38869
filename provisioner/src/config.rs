use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Ambient settings read from `provisioner.toml`. Paths, URLs and the service
/// name are fixed and intentionally absent here.
#[derive(Debug, Clone, Default)]
pub struct Settings {
  pub logging: LoggingConfig,
  pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
  #[serde(default = "default_true")]
  pub atomic_writes: bool,

  /// 0 disables the timeout; a stalled transfer then blocks indefinitely.
  #[serde(default)]
  pub timeout_seconds: u64,

  #[serde(default = "default_user_agent")]
  pub user_agent: String,
}

impl DownloadConfig {
  pub fn timeout(&self) -> Option<Duration> {
    (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
  }
}

impl Default for DownloadConfig {
  fn default() -> Self {
    Self {
      atomic_writes: true,
      timeout_seconds: 0,
      user_agent: default_user_agent(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_user_agent() -> String {
  format!("nxlog-provisioner/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
  #[serde(default)]
  logging: Option<LoggingConfig>,

  #[serde(default)]
  download: Option<DownloadConfig>,
}

impl SettingsFile {
  fn normalize(self) -> Settings {
    let mut settings = Settings::default();
    if let Some(l) = self.logging {
      settings.logging = l;
    }
    if let Some(d) = self.download {
      settings.download = d;
    }
    settings
  }
}

/// Loads settings without ever writing to disk. A missing file yields the
/// defaults; an unreadable or invalid one yields the defaults and a notice.
pub fn load_or_default(path: &Path) -> Settings {
  if !path.exists() {
    return Settings::default();
  }

  let raw = match fs::read_to_string(path) {
    Ok(raw) => raw,
    Err(e) => {
      eprintln!(
        "nxlog-provisioner: unable to read settings at {}; using defaults: {e}",
        path.display()
      );
      return Settings::default();
    }
  };

  match parse(&raw) {
    Ok(settings) => settings,
    Err(e) => {
      eprintln!(
        "nxlog-provisioner: invalid settings at {}; using defaults: {e}",
        path.display()
      );
      Settings::default()
    }
  }
}

pub fn parse(raw: &str) -> anyhow::Result<Settings> {
  let file: SettingsFile = toml::from_str(raw)?;
  Ok(file.normalize())
}
