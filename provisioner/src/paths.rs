use std::path::{Path, PathBuf};

pub const CONFIG_FILE_PATH: &str = "C:\\Program Files (x86)\\nxlog\\conf\\nxlog.conf";
pub const BACKUP_FILE_PATH: &str = "C:\\Program Files (x86)\\nxlog\\conf\\nxlog.old.conf";
pub const CONFIG_TEMPLATE_URL: &str =
  "https://www.alienvault.com/documentation/resources/downloads/nxlog.conf";

pub const INSTALLER_BASE_URL: &str = "https://nxlog.co/system/files/products/files/348/";
pub const INSTALLER_FILE_NAME: &str = "nxlog-ce-2.9.1716.msi";

pub const SERVICE_NAME: &str = "nxlog";
pub const SERVICE_START_ARGS: [&str; 2] = ["is", "manual-started"];

/// Everything a run touches on disk and on the network.
#[derive(Debug, Clone)]
pub struct Layout {
  pub artifact_path: PathBuf,
  pub artifact_url: String,
  pub config_path: PathBuf,
  pub backup_path: PathBuf,
  pub template_url: String,
  pub service_name: String,
}

impl Layout {
  pub fn nxlog() -> Self {
    Self {
      artifact_path: PathBuf::from(INSTALLER_FILE_NAME),
      artifact_url: format!("{INSTALLER_BASE_URL}{INSTALLER_FILE_NAME}"),
      config_path: PathBuf::from(CONFIG_FILE_PATH),
      backup_path: PathBuf::from(BACKUP_FILE_PATH),
      template_url: CONFIG_TEMPLATE_URL.to_string(),
      service_name: SERVICE_NAME.to_string(),
    }
  }
}

pub fn base_dir() -> PathBuf {
  let program_data = std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".into());
  PathBuf::from(program_data).join("nxlog-provisioner")
}

pub fn settings_path(base: &Path) -> PathBuf {
  base.join("provisioner.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}
