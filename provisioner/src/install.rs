use crate::error::{ProvisionError, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

pub trait PackageInstaller {
  fn install(&self, artifact: &Path) -> Result<()>;
}

/// Unattended `msiexec /i <artifact> /quiet`.
pub struct MsiInstaller {
  program: OsString,
}

impl MsiInstaller {
  pub fn new() -> Self {
    Self::with_program("msiexec")
  }

  pub fn with_program(program: impl Into<OsString>) -> Self {
    Self {
      program: program.into(),
    }
  }
}

impl Default for MsiInstaller {
  fn default() -> Self {
    Self::new()
  }
}

impl PackageInstaller for MsiInstaller {
  fn install(&self, artifact: &Path) -> Result<()> {
    tracing::info!(stage = "install", artifact = %artifact.display(), "running installer");

    let output = Command::new(&self.program)
      .arg("/i")
      .arg(artifact)
      .arg("/quiet")
      .output()
      .map_err(|e| ProvisionError::Install {
        artifact: artifact.to_path_buf(),
        reason: format!("could not launch {}: {e}", self.program.to_string_lossy()),
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let stdout = String::from_utf8_lossy(&output.stdout);
      return Err(ProvisionError::Install {
        artifact: artifact.to_path_buf(),
        reason: format!(
          "installer exited with {}: stdout='{}' stderr='{}'",
          output.status,
          stdout.trim(),
          stderr.trim()
        ),
      });
    }

    tracing::info!(stage = "install", artifact = %artifact.display(), "installer finished");
    Ok(())
  }
}
