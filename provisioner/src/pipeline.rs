use crate::backup;
use crate::cli::RunConfig;
use crate::console::Console;
use crate::error::{ProvisionError, Result};
use crate::fetch::{FetchReport, Fetcher};
use crate::install::PackageInstaller;
use crate::patch::{self, PatchOutcome};
use crate::paths::{Layout, SERVICE_START_ARGS};
use crate::service_control::ServiceStarter;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// What a completed run did, stage by stage.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub artifact: FetchReport,
  pub backup_bytes: u64,
  pub template: FetchReport,
  pub patch: PatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
  PlaceholderMissing { path: PathBuf },
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::PlaceholderMissing { path } => write!(
        f,
        "`{}` not found in {}; endpoint was not written",
        patch::placeholder_directive(),
        path.display()
      ),
    }
  }
}

#[derive(Debug, Clone)]
pub enum ProvisionOutcome {
  Completed(RunReport),
  CompletedWithWarnings(RunReport, Vec<Warning>),
  DryRun,
}

impl ProvisionOutcome {
  pub fn warnings(&self) -> &[Warning] {
    match self {
      Self::CompletedWithWarnings(_, w) => w,
      _ => &[],
    }
  }

  pub fn report(&self) -> Option<&RunReport> {
    match self {
      Self::Completed(r) | Self::CompletedWithWarnings(r, _) => Some(r),
      Self::DryRun => None,
    }
  }
}

/// The fetch → install → backup → template → patch → start sequence.
/// The first failing stage ends the run; later stages never execute.
pub struct Provisioner<F, I, S> {
  layout: Layout,
  fetcher: F,
  installer: I,
  starter: S,
}

impl<F: Fetcher, I: PackageInstaller, S: ServiceStarter> Provisioner<F, I, S> {
  pub fn new(layout: Layout, fetcher: F, installer: I, starter: S) -> Self {
    Self {
      layout,
      fetcher,
      installer,
      starter,
    }
  }

  pub fn run<W: Write>(&self, cfg: &RunConfig, console: &mut Console<W>) -> Result<ProvisionOutcome> {
    if cfg.dry_run {
      self.describe(cfg, console);
      return Ok(ProvisionOutcome::DryRun);
    }

    let layout = &self.layout;
    let progress = cfg.verbose;

    console.ruler();
    console.step("Download of nxlog started");
    let artifact = self
      .fetcher
      .fetch(&layout.artifact_path, &layout.artifact_url, progress)?;
    console.step("Download finished");
    console.ruler();

    console.step("Installing nxlog");
    self.installer.install(&layout.artifact_path)?;

    console.step("Creating backup of nxlog.conf");
    let backup_bytes = backup::backup(&layout.config_path, &layout.backup_path)?;

    console.step("Download of nxlog config file started");
    let template = self
      .fetcher
      .fetch(&layout.config_path, &layout.template_url, progress)?;

    console.step("Setting desired endpoint");
    let patched = patch::patch_file(&layout.config_path, &cfg.endpoint_address)?;

    let mut warnings = Vec::new();
    if !patched.is_complete() {
      if cfg.require_placeholder {
        return Err(ProvisionError::PlaceholderMissing {
          token: patch::placeholder_directive(),
          path: layout.config_path.clone(),
        });
      }
      warnings.push(Warning::PlaceholderMissing {
        path: layout.config_path.clone(),
      });
    }

    console.step("Starting nxlog service");
    self
      .starter
      .start(&layout.service_name, &SERVICE_START_ARGS, cfg.wait_running)?;

    console.step(
      "Successful configuration of NXLog. Check your SIEM to make sure you are receiving data.",
    );
    console.ruler();

    let report = RunReport {
      artifact,
      backup_bytes,
      template,
      patch: patched,
    };
    tracing::info!(
      artifact_bytes = report.artifact.bytes,
      backup_bytes = report.backup_bytes,
      replacements = report.patch.replacements,
      "provisioning finished"
    );

    if warnings.is_empty() {
      Ok(ProvisionOutcome::Completed(report))
    } else {
      Ok(ProvisionOutcome::CompletedWithWarnings(report, warnings))
    }
  }

  fn describe<W: Write>(&self, cfg: &RunConfig, console: &mut Console<W>) {
    let layout = &self.layout;
    let steps = [
      format!(
        "DRY-RUN: would download {} to {}",
        layout.artifact_url,
        layout.artifact_path.display()
      ),
      format!(
        "DRY-RUN: would run msiexec /i {} /quiet",
        layout.artifact_path.display()
      ),
      format!(
        "DRY-RUN: would back up {} to {}",
        layout.config_path.display(),
        layout.backup_path.display()
      ),
      format!(
        "DRY-RUN: would download {} to {}",
        layout.template_url,
        layout.config_path.display()
      ),
      format!(
        "DRY-RUN: would replace `{}` with `{}`",
        patch::placeholder_directive(),
        patch::endpoint_directive(&cfg.endpoint_address)
      ),
      format!(
        "DRY-RUN: would start service {} with {:?}",
        layout.service_name, SERVICE_START_ARGS
      ),
    ];

    for step in &steps {
      tracing::warn!("{step}");
      console.step(step);
    }
  }
}
