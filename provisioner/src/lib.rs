pub mod atomic;
pub mod backup;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod fetch;
pub mod install;
pub mod logging;
pub mod patch;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod service_control;

pub use cli::RunConfig;
pub use error::ProvisionError;
pub use pipeline::{ProvisionOutcome, Provisioner};

/// Wires the real stages together and runs them once. This is the only
/// place a failure is reported (log file and stderr); callers just map the
/// result to an exit code.
pub fn run(cfg: &RunConfig) -> anyhow::Result<ProvisionOutcome> {
  let base = paths::base_dir();
  let settings = config::load_or_default(&paths::settings_path(&base));

  // Dropped at the end of this function, after the final line is logged.
  let _log_guard = match logging::init_file_and_stderr(
    &paths::logs_dir(&base),
    &settings.logging.level,
    settings.logging.retention_days,
    !cfg.dry_run,
  ) {
    Ok(guard) => Some(guard),
    Err(e) => {
      logging::init_stderr_only(&settings.logging.level);
      tracing::warn!(error = %e, "file logging unavailable; logging to stderr only");
      None
    }
  };

  let mut console = console::Console::stdout(cfg.verbose);
  console.banner();

  tracing::info!(
    endpoint = %cfg.endpoint_address,
    dry_run = cfg.dry_run,
    atomic_writes = settings.download.atomic_writes,
    "starting NXLog provisioning"
  );

  let result = provision(cfg, &settings, &mut console);
  match &result {
    Ok(outcome) => {
      for warning in outcome.warnings() {
        tracing::warn!(%warning, "provisioning completed with a warning");
      }
    }
    Err(e) => {
      tracing::error!(
        stage = failed_stage(e),
        error = %format_args!("{e:#}"),
        "provisioning aborted"
      );
    }
  }
  result
}

fn provision<W: std::io::Write>(
  cfg: &RunConfig,
  settings: &config::Settings,
  console: &mut console::Console<W>,
) -> anyhow::Result<ProvisionOutcome> {
  let fetcher = fetch::HttpFetcher::new(&settings.download)?;
  let provisioner = Provisioner::new(
    paths::Layout::nxlog(),
    fetcher,
    install::MsiInstaller::new(),
    service_control::local(),
  );
  Ok(provisioner.run(cfg, console)?)
}

fn failed_stage(e: &anyhow::Error) -> &'static str {
  e.downcast_ref::<ProvisionError>()
    .map_or("bootstrap", ProvisionError::stage)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn failed_stage_names_pipeline_errors() {
    let e = anyhow::Error::new(ProvisionError::service(
      "nxlog",
      "could not connect to service manager",
    ));
    assert_eq!(failed_stage(&e), "service");

    let e = anyhow::anyhow!("build HTTP client");
    assert_eq!(failed_stage(&e), "bootstrap");
  }
}
