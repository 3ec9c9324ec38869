use crate::error::Result;
use clap::Parser;
use std::ffi::OsString;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
  name = "nxlog-provisioner",
  version,
  about = "Download, install, configure and start the NXLog agent"
)]
struct Cli {
  /// Print the banner, step messages and download progress
  #[arg(short = 'v', long)]
  verbose: bool,

  /// Address written into `define OUTPUT_DESTINATION_ADDRESS`
  #[arg(short = 'E', long, value_name = "ADDRESS")]
  endpoint: String,

  /// Log what each stage would do without touching the system
  #[arg(long)]
  dry_run: bool,

  /// Fail the run when the template has no placeholder to replace
  #[arg(long)]
  require_placeholder: bool,

  /// After starting the service, wait up to SECONDS for it to report running
  #[arg(long, value_name = "SECONDS")]
  wait_running: Option<u64>,
}

/// Options for one run. Built once from the command line, then only borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
  pub verbose: bool,
  pub endpoint_address: String,
  pub dry_run: bool,
  pub require_placeholder: bool,
  pub wait_running: Option<Duration>,
}

impl RunConfig {
  pub fn new(endpoint_address: impl Into<String>) -> Self {
    Self {
      verbose: false,
      endpoint_address: endpoint_address.into(),
      dry_run: false,
      require_placeholder: false,
      wait_running: None,
    }
  }
}

impl From<Cli> for RunConfig {
  fn from(cli: Cli) -> Self {
    Self {
      verbose: cli.verbose,
      endpoint_address: cli.endpoint,
      dry_run: cli.dry_run,
      require_placeholder: cli.require_placeholder,
      wait_running: cli.wait_running.map(Duration::from_secs),
    }
  }
}

/// Parses `args` (including the program name). `--help` and `--version`
/// also come back as `ProvisionError::Invocation`; clap decides how to exit.
pub fn parse<I, T>(args: I) -> Result<RunConfig>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString> + Clone,
{
  let cli = Cli::try_parse_from(args)?;
  Ok(cli.into())
}
