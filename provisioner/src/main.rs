use provisioner::ProvisionError;
use std::process::ExitCode;

fn main() -> ExitCode {
  let cfg = match provisioner::cli::parse(std::env::args_os()) {
    Ok(cfg) => cfg,
    // Prints usage (or help/version) and exits with clap's own code.
    Err(ProvisionError::Invocation(e)) => e.exit(),
    Err(e) => {
      eprintln!("nxlog-provisioner: {e}");
      return ExitCode::FAILURE;
    }
  };

  // `run` has already logged the failure to stderr and the log file.
  match provisioner::run(&cfg) {
    Ok(_) => ExitCode::SUCCESS,
    Err(_) => ExitCode::FAILURE,
  }
}
