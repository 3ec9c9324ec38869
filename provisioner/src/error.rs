use std::path::PathBuf;

/// Failure of a single pipeline stage. Every variant is terminal for the run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
  #[error(transparent)]
  Invocation(#[from] clap::Error),

  #[error("download of {url} failed: {reason}")]
  Fetch { url: String, reason: String },

  #[error("installer failed for {}: {reason}", artifact.display())]
  Install { artifact: PathBuf, reason: String },

  #[error("{op} {}: {source}", path.display())]
  Io {
    op: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("service {service}: {reason}")]
  Service { service: String, reason: String },

  #[error("placeholder `{token}` not found in {}", path.display())]
  PlaceholderMissing { token: String, path: PathBuf },
}

impl ProvisionError {
  pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      op,
      path: path.into(),
      source,
    }
  }

  pub fn fetch(url: &str, reason: impl std::fmt::Display) -> Self {
    Self::Fetch {
      url: url.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn service(service: &str, reason: impl std::fmt::Display) -> Self {
    Self::Service {
      service: service.to_string(),
      reason: reason.to_string(),
    }
  }

  /// Short stage label used in log fields.
  pub fn stage(&self) -> &'static str {
    match self {
      Self::Invocation(_) => "invocation",
      Self::Fetch { .. } => "fetch",
      Self::Install { .. } => "install",
      Self::Io { .. } => "io",
      Self::Service { .. } => "service",
      Self::PlaceholderMissing { .. } => "patch",
    }
  }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
