use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_NAME: &str = "provisioner.log";

/// Daily rolling file log plus a stderr mirror. The console banner and
/// progress line are not routed through here.
///
/// The returned guard owns the background file writer: buffered lines are
/// only flushed when it is dropped, so keep it alive until the run is over.
/// With `prune_old_logs` unset the retention sweep is skipped.
pub fn init_file_and_stderr(
  log_dir: &Path,
  level: &str,
  retention_days: u64,
  prune_old_logs: bool,
) -> anyhow::Result<WorkerGuard> {
  prepare_log_dir(log_dir, retention_days, prune_old_logs)?;

  let (subscriber, guard) = file_subscriber(log_dir, level, true);
  subscriber.try_init()?;
  Ok(guard)
}

fn prepare_log_dir(log_dir: &Path, retention_days: u64, prune_old_logs: bool) -> anyhow::Result<()> {
  fs::create_dir_all(log_dir)?;
  if prune_old_logs {
    cleanup_old_logs(log_dir, retention_days)?;
  }
  Ok(())
}

fn file_subscriber(
  log_dir: &Path,
  level: &str,
  stderr: bool,
) -> (impl tracing::Subscriber + Send + Sync + 'static, WorkerGuard) {
  let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  let filter = tracing_subscriber::EnvFilter::try_new(level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(file_writer)
    .with_target(true);

  let stderr_layer = stderr.then(|| {
    tracing_subscriber::fmt::layer()
      .with_ansi(false)
      .with_writer(std::io::stderr)
      .with_target(false)
  });

  let subscriber = tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer);
  (subscriber, guard)
}

/// Stderr only; used when the log directory cannot be created.
pub fn init_stderr_only(level: &str) {
  let filter = tracing_subscriber::EnvFilter::try_new(level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
  let _ = tracing_subscriber::fmt()
    .with_ansi(false)
    .with_target(false)
    .with_writer(std::io::stderr)
    .with_env_filter(filter)
    .try_init();
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> anyhow::Result<()> {
  if retention_days == 0 {
    return Ok(());
  }

  let cutoff = SystemTime::now()
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let entries = match fs::read_dir(log_dir) {
    Ok(e) => e,
    Err(_) => return Ok(()),
  };

  for entry in entries.flatten() {
    let path: PathBuf = entry.path();
    if !is_provisioner_log_file(&path) {
      continue;
    }

    let modified = match entry.metadata().and_then(|m| m.modified()) {
      Ok(t) => t,
      Err(_) => continue,
    };

    if modified < cutoff {
      let _ = fs::remove_file(&path);
    }
  }

  Ok(())
}

fn is_provisioner_log_file(path: &Path) -> bool {
  let name = match path.file_name().and_then(|n| n.to_str()) {
    Some(n) => n,
    None => return false,
  };

  name == LOG_FILE_NAME || name.starts_with("provisioner.log.")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognizes_rotated_log_names_only() {
    assert!(is_provisioner_log_file(Path::new("logs/provisioner.log")));
    assert!(is_provisioner_log_file(Path::new("logs/provisioner.log.2026-10-01")));
    assert!(!is_provisioner_log_file(Path::new("logs/provisioner.toml")));
    assert!(!is_provisioner_log_file(Path::new("logs/other.log")));
  }

  fn read_logs(dir: &Path) -> String {
    let mut out = String::new();
    for entry in fs::read_dir(dir).unwrap().flatten() {
      if is_provisioner_log_file(&entry.path()) {
        out.push_str(&fs::read_to_string(entry.path()).unwrap());
      }
    }
    out
  }

  fn age(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
    fs::File::options()
      .write(true)
      .open(path)
      .unwrap()
      .set_modified(when)
      .unwrap();
  }

  #[test]
  fn dropping_guard_flushes_every_line() {
    let dir = tempfile::tempdir().unwrap();
    let (subscriber, guard) = file_subscriber(dir.path(), "info", false);

    tracing::subscriber::with_default(subscriber, || {
      for i in 0..2000 {
        tracing::info!(line = i, "filler");
      }
      tracing::error!(stage = "service", "provisioning aborted");
    });
    drop(guard);

    let text = read_logs(dir.path());
    assert_eq!(text.lines().count(), 2001);
    assert_eq!(text.matches("provisioning aborted").count(), 1);
  }

  #[test]
  fn cleanup_removes_expired_logs() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("provisioner.log.2026-01-01");
    fs::write(&stale, b"x").unwrap();
    age(&stale, 30);

    cleanup_old_logs(dir.path(), 14).unwrap();
    assert!(!stale.exists());
  }

  #[test]
  fn prepare_without_pruning_keeps_expired_logs() {
    let dir = tempfile::tempdir().unwrap();
    let stale = dir.path().join("provisioner.log.2026-01-01");
    fs::write(&stale, b"x").unwrap();
    age(&stale, 30);

    prepare_log_dir(dir.path(), 14, false).unwrap();
    assert!(stale.exists());

    prepare_log_dir(dir.path(), 14, true).unwrap();
    assert!(!stale.exists());
  }

  #[test]
  fn cleanup_keeps_fresh_logs_and_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = dir.path().join("provisioner.log.2026-10-16");
    let foreign = dir.path().join("notes.txt");
    fs::write(&fresh, b"x").unwrap();
    fs::write(&foreign, b"y").unwrap();

    cleanup_old_logs(dir.path(), 14).unwrap();

    assert!(fresh.exists());
    assert!(foreign.exists());
  }
}
