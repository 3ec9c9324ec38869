use crate::error::{ProvisionError, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Byte-for-byte copy of `src` to `dst`, returning the number of bytes copied.
///
/// Both handles are dropped on every path out of this function. The
/// destination is synced before returning so a crash right after still
/// leaves a complete backup. Source permission bits are carried over.
pub fn backup(src: &Path, dst: &Path) -> Result<u64> {
  let mut input = File::open(src).map_err(|e| ProvisionError::io("open", src, e))?;
  let perms = input
    .metadata()
    .map_err(|e| ProvisionError::io("stat", src, e))?
    .permissions();

  let mut output = File::create(dst).map_err(|e| ProvisionError::io("create", dst, e))?;
  let copied = io::copy(&mut input, &mut output).map_err(|e| ProvisionError::io("copy to", dst, e))?;
  output.flush().map_err(|e| ProvisionError::io("flush", dst, e))?;
  output.sync_all().map_err(|e| ProvisionError::io("sync", dst, e))?;
  drop(output);

  fs::set_permissions(dst, perms).map_err(|e| ProvisionError::io("set permissions on", dst, e))?;

  tracing::info!(
    stage = "backup",
    src = %src.display(),
    dst = %dst.display(),
    bytes = copied,
    "configuration backed up"
  );
  Ok(copied)
}
