use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Sibling temp file that replaces its destination only on `persist`.
/// Dropping it without persisting removes it, so a failed write never
/// leaves a half-written file at the destination.
pub struct TempFile {
  path: PathBuf,
  file: Option<File>,
}

impl TempFile {
  pub fn create_beside(dest: &Path) -> io::Result<Self> {
    let parent = match dest.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    let name = dest
      .file_name()
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"))?;
    let path = parent.join(format!(
      ".{}.{}.tmp",
      name.to_string_lossy(),
      uuid::Uuid::new_v4().simple()
    ));

    let file = File::options().write(true).create_new(true).open(&path)?;
    Ok(Self {
      path,
      file: Some(file),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn file_mut(&mut self) -> io::Result<&mut File> {
    self
      .file
      .as_mut()
      .ok_or_else(|| io::Error::other("temp file already closed"))
  }

  /// Flushes and syncs the contents, closes the handle, then renames over `dest`.
  pub fn persist(mut self, dest: &Path) -> io::Result<()> {
    if let Some(mut file) = self.file.take() {
      file.flush()?;
      file.sync_all()?;
    }
    fs::rename(&self.path, dest)?;
    self.path = PathBuf::new();
    Ok(())
  }
}

impl Drop for TempFile {
  fn drop(&mut self) {
    self.file.take();
    if !self.path.as_os_str().is_empty() {
      let _ = fs::remove_file(&self.path);
    }
  }
}

/// Writes `contents` to `dest` through a sibling temp file.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> io::Result<()> {
  let mut tmp = TempFile::create_beside(dest)?;
  tmp.file_mut()?.write_all(contents)?;
  tmp.persist(dest)
}
