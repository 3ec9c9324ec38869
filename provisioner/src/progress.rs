use indicatif::HumanBytes;
use std::io::{self, Read, Write};

/// Receives the cumulative byte count of a single transfer.
pub trait ProgressSink {
  fn update(&mut self, total: u64);

  fn finish(&mut self, _total: u64) {}
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
  fn update(&mut self, _total: u64) {}
}

/// Rewrites one status line in place: `Downloading... 1.21 MiB complete`.
pub struct ConsoleProgress<W: Write> {
  out: W,
}

impl ConsoleProgress<io::Stdout> {
  pub fn stdout() -> Self {
    Self { out: io::stdout() }
  }
}

impl<W: Write> ConsoleProgress<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
  fn update(&mut self, total: u64) {
    // Console output is best-effort; a closed stdout must not fail the download.
    let _ = write!(self.out, "\r{}", " ".repeat(35));
    let _ = write!(self.out, "\rDownloading... {} complete", HumanBytes(total));
    let _ = self.out.flush();
  }

  fn finish(&mut self, _total: u64) {
    let _ = writeln!(self.out);
    let _ = self.out.flush();
  }
}

/// Tap on a byte stream: every chunk read bumps the running total and
/// notifies the sink. The total only ever grows.
pub struct CountingReader<'a, R> {
  inner: R,
  sink: &'a mut dyn ProgressSink,
  total: u64,
}

impl<'a, R: Read> CountingReader<'a, R> {
  pub fn new(inner: R, sink: &'a mut dyn ProgressSink) -> Self {
    Self {
      inner,
      sink,
      total: 0,
    }
  }

  pub fn total(&self) -> u64 {
    self.total
  }
}

impl<R: Read> Read for CountingReader<'_, R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    let n = self.inner.read(buf)?;
    if n > 0 {
      self.total += n as u64;
      self.sink.update(self.total);
    }
    Ok(n)
  }
}
