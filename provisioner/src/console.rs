use std::io::{self, Write};

const RULER: &str = "==============================================================";

/// Operator-facing output for `-v`. Silent otherwise; logging is separate.
pub struct Console<W: Write> {
  verbose: bool,
  out: W,
}

impl Console<io::Stdout> {
  pub fn stdout(verbose: bool) -> Self {
    Self::new(verbose, io::stdout())
  }
}

impl<W: Write> Console<W> {
  pub fn new(verbose: bool, out: W) -> Self {
    Self { verbose, out }
  }

  pub fn banner(&mut self) {
    if !self.verbose {
      return;
    }
    let _ = writeln!(self.out);
    let _ = writeln!(self.out, "nxlog-provisioner v{}", env!("CARGO_PKG_VERSION"));
    self.ruler();
  }

  pub fn ruler(&mut self) {
    self.step(RULER);
  }

  pub fn step(&mut self, msg: &str) {
    if self.verbose {
      let _ = writeln!(self.out, "{msg}");
      let _ = self.out.flush();
    }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}
