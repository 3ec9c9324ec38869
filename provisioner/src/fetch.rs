use crate::atomic::TempFile;
use crate::config::DownloadConfig;
use crate::error::{ProvisionError, Result};
use crate::progress::{ConsoleProgress, CountingReader, NoProgress, ProgressSink};
use anyhow::Context;
use reqwest::blocking::{Client, Response};
use reqwest::header::USER_AGENT;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FetchReport {
  pub path: PathBuf,
  pub bytes: u64,
  pub content_length: Option<u64>,
  /// Recorded for the audit log only; nothing is compared against it.
  pub sha256: String,
}

pub trait Fetcher {
  fn fetch(&self, local_path: &Path, url: &str, progress: bool) -> Result<FetchReport>;
}

pub struct HttpFetcher {
  client: Client,
  user_agent: String,
  atomic_writes: bool,
}

impl HttpFetcher {
  pub fn new(cfg: &DownloadConfig) -> anyhow::Result<Self> {
    // Blocking clients default to a 30s timeout; `None` restores "wait forever".
    let client = Client::builder()
      .timeout(cfg.timeout())
      .build()
      .context("build HTTP client")?;

    Ok(Self {
      client,
      user_agent: cfg.user_agent.clone(),
      atomic_writes: cfg.atomic_writes,
    })
  }

  fn get(&self, url: &str) -> Result<Response> {
    let response = self
      .client
      .get(url)
      .header(USER_AGENT, &self.user_agent)
      .send()
      .map_err(|e| ProvisionError::fetch(url, format!("GET failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      return Err(ProvisionError::fetch(
        url,
        format!("unexpected HTTP status {}", status.as_u16()),
      ));
    }
    Ok(response)
  }

  fn fetch_atomic(&self, local_path: &Path, url: &str, sink: &mut dyn ProgressSink) -> Result<Body> {
    let mut tmp = TempFile::create_beside(local_path)
      .map_err(|e| ProvisionError::fetch(url, format!("create temp file for {}: {e}", local_path.display())))?;

    let response = self.get(url)?;
    let file = tmp
      .file_mut()
      .map_err(|e| ProvisionError::fetch(url, e))?;
    let body = stream_body(response, file, sink).map_err(|e| ProvisionError::fetch(url, e))?;
    check_length(url, &body)?;

    tmp
      .persist(local_path)
      .map_err(|e| ProvisionError::fetch(url, format!("replace {}: {e}", local_path.display())))?;
    Ok(body)
  }

  fn fetch_direct(&self, local_path: &Path, url: &str, sink: &mut dyn ProgressSink) -> Result<Body> {
    // Truncates before the request is made; a failure leaves whatever arrived.
    let mut file = File::create(local_path)
      .map_err(|e| ProvisionError::fetch(url, format!("create {}: {e}", local_path.display())))?;

    let response = self.get(url)?;
    let body = stream_body(response, &mut file, sink).map_err(|e| ProvisionError::fetch(url, e))?;
    file
      .sync_all()
      .map_err(|e| ProvisionError::fetch(url, format!("sync {}: {e}", local_path.display())))?;
    check_length(url, &body)?;
    Ok(body)
  }
}

impl HttpFetcher {
  /// Downloads `url` to `local_path`, reporting the running byte count to
  /// `sink`. The sink is finished exactly once, with zero on failure.
  pub fn fetch_with_sink(
    &self,
    local_path: &Path,
    url: &str,
    sink: &mut dyn ProgressSink,
  ) -> Result<FetchReport> {
    let res = if self.atomic_writes {
      self.fetch_atomic(local_path, url, sink)
    } else {
      self.fetch_direct(local_path, url, sink)
    };

    let body = match res {
      Ok(body) => body,
      Err(e) => {
        sink.finish(0);
        return Err(e);
      }
    };
    sink.finish(body.bytes);

    tracing::info!(
      stage = "fetch",
      url = %url,
      path = %local_path.display(),
      bytes = body.bytes,
      sha256 = %body.sha256,
      "download complete"
    );

    Ok(FetchReport {
      path: local_path.to_path_buf(),
      bytes: body.bytes,
      content_length: body.content_length,
      sha256: body.sha256,
    })
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, local_path: &Path, url: &str, progress: bool) -> Result<FetchReport> {
    if progress {
      self.fetch_with_sink(local_path, url, &mut ConsoleProgress::stdout())
    } else {
      self.fetch_with_sink(local_path, url, &mut NoProgress)
    }
  }
}

struct Body {
  bytes: u64,
  content_length: Option<u64>,
  sha256: String,
}

fn stream_body(response: Response, out: &mut File, sink: &mut dyn ProgressSink) -> io::Result<Body> {
  let content_length = response.content_length();
  let mut reader = CountingReader::new(response, sink);
  let mut writer = DigestWriter {
    inner: out,
    hasher: Sha256::new(),
  };

  let bytes = io::copy(&mut reader, &mut writer)?;
  writer.flush()?;

  Ok(Body {
    bytes,
    content_length,
    sha256: format!("{:x}", writer.hasher.finalize()),
  })
}

fn check_length(url: &str, body: &Body) -> Result<()> {
  match body.content_length {
    Some(expected) if expected != body.bytes => Err(ProvisionError::fetch(
      url,
      format!("truncated body: received {} of {expected} bytes", body.bytes),
    )),
    _ => Ok(()),
  }
}

struct DigestWriter<'a> {
  inner: &'a mut File,
  hasher: Sha256,
}

impl Write for DigestWriter<'_> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let n = self.inner.write(buf)?;
    self.hasher.update(&buf[..n]);
    Ok(n)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.inner.flush()
  }
}
