#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

/// Serves exactly one raw HTTP response on 127.0.0.1 and then closes.
pub struct OneShot {
  pub url: String,
  handle: JoinHandle<()>,
}

impl OneShot {
  pub fn raw(response: Vec<u8>) -> Self {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
      let (mut stream, _) = listener.accept().unwrap();
      let mut request = Vec::new();
      let mut buf = [0u8; 1024];
      while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
          break;
        }
        request.extend_from_slice(&buf[..n]);
      }
      let _ = stream.write_all(&response);
      let _ = stream.flush();
    });

    Self {
      url: format!("http://{addr}/file"),
      handle,
    }
  }

  pub fn ok(body: &[u8]) -> Self {
    let mut response = format!(
      "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
      body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    Self::raw(response)
  }

  /// No Content-Length; the body runs until the connection closes.
  pub fn ok_until_close(body: &[u8]) -> Self {
    let mut response = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_vec();
    response.extend_from_slice(body);
    Self::raw(response)
  }

  pub fn status(code: u16, reason: &str) -> Self {
    Self::raw(
      format!("HTTP/1.1 {code} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .into_bytes(),
    )
  }

  /// Declares `declared` bytes but sends only `body` before hanging up.
  pub fn truncated(body: &[u8], declared: usize) -> Self {
    let mut response = format!(
      "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
    )
    .into_bytes();
    response.extend_from_slice(body);
    Self::raw(response)
  }

  pub fn join(self) {
    self.handle.join().unwrap();
  }
}

/// A URL nothing is listening on.
pub fn refused_url() -> String {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);
  format!("http://{addr}/file")
}

pub fn tmp_leftovers(dir: &std::path::Path) -> Vec<String> {
  std::fs::read_dir(dir)
    .unwrap()
    .flatten()
    .map(|e| e.file_name().to_string_lossy().into_owned())
    .filter(|n| n.ends_with(".tmp"))
    .collect()
}
