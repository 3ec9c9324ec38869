use crate::atomic;
use crate::error::{ProvisionError, Result};
use std::fs;
use std::io;
use std::path::Path;

pub const DIRECTIVE: &str = "define OUTPUT_DESTINATION_ADDRESS";
pub const PLACEHOLDER: &str = "usmsensoriphere";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Encoding of the config file, as declared by its byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
  Utf8,
  Utf8Bom,
  Utf16Le,
  Utf16Be,
}

impl TextEncoding {
  /// Splits off a leading BOM. No BOM means plain UTF-8.
  pub fn sniff(raw: &[u8]) -> (Self, &[u8]) {
    if let Some(rest) = raw.strip_prefix(UTF8_BOM) {
      (Self::Utf8Bom, rest)
    } else if let Some(rest) = raw.strip_prefix(UTF16LE_BOM) {
      (Self::Utf16Le, rest)
    } else if let Some(rest) = raw.strip_prefix(UTF16BE_BOM) {
      (Self::Utf16Be, rest)
    } else {
      (Self::Utf8, raw)
    }
  }

  fn bom(self) -> &'static [u8] {
    match self {
      Self::Utf8 => &[],
      Self::Utf8Bom => UTF8_BOM,
      Self::Utf16Le => UTF16LE_BOM,
      Self::Utf16Be => UTF16BE_BOM,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
  pub replacements: usize,
  pub encoding: TextEncoding,
}

impl PatchOutcome {
  /// False when the placeholder was absent and the file was left as-is.
  pub fn is_complete(&self) -> bool {
    self.replacements > 0
  }
}

pub fn placeholder_directive() -> String {
  format!("{DIRECTIVE} {PLACEHOLDER}")
}

pub fn endpoint_directive(endpoint: &str) -> String {
  format!("{DIRECTIVE} {endpoint}")
}

#[derive(Debug)]
pub struct Substitution {
  pub bytes: Vec<u8>,
  pub replacements: usize,
  pub encoding: TextEncoding,
}

/// Replaces every placeholder directive in `raw`, keeping the BOM and the
/// encoding it declares. UTF-8 content is rewritten at the byte level so
/// bytes outside the directive survive even if they are not valid UTF-8.
pub fn substitute(raw: &[u8], endpoint: &str) -> io::Result<Substitution> {
  let (encoding, body) = TextEncoding::sniff(raw);
  let from = placeholder_directive();
  let to = endpoint_directive(endpoint);

  let (replaced, replacements) = match encoding {
    TextEncoding::Utf8 | TextEncoding::Utf8Bom => {
      replace_all_bytes(body, from.as_bytes(), to.as_bytes())
    }
    TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
      let text = decode_utf16(body, encoding == TextEncoding::Utf16Le)?;
      let count = text.matches(from.as_str()).count();
      let text = text.replace(from.as_str(), &to);
      (encode_utf16(&text, encoding == TextEncoding::Utf16Le), count)
    }
  };

  let mut bytes = Vec::with_capacity(encoding.bom().len() + replaced.len());
  bytes.extend_from_slice(encoding.bom());
  bytes.extend_from_slice(&replaced);

  Ok(Substitution {
    bytes,
    replacements,
    encoding,
  })
}

/// Rewrites the endpoint directive in the config at `path` in place.
///
/// The permission bits seen before the rewrite are restored afterwards. When
/// the placeholder is absent nothing is written and the outcome reports zero
/// replacements.
pub fn patch_file(path: &Path, endpoint: &str) -> Result<PatchOutcome> {
  let raw = fs::read(path).map_err(|e| ProvisionError::io("read", path, e))?;
  let perms = fs::metadata(path)
    .map_err(|e| ProvisionError::io("stat", path, e))?
    .permissions();

  let sub = substitute(&raw, endpoint).map_err(|e| ProvisionError::io("decode", path, e))?;
  let outcome = PatchOutcome {
    replacements: sub.replacements,
    encoding: sub.encoding,
  };

  if sub.replacements == 0 {
    tracing::warn!(
      stage = "patch",
      path = %path.display(),
      placeholder = PLACEHOLDER,
      "placeholder directive not found; configuration left unchanged"
    );
    return Ok(outcome);
  }

  atomic::write_atomic(path, &sub.bytes).map_err(|e| ProvisionError::io("write", path, e))?;
  fs::set_permissions(path, perms).map_err(|e| ProvisionError::io("set permissions on", path, e))?;

  tracing::info!(
    stage = "patch",
    path = %path.display(),
    replacements = sub.replacements,
    encoding = ?sub.encoding,
    "endpoint written to configuration"
  );
  Ok(outcome)
}

fn replace_all_bytes(hay: &[u8], needle: &[u8], replacement: &[u8]) -> (Vec<u8>, usize) {
  if needle.is_empty() {
    return (hay.to_vec(), 0);
  }

  let mut out = Vec::with_capacity(hay.len());
  let mut count = 0;
  let mut i = 0;

  while i < hay.len() {
    if hay[i..].starts_with(needle) {
      out.extend_from_slice(replacement);
      i += needle.len();
      count += 1;
    } else {
      out.push(hay[i]);
      i += 1;
    }
  }

  (out, count)
}

fn decode_utf16(body: &[u8], little_endian: bool) -> io::Result<String> {
  if body.len() % 2 != 0 {
    return Err(io::Error::new(
      io::ErrorKind::InvalidData,
      "UTF-16 content has an odd number of bytes",
    ));
  }

  let units: Vec<u16> = body
    .chunks_exact(2)
    .map(|c| {
      if little_endian {
        u16::from_le_bytes([c[0], c[1]])
      } else {
        u16::from_be_bytes([c[0], c[1]])
      }
    })
    .collect();

  String::from_utf16(&units).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn encode_utf16(text: &str, little_endian: bool) -> Vec<u8> {
  text
    .encode_utf16()
    .flat_map(|u| {
      if little_endian {
        u.to_le_bytes()
      } else {
        u.to_be_bytes()
      }
    })
    .collect()
}
