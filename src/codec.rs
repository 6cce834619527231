use std::path::Path;
use std::sync::OnceLock;

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use regex::bytes::Regex;

use crate::error::{ConvError, Result};

pub const DEFAULT_CSV_ENCODING: &str = "cp932";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Look up an encoding by label, accepting the Python-style names found in
/// existing issuer profiles (`cp932`, `utf-8-sig`, `utf_8`).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    let key = label.trim().to_ascii_lowercase().replace('_', "-");
    match key.as_str() {
        "cp932" | "ms932" | "mskanji" | "ms-kanji" | "sjis" | "shift-jis" | "windows-31j" => {
            Ok(SHIFT_JIS)
        }
        "utf-8-sig" | "utf8" | "utf-8" => Ok(UTF_8),
        _ => Encoding::for_label(key.as_bytes())
            .ok_or_else(|| ConvError::UnknownEncoding(label.to_string())),
    }
}

/// Encoding declared by a leading BOM or a `coding:` comment on line 1 or 2.
pub fn detect_encoding(bytes: &[u8]) -> Result<&'static Encoding> {
    static CODING: OnceLock<Regex> = OnceLock::new();
    if bytes.starts_with(UTF8_BOM) {
        return Ok(UTF_8);
    }
    let re = CODING
        .get_or_init(|| Regex::new(r"(?i)^#.*coding[:=]\s*([\w\-]+)").expect("static regex"));
    for line in bytes.split(|&b| b == b'\n').take(2) {
        if let Some(caps) = re.captures(line) {
            return resolve_encoding(&String::from_utf8_lossy(&caps[1]));
        }
    }
    Ok(UTF_8)
}

/// Strictly decode `bytes` read from `path`. A byte-order mark overrides
/// `encoding`.
pub fn decode(bytes: &[u8], encoding: &'static Encoding, path: &Path) -> Result<String> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConvError::Decode {
            path: path.display().to_string(),
            encoding: used.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

/// Decode a whole file.
pub fn read_to_string(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = std::fs::read(path)?;
    decode(&bytes, encoding, path)
}
