use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

/// Canonical text of an integral cell value: `"0012345"` and `"12345.0"` both
/// become `"12345"`. Spreadsheet exports write whole numbers either way.
///
/// Plain digit forms are canonicalized on the text itself, so long identifiers
/// keep every digit. Only exponent forms (`"1.2345E4"`) go through `f64`.
pub fn canonical_integer_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if !whole.is_empty() && is_ascii_digits(whole) && is_ascii_digits(fraction) {
        if fraction.bytes().any(|byte| byte != b'0') {
            return None;
        }
        let digits = match whole.trim_start_matches('0') {
            "" => "0",
            digits => digits,
        };
        let sign = if negative && digits != "0" { "-" } else { "" };
        return Some(format!("{sign}{digits}"));
    }

    if !unsigned.contains(['e', 'E']) {
        return None;
    }
    let value = trimmed.parse::<f64>().ok()?;
    if !value.is_finite() || value.fract() != 0.0 || value.abs() >= i64::MAX as f64 {
        return None;
    }
    Some((value as i64).to_string())
}

fn is_ascii_digits(text: &str) -> bool {
    text.bytes().all(|byte| byte.is_ascii_digit())
}
