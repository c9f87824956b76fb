//! Environment variable helpers
//!
//! Used by the runtime configuration to apply `INGEST_*` overrides on top of
//! library defaults. Unset or unparsable variables fall back to the default.
//!
//! # Usage
//!
//! ```ignore
//! use ingest_core::env::{env_get, env_get_bytes};
//!
//! let threshold: f32 = env_get("INGEST_WAKE_THRESHOLD", 0.5);
//! let capacity = env_get_bytes("INGEST_STAGING_CAPACITY", 1024); // "4k", "1m", "4096"
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as a byte size.
///
/// Accepts a plain number or a number with a `k`/`m`/`g` suffix (binary
/// multiples, optional trailing `b`, any case).
pub fn env_get_bytes(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bytes(&v))
        .unwrap_or(default)
}

/// Parse "512", "4k", "4KB", "1m", "2g"
pub fn parse_bytes(s: &str) -> Option<usize> {
    let lower = s.trim().to_ascii_lowercase();
    let s = lower.strip_suffix('b').unwrap_or(lower.as_str());
    let (digits, shift) = match s.as_bytes().last()? {
        b'k' => (&s[..s.len() - 1], 10),
        b'm' => (&s[..s.len() - 1], 20),
        b'g' => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };
    let n: usize = digits.trim().parse().ok()?;
    n.checked_mul(1usize << shift)
}
