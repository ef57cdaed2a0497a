//! Utility functions and helpers

pub mod time;

use anyhow::{bail, Result};

/// Longest accepted lookback window (about a century)
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Parse a lookback window into days (e.g., "30d", "12w", "6m", "1y").
///
/// Months count as 30 days and years as 365.
pub fn parse_lookback(s: &str) -> Result<u32> {
    let s = s.trim();

    let (num_str, unit) = if let Some(num_str) = s.strip_suffix('d') {
        (num_str, 1)
    } else if let Some(num_str) = s.strip_suffix('w') {
        (num_str, 7)
    } else if let Some(num_str) = s.strip_suffix('m') {
        (num_str, 30)
    } else if let Some(num_str) = s.strip_suffix('y') {
        (num_str, 365)
    } else {
        // Default to days if no suffix
        (s, 1)
    };

    let days = match num_str.parse::<u32>()?.checked_mul(unit) {
        Some(days) if days <= MAX_LOOKBACK_DAYS => days,
        _ => bail!("Lookback is longer than {} days: {}", MAX_LOOKBACK_DAYS, s),
    };
    if days == 0 {
        bail!("Lookback must be at least one day: {}", s);
    }
    Ok(days)
}

/// Format a count with thousands separators
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
