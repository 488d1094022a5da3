//! Human-readable byte sizes ("500K", "10M", "1G")

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Parse a size string into bytes.
///
/// Accepts a bare integer or an integer followed by `K`, `M` or `G`
/// (base 1024, case-insensitive). Empty or malformed input parses to 0,
/// which disables size filtering.
pub fn parse_size(input: &str) -> u64 {
    let normalized = input.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return 0;
    }

    let (digits, multiplier) = match normalized.as_bytes()[normalized.len() - 1] {
        b'K' => (&normalized[..normalized.len() - 1], KIB),
        b'M' => (&normalized[..normalized.len() - 1], MIB),
        b'G' => (&normalized[..normalized.len() - 1], GIB),
        _ => (normalized.as_str(), 1),
    };

    digits
        .trim()
        .parse::<u64>()
        .map(|value| value.saturating_mul(multiplier))
        .unwrap_or(0)
}

/// Format a byte count in megabytes with two decimals
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MIB as f64)
}
