//! Compact magnitude formatting for badge messages
//!
//! Mirrors the shape badge consumers already display: at most two decimal
//! places, trailing zeros dropped, and a K/M/B/T suffix.

const UNITS: [&str; 4] = ["K", "M", "B", "T"];

/// Format a count as a short human-readable magnitude
///
/// Rounds half-up to two decimals. A value that rounds to 1000 of one unit
/// is expressed in the next unit instead.
///
/// # Examples
/// ```
/// use download_badges::utils::magnitude::format_compact;
///
/// assert_eq!(format_compact(999), "999");
/// assert_eq!(format_compact(1_500), "1.5K");
/// assert_eq!(format_compact(1_234_567), "1.23M");
/// assert_eq!(format_compact(999_999), "1M");
/// ```
pub fn format_compact(count: u64) -> String {
    if count < 1_000 {
        return count.to_string();
    }

    let mut exponent = 1usize;
    while exponent < UNITS.len() && count >= 1_000u64.pow(exponent as u32 + 1) {
        exponent += 1;
    }

    let mut hundredths = scaled_hundredths(count, exponent);
    if hundredths >= 100_000 && exponent < UNITS.len() {
        exponent += 1;
        hundredths = scaled_hundredths(count, exponent);
    }

    let whole = hundredths / 100;
    let fraction = hundredths % 100;
    let unit = UNITS[exponent - 1];
    if fraction == 0 {
        format!("{}{}", whole, unit)
    } else if fraction % 10 == 0 {
        format!("{}.{}{}", whole, fraction / 10, unit)
    } else {
        format!("{}.{:02}{}", whole, fraction, unit)
    }
}

fn scaled_hundredths(count: u64, exponent: usize) -> u128 {
    let divisor = 1_000u128.pow(exponent as u32);
    (u128::from(count) * 100 + divisor / 2) / divisor
}
