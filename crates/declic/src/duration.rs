//! Duration text in the `1h30m`, `250ms`, `1.5s` style.

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("h", 3_600 * NANOS_PER_SEC),
];

/// Parse a sequence of decimal numbers with units, e.g. `1h30m` or `2.5s`.
///
/// `0` on its own is accepted without a unit. Negative durations are rejected.
pub fn parse(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.starts_with('-') {
        return Err(format!("negative duration {input:?}"));
    }
    let mut rest = text.strip_prefix('+').unwrap_or(text);

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let number = &rest[..digits_end];
        if number.is_empty() || number == "." {
            return Err(format!("invalid duration {input:?}"));
        }
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];
        let Some(&(_, scale)) = UNITS.iter().find(|(name, _)| *name == unit) else {
            if unit.is_empty() {
                return Err(format!("missing unit in duration {input:?}"));
            }
            return Err(format!("unknown unit {unit:?} in duration {input:?}"));
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| format!("invalid duration {input:?}"))?
        };
        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| format!("duration {input:?} is out of range"))?;
        if !fraction.is_empty() {
            if fraction.contains('.') {
                return Err(format!("invalid duration {input:?}"));
            }
            // Digits past nanosecond precision are dropped.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits
                .parse()
                .map_err(|_| format!("invalid duration {input:?}"))?;
            nanos = nanos
                .checked_add(numerator * scale / 10u128.pow(digits.len() as u32))
                .ok_or_else(|| format!("duration {input:?} is out of range"))?;
        }
        total = total
            .checked_add(nanos)
            .ok_or_else(|| format!("duration {input:?} is out of range"))?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| format!("duration {input:?} is out of range"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Accept either duration text or a bare integer number of nanoseconds.
pub fn parse_lenient(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        let nanos: u64 = text
            .parse()
            .map_err(|_| format!("duration {input:?} is out of range"))?;
        return Ok(Duration::from_nanos(nanos));
    }
    parse(text)
}

/// Format the way [`parse`] reads it back: `1h30m0s`, `1.5s`, `300ms`, `0s`.
pub fn format(duration: Duration) -> String {
    let total = duration.as_nanos();
    if total == 0 {
        return "0s".to_string();
    }
    if total < NANOS_PER_SEC {
        let (unit, scale) = if total < 1_000 {
            ("ns", 1)
        } else if total < 1_000_000 {
            ("µs", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{unit}", decimal(total, scale));
    }

    let hours = total / (3_600 * NANOS_PER_SEC);
    let rest = total % (3_600 * NANOS_PER_SEC);
    let minutes = rest / (60 * NANOS_PER_SEC);
    let rest = rest % (60 * NANOS_PER_SEC);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h{minutes}m"));
    } else if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&decimal(rest, NANOS_PER_SEC));
    out.push('s');
    out
}

fn decimal(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let digits = format!("{fraction:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
