//! Numeric literal recognition and number-to-text conversion.
//!
//! A token counts as a number when it *starts* with numeric syntax, so `440hz`
//! reads as 440 and `1e3` as 1000. Text that merely looks numeric further in
//! (`hz440`) does not.

/// Parse the longest numeric prefix of `s`.
///
/// Accepts an optional sign, digits with an optional fraction, an optional
/// exponent, and the literal `Infinity`. Returns `None` when no digit is found.
pub fn parse_prefix(s: &str) -> Option<f64> {
    scan_prefix(s).map(|(n, _)| n)
}

/// The numeric prefix of `s` and its length in bytes.
fn scan_prefix(s: &str) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }

    if s[i..].starts_with("Infinity") {
        let inf = f64::INFINITY;
        let n = if bytes[0] == b'-' { -inf } else { inf };
        return Some((n, i + "Infinity".len()));
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }

    if digits == 0 {
        return None;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    s[..i].parse().ok().map(|n| (n, i))
}

/// Render a number the way it reads when concatenated with text.
pub fn to_text(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

/// Coerce text to a number: blank text is 0, and anything that is not
/// numeric syntax from end to end is NaN.
pub fn coerce(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match scan_prefix(trimmed) {
        Some((n, len)) if len == trimmed.len() => n,
        _ => f64::NAN,
    }
}
