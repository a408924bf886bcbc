// src/phone.rs
//
// Zambian mobile numbers: 9 significant digits starting with 95-97 or 76-77,
// written bare, with a local leading 0, or with the 260 country code.

use std::sync::LazyLock;

use regex::Regex;

pub const COUNTRY_CODE: &str = "+260";

static ZAMBIAN_MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+?260|0)?(?:9[5-7]|7[6-7])\d{7}$").expect("static phone pattern")
});

/// Drops surrounding whitespace and the usual separators.
fn compact(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect()
}

pub fn is_valid(raw: &str) -> bool {
    ZAMBIAN_MOBILE.is_match(&compact(raw))
}

/// Canonical `+260XXXXXXXXX` form sent to the payment endpoint.
pub fn normalize(raw: &str) -> String {
    let phone = compact(raw);

    if phone.starts_with(COUNTRY_CODE) {
        return phone;
    }
    if let Some(rest) = phone.strip_prefix("260") {
        if rest.len() == 9 {
            return format!("{COUNTRY_CODE}{rest}");
        }
    }
    if phone.starts_with('+') {
        // foreign number, leave it for the backend to reject
        return phone;
    }
    let local = phone.strip_prefix('0').unwrap_or(&phone);
    format!("{COUNTRY_CODE}{local}")
}

/// For logs: keeps the last four digits only, `+260971234567` -> `*********4567`.
pub fn mask(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let keep = chars.len().min(4);
    let hidden = chars.len() - keep;
    "*".repeat(hidden) + &chars[hidden..].iter().collect::<String>()
}
