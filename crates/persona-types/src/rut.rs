//! Person identifier (RUT) validation.
//!
//! An identifier is a run of decimal digits (the body) followed by a single check
//! character. Dots and dashes are formatting only and are ignored, as is the case of
//! the check character, so `12.345.678-5`, `12345678-5` and `123456785` are the same
//! identifier for validation purposes.
//!
//! The check character is the mod-11 digit of the body: digits are weighted 2, 3, 4,
//! 5, 6, 7, 2, 3, ... starting from the rightmost one, and `11 - (sum % 11)` maps
//! `11` to `'0'` and `10` to `'K'`.

/// Strip surrounding whitespace. Separators are kept; documents are keyed by the
/// identifier as the client wrote it.
pub fn normalize_identifier(id: &str) -> String {
    id.trim().to_string()
}

/// Compute the expected check character for an identifier body.
///
/// Returns `None` if the body is empty or contains anything but ASCII digits.
pub fn check_digit(body: &str) -> Option<char> {
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut sum: u32 = 0;
    let mut weight: u32 = 2;
    for b in body.bytes().rev() {
        sum += u32::from(b - b'0') * weight;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }

    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        d => char::from_digit(d, 10),
    }
}

/// Check an identifier's structure and check character.
pub fn is_valid_identifier(id: &str) -> bool {
    if !id.is_ascii() {
        return false;
    }

    let compact: String = id
        .chars()
        .filter(|c| *c != '.' && *c != '-')
        .collect::<String>()
        .to_uppercase();

    if compact.len() < 2 {
        return false;
    }

    let (body, check) = compact.split_at(compact.len() - 1);
    let Some(given) = check.chars().next() else {
        return false;
    };
    if !given.is_ascii_digit() && given != 'K' {
        return false;
    }

    check_digit(body) == Some(given)
}
