//! Brazilian taxpayer ID (CPF) validation.
//!
//! A CPF is 11 digits where the last two are check digits computed from the
//! preceding ones. Punctuation (`XXX.XXX.XXX-XX`) is ignored.

/// Keep only the ASCII digits of `input`.
pub fn digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Validate a CPF with or without punctuation.
pub fn is_valid(input: &str) -> bool {
    let digits: Vec<u32> = digits(input).bytes().map(|b| u32::from(b - b'0')).collect();

    if digits.len() != 11 {
        return false;
    }

    // Repeated sequences pass the checksum but are never issued.
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    digits[9] == check_digit(&digits[..9]) && digits[10] == check_digit(&digits[..10])
}

/// Canonical `XXX.XXX.XXX-XX` form of a valid CPF.
pub fn format(input: &str) -> Option<String> {
    if !is_valid(input) {
        return None;
    }
    let d = digits(input);
    Some(format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11]))
}

/// Weights run from `len + 1` down to 2 over the given prefix.
fn check_digit(prefix: &[u32]) -> u32 {
    let top = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, &d)| d * (top - i as u32))
        .sum();
    let digit = 11 - (sum % 11);
    if digit >= 10 { 0 } else { digit }
}
