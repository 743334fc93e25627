/// Postal code handling.
///
/// Two different jobs live here and should not be confused:
///   - `PostalCode::normalize` is the mechanical server-side rule applied to
///     whatever arrives in the `/api/{zip}` path. It never rejects input.
///   - `parse_zip_input` is the strict check the explore view runs on what a
///     person typed before it navigates anywhere.

use std::fmt;

/// Length of a normalized postal code.
pub const ZIP_LEN: usize = 5;

/// Message shown when typed input is not a usable ZIP.
pub const INVALID_ZIP_MESSAGE: &str = "Please enter a valid 5-digit ZIP code.";

// ---------------------------------------------------------------------------
// Normalized postal code
// ---------------------------------------------------------------------------

/// A postal code normalized to exactly five characters.
///
/// Used as the lookup key against `ewg_zip_pwsids.zip_code` and as the
/// `zip` echoed back in responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostalCode(String);

impl PostalCode {
    /// Left-pads `raw` with `'0'` to five characters. Input longer than five
    /// characters keeps its first five. No other validation is performed.
    ///
    /// ```
    /// use tapwater_service::zip::PostalCode;
    /// assert_eq!(PostalCode::normalize("850").as_str(), "00850");
    /// ```
    pub fn normalize(raw: &str) -> Self {
        let head: String = raw.chars().take(ZIP_LEN).collect();
        let pad = ZIP_LEN - head.chars().count();
        let mut code = String::with_capacity(ZIP_LEN);
        code.extend(std::iter::repeat_n('0', pad));
        code.push_str(&head);
        PostalCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Typed input
// ---------------------------------------------------------------------------

/// Cleans what a person typed into a ZIP: non-digits are dropped and the
/// first five digits kept. Anything short of five digits is rejected with
/// `INVALID_ZIP_MESSAGE`.
pub fn parse_zip_input(input: &str) -> Result<String, String> {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(ZIP_LEN)
        .collect();

    if cleaned.len() == ZIP_LEN {
        Ok(cleaned)
    } else {
        Err(INVALID_ZIP_MESSAGE.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_zip_is_left_padded() {
        assert_eq!(PostalCode::normalize("850").as_str(), "00850");
        assert_eq!(PostalCode::normalize("1").as_str(), "00001");
    }

    #[test]
    fn test_five_digit_zip_is_unchanged() {
        assert_eq!(PostalCode::normalize("85001").as_str(), "85001");
    }

    #[test]
    fn test_empty_zip_becomes_all_zeros() {
        assert_eq!(PostalCode::normalize("").as_str(), "00000");
    }

    #[test]
    fn test_overlength_input_is_truncated_not_rejected() {
        assert_eq!(PostalCode::normalize("850011234").as_str(), "85001");
    }

    #[test]
    fn test_non_numeric_input_is_padded_mechanically() {
        assert_eq!(PostalCode::normalize("ab").as_str(), "000ab");
    }

    #[test]
    fn test_normalized_code_is_always_five_chars() {
        for raw in ["", "9", "12", "123", "1234", "12345", "123456", "zzzzzzzz"] {
            assert_eq!(
                PostalCode::normalize(raw).as_str().chars().count(),
                ZIP_LEN,
                "normalize({:?}) should be five characters",
                raw
            );
        }
    }

    #[test]
    fn test_parse_zip_input_strips_non_digits() {
        assert_eq!(parse_zip_input(" 85-001 "), Ok("85001".to_string()));
        assert_eq!(parse_zip_input("85001-1234"), Ok("85001".to_string()));
    }

    #[test]
    fn test_parse_zip_input_rejects_short_input() {
        assert_eq!(parse_zip_input("850"), Err(INVALID_ZIP_MESSAGE.to_string()));
        assert_eq!(parse_zip_input("phoenix"), Err(INVALID_ZIP_MESSAGE.to_string()));
    }
}
