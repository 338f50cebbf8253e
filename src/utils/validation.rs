//! Centralized validation and helper functions.

use std::path::{Path, PathBuf};

/// Convert a count to f64 with explicit precision loss allowance.
#[inline]
#[must_use]
pub fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Check that a token is a non-empty run of ASCII digits.
///
/// # Examples
///
/// ```
/// use diadem_metric::utils::validation::is_unsigned_integer;
///
/// assert!(is_unsigned_integer("42"));
/// assert!(!is_unsigned_integer("-1"));
/// assert!(!is_unsigned_integer(""));
/// ```
#[must_use]
pub fn is_unsigned_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Like [`is_unsigned_integer`] but allowing one leading minus sign.
#[must_use]
pub fn is_signed_integer(s: &str) -> bool {
    is_unsigned_integer(s.strip_prefix('-').unwrap_or(s))
}

/// Check that a token is a plain decimal: digits and dots only, optionally
/// preceded by a minus sign when `allow_sign` is set.
///
/// Exponents, `inf` and `nan` are rejected. The token may still fail to
/// parse (for example `"1.2.3"`); callers parse after this check.
///
/// # Examples
///
/// ```
/// use diadem_metric::utils::validation::is_plain_decimal;
///
/// assert!(is_plain_decimal("-12.5", true));
/// assert!(!is_plain_decimal("-12.5", false));
/// assert!(!is_plain_decimal("1e5", true));
/// ```
#[must_use]
pub fn is_plain_decimal(s: &str, allow_sign: bool) -> bool {
    let body = if allow_sign {
        s.strip_prefix('-').unwrap_or(s)
    } else {
        s
    };
    !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Input validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Input not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Expected an SWC file but found a directory: {}", .0.display())]
    Directory(PathBuf),
}

/// Validate that a reconstruction input is an existing regular file.
///
/// # Errors
///
/// Returns `ValidationError::NotFound` if the path does not exist and
/// `ValidationError::Directory` if it names a directory.
pub fn validate_input_file(path: &Path) -> Result<(), ValidationError> {
    if path.is_dir() {
        return Err(ValidationError::Directory(path.to_path_buf()));
    }
    if !path.exists() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }
    Ok(())
}
