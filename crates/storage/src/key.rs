//! Object key and bucket name validation.

use crate::error::{ErrorKind, Result};

/// Validates an object key (or bucket name) before it is sent to a store.
///
/// Keys are flat: there is no path normalization, only rejection of names
/// no store would accept. Empty names and names containing null bytes or
/// other control characters are rejected.
///
/// # Examples
///
/// ```
/// use bkm_storage::validate_key;
/// assert!(validate_key("web1.example.com.12.aa.tar.gpg").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate(key: &str) -> Result<&str> {
    if key.is_empty() || key.chars().any(char::is_control) {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate("web1.4.tar.COMPLETE").unwrap(), "web1.4.tar.COMPLETE");
        assert_eq!(validate("bkup-web").unwrap(), "bkup-web");
        // Slashes are just bytes in a flat namespace
        assert_eq!(validate("odd/name.1.tar").unwrap(), "odd/name.1.tar");
    }

    #[test]
    fn test_invalid_keys() {
        assert!(validate("").is_err());
        assert!(validate("\0").is_err());
        assert!(validate("web1.4\n.tar").is_err());
    }
}
