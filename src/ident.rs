//! Identifier and module path validation
//!
//! Binding names must be plain identifiers:
//! - Start with an ASCII letter or underscore
//! - Contain only ASCII letters, digits, underscores
//!
//! Module paths are dot-separated identifiers (`pkg`, `pkg.sub.leaf`).
//! Dots are reserved for the module path separator, so they never appear
//! inside a binding name.
//!
//! Manual single-pass validation, no allocations on the happy path.

use crate::error::BindError;

/// Validate a binding name
///
/// Valid names:
/// - `X`, `attr`, `_private`, `member1`
///
/// Invalid names:
/// - Empty string
/// - Digits first: `1st`
/// - Dots: `pkg.attr` (that's a module path)
/// - Dashes or spaces: `my-name`, `my name`
pub fn validate_identifier(name: &str) -> Result<(), BindError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(BindError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Validate a dotted module path (`pkg.sub.leaf`)
pub fn validate_module_path(path: &str) -> Result<(), BindError> {
    if !path.is_empty() && path.split('.').all(is_identifier) {
        Ok(())
    } else {
        Err(BindError::InvalidModulePath {
            path: path.to_string(),
        })
    }
}

/// Check whether `s` is a valid identifier without building an error
#[inline]
pub fn is_identifier(s: &str) -> bool {
    let bytes = s.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };

    if !first.is_ascii_alphabetic() && first != b'_' {
        return false;
    }

    bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    // ═══════════════════════════════════════════════════════════════
    // Identifiers
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn valid_identifiers() {
        assert!(validate_identifier("X").is_ok());
        assert!(validate_identifier("attr").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("member1").is_ok());
        assert!(validate_identifier("CamelCase").is_ok());
    }

    #[test]
    fn invalid_empty() {
        assert!(matches!(
            validate_identifier(""),
            Err(BindError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn invalid_digit_first() {
        assert!(validate_identifier("1st").is_err());
    }

    #[test]
    fn invalid_dot_dash_space() {
        assert!(validate_identifier("pkg.attr").is_err());
        assert!(validate_identifier("my-name").is_err());
        assert!(validate_identifier("my name").is_err());
    }

    #[test]
    fn invalid_non_ascii() {
        assert!(validate_identifier("café").is_err());
    }

    // ═══════════════════════════════════════════════════════════════
    // Module paths
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn valid_module_paths() {
        assert!(validate_module_path("pkg").is_ok());
        assert!(validate_module_path("package1.submodule1").is_ok());
        assert!(validate_module_path("a.b.c_d").is_ok());
    }

    #[test]
    fn invalid_module_paths() {
        assert!(validate_module_path("").is_err());
        assert!(validate_module_path(".pkg").is_err());
        assert!(validate_module_path("pkg.").is_err());
        assert!(validate_module_path("pkg..sub").is_err());
        assert!(matches!(
            validate_module_path("pkg.1sub"),
            Err(BindError::InvalidModulePath { .. })
        ));
    }
}
