// src/core/version.rs

use std::num::ParseIntError;

/// Splits a dotted version string into numeric components.
///
/// The returned vectors compare element by element, so `"1.10"` sorts after `"1.9"`.
/// This is a plain numeric comparison, not semver: pre-release tags are rejected.
pub fn parse_version(s: &str) -> Result<Vec<u64>, ParseIntError> {
    s.split('.').map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_components() {
        assert_eq!(parse_version("2.17.3").unwrap(), vec![2, 17, 3]);
        assert_eq!(parse_version("7").unwrap(), vec![7]);
    }

    #[test]
    fn test_parse_version_orders_numerically() {
        assert!(parse_version("1.10").unwrap() > parse_version("1.9").unwrap());
        assert!(parse_version("1.2.0").unwrap() > parse_version("1.2").unwrap());
        assert_eq!(parse_version("0.1").unwrap(), parse_version("0.1").unwrap());
    }

    #[test]
    fn test_parse_version_rejects_non_numeric() {
        assert!(parse_version("1.2-rc1").is_err());
        assert!(parse_version("").is_err());
        assert!(parse_version("1..2").is_err());
    }
}
