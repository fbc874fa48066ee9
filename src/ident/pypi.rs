//! PyPI package names.

use crate::ident::PackageIdentifier;
use crate::types::{ArtiscopeError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A PyPI project name. PyPI has no scopes; equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PyPiPackageIdentifier(String);

impl PyPiPackageIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PackageIdentifier for PyPiPackageIdentifier {
    fn scope(&self) -> Option<&str> {
        None
    }
}

impl FromStr for PyPiPackageIdentifier {
    type Err = ArtiscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(ArtiscopeError::invalid_identifier(raw, "empty package name"));
        }
        if raw.contains('/') {
            return Err(ArtiscopeError::invalid_identifier(
                raw,
                "PyPI names cannot contain '/'",
            ));
        }
        Ok(Self::new(raw))
    }
}

impl fmt::Display for PyPiPackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_equality() {
        let a: PyPiPackageIdentifier = "requests".parse().unwrap();
        assert_eq!(a, PyPiPackageIdentifier::new("requests"));
        assert_ne!(a, PyPiPackageIdentifier::new("Requests"));
        assert_eq!(a.scope(), None);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!("".parse::<PyPiPackageIdentifier>().is_err());
        assert!("a/b".parse::<PyPiPackageIdentifier>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&PyPiPackageIdentifier::new("numpy")).unwrap();
        assert_eq!(json, "\"numpy\"");
    }
}
