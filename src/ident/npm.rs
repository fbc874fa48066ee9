//! npm package names and scope/package filter tokens.

use crate::ident::PackageIdentifier;
use crate::types::{ArtiscopeError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An npm package, optionally inside a scope.
///
/// The scope is stored without its leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NpmPackageIdentifier {
    scope: Option<String>,
    name: String,
}

impl NpmPackageIdentifier {
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            scope: None,
            name: name.into(),
        }
    }

    pub fn scoped(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl PackageIdentifier for NpmPackageIdentifier {
    fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl FromStr for NpmPackageIdentifier {
    type Err = ArtiscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('/').collect();
        match parts.as_slice() {
            [name] => {
                if name.is_empty() {
                    return Err(ArtiscopeError::invalid_identifier(raw, "empty package name"));
                }
                Ok(Self::unscoped(*name))
            }
            [scope, name] => {
                let scope = scope.strip_prefix('@').ok_or_else(|| {
                    ArtiscopeError::invalid_identifier(
                        raw,
                        format!("scope '{}' must start with '@'", scope),
                    )
                })?;
                if scope.is_empty() {
                    return Err(ArtiscopeError::invalid_identifier(raw, "empty scope"));
                }
                if name.is_empty() {
                    return Err(ArtiscopeError::invalid_identifier(raw, "empty package name"));
                }
                Ok(Self::scoped(scope, *name))
            }
            _ => Err(ArtiscopeError::invalid_identifier(
                raw,
                "expected at most one '/' to separate scope and package name",
            )),
        }
    }
}

impl fmt::Display for NpmPackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "@{}/{}", scope, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl Ord for NpmPackageIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string()
            .cmp(&other.to_string())
            .then_with(|| self.scope.cmp(&other.scope))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for NpmPackageIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A whole scope, an unscoped package, or a package inside a scope.
///
/// Used for trusted/excluded filter files and for not-claimed results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NpmPackageOrScope {
    Scope { scope: String },
    Package { name: String },
    Scoped { scope: String, name: String },
}

impl NpmPackageOrScope {
    pub fn scope(&self) -> Option<&str> {
        match self {
            NpmPackageOrScope::Scope { scope } | NpmPackageOrScope::Scoped { scope, .. } => {
                Some(scope)
            }
            NpmPackageOrScope::Package { .. } => None,
        }
    }

    pub fn package_name(&self) -> Option<&str> {
        match self {
            NpmPackageOrScope::Package { name } | NpmPackageOrScope::Scoped { name, .. } => {
                Some(name)
            }
            NpmPackageOrScope::Scope { .. } => None,
        }
    }
}

impl From<&NpmPackageIdentifier> for NpmPackageOrScope {
    fn from(id: &NpmPackageIdentifier) -> Self {
        match &id.scope {
            Some(scope) => NpmPackageOrScope::Scoped {
                scope: scope.clone(),
                name: id.name.clone(),
            },
            None => NpmPackageOrScope::Package {
                name: id.name.clone(),
            },
        }
    }
}

impl FromStr for NpmPackageOrScope {
    type Err = ArtiscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        if raw.contains('/') {
            let id: NpmPackageIdentifier = raw.parse()?;
            return Ok(NpmPackageOrScope::from(&id));
        }

        match raw.strip_prefix('@') {
            Some("") => Err(ArtiscopeError::invalid_identifier(raw, "empty scope")),
            Some(scope) => Ok(NpmPackageOrScope::Scope {
                scope: scope.to_string(),
            }),
            None if raw.is_empty() => {
                Err(ArtiscopeError::invalid_identifier(raw, "empty package name"))
            }
            None => Ok(NpmPackageOrScope::Package {
                name: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for NpmPackageOrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NpmPackageOrScope::Scope { scope } => write!(f, "@{}", scope),
            NpmPackageOrScope::Package { name } => f.write_str(name),
            NpmPackageOrScope::Scoped { scope, name } => write!(f, "@{}/{}", scope, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_scoped() {
        let id: NpmPackageIdentifier = "@company/utils".parse().unwrap();
        assert_eq!(id.scope(), Some("company"));
        assert_eq!(id.name(), "utils");
    }

    #[test]
    fn test_parse_unscoped() {
        let id: NpmPackageIdentifier = "lodash".parse().unwrap();
        assert_eq!(id.scope(), None);
        assert_eq!(id.name(), "lodash");
    }

    #[test]
    fn test_round_trip() {
        for raw in ["lodash", "@company/utils", "@Mixed/Case-Pkg", "left-pad", "@a/b.c_d"] {
            let id: NpmPackageIdentifier = raw.parse().unwrap();
            assert_eq!(id.to_string(), raw);
            let again: NpmPackageIdentifier = id.to_string().parse().unwrap();
            assert_eq!(again, id);
        }
    }

    #[test]
    fn test_rejects_scope_without_at() {
        let err = "company/utils".parse::<NpmPackageIdentifier>().unwrap_err();
        assert!(err.to_string().contains("must start with '@'"));
    }

    #[test]
    fn test_rejects_multiple_separators() {
        assert!("@a/b/c".parse::<NpmPackageIdentifier>().is_err());
    }

    #[test]
    fn test_rejects_empty_parts() {
        assert!("".parse::<NpmPackageIdentifier>().is_err());
        assert!("@/x".parse::<NpmPackageIdentifier>().is_err());
        assert!("@scope/".parse::<NpmPackageIdentifier>().is_err());
    }

    #[test]
    fn test_equality_uses_structure() {
        let mut set = HashSet::new();
        set.insert(NpmPackageIdentifier::scoped("foo", "bar"));
        assert!(set.contains(&"@foo/bar".parse::<NpmPackageIdentifier>().unwrap()));
        assert!(!set.contains(&NpmPackageIdentifier::unscoped("bar")));
        assert_ne!(
            NpmPackageIdentifier::scoped("Foo", "bar"),
            NpmPackageIdentifier::scoped("foo", "bar")
        );
    }

    #[test]
    fn test_ordering_by_canonical_string() {
        let mut ids: Vec<NpmPackageIdentifier> = ["zeta", "@scope/alpha", "beta"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let sorted: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(sorted, vec!["@scope/alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_package_or_scope_parse() {
        assert_eq!(
            "@foo".parse::<NpmPackageOrScope>().unwrap(),
            NpmPackageOrScope::Scope { scope: "foo".into() }
        );
        assert_eq!(
            "baz".parse::<NpmPackageOrScope>().unwrap(),
            NpmPackageOrScope::Package { name: "baz".into() }
        );
        assert_eq!(
            "@foo/bar".parse::<NpmPackageOrScope>().unwrap(),
            NpmPackageOrScope::Scoped {
                scope: "foo".into(),
                name: "bar".into()
            }
        );
        assert!("foo/bar".parse::<NpmPackageOrScope>().is_err());
        assert!("@".parse::<NpmPackageOrScope>().is_err());
        assert!("".parse::<NpmPackageOrScope>().is_err());
    }

    #[test]
    fn test_package_or_scope_display() {
        for raw in ["@foo", "baz", "@foo/bar"] {
            assert_eq!(raw.parse::<NpmPackageOrScope>().unwrap().to_string(), raw);
        }
    }

    #[test]
    fn test_package_or_scope_accessors() {
        let scope = NpmPackageOrScope::Scope { scope: "foo".into() };
        assert_eq!(scope.scope(), Some("foo"));
        assert_eq!(scope.package_name(), None);

        let pkg = NpmPackageOrScope::from(&NpmPackageIdentifier::unscoped("baz"));
        assert_eq!(pkg.scope(), None);
        assert_eq!(pkg.package_name(), Some("baz"));
    }

    #[test]
    fn test_package_or_scope_json_shape() {
        let json = serde_json::to_value(NpmPackageOrScope::Scope { scope: "foo".into() }).unwrap();
        assert_eq!(json["kind"], "scope");
        assert_eq!(json["scope"], "foo");
    }
}
