//! Package name and version newtypes.

use std::borrow::Borrow;

/// The name a package is published under.
///
/// Names are kept exactly as the publisher spelled them: they become part of
/// on-disk directory names (`Name~Version`) and the asset tree is
/// case-sensitive on most hosts.
///
/// # Example
///
/// ```
/// use upkg_schema::types::PackageName;
///
/// let name = PackageName::new("Tweening");
/// assert_eq!(name.as_str(), "Tweening");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name.
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Get the package name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A version string or version requirement.
///
/// Versions are stored as strings to support arbitrary formats
/// (`1.2.3`, `2017.1`, `1.0.0-beta`). Ordering and requirement matching go
/// through a [`crate::version::VersionComparator`], never through `Ord` on
/// the raw text.
///
/// # Example
///
/// ```
/// use upkg_schema::types::Version;
///
/// let version = Version::new("1.7.1");
/// assert_eq!(version.as_str(), "1.7.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Version(String);

impl Version {
    /// Create a new version from a string.
    pub fn new(v: &str) -> Self {
        Self(v.to_string())
    }

    /// Get the version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
