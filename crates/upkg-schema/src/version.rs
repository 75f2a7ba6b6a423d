//! Version comparison
//!
//! Supports:
//! - Any: `*` or `latest`
//! - Exact: `1.7.1`
//! - Semver requirements: `^1.2`, `~1.2`, `>=1.0, <2.0`
//! - Segment prefixes: `1.2` matches `1.2.x` but not `1.20.0`
//!
//! The resolver and locator only ever talk to a [`VersionComparator`], so a
//! host can swap in its own ordering without touching the engine.

use crate::types::Version;

/// Orders versions and matches them against requirements.
pub trait VersionComparator: Send + Sync {
    /// Returns true if `candidate` is strictly newer than `current`.
    fn greater_than(&self, candidate: &Version, current: &Version) -> bool;

    /// Returns true if `version` satisfies `requirement`.
    fn satisfies(&self, version: &Version, requirement: &Version) -> bool;
}

/// Numeric dotted-segment ordering with semver requirement matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparator;

impl VersionComparator for DefaultComparator {
    fn greater_than(&self, candidate: &Version, current: &Version) -> bool {
        is_newer(base_version(current), base_version(candidate))
    }

    fn satisfies(&self, version: &Version, requirement: &Version) -> bool {
        version_satisfies_requirement(version, requirement)
    }
}

/// Strip requirement operators so `^1.2` and `>=1.2` order like `1.2`.
pub fn base_version(v: &str) -> &str {
    let v = v.trim();
    let v = v.split(',').next().unwrap_or(v);
    v.trim_start_matches(|c: char| matches!(c, '^' | '~' | '=' | '>' | '<' | ' '))
        .trim_start_matches('v')
}

/// Compare two versions. Returns true if `latest` is newer than `current`.
/// Handles simple numeric comparison (e.g. 1.2.3 > 1.2.2).
pub fn is_newer(current: &str, latest: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> {
        v.split(['.', '-'])
            .map_while(|s| s.parse::<u32>().ok())
            .collect()
    };

    let c_parts = parse(current);
    let l_parts = parse(latest);

    for i in 0..std::cmp::max(c_parts.len(), l_parts.len()) {
        let cv = c_parts.get(i).unwrap_or(&0);
        let lv = l_parts.get(i).unwrap_or(&0);
        if lv > cv {
            return true;
        }
        if cv > lv {
            return false;
        }
    }

    // Stable (no suffix) beats any pre-release with the same numbers.
    let has_suffix = |v: &str| v.contains('-') || v.chars().any(char::is_alphabetic);

    let c_has_suffix = has_suffix(current);
    let l_has_suffix = has_suffix(latest);

    if c_has_suffix && !l_has_suffix {
        return true;
    }
    if !c_has_suffix && l_has_suffix {
        return false;
    }

    // Both pre-release: lexicographic is good enough ("beta.2" > "beta.1", "rc" > "beta").
    if c_has_suffix && l_has_suffix {
        return latest > current;
    }

    false
}

/// Check if a version satisfies a requirement using semver.
/// Falls back to segment-based prefix matching for non-semver specs.
pub fn version_satisfies_requirement(version: &str, requirement: &str) -> bool {
    let requirement = requirement.trim();
    if requirement.is_empty() || requirement == "latest" || requirement == "*" {
        return true;
    }

    if version == requirement {
        return true;
    }

    if let (Ok(ver), Ok(req)) = (
        semver::Version::parse(version),
        semver::VersionReq::parse(requirement),
    ) {
        return req.matches(&ver);
    }

    version_matches_segments(version, requirement)
}

/// Check if a version string matches a requirement by comparing segments.
/// "0.2" matches "0.2.0", "0.2.1" but NOT "0.20.0"
pub fn version_matches_segments(version: &str, requirement: &str) -> bool {
    let v_parts: Vec<&str> = version.split('.').collect();
    let r_parts: Vec<&str> = requirement.split('.').collect();

    if r_parts.len() > v_parts.len() {
        return false;
    }

    r_parts.iter().zip(v_parts.iter()).all(|(r, v)| r == v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer_numeric() {
        assert!(is_newer("1.2.3", "1.2.4"));
        assert!(is_newer("1.2.3", "1.3.0"));
        assert!(!is_newer("1.2.3", "1.2.2"));
        assert!(!is_newer("1.2.3", "1.2.3"));
    }

    #[test]
    fn test_is_newer_prerelease_upgrade() {
        assert!(is_newer("1.0.0-beta", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0-beta"));
    }

    #[test]
    fn test_is_newer_intra_prerelease() {
        assert!(is_newer("1.0.0-beta.1", "1.0.0-beta.2"));
        assert!(is_newer("1.0.0-alpha", "1.0.0-beta"));
        assert!(!is_newer("1.0.0-beta.2", "1.0.0-beta.1"));
    }

    #[test]
    fn test_comparator_ignores_operators() {
        let cmp = DefaultComparator;
        assert!(cmp.greater_than(&Version::new("^2.0"), &Version::new("1.4.0")));
        assert!(!cmp.greater_than(&Version::new(">=0.5"), &Version::new("1.0.0")));
    }

    #[test]
    fn test_version_satisfies_requirement_exact() {
        assert!(version_satisfies_requirement("1.2.3", "1.2.3"));
        assert!(!version_satisfies_requirement("1.2.3", "1.2.4"));
    }

    #[test]
    fn test_version_satisfies_requirement_any() {
        assert!(version_satisfies_requirement("1.2.3", "latest"));
        assert!(version_satisfies_requirement("0.0.1", "*"));
        assert!(version_satisfies_requirement("0.0.1", ""));
    }

    #[test]
    fn test_version_satisfies_requirement_semver() {
        assert!(version_satisfies_requirement("0.26.1", "^0.26"));
        assert!(!version_satisfies_requirement("0.27.0", "^0.26"));
    }

    #[test]
    fn test_version_satisfies_requirement_prefix() {
        assert!(version_satisfies_requirement("2017.1", "2017"));
        assert!(!version_satisfies_requirement("2018.1", "2017"));
    }

    #[test]
    fn test_version_matches_segments() {
        assert!(version_matches_segments("0.2.0", "0.2"));
        assert!(!version_matches_segments("0.20.0", "0.2"));
        assert!(!version_matches_segments("10.0.0", "1"));
    }
}
