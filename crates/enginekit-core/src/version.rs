//! Version tags, commit hashes, and the ordering used to pick among cached versions.

use std::cmp::Ordering;
use std::fmt;
use std::time::SystemTime;

/// Identifier of an upstream release, also the name of its cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionTag(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version tag {0:?}: must be a single non-empty path component")]
pub struct InvalidTag(pub String);

impl VersionTag {
    /// Validates that `tag` can safely be used as a directory name.
    pub fn parse(tag: impl Into<String>) -> Result<Self, InvalidTag> {
        let tag = tag.into();
        let bad = tag.is_empty()
            || tag == "."
            || tag == ".."
            || tag.contains(['/', '\\', '\0'])
            || tag.trim() != tag;
        if bad {
            return Err(InvalidTag(tag));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for VersionTag {
    type Err = InvalidTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Source-control commit a tag points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(sha: impl Into<String>) -> Self {
        Self(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated hash as used in archive folder names (first 7 characters).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric reading of a tag such as `v5.0.0-beta98`: release components plus
/// an optional pre-release suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NumericVersion {
    parts: Vec<u64>,
    pre: Option<String>,
}

impl NumericVersion {
    fn parse(tag: &str) -> Option<Self> {
        let body = tag.strip_prefix(['v', 'V']).unwrap_or(tag);
        let (release, pre) = match body.split_once('-') {
            Some((r, p)) => (r, Some(p.to_string())),
            None => (body, None),
        };
        let parts = release
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { parts, pre })
    }
}

impl Ord for NumericVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        // A pre-release sorts below the release it precedes.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }
}

impl PartialOrd for NumericVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `beta98` vs `beta100`: compares the alphabetic head, then the trailing number.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let split = |s: &str| {
        let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (head, num) = s.split_at(s.len() - digits);
        (head.to_string(), num.parse::<u64>().ok())
    };
    let (ha, na) = split(a);
    let (hb, nb) = split(b);
    ha.cmp(&hb).then(na.cmp(&nb)).then_with(|| a.cmp(b))
}

/// A version found in the local cache.
#[derive(Debug, Clone)]
pub struct CachedVersion {
    pub tag: VersionTag,
    pub modified: Option<SystemTime>,
}

/// Orders cached versions so the preferred fallback comes first:
/// numerically parseable tags (highest first) before unparseable ones, then
/// newest modification time, then the lexicographically greatest tag.
pub fn fallback_order(a: &CachedVersion, b: &CachedVersion) -> Ordering {
    let va = NumericVersion::parse(a.tag.as_str());
    let vb = NumericVersion::parse(b.tag.as_str());
    let by_version = match (&va, &vb) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_version
        .then_with(|| b.modified.cmp(&a.modified))
        .then_with(|| b.tag.cmp(&a.tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cached(tag: &str, secs: u64) -> CachedVersion {
        CachedVersion {
            tag: VersionTag::parse(tag).unwrap(),
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    fn pick(mut v: Vec<CachedVersion>) -> String {
        v.sort_by(fallback_order);
        v[0].tag.to_string()
    }

    #[test]
    fn tag_validation() {
        assert!(VersionTag::parse("v5.0.0").is_ok());
        assert!(VersionTag::parse("v5.0.0-beta98").is_ok());
        assert!(VersionTag::parse("").is_err());
        assert!(VersionTag::parse("..").is_err());
        assert!(VersionTag::parse("a/b").is_err());
        assert!(VersionTag::parse("a\\b").is_err());
        assert!(VersionTag::parse(" v1").is_err());
    }

    #[test]
    fn short_commit() {
        assert_eq!(CommitHash::new("abc1234def5678").short(), "abc1234");
        assert_eq!(CommitHash::new("abc").short(), "abc");
    }

    #[test]
    fn highest_numeric_version_wins() {
        let v = vec![cached("v5.0.0", 30), cached("v5.10.0", 10), cached("v5.9.1", 20)];
        assert_eq!(pick(v), "v5.10.0");
    }

    #[test]
    fn prerelease_below_release() {
        let v = vec![cached("v5.0.0-beta100", 50), cached("v5.0.0", 1), cached("v5.0.0-beta98", 60)];
        assert_eq!(pick(v), "v5.0.0");
        let v = vec![cached("v5.0.0-beta98", 60), cached("v5.0.0-beta100", 50)];
        assert_eq!(pick(v), "v5.0.0-beta100");
    }

    #[test]
    fn parseable_beats_unparseable() {
        let v = vec![cached("nightly", 100), cached("v1.0.0", 1)];
        assert_eq!(pick(v), "v1.0.0");
    }

    #[test]
    fn unparseable_fall_back_to_mtime_then_name() {
        let v = vec![cached("alpha", 10), cached("beta", 20)];
        assert_eq!(pick(v), "beta");
        let v = vec![cached("zeta", 10), cached("alpha", 20)];
        assert_eq!(pick(v), "alpha");
        let v = vec![cached("alpha", 10), cached("zeta", 10)];
        assert_eq!(pick(v), "zeta");
    }
}
