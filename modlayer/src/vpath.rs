//! Virtual paths for the overlay namespace.
//!
//! Every catalog key is a [`VirtualPath`]: a normalized, forward-slash,
//! case-sensitive relative path. Normalization canonicalizes separators and
//! resolves `.` and `..` segments, so two spellings of the same location
//! always compare equal. The namespace root is the empty path.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Separator used between virtual path segments.
pub const SEPARATOR: char = '/';

/// A normalized virtual path inside the overlay namespace.
///
/// Construction always normalizes, so a `VirtualPath` never contains
/// backslashes, empty segments, `.` or `..`. Normalization is idempotent.
///
/// # Example
///
/// ```
/// use modlayer::vpath::VirtualPath;
///
/// let path = VirtualPath::new("sprites\\./npc/../player/idle.png");
/// assert_eq!(path.as_str(), "sprites/player/idle.png");
/// assert_eq!(path.parent().unwrap().as_str(), "sprites/player");
/// assert_eq!(path.file_name(), Some("idle.png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Create a normalized virtual path from a raw string.
    ///
    /// Backslashes are treated as separators; empty and `.` segments are
    /// dropped; `..` pops the previous segment and resolves against the
    /// namespace root when there is nothing left to pop.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    /// The namespace root (the empty path).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Build a virtual path from a relative filesystem path.
    ///
    /// Components are joined with the virtual separator; non-UTF-8 names are
    /// converted lossily.
    pub fn from_fs(path: &Path) -> Self {
        let joined = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(joined)
    }

    /// True if this is the namespace root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Some(VirtualPath(self.0[..idx].to_string())),
            None => Some(VirtualPath::root()),
        }
    }

    /// The final segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Some(&self.0[idx + 1..]),
            None => Some(&self.0),
        }
    }

    /// The extension of the final segment (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Append a segment (or a relative sub-path), normalizing the result.
    pub fn join(&self, tail: impl AsRef<str>) -> VirtualPath {
        if self.is_root() {
            VirtualPath::new(tail.as_ref())
        } else {
            VirtualPath::new(format!("{}/{}", self.0, tail.as_ref()))
        }
    }

    /// Component-wise prefix test. The root is a prefix of every path.
    pub fn starts_with(&self, prefix: &VirtualPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.len() > prefix.0.len()
                && self.0.starts_with(&prefix.0)
                && self.0.as_bytes()[prefix.0.len()] == SEPARATOR as u8)
    }

    /// Iterate over the path segments (empty for the root).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VirtualPath {
    fn from(raw: &str) -> Self {
        VirtualPath::new(raw)
    }
}

/// Normalize a raw path string into canonical virtual-path form.
///
/// Idempotent: `normalize(normalize(p)) == normalize(p)` for any input.
pub fn normalize(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                // Leading `..` resolves against the namespace root.
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize("a\\b/c"), "a/b/c");
        assert_eq!(normalize("a//b///c"), "a/b/c");
        assert_eq!(normalize("/a/b/"), "a/b");
    }

    #[test]
    fn test_normalize_dot_segments() {
        assert_eq!(normalize("a/./b"), "a/b");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("../a"), "a");
        assert_eq!(normalize("a/../../b"), "b");
        assert_eq!(normalize("."), "");
        assert_eq!(normalize(".."), "");
    }

    #[test]
    fn test_normalize_preserves_case() {
        assert_eq!(normalize("Sprites/Player.PNG"), "Sprites/Player.PNG");
    }

    #[test]
    fn test_root() {
        let root = VirtualPath::root();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);
        assert_eq!(root.file_name(), None);
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn test_parent_chain() {
        let path = VirtualPath::new("a/b/c");
        let b = path.parent().unwrap();
        assert_eq!(b.as_str(), "a/b");
        let a = b.parent().unwrap();
        assert_eq!(a.as_str(), "a");
        let root = a.parent().unwrap();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_file_name_and_extension() {
        assert_eq!(VirtualPath::new("a/b/idle.png").file_name(), Some("idle.png"));
        assert_eq!(VirtualPath::new("a/b/idle.png").extension(), Some("png"));
        assert_eq!(VirtualPath::new("a/noext").extension(), None);
        // Leading-dot names have no extension.
        assert_eq!(VirtualPath::new("a/.hidden").extension(), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(VirtualPath::root().join("a/b").as_str(), "a/b");
        assert_eq!(VirtualPath::new("a").join("b").as_str(), "a/b");
        assert_eq!(VirtualPath::new("a").join("../b").as_str(), "b");
    }

    #[test]
    fn test_starts_with() {
        let path = VirtualPath::new("a/b/c");
        assert!(path.starts_with(&VirtualPath::root()));
        assert!(path.starts_with(&VirtualPath::new("a")));
        assert!(path.starts_with(&VirtualPath::new("a/b")));
        assert!(path.starts_with(&VirtualPath::new("a/b/c")));
        assert!(!path.starts_with(&VirtualPath::new("a/b/c/d")));
        // "ab" is not a component prefix of "a/b".
        assert!(!VirtualPath::new("ab/c").starts_with(&VirtualPath::new("a")));
    }

    #[test]
    fn test_from_fs() {
        let path = VirtualPath::from_fs(Path::new("sprites/player/idle.png"));
        assert_eq!(path.as_str(), "sprites/player/idle.png");
    }

    #[test]
    fn test_segments() {
        let path = VirtualPath::new("a/b/c");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(VirtualPath::root().segments().count(), 0);
    }

    proptest! {
        #[test]
        fn test_normalize_idempotent(raw in ".{0,64}") {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn test_normalize_never_contains_dot_segments(
            raw in r"[a-zA-Z0-9_./\\-]{0,64}"
        ) {
            let normalized = normalize(&raw);
            for segment in normalized.split('/') {
                prop_assert_ne!(segment, ".");
                prop_assert_ne!(segment, "..");
            }
        }
    }
}
