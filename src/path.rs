//! Immutable path values with structural sharing
//!
//! A [`PathValue`] is a fully qualified absolute path stored as a chain of
//! segments: either a root segment with no parent, or a {parent, name} pair
//! where the parent is shared between all paths below it. Enumerating a
//! directory with 10,000 entries allocates 10,000 names but only one parent
//! chain.
//!
//! Comparisons are case-insensitive and depth-ordered: paths are compared
//! segment by segment starting at the root, and a shorter path sorts before
//! any of its descendants.

use crate::error::{FsError, FsResult};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

const SEPARATOR: char = '/';

/// An immutable absolute path. Cloning is cheap (one `Arc` bump) and clones
/// share the parent chain.
#[derive(Clone)]
pub struct PathValue {
    inner: Arc<Segment>,
}

struct Segment {
    /// `None` for the root segment
    parent: Option<PathValue>,
    /// Segment name; never contains separators except for the root ("/")
    name: String,
}

impl PathValue {
    /// Parse an absolute path string into a `PathValue`.
    pub fn parse(path: &str) -> FsResult<PathValue> {
        if !path.starts_with(SEPARATOR) {
            return Err(FsError::InvalidPath {
                path: path.to_string(),
                reason: "path must be absolute".into(),
            });
        }

        let mut current = PathValue::root();
        for segment in path.split(SEPARATOR) {
            if segment.is_empty() {
                continue;
            }
            current = current.push(segment)?;
        }
        Ok(current)
    }

    /// The filesystem root ("/").
    pub fn root() -> PathValue {
        PathValue {
            inner: Arc::new(Segment {
                parent: None,
                name: SEPARATOR.to_string(),
            }),
        }
    }

    /// Append a relative name to this path. The name may contain separators,
    /// in which case each component becomes its own segment.
    pub fn combine(&self, name: &str) -> FsResult<PathValue> {
        if name.is_empty() {
            return Err(FsError::InvalidPath {
                path: name.to_string(),
                reason: "name must not be empty".into(),
            });
        }

        let mut current = self.clone();
        for segment in name.split(SEPARATOR) {
            if segment.is_empty() {
                continue;
            }
            current = current.push(segment)?;
        }
        Ok(current)
    }

    fn push(&self, name: &str) -> FsResult<PathValue> {
        debug_assert!(!name.contains(SEPARATOR));
        if name.contains('\0') {
            return Err(FsError::InvalidPath {
                path: name.to_string(),
                reason: "name contains a NUL byte".into(),
            });
        }
        Ok(PathValue {
            inner: Arc::new(Segment {
                parent: Some(self.clone()),
                name: name.to_string(),
            }),
        })
    }

    /// The name of the final segment (or "/" for the root).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<PathValue> {
        self.inner.parent.clone()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.inner.parent.clone();
        while let Some(p) = current {
            depth += 1;
            current = p.inner.parent.clone();
        }
        depth
    }

    /// Segment names in root-first order, excluding the root itself.
    fn names(&self) -> Vec<&str> {
        let mut result = Vec::new();
        let mut current: &PathValue = self;
        while let Some(parent) = &current.inner.parent {
            result.push(current.inner.name.as_str());
            current = parent;
        }
        result.reverse();
        result
    }

    /// Render the full path as a `String`.
    pub fn full_name(&self) -> String {
        if self.is_root() {
            return self.inner.name.clone();
        }
        let names = self.names();
        let mut out = String::with_capacity(names.iter().map(|n| n.len() + 1).sum());
        for name in names {
            out.push(SEPARATOR);
            out.push_str(name);
        }
        out
    }

    /// Render as a `std::path::PathBuf` for interop with std APIs.
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.full_name())
    }

    /// The path of `self` relative to `ancestor`, as segment names in
    /// root-first order. Returns `None` if `ancestor` is not an ancestor.
    pub fn relative_to(&self, ancestor: &PathValue) -> Option<Vec<String>> {
        let mut names = Vec::new();
        let mut current = self.clone();
        loop {
            if current == *ancestor {
                names.reverse();
                return Some(names);
            }
            match current.parent() {
                Some(parent) => {
                    names.push(current.name().to_string());
                    current = parent;
                }
                None => return None,
            }
        }
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().map(|c| c.to_ascii_lowercase());
    let mut bi = b.chars().map(|c| c.to_ascii_lowercase());
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

impl PartialEq for PathValue {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        self.inner.name.eq_ignore_ascii_case(&other.inner.name)
            && self.inner.parent == other.inner.parent
    }
}

impl Eq for PathValue {}

impl Hash for PathValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.inner.name.chars() {
            c.to_ascii_lowercase().hash(state);
        }
        if let Some(parent) = &self.inner.parent {
            parent.hash(state);
        }
    }
}

impl PartialOrd for PathValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathValue {
    /// Depth-ordered, segment-by-segment, case-insensitive comparison:
    /// a path with fewer segments sorts before any longer path it prefixes.
    fn cmp(&self, other: &Self) -> Ordering {
        let xs = self.names();
        let ys = other.names();
        for i in 0..xs.len().max(ys.len()) {
            match (xs.get(i), ys.get(i)) {
                (None, _) => return Ordering::Less,
                (_, None) => return Ordering::Greater,
                (Some(x), Some(y)) => match cmp_ignore_case(x, y) {
                    Ordering::Equal => continue,
                    other => return other,
                },
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl fmt::Debug for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathValue({})", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let path = PathValue::parse("/data/sub/file.txt").unwrap();
        assert_eq!(path.full_name(), "/data/sub/file.txt");
        assert_eq!(path.name(), "file.txt");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.parent().unwrap().full_name(), "/data/sub");
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(PathValue::parse("data/sub").is_err());
        assert!(PathValue::parse("").is_err());
    }

    #[test]
    fn test_parse_collapses_empty_segments() {
        let path = PathValue::parse("//data//sub/").unwrap();
        assert_eq!(path.full_name(), "/data/sub");
    }

    #[test]
    fn test_root() {
        let root = PathValue::root();
        assert!(root.is_root());
        assert_eq!(root.full_name(), "/");
        assert_eq!(root.depth(), 0);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_combine() {
        let base = PathValue::parse("/data").unwrap();
        let one = base.combine("file.txt").unwrap();
        assert_eq!(one.full_name(), "/data/file.txt");

        // Multi-segment names split into individual segments
        let nested = base.combine("a/b/c").unwrap();
        assert_eq!(nested.full_name(), "/data/a/b/c");
        assert_eq!(nested.name(), "c");
        assert_eq!(nested.parent().unwrap().name(), "b");

        assert!(base.combine("").is_err());
    }

    #[test]
    fn test_parent_chain_is_shared() {
        let dir = PathValue::parse("/data/sub").unwrap();
        let a = dir.combine("a.txt").unwrap();
        let b = dir.combine("b.txt").unwrap();
        assert!(Arc::ptr_eq(
            &a.parent().unwrap().inner,
            &b.parent().unwrap().inner
        ));
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = PathValue::parse("/Data/File.TXT").unwrap();
        let b = PathValue::parse("/data/file.txt").unwrap();
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_depth_ordering() {
        let parent = PathValue::parse("/data").unwrap();
        let child = PathValue::parse("/data/sub").unwrap();
        let sibling = PathValue::parse("/extra").unwrap();

        assert!(parent < child);
        assert!(child < sibling); // "data" < "extra" at depth 1
        assert_eq!(
            PathValue::parse("/A/b").unwrap().cmp(&PathValue::parse("/a/B").unwrap()),
            Ordering::Equal
        );
    }

    #[test]
    fn test_relative_to() {
        let root = PathValue::parse("/data").unwrap();
        let leaf = PathValue::parse("/data/a/b").unwrap();
        assert_eq!(leaf.relative_to(&root).unwrap(), vec!["a", "b"]);
        assert!(root.relative_to(&leaf).is_none());
        assert_eq!(root.relative_to(&root).unwrap(), Vec::<String>::new());
    }
}
