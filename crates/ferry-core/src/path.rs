//! Hierarchical provider paths
//!
//! A [`ProviderPath`] names a node inside one provider's namespace. It is an
//! ordered list of parts (the first being the root) plus a folder flag. Each
//! part may carry the identifier an id-based provider assigned to it; a path
//! whose last part has no identifier is speculative until the provider
//! resolves it.

use crate::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One segment of a [`ProviderPath`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathPart {
    value: String,
    id: Option<String>,
}

impl PathPart {
    /// Create a part without a provider identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            id: None,
        }
    }

    /// Create a part carrying a provider identifier
    pub fn with_id(value: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            id: Some(id.into()),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A path to a file or folder within a single provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPath")]
pub struct ProviderPath {
    parts: Vec<PathPart>,
    folder: bool,
}

/// Wire form of a [`ProviderPath`], checked before use
#[derive(Deserialize)]
struct RawPath {
    parts: Vec<PathPart>,
    folder: bool,
}

impl TryFrom<RawPath> for ProviderPath {
    type Error = ProviderError;

    fn try_from(raw: RawPath) -> Result<Self> {
        Self::from_parts(raw.parts, raw.folder)
    }
}

impl ProviderPath {
    /// The root folder
    pub fn root() -> Self {
        Self {
            parts: vec![PathPart::new("")],
            folder: true,
        }
    }

    /// The root folder of an id-based provider
    pub fn root_with_id(id: impl Into<String>) -> Self {
        Self {
            parts: vec![PathPart::with_id("", id)],
            folder: true,
        }
    }

    /// Parse a materialized path such as `/docs/report.txt` or `/docs/`.
    ///
    /// A trailing slash marks a folder. Empty, `.` and `..` segments are
    /// rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| ProviderError::InvalidPath(format!("{raw:?} must start with '/'")))?;

        if rest.is_empty() {
            return Ok(Self::root());
        }

        let folder = rest.ends_with('/');
        let body = rest.strip_suffix('/').unwrap_or(rest);

        let mut parts = vec![PathPart::new("")];
        for segment in body.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(ProviderError::InvalidPath(format!(
                    "{raw:?} contains an invalid segment"
                )));
            }
            parts.push(PathPart::new(segment));
        }

        Ok(Self { parts, folder })
    }

    /// Build a path from parts; the first part must be the root
    pub fn from_parts(parts: Vec<PathPart>, folder: bool) -> Result<Self> {
        match parts.first() {
            Some(root) if root.value.is_empty() => {}
            _ => return Err(ProviderError::InvalidPath("path must begin at the root".into())),
        }
        if parts.len() == 1 && !folder {
            return Err(ProviderError::InvalidPath("the root is always a folder".into()));
        }
        Ok(Self { parts, folder })
    }

    pub fn is_dir(&self) -> bool {
        self.folder
    }

    pub fn is_file(&self) -> bool {
        !self.folder
    }

    pub fn is_root(&self) -> bool {
        self.parts.len() == 1
    }

    /// Name of the last segment (empty for the root)
    pub fn name(&self) -> &str {
        self.last().value()
    }

    /// Provider identifier of the last segment, if resolved
    pub fn identifier(&self) -> Option<&str> {
        self.last().id()
    }

    /// Attach a provider identifier to the last segment
    pub fn set_identifier(&mut self, id: Option<String>) {
        self.last_mut().id = id;
    }

    pub fn parts(&self) -> &[PathPart] {
        &self.parts
    }

    /// Segment names below the root
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.parts[1..].iter().map(PathPart::value)
    }

    /// The containing folder, `None` for the root
    pub fn parent(&self) -> Option<ProviderPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
            folder: true,
        })
    }

    /// A child of this path; the result is speculative (no identifier)
    pub fn child(&self, name: impl Into<String>, folder: bool) -> ProviderPath {
        let mut parts = self.parts.clone();
        parts.push(PathPart::new(name));
        Self { parts, folder }
    }

    /// A child of this path whose provider identifier is already known
    pub fn child_with_id(
        &self,
        name: impl Into<String>,
        id: Option<String>,
        folder: bool,
    ) -> ProviderPath {
        let mut child = self.child(name, folder);
        child.set_identifier(id);
        child
    }

    /// Replace the last segment's name. Clears its identifier.
    pub fn rename(&mut self, name: impl Into<String>) {
        let last = self.last_mut();
        last.value = name.into();
        last.id = None;
    }

    /// Advance the last segment to the next name in the collision-avoidance
    /// sequence: `a.txt` -> `a (1).txt` -> `a (2).txt`. Folders never split an
    /// extension. Clears the identifier, since the new name is speculative.
    pub fn increment_name(&mut self) {
        let next = incremented(self.name(), self.folder);
        self.rename(next);
    }

    /// Slash-joined representation, with a trailing slash for folders
    pub fn materialized(&self) -> String {
        let mut out = String::from("/");
        out.push_str(&self.segments().collect::<Vec<_>>().join("/"));
        if self.folder && !self.is_root() {
            out.push('/');
        }
        out
    }

    /// Path of this node relative to `ancestor`, without a leading slash.
    /// `None` when `ancestor` is not a prefix of this path.
    pub fn relative_to(&self, ancestor: &ProviderPath) -> Option<String> {
        if ancestor.parts.len() > self.parts.len() {
            return None;
        }
        let shared = ancestor
            .segments()
            .zip(self.segments())
            .all(|(a, b)| a == b);
        if !shared {
            return None;
        }
        let rest: Vec<&str> = self.segments().skip(ancestor.parts.len() - 1).collect();
        let mut out = rest.join("/");
        if self.folder && !rest.is_empty() {
            out.push('/');
        }
        Some(out)
    }

    fn last(&self) -> &PathPart {
        // parts always holds at least the root
        &self.parts[self.parts.len() - 1]
    }

    fn last_mut(&mut self) -> &mut PathPart {
        let idx = self.parts.len() - 1;
        &mut self.parts[idx]
    }
}

impl fmt::Display for ProviderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.materialized())
    }
}

impl std::str::FromStr for ProviderPath {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn incremented(value: &str, folder: bool) -> String {
    let (stem, ext) = if folder {
        (value, "")
    } else {
        split_extension(value)
    };
    match split_counter(stem) {
        Some((base, n)) => format!("{} ({}){}", base, n + 1, ext),
        None => format!("{} (1){}", stem, ext),
    }
}

/// `report (3)` -> `("report", 3)`
fn split_counter(stem: &str) -> Option<(&str, u64)> {
    let inner = stem.strip_suffix(')')?;
    let open = inner.rfind(" (")?;
    let digits = &inner[open + 2..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&inner[..open], digits.parse().ok()?))
}

/// Split like `os.path.splitext`: a leading dot is not an extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[..idx].chars().all(|c| c == '.') => {
            (&name[..idx], &name[idx..])
        }
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn test_deserialize_checks_parts() {
        let path = ProviderPath::parse("/docs/a.txt").unwrap();
        let encoded = serde_json::to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<ProviderPath>(&encoded).unwrap(), path);

        assert!(serde_json::from_str::<ProviderPath>(r#"{"parts":[],"folder":true}"#).is_err());
        assert!(serde_json::from_str::<ProviderPath>(
            r#"{"parts":[{"value":"docs","id":null}],"folder":true}"#
        )
        .is_err());
    }

    #[test]
    fn test_parse_file_and_folder() {
        let file = ProviderPath::parse("/docs/report.txt").unwrap();
        assert!(file.is_file());
        assert_eq!(file.name(), "report.txt");
        assert_eq!(file.materialized(), "/docs/report.txt");

        let folder = ProviderPath::parse("/docs/").unwrap();
        assert!(folder.is_dir());
        assert_eq!(folder.name(), "docs");
        assert_eq!(folder.to_string(), "/docs/");

        let root = ProviderPath::parse("/").unwrap();
        assert!(root.is_root());
        assert!(root.parent().is_none());
    }

    #[rstest]
    #[case("docs")]
    #[case("/a//b")]
    #[case("/a/../b")]
    #[case("/./")]
    fn test_parse_rejects(#[case] raw: &str) {
        assert!(matches!(
            ProviderPath::parse(raw),
            Err(ProviderError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_parent_and_child() {
        let path = ProviderPath::parse("/a/b/c.txt").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.materialized(), "/a/b/");
        assert!(parent.is_dir());
        assert_eq!(parent.child("c.txt", false), path);

        let nested = parent.child_with_id("d", Some("id-9".into()), true);
        assert_eq!(nested.materialized(), "/a/b/d/");
        assert_eq!(nested.identifier(), Some("id-9"));
    }

    #[rstest]
    #[case("a.txt", false, "a (1).txt")]
    #[case("a (1).txt", false, "a (2).txt")]
    #[case("a (9)", false, "a (10)")]
    #[case("archive.tar.gz", false, "archive.tar (1).gz")]
    #[case(".bashrc", false, ".bashrc (1)")]
    #[case("photos.2024", true, "photos.2024 (1)")]
    #[case("a (x).txt", false, "a (x) (1).txt")]
    fn test_increment_name(#[case] name: &str, #[case] folder: bool, #[case] expected: &str) {
        let mut path = ProviderPath::root().child(name, folder);
        path.increment_name();
        assert_eq!(path.name(), expected);
    }

    #[test]
    fn test_increment_clears_identifier() {
        let mut path = ProviderPath::root().child_with_id("a.txt", Some("abc".into()), false);
        path.increment_name();
        assert_eq!(path.identifier(), None);
    }

    #[test]
    fn test_relative_to() {
        let root = ProviderPath::parse("/a/").unwrap();
        let file = ProviderPath::parse("/a/b/c.txt").unwrap();
        assert_eq!(file.relative_to(&root).as_deref(), Some("b/c.txt"));

        let other = ProviderPath::parse("/x/").unwrap();
        assert_eq!(file.relative_to(&other), None);

        let sub = ProviderPath::parse("/a/b/").unwrap();
        assert_eq!(sub.relative_to(&root).as_deref(), Some("b/"));
    }

    proptest! {
        #[test]
        fn prop_increment_never_repeats(stem in "[a-z]{1,8}", ext in "(\\.[a-z]{1,3})?", steps in 1usize..30) {
            let mut path = ProviderPath::root().child(format!("{stem}{ext}"), false);
            let mut seen = HashSet::new();
            seen.insert(path.name().to_string());
            for _ in 0..steps {
                path.increment_name();
                prop_assert!(seen.insert(path.name().to_string()));
                prop_assert!(path.name().ends_with(ext.as_str()));
            }
        }
    }
}
