//! Element path addressing.

use std::fmt;

use smol_str::SmolStr;

/// Address of an element in a provider's model tree.
///
/// A path is a sequence of non-empty segments. The text form joins segments
/// with `/`; parsing drops empty segments, so leading, trailing and doubled
/// separators are tolerated. The empty path addresses the model root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementPath {
    segments: Vec<SmolStr>,
}

impl ElementPath {
    /// The root path (no segments).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a path from its text form.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let segments = text
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(SmolStr::new)
            .collect();
        Self { segments }
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Iterates over the segments front to back.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(SmolStr::as_str)
    }

    /// The final segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(SmolStr::as_str)
    }

    /// Returns this path extended by one relative part.
    ///
    /// The part may itself contain separators; its segments are appended in
    /// order.
    #[must_use]
    pub fn child(&self, part: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            part.split('/')
                .filter(|segment| !segment.is_empty())
                .map(SmolStr::new),
        );
        Self { segments }
    }

    /// Concatenates two paths.
    #[must_use]
    pub fn join(&self, other: &ElementPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The path without its final segment. The parent of the root is the
    /// root itself.
    #[must_use]
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl From<&str> for ElementPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for ElementPath {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_segments() {
        let path = ElementPath::parse("/a//b/c/");
        assert_eq!(path.segments().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(path.to_string(), "a/b/c");
    }

    #[test]
    fn root_round_trip() {
        let root = ElementPath::parse("");
        assert!(root.is_root());
        assert_eq!(root.to_string(), "");
        assert_eq!(ElementPath::parse("///"), root);
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(ElementPath::root().parent(), ElementPath::root());
        assert_eq!(ElementPath::parse("a/b").parent(), ElementPath::parse("a"));
        assert_eq!(ElementPath::parse("a").parent(), ElementPath::root());
    }

    #[test]
    fn child_splits_on_separator() {
        let base = ElementPath::parse("status");
        assert_eq!(base.child("opMode/Command"), ElementPath::parse("status/opMode/Command"));
    }

    #[test]
    fn join_concatenates() {
        let left = ElementPath::parse("a/b");
        let right = ElementPath::parse("c/d");
        assert_eq!(left.join(&right), ElementPath::parse("a/b/c/d"));
        assert_eq!(left.join(&ElementPath::root()), left);
    }

    #[test]
    fn last_segment() {
        assert_eq!(ElementPath::parse("a/b/c").last(), Some("c"));
        assert_eq!(ElementPath::root().last(), None);
    }
}
