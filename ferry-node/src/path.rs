use std::fmt::{Display, Formatter};

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// An absolute, normalised path within the virtual file system.
///
/// Paths always start with `/`, never end with one (unless they are the root)
/// and never contain empty components.
pub struct VirtualPath(String);

impl VirtualPath {
    /// Creates a new path, normalising separators.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut normalised = String::new();
        for component in path
            .as_ref()
            .split(SEPARATOR)
            .filter(|c| !c.is_empty())
        {
            normalised.push(SEPARATOR);
            normalised.push_str(component);
        }

        if normalised.is_empty() {
            normalised.push(SEPARATOR);
        }

        Self(normalised)
    }

    /// The root directory.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// The last component of the path, empty for the root.
    pub fn name(&self) -> &str {
        self.0
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    /// The parent directory, `None` for the root.
    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_root() {
            return None;
        }

        let idx = self.0.rfind(SEPARATOR)?;
        if idx == 0 {
            Some(Self::root())
        } else {
            Some(Self(self.0[..idx].to_string()))
        }
    }

    /// Appends a relative path.
    pub fn join(&self, child: impl AsRef<str>) -> VirtualPath {
        Self::new(format!("{}{}{}", self.0, SEPARATOR, child.as_ref()))
    }

    /// The components of the path, excluding the root.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|c| !c.is_empty())
    }

    /// Returns if `other` lives somewhere below this directory.
    pub fn is_ancestor_of(&self, other: &VirtualPath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }

        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0[self.0.len()..].starts_with(SEPARATOR)
    }
}

impl Display for VirtualPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VirtualPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VirtualPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalisation() {
        assert_eq!(VirtualPath::new("a//b/").as_str(), "/a/b");
        assert_eq!(VirtualPath::new("").as_str(), "/");
        assert_eq!(VirtualPath::new("///").as_str(), "/");
        assert!(VirtualPath::new("/").is_root());
    }

    #[test]
    fn test_parent_and_name() {
        let path = VirtualPath::new("/mp3/release/track.mp3");
        assert_eq!(path.name(), "track.mp3");
        assert_eq!(path.parent(), Some(VirtualPath::new("/mp3/release")));
        assert_eq!(VirtualPath::new("/mp3").parent(), Some(VirtualPath::root()));
        assert_eq!(VirtualPath::root().parent(), None);
        assert_eq!(VirtualPath::root().name(), "");
    }

    #[test]
    fn test_ancestry() {
        let dir = VirtualPath::new("/dir1");
        assert!(dir.is_ancestor_of(&VirtualPath::new("/dir1/dir2")));
        assert!(!dir.is_ancestor_of(&VirtualPath::new("/dir10/dir2")));
        assert!(!dir.is_ancestor_of(&dir));
        assert!(VirtualPath::root().is_ancestor_of(&dir));
        assert_eq!(dir.join("dir2/file"), VirtualPath::new("/dir1/dir2/file"));
        assert_eq!(dir.join("x").components().collect::<Vec<_>>(), vec!["dir1", "x"]);
    }
}
