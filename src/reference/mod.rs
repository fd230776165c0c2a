mod mediatype;
mod parser;

use std::fmt;

use crate::digest::Digest;

pub use mediatype::MediaType;

pub(crate) use parser::{check_registry, check_tag};

/// Errors from [`ImageReference::try_from`].
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Empty image reference.")]
    Empty,

    #[error("Missing repository.")]
    MissingRepository,

    #[error("Empty tag.")]
    EmptyTag,

    #[error("Invalid character {0:?} in image reference.")]
    InvalidCharacter(char),

    #[error("Invalid registry host {0:?}.")]
    InvalidRegistry(String),

    #[error("Invalid repository path component {0:?}.")]
    InvalidRepository(String),

    #[error("Invalid tag {0:?}.")]
    InvalidTag(String),

    #[error("{0}")]
    InvalidDigest(#[from] crate::digest::DigestError),
}

/// Reference to an image in a container registry, as written by the user.
///
/// Parsing does not apply any default: omitted parts are `None`. The
/// [`PolicyTable`](crate::PolicyTable) fills them later.
///
/// The parts are extracted in a fixed order:
///
/// 1. The digest, after the last `@`. When present, the tag is dropped.
/// 2. The tag, after a `:` that appears after the last `/`.
/// 3. The registry host, if the first `/`-separated segment contains a
///    `.` or a `:`, or if it is `localhost`.
/// 4. Everything else is the repository path.
///
/// The host must be a hostname with an optional port, every path
/// segment must be lowercase alphanumeric runs joined by `.`, `_`,
/// `__` or dashes, and the tag can have up to 128 characters from
/// `[A-Za-z0-9_.-]` (not starting with `.` or `-`).
///
/// # Examples
///
/// ```
/// # use manifest_locator::*;
/// let reference = ImageReference::try_from("localhost:5000/foo/bar:1.2").unwrap();
/// assert_eq!(reference.registry, Some("localhost:5000"));
/// assert_eq!(reference.repository.segments(), ["foo", "bar"]);
/// assert_eq!(reference.tag, Some("1.2"));
/// assert!(reference.digest.is_none());
/// ```
///
/// ```
/// # use manifest_locator::*;
/// let reference = ImageReference::try_from("debian").unwrap();
/// assert_eq!(reference.registry, None);
/// assert_eq!(reference.repository.to_string(), "debian");
/// assert_eq!(reference.tag, None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ImageReference<'a> {
    /// Address of the registry server, if explicit.
    pub registry: Option<&'a str>,

    /// Repository path.
    pub repository: Repository<'a>,

    /// Image tag, if explicit.
    pub tag: Option<&'a str>,

    /// Manifest digest, if present.
    pub digest: Option<Digest>,
}

impl ImageReference<'_> {
    /// Return `true` if the reference is pinned to a digest.
    pub fn is_pinned(&self) -> bool {
        self.digest.is_some()
    }
}

/// Represents a repository path, like `nixos/nix` or
/// `todd2982/watchtower`. It is never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Repository<'a>(Vec<&'a str>);

impl<'a> Repository<'a> {
    pub(crate) fn new(segments: Vec<&'a str>) -> Self {
        debug_assert!(!segments.is_empty());
        Repository(segments)
    }

    /// Segments of the path, in order.
    pub fn segments(&self) -> &[&'a str] {
        &self.0
    }

    /// Return the last segment of the path.
    ///
    /// # Examples
    ///
    /// ```
    /// # use manifest_locator::*;
    /// let reference = ImageReference::try_from("foo/bar/baz:stable").unwrap();
    /// assert_eq!(reference.repository.name(), "baz");
    /// ```
    pub fn name(&self) -> &'a str {
        self.0.last().copied().unwrap_or_default()
    }

    /// Return the first segment of the path, or `None` if the
    /// path has a single segment.
    pub fn namespace(&self) -> Option<&'a str> {
        match self.0.as_slice() {
            [namespace, _, ..] => Some(*namespace),
            _ => None,
        }
    }
}

impl fmt::Display for Repository<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl fmt::Display for ImageReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = self.registry {
            write!(f, "{registry}/")?;
        }

        write!(f, "{}", self.repository)?;

        match (&self.digest, self.tag) {
            (Some(digest), _) => write!(f, "@{digest}"),
            (None, Some(tag)) => write!(f, ":{tag}"),
            (None, None) => Ok(()),
        }
    }
}

impl<'a> TryFrom<&'a str> for ImageReference<'a> {
    type Error = ParseError;

    fn try_from(reference: &'a str) -> Result<Self, Self::Error> {
        parser::parse(reference)
    }
}

#[test]
fn display_references() {
    for reference in [
        "foo",
        "foo/bar:1",
        "example.com:5000/a/b/c:latest",
        "localhost/x",
    ] {
        assert_eq!(
            ImageReference::try_from(reference).unwrap().to_string(),
            reference
        );
    }

    // The tag is dropped when there is a digest.
    let digest = format!("sha256:{}", "e".repeat(64));
    let reference = format!("ghcr.io/foo:1.0@{digest}");
    assert_eq!(
        ImageReference::try_from(reference.as_str())
            .unwrap()
            .to_string(),
        format!("ghcr.io/foo@{digest}")
    );
}

#[test]
fn repository_components() {
    let reference = ImageReference::try_from("ghcr.io/a/b/c").unwrap();
    assert_eq!(reference.repository.namespace(), Some("a"));
    assert_eq!(reference.repository.name(), "c");

    let reference = ImageReference::try_from("alpine").unwrap();
    assert_eq!(reference.repository.namespace(), None);
    assert_eq!(reference.repository.name(), "alpine");
}
