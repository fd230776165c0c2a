//! Parse a reference to an image in a container registry.
//!
//! The reference is split in three steps, always in the same order:
//! digest, then tag, then registry host. Each step only looks at what
//! the previous one left. Every part is then checked against the
//! reference grammar, so it can be copied into a URL as it is.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use super::*;

/// Hostname that is always classified as a registry, even if it has
/// no `.` or `:`.
const LOCALHOST: &str = "localhost";

/// DNS labels separated by `.`, and an optional port.
const REGISTRY_REGEXP: &str = r"^(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*(?::[0-9]+)?$";

/// Lowercase alphanumeric runs, joined by `.`, `_`, `__` or dashes.
const PATH_COMPONENT_REGEXP: &str = r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$";

const TAG_REGEXP: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$";

lazy_static! {
    static ref REGISTRY: Regex = Regex::new(REGISTRY_REGEXP).expect("registry regexp");
    static ref PATH_COMPONENT: Regex =
        Regex::new(PATH_COMPONENT_REGEXP).expect("path component regexp");
    static ref TAG: Regex = Regex::new(TAG_REGEXP).expect("tag regexp");
}

type Result<T> = std::result::Result<T, ParseError>;

pub(super) fn parse(reference: &str) -> Result<ImageReference<'_>> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ParseError::Empty);
    }

    let (name, digest) = split_digest(reference);
    let digest = digest.map(Digest::try_from).transpose()?;

    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || *c == '@')
    {
        return Err(ParseError::InvalidCharacter(c));
    }

    // The tag is not part of the URL of a pinned reference, so it
    // is not validated.
    let (name, tag) = split_tag(name);
    let tag = match tag {
        Some(tag) if digest.is_some() => {
            trace!(reference, tag, "tag ignored in digest-pinned reference");
            None
        }
        Some(tag) => {
            check_tag(tag)?;
            Some(tag)
        }
        None => None,
    };

    let (registry, path) = split_registry(name);
    let segments: Vec<&str> = match path {
        Some(path) => path.split('/').collect(),
        None => Vec::new(),
    };

    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(ParseError::MissingRepository);
    }

    if let Some(registry) = registry {
        check_registry(registry)?;
    }

    if let Some(segment) = segments.iter().find(|s| !PATH_COMPONENT.is_match(s)) {
        return Err(ParseError::InvalidRepository(segment.to_string()));
    }

    trace!(reference, ?registry, ?segments, ?tag, "parsed image reference");

    Ok(ImageReference {
        registry,
        repository: Repository::new(segments),
        tag,
        digest,
    })
}

/// Check that `registry` is a hostname with an optional port.
pub(crate) fn check_registry(registry: &str) -> Result<()> {
    if REGISTRY.is_match(registry) {
        Ok(())
    } else {
        Err(ParseError::InvalidRegistry(registry.to_owned()))
    }
}

/// Check that `tag` is a valid image tag.
pub(crate) fn check_tag(tag: &str) -> Result<()> {
    match tag {
        "" => Err(ParseError::EmptyTag),
        tag if TAG.is_match(tag) => Ok(()),
        tag => Err(ParseError::InvalidTag(tag.to_owned())),
    }
}

/// Extract the digest after the last `@`.
fn split_digest(reference: &str) -> (&str, Option<&str>) {
    match reference.rsplit_once('@') {
        Some((name, digest)) => (name, Some(digest)),
        None => (reference, None),
    }
}

/// Extract the tag after the last `:`.
///
/// If the value after `:` contains a `/`, the `:` belongs to a
/// `host:port` pair, and it is not a tag.
fn split_tag(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, Some(tag)),
        _ => (name, None),
    }
}

/// Split the registry host from the repository path.
///
/// The path is `None` when the whole name is a registry host.
fn split_registry(name: &str) -> (Option<&str>, Option<&str>) {
    let (first, rest) = match name.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };

    if is_registry_host(first) {
        (Some(first), rest)
    } else {
        (None, Some(name))
    }
}

fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == LOCALHOST
}

#[test]
fn grammar_checks() {
    assert!(check_registry("index.docker.io").is_ok());
    assert!(check_registry("localhost:5000").is_ok());
    assert!(check_registry("10.0.0.1:80").is_ok());
    assert!(check_registry("https://mirror").is_err());
    assert!(check_registry("mirror/v2").is_err());
    assert!(check_registry("mirror:").is_err());
    assert!(check_registry("").is_err());

    assert!(check_tag("latest").is_ok());
    assert!(check_tag("_x").is_ok());
    assert_eq!(check_tag(""), Err(ParseError::EmptyTag));
    assert!(check_tag("-x").is_err());
    assert!(check_tag("a/b").is_err());
}

#[test]
fn tokenizer_steps() {
    assert_eq!(split_digest("a/b:1@sha256:00"), ("a/b:1", Some("sha256:00")));
    assert_eq!(split_digest("a/b:1"), ("a/b:1", None));

    assert_eq!(split_tag("a/b:1"), ("a/b", Some("1")));
    assert_eq!(split_tag("host:5000/a/b"), ("host:5000/a/b", None));
    assert_eq!(split_tag("host:5000/a/b:2"), ("host:5000/a/b", Some("2")));

    assert_eq!(split_registry("a/b"), (None, Some("a/b")));
    assert_eq!(split_registry("a.b/c"), (Some("a.b"), Some("c")));
    assert_eq!(split_registry("a:1/c/d"), (Some("a:1"), Some("c/d")));
    assert_eq!(split_registry("localhost/c"), (Some("localhost"), Some("c")));
    assert_eq!(split_registry("ghcr.io"), (Some("ghcr.io"), None));
    assert_eq!(split_registry("debian"), (None, Some("debian")));
}

#[test]
fn parse_valid_references() {
    use sha2::{Digest as _, Sha256, Sha512};

    macro_rules! check {
        ($reference:expr, [ $registry:expr, $repository:expr, $tag:expr, $digest:expr ]) => {
            let reference = $reference;
            assert_eq!(
                ImageReference::try_from(<_ as AsRef<str>>::as_ref(&reference)).unwrap(),
                ImageReference {
                    registry: $registry,
                    repository: Repository::new($repository.to_vec()),
                    tag: $tag,
                    digest: $digest,
                }
            )
        };
    }

    let sha256 = format!("{:x}", Sha256::digest(b"\x00\x01"));
    let sha512 = format!("{:x}", Sha512::digest(b"\x01\x02"));

    check!("foo", [None, ["foo"], None, None]);

    check!("foo/bar", [None, ["foo", "bar"], None, None]);

    check!("foo/bar:1.2.3", [None, ["foo", "bar"], Some("1.2.3"), None]);

    check!(
        "example.com:5678/foo/bar:1.2.3",
        [Some("example.com:5678"), ["foo", "bar"], Some("1.2.3"), None]
    );

    check!(
        "localhost:5000/foo",
        [Some("localhost:5000"), ["foo"], None, None]
    );

    check!("localhost/foo:x", [Some("localhost"), ["foo"], Some("x"), None]);

    check!(
        "registry.example.com/a/b/c/d:v1",
        [Some("registry.example.com"), ["a", "b", "c", "d"], Some("v1"), None]
    );

    check!(
        "  padded/name:tag  ",
        [None, ["padded", "name"], Some("tag"), None]
    );

    check!(
        &format!("example.com/foo/bar:1.2.3@sha256:{sha256}"),
        [
            Some("example.com"),
            ["foo", "bar"],
            None,
            Digest::try_from(format!("sha256:{sha256}")).ok()
        ]
    );

    check!(
        "my-registry.example.com:443/foo__bar/baz-qux/a.b_c:V_1.0-rc.1",
        [
            Some("my-registry.example.com:443"),
            ["foo__bar", "baz-qux", "a.b_c"],
            Some("V_1.0-rc.1"),
            None
        ]
    );

    // Empty or unusual tags are dropped with the digest.
    check!(
        &format!("foo/bar:@sha256:{sha256}"),
        [
            None,
            ["foo", "bar"],
            None,
            Digest::try_from(format!("sha256:{sha256}")).ok()
        ]
    );

    check!(
        &format!("example.com:1234/foo/bar@sha512:{sha512}"),
        [
            Some("example.com:1234"),
            ["foo", "bar"],
            None,
            Digest::try_from(format!("sha512:{sha512}")).ok()
        ]
    );
}

#[test]
fn reject_invalid_references() {
    use crate::digest::DigestError;

    macro_rules! reject {
        ($reference:expr, $error:pat $(if $guard:expr)?) => {
            let input = String::from($reference);
            let result = ImageReference::try_from(input.as_str());
            assert!(
                matches!(result, Err($error) $(if $guard)?),
                "{input:?}: {result:?}"
            );
        };
    }

    reject!("", ParseError::Empty);
    reject!("   ", ParseError::Empty);
    reject!("ghcr.io", ParseError::MissingRepository);
    reject!("ghcr.io/", ParseError::MissingRepository);
    reject!("localhost:5000", ParseError::MissingRepository);
    reject!("foo//bar", ParseError::MissingRepository);
    reject!("/foo", ParseError::MissingRepository);
    reject!(":tag", ParseError::MissingRepository);
    reject!("foo:", ParseError::EmptyTag);
    reject!("foo bar", ParseError::InvalidCharacter(' '));
    reject!(
        format!("a@b@sha256:{}", "0".repeat(64)),
        ParseError::InvalidCharacter('@')
    );


    // Parts that would change the meaning of the URL.
    reject!(
        "evil.com?/foo/bar:1",
        ParseError::InvalidRegistry(ref r) if r == "evil.com?"
    );
    reject!("https:/foo/bar", ParseError::InvalidRegistry(_));
    reject!("-bad.example.com/foo", ParseError::InvalidRegistry(_));
    reject!(
        "ghcr.io/../../token:1",
        ParseError::InvalidRepository(ref s) if s == ".."
    );
    reject!("ghcr.io/./foo", ParseError::InvalidRepository(_));
    reject!("ghcr.io/foo%2Fbar", ParseError::InvalidRepository(_));
    reject!("ghcr.io/foo?x=1/bar", ParseError::InvalidRepository(_));
    reject!("Debian", ParseError::InvalidRepository(_));
    reject!("foo-/bar", ParseError::InvalidRepository(_));
    reject!(
        "ghcr.io/foo/bar:1.0#frag",
        ParseError::InvalidTag(ref t) if t == "1.0#frag"
    );
    reject!("ghcr.io/foo/bar:1.0?x=y", ParseError::InvalidTag(_));
    reject!("foo:.hidden", ParseError::InvalidTag(_));
    reject!(
        format!("foo:{}", "a".repeat(129)),
        ParseError::InvalidTag(_)
    );

    reject!(
        "debian:stable@md5:0000",
        ParseError::InvalidDigest(DigestError::InvalidAlgorithm)
    );
    reject!(
        "debian:stable@sha256:0000",
        ParseError::InvalidDigest(DigestError::InvalidValue)
    );
    reject!(
        format!("debian:stable@sha256:{:064}", "x"),
        ParseError::InvalidDigest(DigestError::InvalidValue)
    );
}
