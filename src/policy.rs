//! Defaults for the parts omitted in an image reference.
//!
//! The registry host is resolved first, because the rules for the
//! repository path depend on it.

use std::{collections::HashMap, fmt};

use tracing::trace;

use crate::{
    digest::Digest,
    reference::{check_registry, check_tag, ImageReference, ParseError},
};

/// Registry used when the reference does not include a hostname,
/// like `debian` or `nixos/nix`.
pub const DEFAULT_REGISTRY: &str = "index.docker.io";

/// Tag used when the reference has no tag and no digest.
pub const DEFAULT_TAG: &str = "latest";

/// Namespace that Docker Hub reserves for its official images.
pub const DOCKER_HUB_NAMESPACE: &str = "library";

/// Conventions of a single registry.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryRule {
    /// Namespace prepended to repository paths with a single segment.
    ///
    /// With `Some("library")`, `debian` is resolved as `library/debian`.
    pub official_namespace: Option<String>,
}

impl RegistryRule {
    pub fn official_namespace(namespace: impl Into<String>) -> Self {
        RegistryRule {
            official_namespace: Some(namespace.into()),
        }
    }
}

/// Defaulting rules, keyed by the resolved registry host.
///
/// [`PolicyTable::default`] uses `index.docker.io` and `latest`, and it
/// adds the `library` namespace only for `index.docker.io`.
///
/// # Examples
///
/// ```
/// # use manifest_locator::*;
/// let policy = PolicyTable::default()
///     .with_rule("registry.example.com", RegistryRule::official_namespace("base"));
///
/// let reference = ImageReference::try_from("registry.example.com/alpine").unwrap();
/// let resolved = policy.apply(&reference);
/// assert_eq!(resolved.repository_path(), "base/alpine");
/// assert_eq!(resolved.target, Target::Tag("latest".into()));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyTable {
    default_registry: String,
    default_tag: String,
    rules: HashMap<String, RegistryRule>,
}

impl PolicyTable {
    /// Create a table with no registry rules.
    ///
    /// The defaults are checked with the same rules used for the
    /// registry and the tag of a reference.
    pub fn new(
        default_registry: impl Into<String>,
        default_tag: impl Into<String>,
    ) -> Result<Self, ParseError> {
        let default_registry = default_registry.into();
        let default_tag = default_tag.into();

        check_registry(&default_registry)?;
        check_tag(&default_tag)?;

        Ok(PolicyTable {
            default_registry,
            default_tag,
            rules: HashMap::new(),
        })
    }

    /// Add (or replace) the rule for `host`.
    pub fn with_rule(mut self, host: impl AsRef<str>, rule: RegistryRule) -> Self {
        self.insert_rule(host, rule);
        self
    }

    pub fn insert_rule(&mut self, host: impl AsRef<str>, rule: RegistryRule) {
        self.rules
            .insert(host.as_ref().to_ascii_lowercase(), rule);
    }

    /// Rule for `host`. Hostnames are compared without case.
    pub fn rule(&self, host: &str) -> Option<&RegistryRule> {
        self.rules.get(&host.to_ascii_lowercase())
    }

    pub fn default_registry(&self) -> &str {
        &self.default_registry
    }

    pub fn default_tag(&self) -> &str {
        &self.default_tag
    }

    /// Fill the omitted parts of `reference`.
    ///
    /// It does not validate anything; the reference is trusted as it
    /// comes from the parser.
    pub fn apply(&self, reference: &ImageReference) -> ResolvedReference {
        let registry = reference.registry.unwrap_or(&self.default_registry);

        let segments = reference.repository.segments();
        let namespace = match segments {
            [_] => self
                .rule(registry)
                .and_then(|r| r.official_namespace.as_deref()),
            _ => None,
        };

        let repository = namespace
            .into_iter()
            .chain(segments.iter().copied())
            .map(str::to_owned)
            .collect();

        let target = match (&reference.digest, reference.tag) {
            (Some(digest), _) => Target::Digest(digest.clone()),
            (None, Some(tag)) => Target::Tag(tag.to_owned()),
            (None, None) => Target::Tag(self.default_tag.clone()),
        };

        trace!(%reference, registry, ?namespace, "applied registry policy");

        ResolvedReference {
            registry: registry.to_owned(),
            repository,
            target,
        }
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        PolicyTable {
            default_registry: DEFAULT_REGISTRY.to_owned(),
            default_tag: DEFAULT_TAG.to_owned(),
            rules: HashMap::new(),
        }
        .with_rule(
            DEFAULT_REGISTRY,
            RegistryRule::official_namespace(DOCKER_HUB_NAMESPACE),
        )
    }
}

/// What the manifest of a [`ResolvedReference`] is looked up by.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Tag(String),
    Digest(Digest),
}

/// Image reference with all the defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedReference {
    /// Address of the registry server.
    pub registry: String,

    /// Segments of the repository path, after adding the
    /// official namespace.
    pub repository: Vec<String>,

    pub target: Target,
}

impl ResolvedReference {
    /// Repository segments joined by `/`.
    pub fn repository_path(&self) -> String {
        self.repository.join("/")
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self.target, Target::Digest(_))
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository_path())?;

        match &self.target {
            Target::Tag(tag) => write!(f, ":{tag}"),
            Target::Digest(digest) => write!(f, "@{digest}"),
        }
    }
}

#[cfg(test)]
fn resolve(policy: &PolicyTable, reference: &str) -> ResolvedReference {
    policy.apply(&ImageReference::try_from(reference).unwrap())
}

#[test]
fn default_registry_and_tag() {
    let policy = PolicyTable::default();

    let resolved = resolve(&policy, "todd2982/watchtower");
    assert_eq!(resolved.registry, DEFAULT_REGISTRY);
    assert_eq!(resolved.repository_path(), "todd2982/watchtower");
    assert_eq!(resolved.target, Target::Tag(DEFAULT_TAG.into()));

    let resolved = resolve(&policy, "ghcr.io/todd2982/watchtower:mytag");
    assert_eq!(resolved.registry, "ghcr.io");
    assert_eq!(resolved.target, Target::Tag("mytag".into()));
}

#[test]
fn official_namespace_only_for_default_registry() {
    let policy = PolicyTable::default();

    assert_eq!(resolve(&policy, "debian").repository_path(), "library/debian");
    assert_eq!(
        resolve(&policy, "index.docker.io/debian").repository_path(),
        "library/debian"
    );
    assert_eq!(
        resolve(&policy, "INDEX.DOCKER.IO/debian").repository_path(),
        "library/debian"
    );

    // Paths with a namespace are never changed.
    assert_eq!(resolve(&policy, "nixos/nix").repository_path(), "nixos/nix");

    // Other registries keep single-segment paths untouched.
    for reference in [
        "docker-registry.domain/imagename",
        "localhost/imagename",
        "localhost:5000/imagename",
        "docker.io/imagename",
    ] {
        assert_eq!(resolve(&policy, reference).repository, ["imagename"]);
    }
}

#[test]
fn custom_rules() {
    let policy = PolicyTable::new("mirror.local", "stable")
        .unwrap()
        .with_rule("mirror.local", RegistryRule::official_namespace("base"));

    let resolved = resolve(&policy, "alpine");
    assert_eq!(resolved.to_string(), "mirror.local/base/alpine:stable");

    // Docker Hub has no rule in this table.
    let resolved = resolve(&policy, "index.docker.io/alpine");
    assert_eq!(resolved.to_string(), "index.docker.io/alpine:stable");
}

#[test]
fn reject_invalid_defaults() {
    assert!(PolicyTable::new(DEFAULT_REGISTRY, DEFAULT_TAG).is_ok());

    assert_eq!(
        PolicyTable::new("https://mirror", DEFAULT_TAG),
        Err(ParseError::InvalidRegistry("https://mirror".into()))
    );
    assert!(matches!(
        PolicyTable::new("mirror/v2", DEFAULT_TAG),
        Err(ParseError::InvalidRegistry(_))
    ));
    assert_eq!(
        PolicyTable::new("x", ""),
        Err(ParseError::EmptyTag)
    );
    assert!(matches!(
        PolicyTable::new("x", "1.0#frag"),
        Err(ParseError::InvalidTag(_))
    ));
}

#[test]
fn digest_is_kept_as_target() {
    let digest = format!("sha256:{}", "d".repeat(64));
    let resolved = resolve(
        &PolicyTable::default(),
        &format!("docker-registry.domain/imagename@{digest}"),
    );

    assert!(resolved.is_pinned());
    assert_eq!(resolved.target, Target::Digest(Digest::try_from(digest).unwrap()));
}
