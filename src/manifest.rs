use tracing::debug;

use crate::{
    config::{ConfigError, ResolverConfig},
    digest::Digest,
    policy::{PolicyTable, ResolvedReference, Target},
    reference::{ImageReference, MediaType, ParseError},
};

/// Errors from [`Resolver`].
///
/// Both kinds are terminal. Retrying the same reference always
/// gives the same error.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("Invalid image reference: {0}")]
    InvalidReference(#[from] ParseError),

    #[error("Image is pinned to {digest}.")]
    UnsupportedReference { digest: Digest },
}

impl ResolveError {
    /// Return `true` if the reference is valid, but it can't be
    /// checked for updates.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ResolveError::UnsupportedReference { .. })
    }
}

/// Image of a container, as reported by the container runtime.
pub trait ContainerImage {
    /// Image name from the container configuration.
    fn image_name(&self) -> &str;

    /// Repository tags of the image.
    ///
    /// Used when [`image_name`][Self::image_name] is empty.
    fn repo_tags(&self) -> &[String] {
        &[]
    }
}

/// Request to get the manifest of an image.
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestRequest {
    pub url: String,

    /// Value for the `Accept` header.
    pub accept: String,
}

/// Compute the manifest URL for image references.
///
/// A `Resolver` is immutable, so it can be shared between threads.
///
/// # Examples
///
/// ```
/// # use manifest_locator::*;
/// let resolver = Resolver::default();
///
/// assert_eq!(
///     resolver.manifest_url("ghcr.io/todd2982/watchtower:mytag").unwrap(),
///     "https://ghcr.io/v2/todd2982/watchtower/manifests/mytag",
/// );
///
/// assert_eq!(
///     resolver.manifest_url("debian").unwrap(),
///     "https://index.docker.io/v2/library/debian/manifests/latest",
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    policy: PolicyTable,
}

impl Resolver {
    pub fn new(policy: PolicyTable) -> Self {
        Resolver { policy }
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        Ok(Resolver::new(config.policy()?))
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    /// Parse `reference` and apply the defaults for its registry.
    ///
    /// Digest-pinned references are returned as they are. The error is
    /// only reported when a URL is requested.
    pub fn resolve(&self, reference: &str) -> Result<ResolvedReference, ResolveError> {
        let reference = ImageReference::try_from(reference)?;
        Ok(self.policy.apply(&reference))
    }

    /// Return the URL to get the manifest of `reference`.
    pub fn manifest_url(&self, reference: &str) -> Result<String, ResolveError> {
        let resolved = self.resolve(reference)?;

        match build_url(&resolved) {
            Ok(url) => {
                debug!(reference, %url, "manifest URL");
                Ok(url)
            }

            Err(err) => {
                debug!(reference, %err, "no manifest URL");
                Err(err)
            }
        }
    }

    /// Like [`manifest_url`][Self::manifest_url], including the `Accept`
    /// header for the request.
    pub fn manifest_request(&self, reference: &str) -> Result<ManifestRequest, ResolveError> {
        Ok(ManifestRequest {
            url: self.manifest_url(reference)?,
            accept: MediaType::accept_header(),
        })
    }

    /// Return the URL to get the manifest of the image of `container`.
    pub fn container_manifest_url(
        &self,
        container: &impl ContainerImage,
    ) -> Result<String, ResolveError> {
        let name = match container.image_name().trim() {
            "" => container
                .repo_tags()
                .first()
                .map(String::as_str)
                .unwrap_or_default(),
            name => name,
        };

        self.manifest_url(name)
    }
}

/// Build the manifest URL of a resolved reference:
///
/// ```text
/// https://{registry}/v2/{repository}/manifests/{tag}
/// ```
///
/// References pinned to a digest are rejected with
/// [`ResolveError::UnsupportedReference`].
pub fn build_url(resolved: &ResolvedReference) -> Result<String, ResolveError> {
    match &resolved.target {
        Target::Tag(tag) => Ok(format!(
            "https://{}/v2/{}/manifests/{}",
            resolved.registry,
            resolved.repository_path(),
            tag
        )),

        Target::Digest(digest) => Err(ResolveError::UnsupportedReference {
            digest: digest.clone(),
        }),
    }
}

/// Return the manifest URL of `reference`, using the default
/// [`PolicyTable`].
///
/// # Examples
///
/// ```
/// # use manifest_locator::*;
/// assert_eq!(
///     build_manifest_url("todd2982/watchtower").unwrap(),
///     "https://index.docker.io/v2/todd2982/watchtower/manifests/latest",
/// );
/// ```
pub fn build_manifest_url(reference: &str) -> Result<String, ResolveError> {
    Resolver::default().manifest_url(reference)
}

#[cfg(test)]
struct TestContainer {
    image: &'static str,
    tags: Vec<String>,
}

#[cfg(test)]
impl ContainerImage for TestContainer {
    fn image_name(&self) -> &str {
        self.image
    }

    fn repo_tags(&self) -> &[String] {
        &self.tags
    }
}

#[test]
fn reject_pinned_references() {
    let digest = format!("sha256:{}", "c".repeat(64));

    for reference in [
        format!("docker-registry.domain/imagename@{digest}"),
        format!("imagename:1.0@{digest}"),
        format!("localhost:5000/a/b@{digest}"),
    ] {
        let err = build_manifest_url(&reference).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(
            err,
            ResolveError::UnsupportedReference {
                digest: Digest::try_from(digest.as_str()).unwrap()
            }
        );
    }
}

#[test]
fn reject_invalid_references() {
    for reference in ["", "ghcr.io", "foo:", "a//b"] {
        let err = build_manifest_url(reference).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidReference(_)));
        assert!(!err.is_unsupported());
    }

    assert_eq!(
        build_manifest_url("debian@sha1:00"),
        Err(ResolveError::InvalidReference(ParseError::InvalidDigest(
            crate::digest::DigestError::InvalidAlgorithm
        )))
    );
}

#[test]
fn manifest_request_has_accept_header() {
    let request = Resolver::default()
        .manifest_request("localhost:5000/foo/bar:1")
        .unwrap();

    assert_eq!(request.url, "https://localhost:5000/v2/foo/bar/manifests/1");
    for mediatype in MediaType::ALL {
        assert!(request.accept.contains(mediatype));
    }
}

#[test]
fn container_image_name() {
    let resolver = Resolver::default();

    let container = TestContainer {
        image: "todd2982/watchtower",
        tags: vec![],
    };
    assert_eq!(
        resolver.container_manifest_url(&container).unwrap(),
        "https://index.docker.io/v2/todd2982/watchtower/manifests/latest"
    );

    // Use the repository tags if the image name is empty.
    let container = TestContainer {
        image: "",
        tags: vec!["ghcr.io/foo/bar:2".into(), "ghcr.io/foo/bar:latest".into()],
    };
    assert_eq!(
        resolver.container_manifest_url(&container).unwrap(),
        "https://ghcr.io/v2/foo/bar/manifests/2"
    );

    let container = TestContainer {
        image: "",
        tags: vec![],
    };
    assert_eq!(
        resolver.container_manifest_url(&container),
        Err(ResolveError::InvalidReference(ParseError::Empty))
    );
}

#[test]
fn resolver_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Resolver>();
}
