use manifest_locator::{
    build_manifest_url, ContainerImage, PolicyTable, RegistryRule, ResolveError, Resolver,
    DEFAULT_REGISTRY,
};

const PINNED_DIGEST: &str =
    "sha256:daf7034c5c89775afe3008393ae033529913548243b84926931d7c84398ecda7";

/// Container whose image only has repository tags, like the
/// value reported by `docker image inspect`.
struct InspectedContainer {
    image: String,
    repo_tags: Vec<String>,
}

impl InspectedContainer {
    fn new(image: &str) -> Self {
        InspectedContainer {
            image: image.to_owned(),
            repo_tags: vec![image.to_owned()],
        }
    }
}

impl ContainerImage for InspectedContainer {
    fn image_name(&self) -> &str {
        &self.image
    }

    fn repo_tags(&self) -> &[String] {
        &self.repo_tags
    }
}

#[test]
fn fully_qualified_image() {
    assert_eq!(
        build_manifest_url("ghcr.io/todd2982/watchtower:mytag").unwrap(),
        "https://ghcr.io/v2/todd2982/watchtower/manifests/mytag"
    );
}

#[test]
fn assume_docker_hub_without_registry() {
    assert_eq!(
        build_manifest_url("todd2982/watchtower:latest").unwrap(),
        "https://index.docker.io/v2/todd2982/watchtower/manifests/latest"
    );
}

#[test]
fn assume_latest_without_tag() {
    assert_eq!(
        build_manifest_url("todd2982/watchtower").unwrap(),
        "https://index.docker.io/v2/todd2982/watchtower/manifests/latest"
    );
}

#[test]
fn no_library_namespace_in_other_registries() {
    assert_eq!(
        build_manifest_url("docker-registry.domain/imagename:latest").unwrap(),
        "https://docker-registry.domain/v2/imagename/manifests/latest"
    );
}

#[test]
fn library_namespace_in_docker_hub() {
    assert_eq!(
        build_manifest_url("imagename").unwrap(),
        "https://index.docker.io/v2/library/imagename/manifests/latest"
    );
}

#[test]
fn reject_pinned_images() {
    let reference = format!("docker-registry.domain/imagename@{PINNED_DIGEST}");

    let result = build_manifest_url(&reference);
    assert!(matches!(
        result,
        Err(ResolveError::UnsupportedReference { ref digest }) if digest.source() == PINNED_DIGEST
    ));

    // Also rejected through a container.
    let container = InspectedContainer::new(&reference);
    let err = Resolver::default()
        .container_manifest_url(&container)
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn malformed_references_never_build_urls() {
    for reference in [
        "evil.com?/foo/bar:1",
        "ghcr.io/../../token:1",
        "ghcr.io/foo/bar:1.0#frag",
        "ghcr.io/foo/bar:1.0?x=y",
        "https://ghcr.io/foo/bar",
        "ghcr.io/foo%2Fbar",
    ] {
        assert!(
            matches!(
                build_manifest_url(reference),
                Err(ResolveError::InvalidReference(_))
            ),
            "{reference}"
        );
    }
}

#[test]
fn digest_wins_over_empty_tag() {
    let reference = format!("docker-registry.domain/imagename:@{PINNED_DIGEST}");
    assert!(build_manifest_url(&reference).unwrap_err().is_unsupported());
}

#[test]
fn explicit_registry_hosts_are_kept() {
    for (reference, host) in [
        ("example.com/a/b", "example.com"),
        ("example.com:8443/a", "example.com:8443"),
        ("registry:5000/a/b", "registry:5000"),
        ("localhost/a", "localhost"),
        ("localhost:5000/a:1", "localhost:5000"),
    ] {
        let url = build_manifest_url(reference).unwrap();
        let url = url::Url::parse(&url).unwrap();

        assert_eq!(url.scheme(), "https");
        assert_ne!(url.host_str(), Some(DEFAULT_REGISTRY));
        assert!(
            url.as_str().starts_with(&format!("https://{host}/v2/")),
            "{reference}: {url}"
        );
    }
}

#[test]
fn containers_resolve_like_references() {
    let resolver = Resolver::default();

    for reference in [
        "ghcr.io/todd2982/watchtower:mytag",
        "todd2982/watchtower",
        "docker-registry.domain/imagename:latest",
    ] {
        assert_eq!(
            resolver
                .container_manifest_url(&InspectedContainer::new(reference))
                .unwrap(),
            build_manifest_url(reference).unwrap()
        );
    }
}

#[test]
fn custom_policy_table() {
    let policy = PolicyTable::new("mirror.example.com", "stable")
        .unwrap()
        .with_rule(
            "mirror.example.com",
            RegistryRule::official_namespace("library"),
        );

    let resolver = Resolver::new(policy);
    assert_eq!(
        resolver.manifest_url("alpine").unwrap(),
        "https://mirror.example.com/v2/library/alpine/manifests/stable"
    );
    assert_eq!(
        resolver.manifest_url("index.docker.io/alpine:3").unwrap(),
        "https://index.docker.io/v2/alpine/manifests/3"
    );
}

#[test]
fn concurrent_resolution_is_idempotent() {
    let resolver = Resolver::default();
    let references = [
        "ghcr.io/todd2982/watchtower:mytag",
        "todd2982/watchtower",
        "imagename",
        "docker-registry.domain/imagename@sha256:daf7034c5c89775afe3008393ae033529913548243b84926931d7c84398ecda7",
        "",
    ];

    let expected: Vec<_> = references
        .iter()
        .map(|r| resolver.manifest_url(r))
        .collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    references
                        .iter()
                        .map(|r| resolver.manifest_url(r))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
