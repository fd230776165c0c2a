//! Resolve container image references to the URL of their manifest in
//! a registry.
//!
//! The resolution runs in three steps:
//!
//! 1. [`ImageReference::try_from`] splits the reference.
//! 2. [`PolicyTable::apply`] fills the omitted registry and tag.
//! 3. [`build_url`] creates the `https://{registry}/v2/{repository}/manifests/{tag}` URL.
//!
//! [`Resolver`] runs all of them, and [`build_manifest_url`] uses the
//! defaults for Docker Hub.

mod config;
mod digest;
mod manifest;
mod policy;

pub mod reference;

pub use config::{ConfigError, ResolverConfig};
pub use digest::{Digest, DigestAlgorithm, DigestError};
pub use manifest::{
    build_manifest_url, build_url, ContainerImage, ManifestRequest, ResolveError, Resolver,
};
pub use policy::{
    PolicyTable, RegistryRule, ResolvedReference, Target, DEFAULT_REGISTRY, DEFAULT_TAG,
    DOCKER_HUB_NAMESPACE,
};
pub use reference::{ImageReference, MediaType, ParseError, Repository};
