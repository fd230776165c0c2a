use std::{collections::HashMap, io};

use crate::{
    policy::{PolicyTable, RegistryRule, DEFAULT_REGISTRY, DEFAULT_TAG},
    reference::{check_registry, check_tag, ParseError},
};

/// Errors from loading a [`ResolverConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid default registry: {0}")]
    InvalidDefaultRegistry(#[source] ParseError),

    #[error("Invalid default tag: {0}")]
    InvalidDefaultTag(#[source] ParseError),
}

/// Settings to build a [`Resolver`](crate::Resolver).
///
/// Every field is optional in the JSON representation. Rules in
/// `registries` are added to the ones in [`PolicyTable::default`],
/// replacing them for the same host.
///
/// # Examples
///
/// ```
/// # use manifest_locator::*;
/// let config = ResolverConfig::from_json(r#"
///     {
///       "default_tag": "stable",
///       "registries": {
///         "registry.example.com": { "official_namespace": "base" }
///       }
///     }
/// "#).unwrap();
///
/// let resolver = Resolver::from_config(&config).unwrap();
/// assert_eq!(
///     resolver.manifest_url("registry.example.com/alpine").unwrap(),
///     "https://registry.example.com/v2/base/alpine/manifests/stable",
/// );
/// ```
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub default_registry: String,
    pub default_tag: String,
    pub registries: HashMap<String, RegistryRule>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            default_registry: DEFAULT_REGISTRY.to_owned(),
            default_tag: DEFAULT_TAG.to_owned(),
            registries: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(json)?.validated()
    }

    pub fn from_reader(reader: impl io::Read) -> Result<Self, ConfigError> {
        serde_json::from_reader::<_, Self>(reader)?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        check_registry(&self.default_registry).map_err(ConfigError::InvalidDefaultRegistry)?;
        check_tag(&self.default_tag).map_err(ConfigError::InvalidDefaultTag)?;
        Ok(self)
    }

    /// Build the [`PolicyTable`] described by this configuration.
    ///
    /// The defaults are checked again, since the fields can be
    /// modified after loading the configuration.
    pub fn policy(&self) -> Result<PolicyTable, ConfigError> {
        let builtin = PolicyTable::default();

        let mut policy = PolicyTable::new(&*self.default_registry, &*self.default_tag)
            .map_err(|err| match err {
                ParseError::EmptyTag | ParseError::InvalidTag(_) => {
                    ConfigError::InvalidDefaultTag(err)
                }
                err => ConfigError::InvalidDefaultRegistry(err),
            })?;

        if let Some(rule) = builtin.rule(DEFAULT_REGISTRY) {
            policy.insert_rule(DEFAULT_REGISTRY, rule.clone());
        }

        for (host, rule) in &self.registries {
            policy.insert_rule(host, rule.clone());
        }

        Ok(policy)
    }
}

#[test]
fn empty_config_is_default() {
    let config = ResolverConfig::from_json("{}").unwrap();
    assert_eq!(config, ResolverConfig::default());
    assert_eq!(config.policy().unwrap(), PolicyTable::default());
}

#[test]
fn override_builtin_rules() {
    let json = r#"
        {
          "default_registry": "mirror.local:5000",
          "registries": {
            "index.docker.io": { "official_namespace": null },
            "mirror.local:5000": { "official_namespace": "library" }
          }
        }
    "#;

    let policy = ResolverConfig::from_reader(json.as_bytes())
        .unwrap()
        .policy()
        .unwrap();
    assert_eq!(policy.default_registry(), "mirror.local:5000");
    assert_eq!(policy.default_tag(), DEFAULT_TAG);
    assert_eq!(
        policy.rule("index.docker.io"),
        Some(&RegistryRule::default())
    );
    assert_eq!(
        policy.rule("mirror.local:5000"),
        Some(&RegistryRule::official_namespace("library"))
    );
}

#[test]
fn reject_invalid_configs() {
    for registry in ["", "https://mirror", "mirror/v2", "mirror.local:", "evil.com?"] {
        let json = format!(r#"{{"default_registry": "{registry}"}}"#);
        assert!(
            matches!(
                ResolverConfig::from_json(&json),
                Err(ConfigError::InvalidDefaultRegistry(ParseError::InvalidRegistry(_)))
            ),
            "{registry:?}"
        );
    }

    assert!(matches!(
        ResolverConfig::from_json(r#"{"default_tag": ""}"#),
        Err(ConfigError::InvalidDefaultTag(ParseError::EmptyTag))
    ));

    assert!(matches!(
        ResolverConfig::from_json(r#"{"default_tag": " "}"#),
        Err(ConfigError::InvalidDefaultTag(ParseError::InvalidTag(_)))
    ));

    // Fields modified after loading are checked when building the policy.
    let mut config = ResolverConfig::default();
    config.default_registry = "https://mirror".into();
    assert!(matches!(
        config.policy(),
        Err(ConfigError::InvalidDefaultRegistry(_))
    ));

    let mut config = ResolverConfig::default();
    config.default_tag = "1.0?x=y".into();
    assert!(matches!(
        config.policy(),
        Err(ConfigError::InvalidDefaultTag(ParseError::InvalidTag(_)))
    ));

    assert!(matches!(
        ResolverConfig::from_json(r#"{"unknown": 1}"#),
        Err(ConfigError::Json(_))
    ));

    assert!(matches!(
        ResolverConfig::from_json("["),
        Err(ConfigError::Json(_))
    ));
}
