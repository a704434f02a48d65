//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::tagging::TagSet;

/// Fleet configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "GROUNDCREW")]
pub struct FleetConfig {
    /// Region the fleet is provisioned in. Defaults to `eu-west-1`.
    #[ortho_config(default = "eu-west-1".to_owned())]
    pub region: String,
    /// Commercial instance type for new instances.
    #[ortho_config(default = "t3.micro".to_owned())]
    pub instance_type: String,
    /// Machine image identifier to boot from. This value is required.
    pub image_id: String,
    /// Subnet new instances are placed in. This value is required.
    pub subnet_id: String,
    /// IAM instance profile attached at launch. This value is required.
    pub iam_profile: String,
    /// Key pair name for login access. This value is required.
    pub key_name: String,
    /// Comma-separated security group identifiers.
    pub security_group_ids: Option<String>,
    /// Comma-separated `key=value` pairs applied to every instance in
    /// addition to the generated name tags.
    pub base_tags: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl FleetConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to groundcrew.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration, merging defaults, configuration files,
    /// environment variables, and CLI flags in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("groundcrew")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.region,
            &FieldMetadata::new("region", "GROUNDCREW_REGION", "region"),
        )?;
        Self::require_field(
            &self.instance_type,
            &FieldMetadata::new("instance type", "GROUNDCREW_INSTANCE_TYPE", "instance_type"),
        )?;
        Self::require_field(
            &self.image_id,
            &FieldMetadata::new("machine image", "GROUNDCREW_IMAGE_ID", "image_id"),
        )?;
        Self::require_field(
            &self.subnet_id,
            &FieldMetadata::new("subnet", "GROUNDCREW_SUBNET_ID", "subnet_id"),
        )?;
        Self::require_field(
            &self.iam_profile,
            &FieldMetadata::new(
                "IAM instance profile",
                "GROUNDCREW_IAM_PROFILE",
                "iam_profile",
            ),
        )?;
        Self::require_field(
            &self.key_name,
            &FieldMetadata::new("key pair name", "GROUNDCREW_KEY_NAME", "key_name"),
        )?;
        Ok(())
    }

    /// Returns the configured security group identifiers.
    #[must_use]
    pub fn security_group_list(&self) -> Vec<String> {
        self.security_group_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Parses the configured base tags into a [`TagSet`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTag`] when a pair is not of the form
    /// `key=value`.
    pub fn base_tag_set(&self) -> Result<TagSet, ConfigError> {
        let mut tags = TagSet::new();
        let Some(raw) = self.base_tags.as_deref() else {
            return Ok(tags);
        };
        for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidTag(pair.to_owned()))?;
            if key.trim().is_empty() {
                return Err(ConfigError::InvalidTag(pair.to_owned()));
            }
            tags.push(crate::gateway::Tag::new(key.trim(), value.trim()));
        }
        Ok(tags)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Indicates a malformed `key=value` tag pair.
    #[error("invalid tag pair '{0}', expected key=value")]
    InvalidTag(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
