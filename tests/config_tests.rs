//! Unit tests for configuration loading and validation.

use groundcrew::config::ConfigError;
use groundcrew::{FleetConfig, Tag};
use rstest::*;

#[fixture]
fn valid_config() -> FleetConfig {
    FleetConfig {
        region: String::from("eu-west-1"),
        instance_type: String::from("m5.large"),
        image_id: String::from("ami-0abc"),
        subnet_id: String::from("subnet-1"),
        iam_profile: String::from("worker"),
        key_name: String::from("ops"),
        security_group_ids: Some(String::from("sg-1, sg-2,")),
        base_tags: Some(String::from("team=data, env=prod")),
    }
}

#[rstest]
fn valid_config_passes_validation(valid_config: FleetConfig) {
    assert!(valid_config.validate().is_ok());
}

#[rstest]
#[case("GROUNDCREW_IMAGE_ID", FleetConfig {
    image_id: String::new(),
    ..valid_config()
})]
#[case("GROUNDCREW_SUBNET_ID", FleetConfig {
    subnet_id: String::from("  "),
    ..valid_config()
})]
#[case("GROUNDCREW_IAM_PROFILE", FleetConfig {
    iam_profile: String::new(),
    ..valid_config()
})]
#[case("GROUNDCREW_KEY_NAME", FleetConfig {
    key_name: String::new(),
    ..valid_config()
})]
fn missing_fields_produce_actionable_errors(
    #[case] expected_env_var: &str,
    #[case] config: FleetConfig,
) {
    let error = config.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error}");
    };
    assert!(
        message.contains(expected_env_var),
        "error should mention env var {expected_env_var}: {message}"
    );
    assert!(
        message.contains("groundcrew.toml"),
        "error should mention the config file: {message}"
    );
}

#[rstest]
fn security_groups_split_and_trim(valid_config: FleetConfig) {
    assert_eq!(valid_config.security_group_list(), ["sg-1", "sg-2"]);
}

#[rstest]
fn base_tags_parse_into_a_tag_set(valid_config: FleetConfig) {
    let tags = valid_config.base_tag_set().expect("tags should parse");
    assert_eq!(
        tags.as_slice(),
        [Tag::new("team", "data"), Tag::new("env", "prod")]
    );
}

#[rstest]
fn malformed_base_tags_are_rejected(valid_config: FleetConfig) {
    let config = FleetConfig {
        base_tags: Some(String::from("team")),
        ..valid_config
    };
    let error = config.base_tag_set().expect_err("bare key should fail");
    assert!(matches!(error, ConfigError::InvalidTag(ref pair) if pair == "team"));
}

#[rstest]
fn absent_optional_fields_mean_empty_collections(valid_config: FleetConfig) {
    let config = FleetConfig {
        security_group_ids: None,
        base_tags: None,
        ..valid_config
    };
    assert!(config.security_group_list().is_empty());
    assert!(
        config
            .base_tag_set()
            .expect("no tags should parse")
            .is_empty()
    );
}
