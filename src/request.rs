//! Instance specifications and their translation into capacity requests.
//!
//! Translation is pure: no side effects, no network access. Validation runs
//! before any control-plane call so malformed specifications never leave the
//! process.

use crate::error::ProvisionError;
use crate::gateway::Tag;
use crate::tagging::TagSet;

/// Requested instance count, as a closed range.
///
/// On-demand requests use the full range; spot requests use `max` as the
/// exact count. Invariant: `1 <= min <= max`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CountRange {
    /// Minimum number of instances the request may be satisfied with.
    pub min: u32,
    /// Maximum (and preferred) number of instances.
    pub max: u32,
}

impl CountRange {
    /// Builds a range requesting exactly `count` instances.
    #[must_use]
    pub const fn exact(count: u32) -> Self {
        Self {
            min: count,
            max: count,
        }
    }
}

/// Parameters describing the instances a provisioning call should create.
///
/// The presence of a spot price selects the pricing model: specifications
/// with a price translate into spot requests, those without into on-demand
/// requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceSpec {
    /// Commercial instance type (for example `m5.large`).
    pub instance_type: String,
    /// Name of the IAM instance profile attached at launch.
    pub iam_profile: String,
    /// Machine image identifier to boot from.
    pub image_id: String,
    /// Subnet the instances are placed in.
    pub subnet_id: String,
    /// Security groups applied to each instance.
    pub security_group_ids: Vec<String>,
    /// Opaque user-data blob handed to the instance at first boot.
    pub user_data: String,
    /// Key pair name for login access.
    pub key_name: String,
    /// Requested instance count.
    pub counts: CountRange,
    /// Maximum hourly price for spot capacity. `None` selects on-demand.
    pub spot_price: Option<String>,
}

impl InstanceSpec {
    /// Starts a builder for an [`InstanceSpec`].
    #[must_use]
    pub fn builder() -> InstanceSpecBuilder {
        InstanceSpecBuilder::default()
    }

    /// Returns whether this specification selects the spot pricing model.
    #[must_use]
    pub const fn is_spot(&self) -> bool {
        self.spot_price.is_some()
    }

    /// Validates the count invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Validation`] when either bound is below one
    /// or the bounds are inverted.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.counts.min < 1 || self.counts.max < 1 {
            return Err(ProvisionError::validation(
                "instance count must be at least 1",
            ));
        }
        if self.counts.min > self.counts.max {
            return Err(ProvisionError::validation(format!(
                "minimum count {} exceeds maximum count {}",
                self.counts.min, self.counts.max
            )));
        }
        Ok(())
    }
}

/// Builder for [`InstanceSpec`].
#[derive(Clone, Debug, Default)]
pub struct InstanceSpecBuilder {
    instance_type: String,
    iam_profile: String,
    image_id: String,
    subnet_id: String,
    security_group_ids: Vec<String>,
    user_data: String,
    key_name: String,
    counts: Option<CountRange>,
    spot_price: Option<String>,
}

impl InstanceSpecBuilder {
    /// Sets the instance type.
    #[must_use]
    pub fn instance_type(mut self, value: impl Into<String>) -> Self {
        self.instance_type = value.into();
        self
    }

    /// Sets the IAM instance profile name.
    #[must_use]
    pub fn iam_profile(mut self, value: impl Into<String>) -> Self {
        self.iam_profile = value.into();
        self
    }

    /// Sets the machine image identifier.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = value.into();
        self
    }

    /// Sets the subnet identifier.
    #[must_use]
    pub fn subnet_id(mut self, value: impl Into<String>) -> Self {
        self.subnet_id = value.into();
        self
    }

    /// Sets the security group identifiers.
    #[must_use]
    pub fn security_group_ids(mut self, value: impl IntoIterator<Item = String>) -> Self {
        self.security_group_ids = value.into_iter().collect();
        self
    }

    /// Sets the user-data blob.
    #[must_use]
    pub fn user_data(mut self, value: impl Into<String>) -> Self {
        self.user_data = value.into();
        self
    }

    /// Sets the key pair name.
    #[must_use]
    pub fn key_name(mut self, value: impl Into<String>) -> Self {
        self.key_name = value.into();
        self
    }

    /// Requests between `min` and `max` instances.
    #[must_use]
    pub const fn count_range(mut self, min: u32, max: u32) -> Self {
        self.counts = Some(CountRange { min, max });
        self
    }

    /// Requests exactly `count` instances.
    #[must_use]
    pub const fn count(mut self, count: u32) -> Self {
        self.counts = Some(CountRange::exact(count));
        self
    }

    /// Sets the spot price, selecting the spot pricing model.
    #[must_use]
    pub fn spot_price(mut self, value: impl Into<String>) -> Self {
        self.spot_price = Some(value.into());
        self
    }

    /// Builds and validates the specification.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Validation`] when no count was given or the
    /// count invariant does not hold.
    pub fn build(self) -> Result<InstanceSpec, ProvisionError> {
        let counts = self
            .counts
            .ok_or_else(|| ProvisionError::validation("instance count is required"))?;
        let spec = InstanceSpec {
            instance_type: self.instance_type,
            iam_profile: self.iam_profile,
            image_id: self.image_id,
            subnet_id: self.subnet_id,
            security_group_ids: self.security_group_ids,
            user_data: self.user_data,
            key_name: self.key_name,
            counts,
            spot_price: self.spot_price,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Payload for an on-demand capacity request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OnDemandRequest {
    /// Commercial instance type.
    pub instance_type: String,
    /// IAM instance profile name.
    pub iam_profile: String,
    /// Machine image identifier.
    pub image_id: String,
    /// Subnet identifier.
    pub subnet_id: String,
    /// Security group identifiers.
    pub security_group_ids: Vec<String>,
    /// Opaque user-data blob.
    pub user_data: String,
    /// Key pair name.
    pub key_name: String,
    /// Minimum acceptable instance count.
    pub min_count: u32,
    /// Maximum (preferred) instance count.
    pub max_count: u32,
    /// Tags applied at launch time, before the per-instance name tags.
    pub launch_tags: Vec<Tag>,
}

/// Payload for a spot capacity request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpotCapacityRequest {
    /// Commercial instance type.
    pub instance_type: String,
    /// IAM instance profile name.
    pub iam_profile: String,
    /// Machine image identifier.
    pub image_id: String,
    /// Subnet identifier.
    pub subnet_id: String,
    /// Security group identifiers.
    pub security_group_ids: Vec<String>,
    /// Opaque user-data blob.
    pub user_data: String,
    /// Key pair name.
    pub key_name: String,
    /// Exact instance count to request.
    pub instance_count: u32,
    /// Maximum hourly price.
    pub spot_price: String,
}

/// Translates a specification into an on-demand request payload.
///
/// `launch_tags` are applied by the control plane at creation time; the
/// per-instance name tags are applied separately after the reservation is
/// known.
///
/// # Errors
///
/// Returns [`ProvisionError::Validation`] when the count invariant fails or
/// the specification carries a spot price.
pub fn on_demand(
    spec: &InstanceSpec,
    launch_tags: &TagSet,
) -> Result<OnDemandRequest, ProvisionError> {
    spec.validate()?;
    if spec.is_spot() {
        return Err(ProvisionError::validation(
            "specification carries a spot price; use the spot provisioning path",
        ));
    }
    Ok(OnDemandRequest {
        instance_type: spec.instance_type.clone(),
        iam_profile: spec.iam_profile.clone(),
        image_id: spec.image_id.clone(),
        subnet_id: spec.subnet_id.clone(),
        security_group_ids: spec.security_group_ids.clone(),
        user_data: spec.user_data.clone(),
        key_name: spec.key_name.clone(),
        min_count: spec.counts.min,
        max_count: spec.counts.max,
        launch_tags: launch_tags.to_vec(),
    })
}

/// Translates a specification into a spot request payload.
///
/// # Errors
///
/// Returns [`ProvisionError::Validation`] when the count is below one or no
/// spot price was given.
pub fn spot(spec: &InstanceSpec) -> Result<SpotCapacityRequest, ProvisionError> {
    spec.validate()?;
    let spot_price = spec
        .spot_price
        .clone()
        .ok_or_else(|| ProvisionError::validation("spot price is required for spot capacity"))?;
    Ok(SpotCapacityRequest {
        instance_type: spec.instance_type.clone(),
        iam_profile: spec.iam_profile.clone(),
        image_id: spec.image_id.clone(),
        subnet_id: spec.subnet_id.clone(),
        security_group_ids: spec.security_group_ids.clone(),
        user_data: spec.user_data.clone(),
        key_name: spec.key_name.clone(),
        instance_count: spec.counts.max,
        spot_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with_counts(min: u32, max: u32) -> InstanceSpec {
        InstanceSpec {
            instance_type: String::from("m5.large"),
            iam_profile: String::from("worker"),
            image_id: String::from("ami-0abc"),
            subnet_id: String::from("subnet-1"),
            security_group_ids: vec![String::from("sg-1")],
            user_data: String::from("#!/bin/sh\n"),
            key_name: String::from("ops"),
            counts: CountRange { min, max },
            spot_price: None,
        }
    }

    #[test]
    fn builder_rejects_missing_count() {
        let result = InstanceSpec::builder().instance_type("m5.large").build();
        assert!(matches!(result, Err(ProvisionError::Validation { .. })));
    }

    #[test]
    fn zero_count_fails_validation() {
        let spec = spec_with_counts(0, 0);
        assert!(matches!(
            spec.validate(),
            Err(ProvisionError::Validation { .. })
        ));
    }

    #[test]
    fn inverted_range_fails_validation() {
        let spec = spec_with_counts(3, 2);
        let err = spec.validate().expect_err("inverted range should fail");
        assert!(err.to_string().contains("exceeds maximum"), "got: {err}");
    }

    #[test]
    fn on_demand_rejects_spot_specifications() {
        let mut spec = spec_with_counts(1, 2);
        spec.spot_price = Some(String::from("0.40"));
        let result = on_demand(&spec, &TagSet::new());
        assert!(matches!(result, Err(ProvisionError::Validation { .. })));
    }

    #[test]
    fn spot_requires_a_price() {
        let spec = spec_with_counts(2, 2);
        let result = spot(&spec);
        assert!(matches!(result, Err(ProvisionError::Validation { .. })));
    }

    #[test]
    fn spot_uses_the_maximum_count() {
        let mut spec = spec_with_counts(1, 3);
        spec.spot_price = Some(String::from("0.40"));
        let request = spot(&spec).expect("spot translation should succeed");
        assert_eq!(request.instance_count, 3);
        assert_eq!(request.spot_price, "0.40");
    }
}
