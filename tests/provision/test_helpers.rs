//! Shared fixtures for the provisioning BDD scenarios.

use groundcrew::test_support::ScriptedGateway;
use groundcrew::{InstanceSpec, ProvisionError};
use rstest::fixture;

/// Context threaded through the provisioning scenarios.
#[derive(Clone, Debug, Default)]
pub struct ProvisionContext {
    /// Scripted control plane shared with the orchestrator under test.
    pub gateway: ScriptedGateway,
    /// Result of the workflow driven by the `when` step.
    pub outcome: Option<ProvisionOutcome>,
    /// Snapshot of the tracked identifiers after the workflow ran.
    pub inventory_ids: Vec<String>,
}

/// Outcome of a provisioning workflow.
#[derive(Clone, Debug)]
pub enum ProvisionOutcome {
    /// The workflow finished and returned these instance identifiers.
    Success(Vec<String>),
    /// The workflow failed with this error.
    Failure(ProvisionError),
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    ProvisionContext::default()
}

/// Builds an on-demand specification requesting between `min` and `max`
/// instances.
pub fn on_demand_spec(min: u32, max: u32) -> InstanceSpec {
    InstanceSpec {
        instance_type: String::from("m5.large"),
        iam_profile: String::from("worker"),
        image_id: String::from("ami-0abc"),
        subnet_id: String::from("subnet-1"),
        security_group_ids: vec![String::from("sg-1")],
        user_data: String::from("#!/bin/sh\n"),
        key_name: String::from("ops"),
        counts: groundcrew::CountRange { min, max },
        spot_price: None,
    }
}

/// Builds a spot specification requesting exactly `count` instances.
pub fn spot_spec(count: u32) -> InstanceSpec {
    let mut spec = on_demand_spec(count, count);
    spec.spot_price = Some(String::from("0.40"));
    spec
}
