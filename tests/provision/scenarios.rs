//! BDD scenarios for the provisioning workflows.

use rstest_bdd_macros::scenario;

use super::test_helpers::ProvisionContext;

#[scenario(
    path = "tests/features/provision.feature",
    name = "Tag every launched instance with its batch ordinal"
)]
fn scenario_tag_batch_ordinals(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Terminate the whole batch when tagging fails midway"
)]
fn scenario_compensate_tagging_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Restoring by name with no matches empties the inventory"
)]
fn scenario_restore_empty(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Terminating an empty inventory is a no-op"
)]
fn scenario_terminate_noop(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Reject a spot batch with zero capacity"
)]
fn scenario_reject_zero_spot(provision_context: ProvisionContext) {
    let _ = provision_context;
}
