//! BDD step definitions for the provisioning workflows.

use std::time::Duration;

use groundcrew::test_support::{GatewayCall, ScriptedGateway};
use groundcrew::{ProvisionError, ProvisioningOrchestrator, TagSet};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{ProvisionContext, ProvisionOutcome, on_demand_spec, spot_spec};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn orchestrator(gateway: &ScriptedGateway) -> ProvisioningOrchestrator<ScriptedGateway> {
    ProvisioningOrchestrator::new(gateway.clone(), TagSet::from_pairs([("team", "data")]))
        .with_wait_timeout(Duration::from_millis(20))
}

fn runtime() -> Result<Runtime, StepError> {
    Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))
}

#[given("a gateway that launches instances \"{first}\" and \"{second}\"")]
fn gateway_launches_two(
    provision_context: ProvisionContext,
    first: String,
    second: String,
) -> ProvisionContext {
    provision_context
        .gateway
        .push_reservation(&[(first.as_str(), None, None), (second.as_str(), None, None)]);
    provision_context
}

#[given("tagging fails on the second instance")]
fn tagging_fails_second(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context.gateway.push_tag_success();
    provision_context.gateway.push_tag_failure("tag denied");
    provision_context
}

#[given("a gateway with no instances matching the name \"{pattern}\"")]
fn gateway_matches_nothing(
    provision_context: ProvisionContext,
    pattern: String,
) -> ProvisionContext {
    let _ = pattern;
    provision_context.gateway.push_description(Vec::new());
    provision_context
}

#[given("a gateway that launches no instances")]
fn gateway_launches_nothing(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context
}

#[when("I provision an on-demand batch named \"{batch}\"")]
fn provision_on_demand(
    provision_context: ProvisionContext,
    batch: String,
) -> Result<ProvisionContext, StepError> {
    let runtime = runtime()?;
    let mut orchestrator = orchestrator(&provision_context.gateway);
    let result = runtime.block_on(async {
        orchestrator
            .provision_on_demand_and_await_ready(&batch, &on_demand_spec(2, 2))
            .await
    });
    Ok(finish(provision_context, &orchestrator, result))
}

#[when("I provision a spot batch of \"{count}\" instances")]
fn provision_spot(
    provision_context: ProvisionContext,
    count: u32,
) -> Result<ProvisionContext, StepError> {
    let runtime = runtime()?;
    let mut orchestrator = orchestrator(&provision_context.gateway);
    let result = runtime.block_on(async {
        orchestrator
            .provision_spot_and_await_ready("batch", &spot_spec(count))
            .await
    });
    Ok(finish(provision_context, &orchestrator, result))
}

#[when("I restore the inventory from the name \"{pattern}\"")]
fn restore_by_name(
    provision_context: ProvisionContext,
    pattern: String,
) -> Result<ProvisionContext, StepError> {
    let runtime = runtime()?;
    let mut orchestrator = orchestrator(&provision_context.gateway);
    let result = runtime.block_on(async {
        orchestrator
            .restore_running_instances_by_name(&pattern)
            .await
            .map(|()| orchestrator.instance_ids().to_vec())
    });
    Ok(finish(provision_context, &orchestrator, result))
}

#[when("I terminate all tracked instances twice")]
fn terminate_twice(provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let runtime = runtime()?;
    let mut orchestrator = orchestrator(&provision_context.gateway);
    let result = runtime.block_on(async {
        orchestrator.terminate_all_instances().await?;
        orchestrator.terminate_all_instances().await?;
        Ok(Vec::new())
    });
    Ok(finish(provision_context, &orchestrator, result))
}

fn finish(
    mut context: ProvisionContext,
    orchestrator: &ProvisioningOrchestrator<ScriptedGateway>,
    result: Result<Vec<String>, ProvisionError>,
) -> ProvisionContext {
    context.inventory_ids = orchestrator.instance_ids().to_vec();
    context.outcome = Some(match result {
        Ok(ids) => ProvisionOutcome::Success(ids),
        Err(err) => ProvisionOutcome::Failure(err),
    });
    context
}

fn outcome(context: &ProvisionContext) -> Result<&ProvisionOutcome, StepError> {
    context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

#[then("the provisioning outcome is success")]
fn outcome_is_success(provision_context: &ProvisionContext) -> Result<(), StepError> {
    match outcome(provision_context)? {
        ProvisionOutcome::Success(_) => Ok(()),
        ProvisionOutcome::Failure(err) => Err(StepError::Assertion(format!(
            "workflow failed unexpectedly: {err}"
        ))),
    }
}

#[then("the provisioning outcome is a tagging failure at position \"{index}\"")]
fn outcome_is_tagging_failure(
    provision_context: &ProvisionContext,
    index: usize,
) -> Result<(), StepError> {
    match outcome(provision_context)? {
        ProvisionOutcome::Failure(ProvisionError::TaggingFailed {
            index: failed_index,
            ..
        }) if *failed_index == index => Ok(()),
        other => Err(StepError::Assertion(format!("unexpected outcome: {other:?}"))),
    }
}

#[then("the provisioning outcome is a validation error")]
fn outcome_is_validation_error(provision_context: &ProvisionContext) -> Result<(), StepError> {
    match outcome(provision_context)? {
        ProvisionOutcome::Failure(ProvisionError::Validation { .. }) => Ok(()),
        other => Err(StepError::Assertion(format!("unexpected outcome: {other:?}"))),
    }
}

#[then("the inventory tracks \"{first}\" and \"{second}\"")]
fn inventory_tracks(
    provision_context: &ProvisionContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    if provision_context.inventory_ids == [first.clone(), second.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected [{first}, {second}], got {:?}",
            provision_context.inventory_ids
        )))
    }
}

#[then("the inventory is empty")]
fn inventory_is_empty(provision_context: &ProvisionContext) -> Result<(), StepError> {
    if provision_context.inventory_ids.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "inventory should be empty, got {:?}",
            provision_context.inventory_ids
        )))
    }
}

#[then("name tags \"{first}\" and \"{second}\" were applied in order")]
fn name_tags_applied(
    provision_context: &ProvisionContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    let applied: Vec<String> = provision_context
        .gateway
        .applied_name_tags()
        .into_iter()
        .map(|(_, name)| name)
        .collect();
    if applied == [first.clone(), second.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected [{first}, {second}], got {applied:?}"
        )))
    }
}

#[then("the running wait covered \"{first}\" and \"{second}\"")]
fn running_wait_covered(
    provision_context: &ProvisionContext,
    first: String,
    second: String,
) -> Result<(), StepError> {
    let waited: Vec<Vec<String>> = provision_context
        .gateway
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            GatewayCall::WaitInstancesRunning { instance_ids } => Some(instance_ids),
            _ => None,
        })
        .collect();
    if waited == [vec![first.clone(), second.clone()]] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected one wait over [{first}, {second}], got {waited:?}"
        )))
    }
}

#[then("every launched instance was terminated")]
fn every_instance_terminated(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let terminated = provision_context.gateway.terminated_ids();
    if terminated == ["i-1", "i-2"] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected both instances terminated, got {terminated:?}"
        )))
    }
}

#[then("no gateway call was made")]
fn no_gateway_call(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let count = provision_context.gateway.call_count();
    if count == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected zero gateway calls, got {count}: {:?}",
            provision_context.gateway.calls()
        )))
    }
}
