//! Thin adapters over the gateway's long-poll waiters.
//!
//! Each adapter blocks until the named predicate holds for every identifier
//! or the deadline passes, and maps the gateway's waiter outcome into the
//! orchestrator's error taxonomy. Polling cadence belongs to the gateway.

use std::time::Instant;

use crate::error::ProvisionError;
use crate::gateway::{ComputeGateway, GatewayError};

/// Waits until every spot request has been fulfilled.
///
/// # Errors
///
/// Returns [`ProvisionError::SpotUnfulfilled`] when the wait timed out or the
/// control plane moved a request into a terminal non-fulfilled state, and
/// [`ProvisionError::Gateway`] for any other control-plane failure.
pub async fn spot_fulfilled<G: ComputeGateway>(
    gateway: &G,
    request_ids: &[String],
    deadline: Instant,
) -> Result<(), ProvisionError> {
    gateway
        .wait_spot_fulfilled(request_ids, deadline)
        .await
        .map_err(|source| match source {
            GatewayError::DeadlineExceeded { .. } | GatewayError::SpotRequestFailed { .. } => {
                ProvisionError::SpotUnfulfilled { source }
            }
            other => ProvisionError::Gateway(other),
        })
}

/// Waits until every instance reports the running state.
///
/// # Errors
///
/// Returns [`ProvisionError::WaitTimeout`] when the deadline passed and
/// [`ProvisionError::Gateway`] for any other control-plane failure.
pub async fn instances_running<G: ComputeGateway>(
    gateway: &G,
    instance_ids: &[String],
    deadline: Instant,
) -> Result<(), ProvisionError> {
    gateway
        .wait_instances_running(instance_ids, deadline)
        .await
        .map_err(|source| map_state_wait(source, "running"))
}

/// Waits until every instance reports the terminated state.
///
/// # Errors
///
/// Returns [`ProvisionError::WaitTimeout`] when the deadline passed and
/// [`ProvisionError::Gateway`] for any other control-plane failure.
pub async fn instances_terminated<G: ComputeGateway>(
    gateway: &G,
    instance_ids: &[String],
    deadline: Instant,
) -> Result<(), ProvisionError> {
    gateway
        .wait_instances_terminated(instance_ids, deadline)
        .await
        .map_err(|source| map_state_wait(source, "terminated"))
}

fn map_state_wait(source: GatewayError, state: &str) -> ProvisionError {
    match source {
        GatewayError::DeadlineExceeded { .. } => ProvisionError::WaitTimeout {
            state: state.to_owned(),
            source,
        },
        other => ProvisionError::Gateway(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_exceeded_maps_to_wait_timeout() {
        let mapped = map_state_wait(
            GatewayError::DeadlineExceeded {
                operation: String::from("instance-running"),
            },
            "running",
        );
        assert!(matches!(
            mapped,
            ProvisionError::WaitTimeout { ref state, .. } if state == "running"
        ));
    }

    #[test]
    fn api_failures_pass_through_unchanged() {
        let mapped = map_state_wait(GatewayError::api("boom"), "terminated");
        assert!(matches!(mapped, ProvisionError::Gateway(_)));
    }
}
