//! Unit-level tests for provisioning error variants.

use groundcrew::{GatewayError, ProvisionError};

#[test]
fn spot_unfulfilled_renders_without_exposing_internals() {
    let error = ProvisionError::SpotUnfulfilled {
        source: GatewayError::DeadlineExceeded {
            operation: String::from("spot-request-fulfilled"),
        },
    };
    assert_eq!(error.to_string(), "spot capacity request was not fulfilled");
}

#[test]
fn wait_timeout_names_the_target_state() {
    let error = ProvisionError::WaitTimeout {
        state: String::from("terminated"),
        source: GatewayError::DeadlineExceeded {
            operation: String::from("instance-terminated"),
        },
    };
    assert_eq!(
        error.to_string(),
        "timed out waiting for instances to reach the terminated state"
    );
}

#[test]
fn gateway_errors_pass_their_message_through() {
    let error = ProvisionError::from(GatewayError::api("rate exceeded"));
    assert_eq!(error.to_string(), "compute API error: rate exceeded");
}

#[test]
fn spot_request_failures_carry_the_terminal_state() {
    let error = GatewayError::SpotRequestFailed {
        request_id: String::from("sir-1"),
        state: String::from("cancelled"),
    };
    assert_eq!(error.to_string(), "spot request sir-1 entered state cancelled");
}
