//! Control-plane abstraction for compute provisioning.
//!
//! The orchestrator talks to the cloud exclusively through the
//! [`ComputeGateway`] trait. The production implementation lives in
//! [`aws`]; tests drive the same trait with a scripted double.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::request::{OnDemandRequest, SpotCapacityRequest};

pub mod aws;

/// A single key/value pair applied to a cloud resource.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Builds a tag from a key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An instance as reported by the control plane at request time.
///
/// Instances are only ever constructed from gateway responses; the identifier
/// is assigned remotely and never generated locally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionedInstance {
    /// Identifier assigned by the control plane.
    pub id: String,
    /// Public address, when one was already assigned.
    pub public_ip: Option<String>,
    /// Private address, when one was already assigned.
    pub private_ip: Option<String>,
}

/// The control plane's response to an on-demand capacity request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reservation {
    /// Newly created instances in the control plane's response order.
    pub instances: Vec<ProvisionedInstance>,
}

/// A described instance, including whatever metadata the control plane
/// currently reports for it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceDescription {
    /// Identifier assigned by the control plane.
    pub id: String,
    /// Public address, when assigned.
    pub public_ip: Option<String>,
    /// Private address, when assigned.
    pub private_ip: Option<String>,
    /// Private DNS name, when assigned.
    pub private_dns_name: Option<String>,
    /// Tags currently applied to the instance.
    pub tags: Vec<Tag>,
}

impl InstanceDescription {
    /// Returns the value of the tag with the given key, if present.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }
}

/// Selection criteria for [`ComputeGateway::describe_instances`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceFilter {
    /// Every instance visible to the caller's account and region.
    All,
    /// Instances with the given identifiers.
    ByIds(Vec<String>),
    /// Instances carrying a tag with the given key and value. The control
    /// plane owns any wildcard semantics in the value.
    ByTag {
        /// Tag key to match.
        key: String,
        /// Tag value (or provider-side wildcard pattern) to match.
        value: String,
    },
    /// The instance whose private DNS name matches exactly.
    ByPrivateDnsName(String),
}

/// Errors raised by gateway implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GatewayError {
    /// Wrapper for control-plane API failures.
    #[error("compute API error: {message}")]
    Api {
        /// Message reported by the control plane or transport.
        message: String,
    },
    /// Raised at construction when no usable credentials are available.
    #[error("failed to resolve credentials: {message}")]
    Credentials {
        /// Message reported by the credential provider.
        message: String,
    },
    /// Raised when a long-poll waiter ran out of time.
    #[error("deadline exceeded while waiting for {operation}")]
    DeadlineExceeded {
        /// Waiter operation that timed out.
        operation: String,
    },
    /// Raised when the control plane moved a spot request into a terminal
    /// state other than fulfilled.
    #[error("spot request {request_id} entered state {state}")]
    SpotRequestFailed {
        /// Spot request identifier.
        request_id: String,
        /// Terminal state reported by the control plane.
        state: String,
    },
}

impl GatewayError {
    /// Builds an API error from a message.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

/// Future returned by gateway operations.
pub type GatewayFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Capability set required from the compute control plane.
///
/// Waiter methods block until the named condition holds for every identifier
/// or the `deadline` passes; polling cadence is owned by the implementation.
pub trait ComputeGateway {
    /// Requests on-demand capacity and returns the resulting reservation.
    fn request_instances<'a>(
        &'a self,
        request: &'a OnDemandRequest,
    ) -> GatewayFuture<'a, Reservation>;

    /// Requests spot capacity and returns the spot request identifiers.
    fn request_spot_instances<'a>(
        &'a self,
        request: &'a SpotCapacityRequest,
    ) -> GatewayFuture<'a, Vec<String>>;

    /// Waits until every spot request has been fulfilled.
    fn wait_spot_fulfilled<'a>(
        &'a self,
        request_ids: &'a [String],
        deadline: Instant,
    ) -> GatewayFuture<'a, ()>;

    /// Cancels outstanding spot requests. Best-effort: failures are surfaced
    /// but never retried.
    fn cancel_spot_requests<'a>(&'a self, request_ids: &'a [String]) -> GatewayFuture<'a, ()>;

    /// Resolves fulfilled spot requests to the instance identifiers they
    /// produced.
    fn describe_spot_requests<'a>(
        &'a self,
        request_ids: &'a [String],
    ) -> GatewayFuture<'a, Vec<String>>;

    /// Applies the given tags to the given instances. Partial application is
    /// possible on failure.
    fn create_tags<'a>(
        &'a self,
        instance_ids: &'a [String],
        tags: &'a [Tag],
    ) -> GatewayFuture<'a, ()>;

    /// Waits until every instance reports the running state.
    fn wait_instances_running<'a>(
        &'a self,
        instance_ids: &'a [String],
        deadline: Instant,
    ) -> GatewayFuture<'a, ()>;

    /// Waits until every instance reports the terminated state.
    fn wait_instances_terminated<'a>(
        &'a self,
        instance_ids: &'a [String],
        deadline: Instant,
    ) -> GatewayFuture<'a, ()>;

    /// Describes the instances matching the filter. An empty result is not
    /// an error.
    fn describe_instances<'a>(
        &'a self,
        filter: &'a InstanceFilter,
    ) -> GatewayFuture<'a, Vec<InstanceDescription>>;

    /// Requests termination of the given instances. Termination is accepted
    /// asynchronously; this call does not confirm shutdown.
    fn terminate_instances<'a>(&'a self, instance_ids: &'a [String]) -> GatewayFuture<'a, ()>;
}
