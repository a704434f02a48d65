//! Error types shared by the provisioning workflows.

use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors raised by the provisioning orchestrator and its collaborators.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when an instance specification fails validation before any
    /// control-plane call is made.
    #[error("invalid instance specification: {message}")]
    Validation {
        /// Description of the rejected field or combination.
        message: String,
    },
    /// Wrapper for control-plane failures outside the named cases below.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Raised when tagging aborted partway through a batch. Instances before
    /// `index` carry their generated tags; instances from `index` onwards do
    /// not.
    #[error("failed to tag instance {instance_id} at position {index} of its batch")]
    TaggingFailed {
        /// Zero-based position of the failing instance within the batch.
        index: usize,
        /// Identifier of the instance whose tagging call failed.
        instance_id: String,
        /// Control-plane failure that aborted the tagging sequence.
        #[source]
        source: GatewayError,
    },
    /// Raised when a spot capacity request was rejected or not fulfilled in
    /// time. No instances exist on this path.
    #[error("spot capacity request was not fulfilled")]
    SpotUnfulfilled {
        /// Waiter outcome that ended the fulfillment wait.
        #[source]
        source: GatewayError,
    },
    /// Raised when instances did not reach the expected lifecycle state
    /// before the deadline.
    #[error("timed out waiting for instances to reach the {state} state")]
    WaitTimeout {
        /// Lifecycle state that was being waited on.
        state: String,
        /// Waiter outcome reported by the gateway.
        #[source]
        source: GatewayError,
    },
    /// Raised when a DNS-name or provenance-tag lookup matched nothing.
    #[error("{message}")]
    LookupNotFound {
        /// Description of the lookup that missed.
        message: String,
    },
    /// Raised when a compensating termination failed after an earlier error.
    /// Both failures are preserved: the original error remains the primary
    /// context and the cleanup failure is appended.
    #[error("{original} (teardown also failed: {cleanup})")]
    Compensation {
        /// Failure that triggered the compensation attempt.
        original: Box<ProvisionError>,
        /// Control-plane failure raised by the termination request itself.
        cleanup: GatewayError,
    },
}

impl ProvisionError {
    /// Builds a validation error from a message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a lookup-miss error from a message.
    #[must_use]
    pub fn lookup_not_found(message: impl Into<String>) -> Self {
        Self::LookupNotFound {
            message: message.into(),
        }
    }
}
