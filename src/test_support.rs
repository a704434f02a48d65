//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedGateway`] drives deterministic control-plane outcomes without
//! network access: queued responses are consumed in FIFO order and every call
//! is recorded for assertions. Mutating operations (tagging, waits,
//! cancellation, termination) default to success when no outcome is queued;
//! operations that must produce data (capacity requests, descriptions) fail
//! when unscripted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::gateway::{
    ComputeGateway, GatewayError, GatewayFuture, InstanceDescription, InstanceFilter,
    ProvisionedInstance, Reservation, Tag,
};
use crate::request::{OnDemandRequest, SpotCapacityRequest};

/// One recorded call made through [`ScriptedGateway`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GatewayCall {
    /// On-demand capacity request with its count range.
    RequestInstances {
        /// Minimum count passed in the payload.
        min_count: u32,
        /// Maximum count passed in the payload.
        max_count: u32,
    },
    /// Spot capacity request with its exact count.
    RequestSpotInstances {
        /// Instance count passed in the payload.
        count: u32,
    },
    /// Fulfillment wait over the given spot request identifiers.
    WaitSpotFulfilled {
        /// Spot request identifiers waited on.
        request_ids: Vec<String>,
    },
    /// Cancellation of the given spot request identifiers.
    CancelSpotRequests {
        /// Spot request identifiers cancelled.
        request_ids: Vec<String>,
    },
    /// Resolution of the given spot request identifiers.
    DescribeSpotRequests {
        /// Spot request identifiers resolved.
        request_ids: Vec<String>,
    },
    /// Tag application to the given instances.
    CreateTags {
        /// Instances the tags were applied to.
        instance_ids: Vec<String>,
        /// Applied tags as key/value pairs.
        tags: Vec<(String, String)>,
    },
    /// Running-state wait over the given instances.
    WaitInstancesRunning {
        /// Instance identifiers waited on.
        instance_ids: Vec<String>,
    },
    /// Terminated-state wait over the given instances.
    WaitInstancesTerminated {
        /// Instance identifiers waited on.
        instance_ids: Vec<String>,
    },
    /// Instance description with the given filter.
    DescribeInstances {
        /// Filter passed to the query.
        filter: InstanceFilter,
    },
    /// Termination request for the given instances.
    TerminateInstances {
        /// Instance identifiers covered by the request.
        instance_ids: Vec<String>,
    },
}

#[derive(Debug, Default)]
struct State {
    reservations: VecDeque<Result<Reservation, GatewayError>>,
    spot_request_ids: VecDeque<Result<Vec<String>, GatewayError>>,
    spot_waits: VecDeque<Result<(), GatewayError>>,
    cancellations: VecDeque<Result<(), GatewayError>>,
    spot_resolutions: VecDeque<Result<Vec<String>, GatewayError>>,
    tag_outcomes: VecDeque<Result<(), GatewayError>>,
    running_waits: VecDeque<Result<(), GatewayError>>,
    terminated_waits: VecDeque<Result<(), GatewayError>>,
    descriptions: VecDeque<Result<Vec<InstanceDescription>, GatewayError>>,
    terminations: VecDeque<Result<(), GatewayError>>,
    calls: Vec<GatewayCall>,
}

/// Scripted compute gateway double.
#[derive(Clone, Debug, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<State>>,
}

fn unscripted(operation: &str) -> GatewayError {
    GatewayError::api(format!("no scripted response for {operation}"))
}

impl ScriptedGateway {
    /// Creates a gateway with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("scripted gateway lock poisoned: {err}"))
    }

    /// Queues a successful reservation built from `(id, public_ip,
    /// private_ip)` triples.
    pub fn push_reservation(&self, instances: &[(&str, Option<&str>, Option<&str>)]) {
        let reservation = Reservation {
            instances: instances
                .iter()
                .map(|(id, public_ip, private_ip)| ProvisionedInstance {
                    id: (*id).to_owned(),
                    public_ip: public_ip.map(ToOwned::to_owned),
                    private_ip: private_ip.map(ToOwned::to_owned),
                })
                .collect(),
        };
        self.lock().reservations.push_back(Ok(reservation));
    }

    /// Queues a failing on-demand capacity request.
    pub fn fail_next_reservation(&self, message: &str) {
        self.lock()
            .reservations
            .push_back(Err(GatewayError::api(message)));
    }

    /// Queues a successful spot capacity request returning the given spot
    /// request identifiers.
    pub fn push_spot_request_ids(&self, request_ids: &[&str]) {
        self.lock()
            .spot_request_ids
            .push_back(Ok(request_ids.iter().map(|id| (*id).to_owned()).collect()));
    }

    /// Queues a fulfillment-wait outcome.
    pub fn push_spot_wait(&self, outcome: Result<(), GatewayError>) {
        self.lock().spot_waits.push_back(outcome);
    }

    /// Queues a cancellation outcome.
    pub fn push_cancellation(&self, outcome: Result<(), GatewayError>) {
        self.lock().cancellations.push_back(outcome);
    }

    /// Queues a successful spot resolution returning the given instance
    /// identifiers.
    pub fn push_spot_resolution(&self, instance_ids: &[&str]) {
        self.lock()
            .spot_resolutions
            .push_back(Ok(instance_ids.iter().map(|id| (*id).to_owned()).collect()));
    }

    /// Queues a successful tagging call.
    pub fn push_tag_success(&self) {
        self.lock().tag_outcomes.push_back(Ok(()));
    }

    /// Queues a failing tagging call.
    pub fn push_tag_failure(&self, message: &str) {
        self.lock()
            .tag_outcomes
            .push_back(Err(GatewayError::api(message)));
    }

    /// Queues a running-wait outcome.
    pub fn push_running_wait(&self, outcome: Result<(), GatewayError>) {
        self.lock().running_waits.push_back(outcome);
    }

    /// Queues a terminated-wait outcome.
    pub fn push_terminated_wait(&self, outcome: Result<(), GatewayError>) {
        self.lock().terminated_waits.push_back(outcome);
    }

    /// Queues a successful instance description.
    pub fn push_description(&self, instances: Vec<InstanceDescription>) {
        self.lock().descriptions.push_back(Ok(instances));
    }

    /// Queues a failing instance description.
    pub fn fail_next_description(&self, message: &str) {
        self.lock()
            .descriptions
            .push_back(Err(GatewayError::api(message)));
    }

    /// Queues a termination outcome.
    pub fn push_termination(&self, outcome: Result<(), GatewayError>) {
        self.lock().terminations.push_back(outcome);
    }

    /// Returns every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Returns the total number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Returns `(instance_id, name_tag_value)` for every recorded tagging
    /// call that carried a `Name` tag.
    #[must_use]
    pub fn applied_name_tags(&self) -> Vec<(String, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::CreateTags { instance_ids, tags } => {
                    let name = tags
                        .iter()
                        .find(|(key, _)| key == "Name")
                        .map(|(_, value)| value.clone())?;
                    let id = instance_ids.first()?.clone();
                    Some((id, name))
                }
                _ => None,
            })
            .collect()
    }

    /// Returns the identifiers covered by every recorded termination
    /// request, flattened in call order.
    #[must_use]
    pub fn terminated_ids(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::TerminateInstances { instance_ids } => Some(instance_ids.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl ComputeGateway for ScriptedGateway {
    fn request_instances<'a>(
        &'a self,
        request: &'a OnDemandRequest,
    ) -> GatewayFuture<'a, Reservation> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::RequestInstances {
                min_count: request.min_count,
                max_count: request.max_count,
            });
            state
                .reservations
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("request_instances")))
        })
    }

    fn request_spot_instances<'a>(
        &'a self,
        request: &'a SpotCapacityRequest,
    ) -> GatewayFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::RequestSpotInstances {
                count: request.instance_count,
            });
            state
                .spot_request_ids
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("request_spot_instances")))
        })
    }

    fn wait_spot_fulfilled<'a>(
        &'a self,
        request_ids: &'a [String],
        _deadline: Instant,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::WaitSpotFulfilled {
                request_ids: request_ids.to_vec(),
            });
            state.spot_waits.pop_front().unwrap_or(Ok(()))
        })
    }

    fn cancel_spot_requests<'a>(&'a self, request_ids: &'a [String]) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::CancelSpotRequests {
                request_ids: request_ids.to_vec(),
            });
            state.cancellations.pop_front().unwrap_or(Ok(()))
        })
    }

    fn describe_spot_requests<'a>(
        &'a self,
        request_ids: &'a [String],
    ) -> GatewayFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::DescribeSpotRequests {
                request_ids: request_ids.to_vec(),
            });
            state
                .spot_resolutions
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("describe_spot_requests")))
        })
    }

    fn create_tags<'a>(
        &'a self,
        instance_ids: &'a [String],
        tags: &'a [Tag],
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::CreateTags {
                instance_ids: instance_ids.to_vec(),
                tags: tags
                    .iter()
                    .map(|tag| (tag.key.clone(), tag.value.clone()))
                    .collect(),
            });
            state.tag_outcomes.pop_front().unwrap_or(Ok(()))
        })
    }

    fn wait_instances_running<'a>(
        &'a self,
        instance_ids: &'a [String],
        _deadline: Instant,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::WaitInstancesRunning {
                instance_ids: instance_ids.to_vec(),
            });
            state.running_waits.pop_front().unwrap_or(Ok(()))
        })
    }

    fn wait_instances_terminated<'a>(
        &'a self,
        instance_ids: &'a [String],
        _deadline: Instant,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::WaitInstancesTerminated {
                instance_ids: instance_ids.to_vec(),
            });
            state.terminated_waits.pop_front().unwrap_or(Ok(()))
        })
    }

    fn describe_instances<'a>(
        &'a self,
        filter: &'a InstanceFilter,
    ) -> GatewayFuture<'a, Vec<InstanceDescription>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::DescribeInstances {
                filter: filter.clone(),
            });
            state
                .descriptions
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("describe_instances")))
        })
    }

    fn terminate_instances<'a>(&'a self, instance_ids: &'a [String]) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(GatewayCall::TerminateInstances {
                instance_ids: instance_ids.to_vec(),
            });
            state.terminations.pop_front().unwrap_or(Ok(()))
        })
    }
}
