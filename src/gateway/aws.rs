//! EC2 implementation of the compute gateway.
//!
//! Polling cadence for the long-poll waiters lives here, not in the
//! orchestrator: each waiter re-describes the watched resources on a fixed
//! interval until the target condition holds or the caller's deadline
//! passes.

use std::time::{Duration, Instant};

use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{
    Filter, IamInstanceProfileSpecification, Instance, InstanceStateName, InstanceType,
    RequestSpotLaunchSpecification, ResourceType, SpotInstanceRequest, SpotInstanceState,
    Tag as SdkTag, TagSpecification,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::time::sleep;
use tracing::debug;

use crate::gateway::{
    ComputeGateway, GatewayError, GatewayFuture, InstanceDescription, InstanceFilter,
    ProvisionedInstance, Reservation, Tag,
};
use crate::request::{OnDemandRequest, SpotCapacityRequest};

const DEFAULT_REGION: &str = "eu-west-1";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Compute gateway backed by the EC2 control plane.
#[derive(Clone, Debug)]
pub struct Ec2Gateway {
    client: Client,
    poll_interval: Duration,
}

impl Ec2Gateway {
    /// Connects to the given region, resolving credentials from the ambient
    /// execution context (environment, profile, or instance-role metadata).
    /// An empty region falls back to `AWS_REGION` and then to the built-in
    /// default. Credential resolution happens eagerly so a misconfigured
    /// environment fails at construction rather than on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Credentials`] when no usable credentials are
    /// available.
    pub async fn connect(region: &str) -> Result<Self, GatewayError> {
        let resolved = if region.is_empty() {
            crate::env::str_var("AWS_REGION", DEFAULT_REGION)
        } else {
            region.to_owned()
        };
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved))
            .load()
            .await;
        let provider = config
            .credentials_provider()
            .ok_or_else(|| GatewayError::Credentials {
                message: String::from("no credentials provider configured"),
            })?;
        provider
            .provide_credentials()
            .await
            .map_err(|err| GatewayError::Credentials {
                message: err.to_string(),
            })?;
        Ok(Self {
            client: Client::new(&config),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Wraps an already-configured EC2 client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the waiter polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn fetch_spot_requests(
        &self,
        request_ids: &[String],
    ) -> Result<Vec<SpotInstanceRequest>, GatewayError> {
        let output = self
            .client
            .describe_spot_instance_requests()
            .set_spot_instance_request_ids(Some(request_ids.to_vec()))
            .send()
            .await
            .map_err(api_error)?;
        Ok(output.spot_instance_requests().to_vec())
    }

    async fn fetch_instance_states(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceStateName>, GatewayError> {
        let output = self
            .client
            .describe_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(api_error)?;
        Ok(output
            .reservations()
            .iter()
            .flat_map(aws_sdk_ec2::types::Reservation::instances)
            .filter_map(|instance| instance.state().and_then(|state| state.name()).cloned())
            .collect())
    }

    async fn poll_spot_fulfilled(
        &self,
        request_ids: &[String],
        deadline: Instant,
    ) -> Result<(), GatewayError> {
        while Instant::now() <= deadline {
            let requests = self.fetch_spot_requests(request_ids).await?;
            if spot_requests_fulfilled(&requests)? {
                return Ok(());
            }
            debug!(requests = request_ids.len(), "spot requests still open");
            sleep(self.poll_interval).await;
        }
        Err(GatewayError::DeadlineExceeded {
            operation: String::from("spot-request-fulfilled"),
        })
    }

    async fn poll_instance_state(
        &self,
        instance_ids: &[String],
        target: InstanceStateName,
        operation: &str,
    ) -> Result<bool, GatewayError> {
        let states = self.fetch_instance_states(instance_ids).await?;
        if target == InstanceStateName::Running {
            ensure_no_terminal_state(&states)?;
        }
        let done =
            states.len() == instance_ids.len() && states.iter().all(|state| *state == target);
        if !done {
            debug!(operation, "instances not yet in the target state");
        }
        Ok(done)
    }

    async fn poll_until_state(
        &self,
        instance_ids: &[String],
        target: InstanceStateName,
        operation: &str,
        deadline: Instant,
    ) -> Result<(), GatewayError> {
        while Instant::now() <= deadline {
            if self
                .poll_instance_state(instance_ids, target.clone(), operation)
                .await?
            {
                return Ok(());
            }
            sleep(self.poll_interval).await;
        }
        Err(GatewayError::DeadlineExceeded {
            operation: operation.to_owned(),
        })
    }

    async fn describe_with_filter(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceDescription>, GatewayError> {
        let mut request = self.client.describe_instances();
        request = match filter {
            InstanceFilter::All => request,
            InstanceFilter::ByIds(ids) => request.set_instance_ids(Some(ids.clone())),
            InstanceFilter::ByTag { key, value } => request.filters(
                Filter::builder()
                    .name(format!("tag:{key}"))
                    .values(value)
                    .build(),
            ),
            InstanceFilter::ByPrivateDnsName(dns_name) => request.filters(
                Filter::builder()
                    .name("private-dns-name")
                    .values(dns_name)
                    .build(),
            ),
        };
        let output = request.send().await.map_err(api_error)?;
        Ok(output
            .reservations()
            .iter()
            .flat_map(aws_sdk_ec2::types::Reservation::instances)
            .filter_map(describe_instance)
            .collect())
    }
}

fn api_error(err: impl std::error::Error) -> GatewayError {
    GatewayError::api(DisplayErrorContext(&err).to_string())
}

fn count_to_i32(count: u32) -> Result<i32, GatewayError> {
    i32::try_from(count)
        .map_err(|_| GatewayError::api("instance count exceeds the control plane's range"))
}

fn sdk_tag(tag: &Tag) -> SdkTag {
    SdkTag::builder().key(&tag.key).value(&tag.value).build()
}

fn describe_instance(instance: &Instance) -> Option<InstanceDescription> {
    let id = instance.instance_id()?.to_owned();
    Some(InstanceDescription {
        id,
        public_ip: instance.public_ip_address().map(ToOwned::to_owned),
        private_ip: instance.private_ip_address().map(ToOwned::to_owned),
        private_dns_name: instance
            .private_dns_name()
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned),
        tags: instance
            .tags()
            .iter()
            .filter_map(|tag| {
                let key = tag.key()?;
                let value = tag.value()?;
                Some(Tag::new(key, value))
            })
            .collect(),
    })
}

fn spot_requests_fulfilled(requests: &[SpotInstanceRequest]) -> Result<bool, GatewayError> {
    if requests.is_empty() {
        return Ok(false);
    }
    for request in requests {
        match request.state() {
            Some(SpotInstanceState::Active) => {}
            Some(SpotInstanceState::Open) | None => return Ok(false),
            Some(state) => {
                return Err(GatewayError::SpotRequestFailed {
                    request_id: request
                        .spot_instance_request_id()
                        .unwrap_or("unknown")
                        .to_owned(),
                    state: state.as_str().to_owned(),
                });
            }
        }
    }
    Ok(true)
}

fn ensure_no_terminal_state(states: &[InstanceStateName]) -> Result<(), GatewayError> {
    let terminal = states.iter().find(|state| {
        matches!(
            state,
            InstanceStateName::Terminated | InstanceStateName::ShuttingDown
        )
    });
    terminal.map_or(Ok(()), |state| {
        Err(GatewayError::api(format!(
            "instance entered unexpected state {} while waiting for running",
            state.as_str()
        )))
    })
}

impl ComputeGateway for Ec2Gateway {
    fn request_instances<'a>(
        &'a self,
        request: &'a OnDemandRequest,
    ) -> GatewayFuture<'a, Reservation> {
        Box::pin(async move {
            let mut builder = self
                .client
                .run_instances()
                .image_id(&request.image_id)
                .instance_type(InstanceType::from(request.instance_type.as_str()))
                .min_count(count_to_i32(request.min_count)?)
                .max_count(count_to_i32(request.max_count)?)
                .key_name(&request.key_name)
                .subnet_id(&request.subnet_id)
                .user_data(BASE64.encode(&request.user_data))
                .iam_instance_profile(
                    IamInstanceProfileSpecification::builder()
                        .name(&request.iam_profile)
                        .build(),
                );
            for group in &request.security_group_ids {
                builder = builder.security_group_ids(group);
            }
            if !request.launch_tags.is_empty() {
                let mut spec = TagSpecification::builder().resource_type(ResourceType::Instance);
                for tag in &request.launch_tags {
                    spec = spec.tags(sdk_tag(tag));
                }
                builder = builder.tag_specifications(spec.build());
            }

            let output = builder.send().await.map_err(api_error)?;
            let instances = output
                .instances()
                .iter()
                .filter_map(|instance| {
                    let id = instance.instance_id()?.to_owned();
                    Some(ProvisionedInstance {
                        id,
                        public_ip: instance.public_ip_address().map(ToOwned::to_owned),
                        private_ip: instance.private_ip_address().map(ToOwned::to_owned),
                    })
                })
                .collect();
            Ok(Reservation { instances })
        })
    }

    fn request_spot_instances<'a>(
        &'a self,
        request: &'a SpotCapacityRequest,
    ) -> GatewayFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut launch = RequestSpotLaunchSpecification::builder()
                .image_id(&request.image_id)
                .instance_type(InstanceType::from(request.instance_type.as_str()))
                .key_name(&request.key_name)
                .subnet_id(&request.subnet_id)
                .user_data(BASE64.encode(&request.user_data))
                .iam_instance_profile(
                    IamInstanceProfileSpecification::builder()
                        .name(&request.iam_profile)
                        .build(),
                );
            for group in &request.security_group_ids {
                launch = launch.security_group_ids(group);
            }

            let output = self
                .client
                .request_spot_instances()
                .spot_price(&request.spot_price)
                .instance_count(count_to_i32(request.instance_count)?)
                .launch_specification(launch.build())
                .send()
                .await
                .map_err(api_error)?;
            Ok(output
                .spot_instance_requests()
                .iter()
                .filter_map(|spot| spot.spot_instance_request_id().map(ToOwned::to_owned))
                .collect())
        })
    }

    fn wait_spot_fulfilled<'a>(
        &'a self,
        request_ids: &'a [String],
        deadline: Instant,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(self.poll_spot_fulfilled(request_ids, deadline))
    }

    fn cancel_spot_requests<'a>(&'a self, request_ids: &'a [String]) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .cancel_spot_instance_requests()
                .set_spot_instance_request_ids(Some(request_ids.to_vec()))
                .send()
                .await
                .map_err(api_error)?;
            Ok(())
        })
    }

    fn describe_spot_requests<'a>(
        &'a self,
        request_ids: &'a [String],
    ) -> GatewayFuture<'a, Vec<String>> {
        Box::pin(async move {
            let requests = self.fetch_spot_requests(request_ids).await?;
            Ok(requests
                .iter()
                .filter_map(|request| request.instance_id().map(ToOwned::to_owned))
                .collect())
        })
    }

    fn create_tags<'a>(
        &'a self,
        instance_ids: &'a [String],
        tags: &'a [Tag],
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .create_tags()
                .set_resources(Some(instance_ids.to_vec()))
                .set_tags(Some(tags.iter().map(sdk_tag).collect()))
                .send()
                .await
                .map_err(api_error)?;
            Ok(())
        })
    }

    fn wait_instances_running<'a>(
        &'a self,
        instance_ids: &'a [String],
        deadline: Instant,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(self.poll_until_state(
            instance_ids,
            InstanceStateName::Running,
            "instance-running",
            deadline,
        ))
    }

    fn wait_instances_terminated<'a>(
        &'a self,
        instance_ids: &'a [String],
        deadline: Instant,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(self.poll_until_state(
            instance_ids,
            InstanceStateName::Terminated,
            "instance-terminated",
            deadline,
        ))
    }

    fn describe_instances<'a>(
        &'a self,
        filter: &'a InstanceFilter,
    ) -> GatewayFuture<'a, Vec<InstanceDescription>> {
        Box::pin(self.describe_with_filter(filter))
    }

    fn terminate_instances<'a>(&'a self, instance_ids: &'a [String]) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .terminate_instances()
                .set_instance_ids(Some(instance_ids.to_vec()))
                .send()
                .await
                .map_err(api_error)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot_request(id: &str, state: SpotInstanceState) -> SpotInstanceRequest {
        SpotInstanceRequest::builder()
            .spot_instance_request_id(id)
            .state(state)
            .build()
    }

    #[test]
    fn open_spot_requests_are_not_fulfilled() {
        let requests = [
            spot_request("sir-1", SpotInstanceState::Active),
            spot_request("sir-2", SpotInstanceState::Open),
        ];
        assert_eq!(spot_requests_fulfilled(&requests), Ok(false));
    }

    #[test]
    fn all_active_spot_requests_are_fulfilled() {
        let requests = [spot_request("sir-1", SpotInstanceState::Active)];
        assert_eq!(spot_requests_fulfilled(&requests), Ok(true));
    }

    #[test]
    fn terminal_spot_states_fail_the_wait() {
        let requests = [spot_request("sir-1", SpotInstanceState::Cancelled)];
        let err = spot_requests_fulfilled(&requests).expect_err("cancelled requests should fail");
        assert!(matches!(
            err,
            GatewayError::SpotRequestFailed { ref request_id, .. } if request_id == "sir-1"
        ));
    }

    #[test]
    fn terminal_instance_states_abort_the_running_wait() {
        let states = [InstanceStateName::Running, InstanceStateName::Terminated];
        assert!(ensure_no_terminal_state(&states).is_err());
        assert!(ensure_no_terminal_state(&[InstanceStateName::Pending]).is_ok());
    }
}
