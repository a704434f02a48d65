//! End-to-end provisioning workflows over a compute gateway.
//!
//! One orchestrator instance manages one batch of instances it created itself
//! (or rediscovered by name tag). Every operation is a blocking call chain to
//! the gateway: there is no background polling and no parallelism within a
//! batch. The inventory is not internally synchronized; exclusive access is
//! enforced through `&mut self`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::gateway::{ComputeGateway, GatewayError, InstanceFilter, Reservation};
use crate::inventory::Inventory;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::request::{self, InstanceSpec};
use crate::tagging::{self, NAME_TAG_KEY, TagSet};
use crate::waiter;


/// Tag key linking an instance to the group that provisioned it.
pub const STACK_PROVENANCE_TAG: &str = "aws:cloudformation:stack-id";

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Drives provisioning, tagging, waiting, and termination workflows.
#[derive(Debug)]
pub struct ProvisioningOrchestrator<G, M = NoopMetrics> {
    gateway: G,
    base_tags: TagSet,
    inventory: Inventory,
    wait_timeout: Duration,
    metrics: M,
}

impl<G: ComputeGateway> ProvisioningOrchestrator<G, NoopMetrics> {
    /// Creates an orchestrator with the given gateway and base tag set and no
    /// metrics reporting.
    #[must_use]
    pub const fn new(gateway: G, base_tags: TagSet) -> Self {
        Self {
            gateway,
            base_tags,
            inventory: Inventory::new(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            metrics: NoopMetrics,
        }
    }
}

impl<G, M> ProvisioningOrchestrator<G, M>
where
    G: ComputeGateway,
    M: MetricsSink,
{
    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics<M2: MetricsSink>(self, metrics: M2) -> ProvisioningOrchestrator<G, M2> {
        ProvisioningOrchestrator {
            gateway: self.gateway,
            base_tags: self.base_tags,
            inventory: self.inventory,
            wait_timeout: self.wait_timeout,
            metrics,
        }
    }

    /// Overrides the time budget for each blocking wait.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Returns the tracked instance identifiers in creation order.
    #[must_use]
    pub fn instance_ids(&self) -> &[String] {
        self.inventory.ids()
    }

    /// Returns the known public addresses of tracked instances.
    #[must_use]
    pub fn public_ips(&self) -> Vec<String> {
        self.inventory.public_ips()
    }

    /// Returns the known private addresses of tracked instances.
    #[must_use]
    pub fn private_ips(&self) -> Vec<String> {
        self.inventory.private_ips()
    }

    /// Returns the full inventory record.
    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Requests on-demand capacity, tags the batch, and waits for every
    /// instance to reach the running state. Returns the created instance
    /// identifiers in the control plane's response order.
    ///
    /// On a tagging failure every instance tracked so far is terminated
    /// before the error is returned. A running-wait failure is returned
    /// without terminating anything; only the spot path compensates at that
    /// step, and the difference is deliberate until a single policy is
    /// settled.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when validation, the capacity request,
    /// tagging, or the running wait fail.
    pub async fn provision_on_demand_and_await_ready(
        &mut self,
        batch_name: &str,
        spec: &InstanceSpec,
    ) -> Result<Vec<String>, ProvisionError> {
        let payload = request::on_demand(spec, &self.base_tags)?;
        let reservation = self.gateway.request_instances(&payload).await?;
        let ids = self.track_reservation(&reservation);
        info!(batch = %batch_name, count = ids.len(), "requested on-demand capacity");
        self.metrics.instances_launched(ids.len());

        if let Err(err) =
            tagging::apply_batch_tags(&self.gateway, &self.base_tags, batch_name, &ids).await
        {
            return Err(self.compensate(err).await);
        }

        waiter::instances_running(&self.gateway, &ids, self.deadline()).await?;
        info!(batch = %batch_name, "on-demand batch is running");
        Ok(ids)
    }

    /// Requests spot capacity, waits for fulfillment, tags the batch, waits
    /// for the running state, and collects addresses. Returns the created
    /// instance identifiers.
    ///
    /// A fulfillment failure cancels the outstanding spot requests and
    /// returns [`ProvisionError::SpotUnfulfilled`]; no instances exist at
    /// that point. After instances exist, tagging, running-wait, and
    /// description failures each terminate every tracked instance before the
    /// error is returned. The workflow ends with one best-effort
    /// reapplication of the base tag set that does not gate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when validation, the spot request,
    /// fulfillment, tagging, the running wait, or the address description
    /// fail.
    pub async fn provision_spot_and_await_ready(
        &mut self,
        batch_name: &str,
        spec: &InstanceSpec,
    ) -> Result<Vec<String>, ProvisionError> {
        let payload = request::spot(spec)?;
        let request_ids = self.gateway.request_spot_instances(&payload).await?;
        info!(batch = %batch_name, requests = request_ids.len(), "requested spot capacity");

        if let Err(err) = waiter::spot_fulfilled(&self.gateway, &request_ids, self.deadline()).await
        {
            return Err(self.cancel_spot_after(err, &request_ids).await);
        }

        let ids = self.gateway.describe_spot_requests(&request_ids).await?;
        for id in &ids {
            self.inventory.add_id(id.clone());
        }
        self.metrics.instances_launched(ids.len());
        debug!(batch = %batch_name, count = ids.len(), "spot requests fulfilled");

        if let Err(err) =
            tagging::apply_batch_tags(&self.gateway, &self.base_tags, batch_name, &ids).await
        {
            return Err(self.compensate(err).await);
        }

        if let Err(err) = waiter::instances_running(&self.gateway, &ids, self.deadline()).await {
            return Err(self.compensate(err).await);
        }

        if let Err(err) = self.collect_addresses(&ids).await {
            return Err(self.compensate(err).await);
        }

        self.reapply_base_tags(&ids).await;
        info!(batch = %batch_name, "spot batch is running");
        Ok(ids)
    }

    /// Requests termination of every tracked instance and clears the
    /// inventory immediately, without waiting for the control plane to
    /// confirm shutdown. A no-op when nothing is tracked.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Gateway`] when the termination request
    /// fails; the inventory is left untouched in that case.
    pub async fn terminate_all_instances(&mut self) -> Result<(), ProvisionError> {
        self.request_termination().await.map_err(ProvisionError::from)
    }

    /// Requests termination of every tracked instance and blocks until the
    /// control plane reports the terminated state for each of them. Unlike
    /// [`Self::terminate_all_instances`] the inventory is retained; the
    /// asymmetry is inherited behaviour kept until a single policy is
    /// settled.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the termination request or the
    /// terminated wait fail.
    pub async fn terminate_all_instances_and_wait(&mut self) -> Result<(), ProvisionError> {
        if self.inventory.is_empty() {
            return Ok(());
        }
        let ids = self.inventory.ids().to_vec();
        self.gateway.terminate_instances(&ids).await?;
        self.metrics.instances_terminated(ids.len());
        waiter::instances_terminated(&self.gateway, &ids, self.deadline()).await?;
        info!(count = ids.len(), "tracked instances reached the terminated state");
        Ok(())
    }

    /// Replaces the inventory with the instances whose `Name` tag matches
    /// `name`. The control plane owns any wildcard semantics in the pattern.
    /// An empty match yields an empty inventory and is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Gateway`] when the query fails.
    pub async fn restore_running_instances_by_name(
        &mut self,
        name: &str,
    ) -> Result<(), ProvisionError> {
        let filter = InstanceFilter::ByTag {
            key: NAME_TAG_KEY.to_owned(),
            value: name.to_owned(),
        };
        let described = self.gateway.describe_instances(&filter).await?;
        info!(name = %name, count = described.len(), "rebuilt inventory from name query");
        self.inventory.rebuild(
            described
                .into_iter()
                .map(|instance| (instance.id, instance.public_ip, instance.private_ip)),
        );
        Ok(())
    }

    /// Returns the identifiers of every instance visible to the account,
    /// independent of this orchestrator's inventory. An empty result is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Gateway`] when the query fails.
    pub async fn running_instance_ids(&self) -> Result<Vec<String>, ProvisionError> {
        let described = self.gateway.describe_instances(&InstanceFilter::All).await?;
        Ok(described.into_iter().map(|instance| instance.id).collect())
    }

    /// Returns the identifiers of instances whose `Name` tag matches the
    /// pattern. An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Gateway`] when the query fails.
    pub async fn running_instance_ids_named(
        &self,
        name: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        let filter = InstanceFilter::ByTag {
            key: NAME_TAG_KEY.to_owned(),
            value: name.to_owned(),
        };
        let described = self.gateway.describe_instances(&filter).await?;
        Ok(described.into_iter().map(|instance| instance.id).collect())
    }

    /// Returns full descriptions of instances carrying the given tag. An
    /// empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Gateway`] when the query fails.
    pub async fn instances_with_tag(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<crate::gateway::InstanceDescription>, ProvisionError> {
        let filter = InstanceFilter::ByTag {
            key: key.to_owned(),
            value: value.to_owned(),
        };
        self.gateway
            .describe_instances(&filter)
            .await
            .map_err(ProvisionError::from)
    }

    /// Resolves the provisioning group of the instance with the given
    /// private DNS name via its provenance tag.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Validation`] for an empty DNS name and
    /// [`ProvisionError::LookupNotFound`] when no instance matches or the
    /// matched instance carries no provenance tag.
    pub async fn stack_id_by_private_dns_name(
        &self,
        dns_name: &str,
    ) -> Result<String, ProvisionError> {
        if dns_name.is_empty() {
            return Err(ProvisionError::validation(
                "private DNS name must not be empty",
            ));
        }
        let filter = InstanceFilter::ByPrivateDnsName(dns_name.to_owned());
        let described = self.gateway.describe_instances(&filter).await?;
        let instance = described.first().ok_or_else(|| {
            ProvisionError::lookup_not_found(format!(
                "no instance found with private DNS name {dns_name}"
            ))
        })?;
        instance
            .tag_value(STACK_PROVENANCE_TAG)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                ProvisionError::lookup_not_found(format!(
                    "instance {} carries no {STACK_PROVENANCE_TAG} tag",
                    instance.id
                ))
            })
    }

    /// Returns the private addresses of every instance in the given
    /// provisioning group.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Gateway`] when the query fails.
    pub async fn stack_private_ips_by_stack_id(
        &self,
        stack_id: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        let filter = InstanceFilter::ByTag {
            key: STACK_PROVENANCE_TAG.to_owned(),
            value: stack_id.to_owned(),
        };
        let described = self.gateway.describe_instances(&filter).await?;
        Ok(described
            .into_iter()
            .filter_map(|instance| instance.private_ip)
            .collect())
    }

    /// Returns the private addresses of the siblings of the instance with
    /// the given private DNS name, resolved through the shared provenance
    /// tag. The named instance itself is excluded.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::LookupNotFound`] when the DNS name or the
    /// provenance tag cannot be resolved.
    pub async fn stack_private_ips_by_child_dns_name(
        &self,
        dns_name: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        let stack_id = self.stack_id_by_private_dns_name(dns_name).await?;
        let filter = InstanceFilter::ByTag {
            key: STACK_PROVENANCE_TAG.to_owned(),
            value: stack_id,
        };
        let described = self.gateway.describe_instances(&filter).await?;
        Ok(described
            .into_iter()
            .filter(|instance| instance.private_dns_name.as_deref() != Some(dns_name))
            .filter_map(|instance| instance.private_ip)
            .collect())
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.wait_timeout
    }

    fn track_reservation(&mut self, reservation: &Reservation) -> Vec<String> {
        let mut ids = Vec::with_capacity(reservation.instances.len());
        for instance in &reservation.instances {
            self.inventory.add_id(instance.id.clone());
            self.inventory.record_addresses(
                &instance.id,
                instance.public_ip.clone(),
                instance.private_ip.clone(),
            );
            ids.push(instance.id.clone());
        }
        ids
    }

    async fn collect_addresses(&mut self, ids: &[String]) -> Result<(), ProvisionError> {
        let filter = InstanceFilter::ByIds(ids.to_vec());
        let described = self.gateway.describe_instances(&filter).await?;
        for instance in described {
            self.inventory
                .record_addresses(&instance.id, instance.public_ip, instance.private_ip);
        }
        Ok(())
    }

    async fn reapply_base_tags(&self, ids: &[String]) {
        if self.base_tags.is_empty() {
            return;
        }
        if let Err(err) = self.gateway.create_tags(ids, self.base_tags.as_slice()).await {
            warn!(error = %err, "best-effort base tag reapplication failed");
        }
    }

    async fn request_termination(&mut self) -> Result<(), GatewayError> {
        if self.inventory.is_empty() {
            return Ok(());
        }
        let ids = self.inventory.ids().to_vec();
        self.gateway.terminate_instances(&ids).await?;
        self.metrics.instances_terminated(ids.len());
        self.inventory.clear();
        info!(count = ids.len(), "requested termination of tracked instances");
        Ok(())
    }

    async fn compensate(&mut self, original: ProvisionError) -> ProvisionError {
        warn!(error = %original, "terminating tracked instances after failure");
        match self.request_termination().await {
            Ok(()) => original,
            Err(cleanup) => ProvisionError::Compensation {
                original: Box::new(original),
                cleanup,
            },
        }
    }

    async fn cancel_spot_after(
        &mut self,
        original: ProvisionError,
        request_ids: &[String],
    ) -> ProvisionError {
        warn!(error = %original, "cancelling outstanding spot requests");
        match self.gateway.cancel_spot_requests(request_ids).await {
            Ok(()) => {
                self.metrics.spot_requests_cancelled(request_ids.len());
                original
            }
            Err(cleanup) => ProvisionError::Compensation {
                original: Box::new(original),
                cleanup,
            },
        }
    }
}
