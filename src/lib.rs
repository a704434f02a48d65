//! Infrastructure helpers for services running against AWS.
//!
//! The core of the crate is the EC2 fleet provisioning orchestrator: it
//! drives multi-step workflows against the compute control plane — request
//! on-demand or spot capacity, wait for remote state transitions, apply
//! tags, collect network addresses, and terminate partially-created
//! resources when a step fails. The control plane sits behind the
//! [`ComputeGateway`] trait so workflows can be driven against the real EC2
//! implementation or a scripted double.
//!
//! Around the core, the crate carries a handful of small, independent
//! helpers: typed environment lookups, sorted map-key extraction, SOCKS5
//! proxy liveness checks, and an S3 object-storage client.

pub mod collections;
pub mod config;
pub mod env;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod metrics;
pub mod net;
pub mod orchestrator;
pub mod request;
pub mod storage;
pub mod tagging;
pub mod test_support;
pub mod waiter;

pub use config::{ConfigError, FleetConfig};
pub use error::ProvisionError;
pub use gateway::aws::Ec2Gateway;
pub use gateway::{
    ComputeGateway, GatewayError, GatewayFuture, InstanceDescription, InstanceFilter,
    ProvisionedInstance, Reservation, Tag,
};
pub use inventory::{InstanceAddresses, Inventory};
pub use metrics::{MetricsSink, NoopMetrics};
pub use net::ProxyCheckError;
pub use orchestrator::{ProvisioningOrchestrator, STACK_PROVENANCE_TAG};
pub use request::{CountRange, InstanceSpec, InstanceSpecBuilder};
pub use storage::{ObjectStorage, StorageError};
pub use tagging::TagSet;
