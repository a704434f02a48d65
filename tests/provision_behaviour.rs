//! Behavioural scenarios for the provisioning workflows.

mod provision;
