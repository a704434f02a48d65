//! Module wiring for the provisioning BDD suite.

pub mod bdd_steps;
pub mod scenarios;
pub mod test_helpers;
