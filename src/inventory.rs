//! The orchestrator's record of instances it believes it owns.

use std::collections::BTreeMap;

/// Public and private addresses known for one instance.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstanceAddresses {
    /// Public address, when the instance exposes one.
    pub public_ip: Option<String>,
    /// Private address, when known.
    pub private_ip: Option<String>,
}

/// Single-owner mutable record of created instances.
///
/// Identifiers form an ordered, duplicate-free sequence; addresses are keyed
/// by identifier rather than by parallel position, so instances that never
/// expose a public address cannot misalign the lists. The tracker is not
/// internally synchronized: one orchestrator instance is assumed to be driven
/// by one logical caller at a time, which `&mut self` enforces at compile
/// time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Inventory {
    ids: Vec<String>,
    addresses: BTreeMap<String, InstanceAddresses>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ids: Vec::new(),
            addresses: BTreeMap::new(),
        }
    }

    /// Adds an instance identifier, ignoring identifiers already tracked.
    pub fn add_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    /// Records the addresses known for an already-tracked instance. Unknown
    /// identifiers are ignored.
    pub fn record_addresses(
        &mut self,
        id: &str,
        public_ip: Option<String>,
        private_ip: Option<String>,
    ) {
        if !self.ids.iter().any(|tracked| tracked == id) {
            return;
        }
        let entry = self.addresses.entry(id.to_owned()).or_default();
        if public_ip.is_some() {
            entry.public_ip = public_ip;
        }
        if private_ip.is_some() {
            entry.private_ip = private_ip;
        }
    }

    /// Forgets every tracked instance.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.addresses.clear();
    }

    /// Replaces the whole inventory with the given instances.
    pub fn rebuild(
        &mut self,
        entries: impl IntoIterator<Item = (String, Option<String>, Option<String>)>,
    ) {
        self.clear();
        for (id, public_ip, private_ip) in entries {
            self.add_id(id.clone());
            self.record_addresses(&id, public_ip, private_ip);
        }
    }

    /// Returns the tracked identifiers in insertion order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Returns the addresses recorded for an instance, if any.
    #[must_use]
    pub fn addresses_of(&self, id: &str) -> Option<&InstanceAddresses> {
        self.addresses.get(id)
    }

    /// Returns the known public addresses in identifier order. Instances
    /// without a public address are skipped.
    #[must_use]
    pub fn public_ips(&self) -> Vec<String> {
        self.ids
            .iter()
            .filter_map(|id| self.addresses.get(id))
            .filter_map(|addresses| addresses.public_ip.clone())
            .collect()
    }

    /// Returns the known private addresses in identifier order. Instances
    /// without a private address are skipped.
    #[must_use]
    pub fn private_ips(&self) -> Vec<String> {
        self.ids
            .iter()
            .filter_map(|id| self.addresses.get(id))
            .filter_map(|addresses| addresses.private_ip.clone())
            .collect()
    }

    /// Returns the number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns whether the inventory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
