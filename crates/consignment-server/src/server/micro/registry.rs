//! Service discovery records and the registry interface.
//!
//! A running [`MicroService`](super::MicroService) publishes one
//! [`ServiceRecord`] per process: its logical name, version, the gRPC
//! endpoints it serves and a single [`Node`] carrying the bound address.
//! Callers look services up by name and dial any node.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service {0} not found")]
    NotFound(String),

    #[error("service record is invalid: {0}")]
    Invalid(String),
}

/// One process serving a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub address: String,
    pub metadata: HashMap<String, String>,
}

/// A named, versioned service and the nodes currently serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub version: String,
    /// Fully-qualified gRPC service names, e.g. `consignment.ShippingService`.
    pub endpoints: Vec<String>,
    pub nodes: Vec<Node>,
}

/// Discovery backend a managed service registers with.
pub trait Registry: Send + Sync + core::fmt::Debug {
    /// Adds the record's nodes under its name and version, replacing nodes
    /// with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Invalid`] for records without a name or nodes.
    fn register(&self, service: &ServiceRecord) -> Result<(), RegistryError>;

    /// Removes the record's nodes. A version with no nodes left is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the name was never registered.
    fn deregister(&self, service: &ServiceRecord) -> Result<(), RegistryError>;

    /// Every registered version of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if nothing is registered under it.
    fn get_service(&self, name: &str) -> Result<Vec<ServiceRecord>, RegistryError>;

    fn list_services(&self) -> Vec<ServiceRecord>;
}

/// In-process registry, keyed by name then version.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    services: RwLock<HashMap<String, BTreeMap<String, ServiceRecord>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for MemoryRegistry {
    fn register(&self, service: &ServiceRecord) -> Result<(), RegistryError> {
        if service.name.is_empty() {
            return Err(RegistryError::Invalid("missing name".to_string()));
        }
        if service.nodes.is_empty() {
            return Err(RegistryError::Invalid(format!(
                "{} has no nodes",
                service.name
            )));
        }

        let mut services = self.services.write();
        let entry = services
            .entry(service.name.clone())
            .or_default()
            .entry(service.version.clone())
            .or_insert_with(|| ServiceRecord {
                nodes: Vec::new(),
                ..service.clone()
            });

        entry.endpoints.clone_from(&service.endpoints);
        for node in &service.nodes {
            entry.nodes.retain(|n| n.id != node.id);
            entry.nodes.push(node.clone());
        }
        Ok(())
    }

    fn deregister(&self, service: &ServiceRecord) -> Result<(), RegistryError> {
        let mut services = self.services.write();
        let versions = services
            .get_mut(&service.name)
            .ok_or_else(|| RegistryError::NotFound(service.name.clone()))?;

        if let Some(record) = versions.get_mut(&service.version) {
            record
                .nodes
                .retain(|n| !service.nodes.iter().any(|gone| gone.id == n.id));
            if record.nodes.is_empty() {
                versions.remove(&service.version);
            }
        }
        if versions.is_empty() {
            services.remove(&service.name);
        }
        Ok(())
    }

    fn get_service(&self, name: &str) -> Result<Vec<ServiceRecord>, RegistryError> {
        self.services
            .read()
            .get(name)
            .map(|versions| versions.values().cloned().collect())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn list_services(&self) -> Vec<ServiceRecord> {
        self.services
            .read()
            .values()
            .flat_map(|versions| versions.values().cloned())
            .collect()
    }
}
