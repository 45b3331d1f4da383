//! Resource managers.
//!
//! A manager combines a resource type's descriptor with the ARM client and
//! exposes the operations the policy layer consumes: enumeration,
//! augmentation, point fetches by id, and the type's resolved capability
//! set.

mod child;

pub use child::ChildResourceManager;

use crate::arm::client::ArmClient;
use crate::capability::{Action, ResourceFilter};
use crate::error::Result;
use crate::identity;
use crate::registry::catalog;
use crate::registry::types::{
    ResourceRecord, ResourceTypeDescriptor, RESOURCE_GROUP_FIELD,
};
use futures::future;
use serde_json::Value;
use std::sync::Arc;

/// Manager for a top-level resource type.
pub struct ResourceManager {
    name: String,
    descriptor: &'static ResourceTypeDescriptor,
    client: ArmClient,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    pub fn new(name: &str, client: ArmClient) -> Result<Self> {
        let descriptor = catalog().descriptor(name)?;
        Ok(Self::from_parts(name, descriptor, client))
    }

    pub(crate) fn from_parts(
        name: &str,
        descriptor: &'static ResourceTypeDescriptor,
        client: ArmClient,
    ) -> Self {
        Self {
            name: name.to_string(),
            descriptor,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &'static ResourceTypeDescriptor {
        self.descriptor
    }

    pub fn client(&self) -> &ArmClient {
        &self.client
    }

    /// Enumerate the type's resources through the provider's list call.
    pub async fn enumerate(&self) -> Result<Vec<ResourceRecord>> {
        let records = self.client.list(&self.descriptor.enum_spec).await?;
        tracing::debug!("enumerated {} {} records", records.len(), self.name);
        Ok(records)
    }

    /// Attach derived fields to enumerated records: every record carrying
    /// an id gets its `resourceGroup` extracted from that id. Records
    /// without an id pass through unchanged. Idempotent.
    pub fn augment(&self, mut records: Vec<ResourceRecord>) -> Result<Vec<ResourceRecord>> {
        for record in &mut records {
            let Some(id) = record.get(&self.descriptor.id_field).and_then(Value::as_str) else {
                continue;
            };
            let group = identity::resource_group(id)?.to_string();
            if let Some(obj) = record.as_object_mut() {
                obj.insert(RESOURCE_GROUP_FIELD.to_string(), Value::String(group));
            }
        }
        Ok(records)
    }

    /// Enumerate and augment - the full record flow exposed downstream.
    pub async fn resources(&self) -> Result<Vec<ResourceRecord>> {
        let records = self.enumerate().await?;
        self.augment(records)
    }

    /// Fetch exact resources by id, one provider call per id, in parallel.
    /// The API version is resolved per id. A failing id never aborts its
    /// siblings: failures are logged and the successes returned, unless
    /// every id failed, in which case the first failure surfaces.
    pub async fn get_resources(&self, resource_ids: &[String]) -> Result<Vec<ResourceRecord>> {
        let fetches = resource_ids.iter().map(|rid| async move {
            let api_version = self.client.resource_api_version(rid)?;
            self.client.get_by_id(rid, &api_version).await
        });
        let outcomes = future::join_all(fetches).await;

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (rid, outcome) in resource_ids.iter().zip(outcomes) {
            match outcome {
                Ok(record) => records.push(record),
                Err(err) => failures.push((rid, err)),
            }
        }

        if records.is_empty() {
            if let Some((_, err)) = failures.into_iter().next() {
                return Err(err);
            }
        } else {
            for (rid, err) in &failures {
                tracing::warn!("failed to fetch {}: {}", rid, err);
            }
        }

        self.augment(records)
    }

    // =========================================================================
    // Resolved capability set
    // =========================================================================

    pub fn action(&self, name: &str) -> Result<Arc<dyn Action>> {
        catalog().capabilities().action(&self.name, name)
    }

    pub fn filter(&self, name: &str) -> Result<Arc<dyn ResourceFilter>> {
        catalog().capabilities().filter(&self.name, name)
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        catalog().capabilities().action_names(&self.name)
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        catalog().capabilities().filter_names(&self.name)
    }
}

/// A manager of either kind, dispatched from the descriptor.
pub enum Manager {
    Standard(ResourceManager),
    Child(ChildResourceManager),
}

impl Manager {
    /// Build the manager for a registered resource type; child types get
    /// the child specialization.
    pub fn for_type(name: &str, client: ArmClient) -> Result<Self> {
        if catalog().descriptor(name)?.is_child() {
            Ok(Manager::Child(ChildResourceManager::new(name, client)?))
        } else {
            Ok(Manager::Standard(ResourceManager::new(name, client)?))
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Manager::Standard(m) => m.name(),
            Manager::Child(m) => m.name(),
        }
    }

    pub fn descriptor(&self) -> &'static ResourceTypeDescriptor {
        match self {
            Manager::Standard(m) => m.descriptor(),
            Manager::Child(m) => m.descriptor(),
        }
    }

    pub async fn enumerate(&self) -> Result<Vec<ResourceRecord>> {
        match self {
            Manager::Standard(m) => m.enumerate().await,
            Manager::Child(m) => m.enumerate().await,
        }
    }

    pub fn augment(&self, records: Vec<ResourceRecord>) -> Result<Vec<ResourceRecord>> {
        match self {
            Manager::Standard(m) => m.augment(records),
            Manager::Child(m) => m.augment(records),
        }
    }

    /// Enumerate and augment.
    pub async fn resources(&self) -> Result<Vec<ResourceRecord>> {
        let records = self.enumerate().await?;
        self.augment(records)
    }

    pub async fn get_resources(&self, resource_ids: &[String]) -> Result<Vec<ResourceRecord>> {
        match self {
            Manager::Standard(m) => m.get_resources(resource_ids).await,
            Manager::Child(m) => m.get_resources(resource_ids).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::client::DEFAULT_ENDPOINT;
    use crate::error::Error;
    use serde_json::json;

    fn manager(name: &str) -> ResourceManager {
        ResourceManager::new(name, ArmClient::with_token(DEFAULT_ENDPOINT, "S1", "t")).unwrap()
    }

    #[test]
    fn unknown_type_is_rejected() {
        let client = ArmClient::with_token(DEFAULT_ENDPOINT, "S1", "t");
        assert!(matches!(
            ResourceManager::new("not-a-type", client).unwrap_err(),
            Error::UnknownResourceType(_)
        ));
    }

    #[test]
    fn augment_derives_resource_group_from_id() {
        let records = vec![json!({
            "id": "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/vm1",
            "name": "vm1"
        })];
        let augmented = manager("vm").augment(records).unwrap();
        assert_eq!(augmented[0][RESOURCE_GROUP_FIELD], "RG1");
    }

    #[test]
    fn augment_is_idempotent() {
        let records = vec![json!({
            "id": "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/vm1",
            "name": "vm1"
        })];
        let m = manager("vm");
        let once = m.augment(records).unwrap();
        let twice = m.augment(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn records_without_id_pass_through_unchanged() {
        let record = json!({ "name": "orphan", "location": "westus" });
        let augmented = manager("vm").augment(vec![record.clone()]).unwrap();
        assert_eq!(augmented, vec![record]);
    }

    #[test]
    fn unparseable_id_surfaces_malformed_identifier() {
        let records = vec![json!({ "id": "/subscriptions/S1/no-group-here", "name": "x" })];
        assert!(matches!(
            manager("vm").augment(records).unwrap_err(),
            Error::MalformedIdentifier { .. }
        ));
    }

    #[test]
    fn common_capability_set_is_resolvable() {
        let m = manager("vm");
        assert!(m.action("tag").is_ok());
        assert!(m.action("delete").is_ok());
        assert!(m.filter("metric").is_ok());
        assert!(m.filter("diagnostic-settings").is_ok());
        assert!(m.action("reboot").is_err());

        let rg = manager("resourcegroup");
        assert!(rg.action("tag").is_ok());
        assert!(rg.action("delete").is_err());
    }

    #[test]
    fn for_type_dispatches_child_types() {
        let client = ArmClient::with_token(DEFAULT_ENDPOINT, "S1", "t");
        assert!(matches!(
            Manager::for_type("sqldatabase", client.clone()).unwrap(),
            Manager::Child(_)
        ));
        assert!(matches!(
            Manager::for_type("sqlserver", client).unwrap(),
            Manager::Standard(_)
        ));
    }
}
