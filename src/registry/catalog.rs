//! Type catalog - loads resource type descriptors from embedded JSON and
//! binds the common capability set.
//!
//! Construction is a two-phase init: first every descriptor file is parsed
//! and registered, then a single finalization pass attaches the common
//! capability set to every class. Deferring the pass until the full type
//! universe is parsed means a type declared in any file receives the same
//! treatment regardless of file order. After construction the catalog is
//! read-only.

use super::capability::CapabilityRegistry;
use super::types::ResourceTypeDescriptor;
use crate::capability::{
    AutoTagUserAction, DeleteAction, DiagnosticSettingsFilter, MetricFilter,
    PolicyCompliantFilter, RemoveTagAction, TagAction, TagActionFilter, TagDelayedAction,
    TagTrimAction,
};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded descriptor files (compiled into the binary).
const DESCRIPTOR_FILES: &[&str] = &[
    include_str!("../resources/common.json"),
    include_str!("../resources/compute.json"),
    include_str!("../resources/storage.json"),
    include_str!("../resources/web.json"),
    include_str!("../resources/sql.json"),
];

/// Root structure of resources/*.json
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    resources: HashMap<String, ResourceTypeDescriptor>,
}

pub struct Catalog {
    descriptors: HashMap<String, ResourceTypeDescriptor>,
    capabilities: CapabilityRegistry,
    /// Lowercased qualified ARM type -> API version, for per-id resolution.
    api_versions: HashMap<String, String>,
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Get the process-wide catalog (built on first access).
pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| {
        Catalog::build()
            .unwrap_or_else(|e| panic!("Failed to build embedded resource catalog: {e}"))
    })
}

impl Catalog {
    /// Parse and finalize the embedded descriptor set. Any inconsistency
    /// here is a packaging defect and fatal to startup.
    pub fn build() -> Result<Self> {
        let mut descriptors = HashMap::new();
        for content in DESCRIPTOR_FILES {
            let file: DescriptorFile = serde_json::from_str(content)
                .map_err(|e| Error::Enumeration(format!("invalid descriptor file: {e}")))?;
            descriptors.extend(file.resources);
        }

        // Parent references must resolve inside the same universe, and a
        // parent must itself be a top-level type (one nesting level).
        for (key, desc) in &descriptors {
            if let Some(parent) = &desc.parent {
                match descriptors.get(&parent.manager_name) {
                    None => {
                        tracing::error!(
                            "descriptor '{}' names unregistered parent '{}'",
                            key,
                            parent.manager_name
                        );
                        return Err(Error::UnknownParentType(parent.manager_name.clone()));
                    }
                    Some(p) if p.is_child() => {
                        tracing::error!(
                            "descriptor '{}' names child type '{}' as its parent",
                            key,
                            parent.manager_name
                        );
                        return Err(Error::UnknownParentType(parent.manager_name.clone()));
                    }
                    Some(_) => {}
                }
            }
        }

        let mut capabilities = CapabilityRegistry::new();
        register_common_capabilities(&mut capabilities, &descriptors)?;

        let api_versions = descriptors
            .values()
            .filter_map(|desc| {
                desc.arm_type
                    .as_ref()
                    .map(|t| (t.to_lowercase(), desc.enum_spec.api_version.clone()))
            })
            .collect();

        Ok(Self {
            descriptors,
            capabilities,
            api_versions,
        })
    }

    pub fn descriptor(&self, key: &str) -> Result<&ResourceTypeDescriptor> {
        self.descriptors
            .get(key)
            .ok_or_else(|| Error::UnknownResourceType(key.to_string()))
    }

    /// All registered resource type keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.descriptors.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// API version for a qualified ARM type, if any descriptor declares it.
    pub fn api_version_for(&self, arm_type: &str) -> Option<&str> {
        self.api_versions
            .get(&arm_type.to_lowercase())
            .map(|s| s.as_str())
    }
}

/// The finalization pass: bind the common action and filter set to every
/// class in the universe. Safe to run more than once over the same
/// registry - registration dedupes identical implementations.
pub fn register_common_capabilities(
    registry: &mut CapabilityRegistry,
    descriptors: &HashMap<String, ResourceTypeDescriptor>,
) -> Result<()> {
    for (key, desc) in descriptors {
        registry.register_action(key, TagAction)?;
        registry.register_action(key, RemoveTagAction)?;
        registry.register_action(key, AutoTagUserAction)?;
        registry.register_action(key, TagTrimAction)?;
        registry.register_action(key, TagDelayedAction)?;
        registry.register_filter(key, MetricFilter)?;
        registry.register_filter(key, TagActionFilter)?;
        registry.register_filter(key, PolicyCompliantFilter)?;

        if desc.supports_delete {
            registry.register_action(key, DeleteAction)?;
        }

        if desc.diagnostic_settings {
            registry.register_filter(key, DiagnosticSettingsFilter)?;
        }
    }
    Ok(())
}
