//! Resource type descriptors - deserialized from embedded JSON files.

use serde::Deserialize;
use serde_json::Value;

/// One cloud resource instance, as returned by the management API.
pub type ResourceRecord = Value;

/// Derived field attached to every record carrying an id.
pub const RESOURCE_GROUP_FIELD: &str = "resourceGroup";

/// Lookup field linking an enumerated child record back to its parent's id.
pub const PARENT_ID_FIELD: &str = "parentId";

/// How a resource type is enumerated.
///
/// For top-level types `path` is relative to the subscription
/// (`providers/Microsoft.Compute/virtualMachines`); for child types it is
/// relative to a parent resource id (`databases`).
#[derive(Debug, Clone, Deserialize)]
pub struct EnumSpec {
    pub path: String,
    pub api_version: String,
    /// Extra query parameters for the list call, e.g. `$filter`.
    #[serde(default)]
    pub params: Value,
}

/// Reference from a child resource type to its parent manager.
#[derive(Debug, Clone, Deserialize)]
pub struct ParentSpec {
    pub manager_name: String,
    /// Annotate each enumerated child with its parent's id.
    #[serde(default)]
    pub annotate_parent: bool,
}

/// Enumeration strategy for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Direct list call scoped to the subscription.
    Describe,
    /// Enumerate the parent type, then list children under each parent id.
    DescribeChild,
}

/// Generic source name in descriptor files; a child type declaring it is
/// upgraded to the describe-child strategy.
pub const DESCRIBE_SOURCE: &str = "describe";
pub const DESCRIBE_CHILD_SOURCE: &str = "describe-child";

/// Static per-type configuration. Immutable once the catalog is built.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceTypeDescriptor {
    pub display_name: String,
    /// Qualified ARM type (`Microsoft.Compute/virtualMachines`). Absent for
    /// meta types with no single provider type, like the generic resource
    /// listing.
    #[serde(default)]
    pub arm_type: Option<String>,
    pub enum_spec: EnumSpec,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Whether the diagnostic-settings filter applies to this type.
    #[serde(default)]
    pub diagnostic_settings: bool,
    /// Whether the common delete action applies. Resource groups opt out.
    #[serde(default = "default_true")]
    pub supports_delete: bool,
    /// Ordered column set for reports.
    pub default_report_fields: Vec<String>,
    #[serde(default)]
    pub parent: Option<ParentSpec>,
    /// Enumeration source override. Unset means the type's natural default.
    #[serde(default)]
    pub source: Option<String>,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

fn default_true() -> bool {
    true
}

impl ResourceTypeDescriptor {
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }
}
