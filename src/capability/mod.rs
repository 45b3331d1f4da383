//! Actions and filters bindable to resource-type classes.
//!
//! Implementations are opaque to the registry: it binds names to them and
//! never inspects their internals. Both kinds apply to resource records
//! through the ARM client, with per-invocation settings passed as a JSON
//! parameter object.

mod actions;
mod filters;

pub use actions::{
    AutoTagUserAction, DeleteAction, RemoveTagAction, TagAction, TagDelayedAction, TagTrimAction,
};
pub use filters::{DiagnosticSettingsFilter, MetricFilter, PolicyCompliantFilter, TagActionFilter};

use crate::arm::client::ArmClient;
use crate::error::Result;
use crate::registry::types::ResourceRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Tag carrying a delayed-action marker, `<op>@<YYYY/MM/DD>`.
pub const DEFAULT_STATUS_TAG: &str = "azgov_status";

/// A mutating operation over a set of resource records.
#[async_trait]
pub trait Action: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        params: &Value,
    ) -> Result<()>;
}

/// A read-only predicate over a single resource record.
#[async_trait]
pub trait ResourceFilter: Send + Sync {
    fn name(&self) -> &'static str;
    async fn matches(
        &self,
        client: &ArmClient,
        record: &ResourceRecord,
        params: &Value,
    ) -> Result<bool>;
}

pub(crate) fn param_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

pub(crate) fn param_i64(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(Value::as_i64)
}

pub(crate) fn param_f64(params: &Value, key: &str) -> Option<f64> {
    params.get(key).and_then(Value::as_f64)
}

pub(crate) fn param_bool(params: &Value, key: &str) -> Option<bool> {
    params.get(key).and_then(Value::as_bool)
}

/// The `tags` object of a record, cloned as a string map.
pub(crate) fn record_tags(record: &ResourceRecord) -> serde_json::Map<String, Value> {
    record
        .get("tags")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn record_id(record: &ResourceRecord) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}
