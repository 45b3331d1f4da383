//! Common remediation actions.
//!
//! Tag mutations go through the scope-level tags endpoint so one API version
//! covers every resource type; delete resolves its API version per id.

use super::{param_i64, param_str, record_id, record_tags, Action, DEFAULT_STATUS_TAG};
use crate::arm::client::ArmClient;
use crate::error::{Error, Result};
use crate::registry::types::ResourceRecord;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

/// API version of the `Microsoft.Resources/tags` scope endpoint.
const TAGS_API_VERSION: &str = "2021-04-01";

/// Azure caps tags per resource at 50.
const MAX_TAGS: usize = 50;

fn tags_url(client: &ArmClient, resource_id: &str) -> String {
    client.resource_url(
        &format!("{resource_id}/providers/Microsoft.Resources/tags/default"),
        TAGS_API_VERSION,
    )
}

async fn patch_tags(
    client: &ArmClient,
    resource_id: &str,
    operation: &str,
    tags: Value,
) -> Result<()> {
    let body = json!({ "operation": operation, "properties": { "tags": tags } });
    client.patch(&tags_url(client, resource_id), &body).await?;
    Ok(())
}

/// Merge one tag (or a tag map) into each record's tags.
#[derive(Debug)]
pub struct TagAction;

#[async_trait]
impl Action for TagAction {
    fn name(&self) -> &'static str {
        "tag"
    }

    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        params: &Value,
    ) -> Result<()> {
        let tags = if let Some(map) = params.get("tags").and_then(Value::as_object) {
            Value::Object(map.clone())
        } else {
            let key = param_str(params, "tag")
                .ok_or_else(|| Error::InvalidParams("tag action requires 'tag' or 'tags'".into()))?;
            let value = param_str(params, "value").unwrap_or_default();
            json!({ key: value })
        };

        for record in records {
            let Some(id) = record_id(record) else { continue };
            patch_tags(client, id, "Merge", tags.clone()).await?;
            tracing::debug!("tagged {}", id);
        }
        Ok(())
    }
}

/// Remove named tags from each record.
#[derive(Debug)]
pub struct RemoveTagAction;

#[async_trait]
impl Action for RemoveTagAction {
    fn name(&self) -> &'static str {
        "untag"
    }

    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        params: &Value,
    ) -> Result<()> {
        let keys: Vec<String> = params
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if keys.is_empty() {
            return Err(Error::InvalidParams("untag action requires 'tags'".into()));
        }

        for record in records {
            let Some(id) = record_id(record) else { continue };
            // The delete operation wants names with their current values.
            let current = record_tags(record);
            let mut doomed = serde_json::Map::new();
            for key in &keys {
                if let Some(value) = current.get(key) {
                    doomed.insert(key.clone(), value.clone());
                }
            }
            if doomed.is_empty() {
                continue;
            }
            patch_tags(client, id, "Delete", Value::Object(doomed)).await?;
        }
        Ok(())
    }
}

/// Tag each record with the principal that is operating on it.
#[derive(Debug)]
pub struct AutoTagUserAction;

#[async_trait]
impl Action for AutoTagUserAction {
    fn name(&self) -> &'static str {
        "auto-tag-user"
    }

    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        params: &Value,
    ) -> Result<()> {
        let key = param_str(params, "tag").unwrap_or("CreatorId");
        let user = param_str(params, "user")
            .map(str::to_string)
            .or_else(|| client.principal())
            .unwrap_or_else(|| "unknown".to_string());

        for record in records {
            let Some(id) = record_id(record) else { continue };
            // Only stamp resources that are not already attributed.
            if record_tags(record).contains_key(key) {
                continue;
            }
            patch_tags(client, id, "Merge", json!({ key: user })).await?;
        }
        Ok(())
    }
}

/// Free tag slots on records near the per-resource tag limit by dropping
/// tags not named in `preserve`.
#[derive(Debug)]
pub struct TagTrimAction;

#[async_trait]
impl Action for TagTrimAction {
    fn name(&self) -> &'static str {
        "tag-trim"
    }

    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        params: &Value,
    ) -> Result<()> {
        let space = param_i64(params, "space").unwrap_or(1).max(0) as usize;
        let preserve: Vec<&str> = params
            .get("preserve")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for record in records {
            let Some(id) = record_id(record) else { continue };
            let tags = record_tags(record);
            if tags.len() + space <= MAX_TAGS {
                continue;
            }
            let excess = tags.len() + space - MAX_TAGS;
            // serde_json maps iterate in insertion order; take a stable
            // ordering so repeated runs trim the same keys.
            let mut candidates: Vec<&String> = tags
                .keys()
                .filter(|k| !preserve.contains(&k.as_str()))
                .collect();
            candidates.sort();
            let mut doomed = serde_json::Map::new();
            for key in candidates.into_iter().take(excess) {
                doomed.insert(key.clone(), tags[key].clone());
            }
            if doomed.is_empty() {
                tracing::warn!("tag-trim: nothing trimmable on {}", id);
                continue;
            }
            patch_tags(client, id, "Delete", Value::Object(doomed)).await?;
        }
        Ok(())
    }
}

/// Mark records for a future operation via a status tag, `<op>@<date>`.
/// The marked-for-op filter is the reading side of this marker.
#[derive(Debug)]
pub struct TagDelayedAction;

/// Render the delayed-action marker for `op` due `days` from now.
pub fn delayed_action_marker(op: &str, days: i64) -> String {
    let due = Utc::now().date_naive() + Duration::days(days);
    format!("{op}@{}", due.format("%Y/%m/%d"))
}

#[async_trait]
impl Action for TagDelayedAction {
    fn name(&self) -> &'static str {
        "mark-for-op"
    }

    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        params: &Value,
    ) -> Result<()> {
        let op = param_str(params, "op")
            .ok_or_else(|| Error::InvalidParams("mark-for-op action requires 'op'".into()))?;
        let days = param_i64(params, "days").unwrap_or(0);
        let tag = param_str(params, "tag").unwrap_or(DEFAULT_STATUS_TAG);
        let marker = delayed_action_marker(op, days);

        for record in records {
            let Some(id) = record_id(record) else { continue };
            patch_tags(client, id, "Merge", json!({ tag: marker })).await?;
            tracing::info!("marked {} for {} ({})", id, op, marker);
        }
        Ok(())
    }
}

/// Delete each record through the management API, resolving the API
/// version per id. Not bound to types that opt out of delete.
#[derive(Debug)]
pub struct DeleteAction;

#[async_trait]
impl Action for DeleteAction {
    fn name(&self) -> &'static str {
        "delete"
    }

    async fn apply(
        &self,
        client: &ArmClient,
        records: &[ResourceRecord],
        _params: &Value,
    ) -> Result<()> {
        for record in records {
            let Some(id) = record_id(record) else { continue };
            let api_version = client.resource_api_version(id)?;
            client
                .delete(&client.resource_url(id, &api_version))
                .await?;
            tracing::info!("deleted {}", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_embeds_op_and_due_date() {
        let marker = delayed_action_marker("delete", 0);
        let (op, date) = marker.split_once('@').unwrap();
        assert_eq!(op, "delete");
        assert_eq!(date, Utc::now().date_naive().format("%Y/%m/%d").to_string());
    }

    #[test]
    fn action_names() {
        assert_eq!(TagAction.name(), "tag");
        assert_eq!(RemoveTagAction.name(), "untag");
        assert_eq!(AutoTagUserAction.name(), "auto-tag-user");
        assert_eq!(TagTrimAction.name(), "tag-trim");
        assert_eq!(TagDelayedAction.name(), "mark-for-op");
        assert_eq!(DeleteAction.name(), "delete");
    }
}
