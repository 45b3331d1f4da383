//! Common inspection filters.

use super::{param_bool, param_f64, param_i64, param_str, record_id, record_tags, ResourceFilter,
    DEFAULT_STATUS_TAG};
use crate::arm::client::ArmClient;
use crate::error::{Error, Result};
use crate::registry::types::ResourceRecord;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

const METRICS_API_VERSION: &str = "2018-01-01";
const DIAGNOSTICS_API_VERSION: &str = "2021-05-01-preview";
const POLICY_STATES_API_VERSION: &str = "2019-10-01";

/// Match records whose delayed-action marker is due, i.e. the reading side
/// of the mark-for-op action.
pub struct TagActionFilter;

#[async_trait]
impl ResourceFilter for TagActionFilter {
    fn name(&self) -> &'static str {
        "marked-for-op"
    }

    async fn matches(
        &self,
        _client: &ArmClient,
        record: &ResourceRecord,
        params: &Value,
    ) -> Result<bool> {
        let tag = param_str(params, "tag").unwrap_or(DEFAULT_STATUS_TAG);
        let skew = param_i64(params, "skew").unwrap_or(0);
        let wanted_op = param_str(params, "op");

        let tags = record_tags(record);
        let Some(marker) = tags.get(tag).and_then(Value::as_str) else {
            return Ok(false);
        };
        let Some((op, date)) = marker.split_once('@') else {
            tracing::warn!("unparseable delayed-action marker: {:?}", marker);
            return Ok(false);
        };
        if wanted_op.is_some_and(|w| w != op) {
            return Ok(false);
        }
        let Ok(due) = NaiveDate::parse_from_str(date, "%Y/%m/%d") else {
            tracing::warn!("unparseable delayed-action date: {:?}", date);
            return Ok(false);
        };
        Ok(due <= Utc::now().date_naive() + Duration::days(skew))
    }
}

/// Compare a resource metric aggregate against a threshold.
pub struct MetricFilter;

fn compare(op: &str, value: f64, threshold: f64) -> Result<bool> {
    Ok(match op {
        "lt" => value < threshold,
        "le" => value <= threshold,
        "gt" => value > threshold,
        "ge" => value >= threshold,
        "eq" => value == threshold,
        other => {
            return Err(Error::InvalidParams(format!(
                "unsupported metric comparison '{other}'"
            )))
        }
    })
}

/// Average the named aggregation over a metrics response.
fn aggregate(response: &Value, aggregation: &str) -> Option<f64> {
    let points: Vec<f64> = response
        .get("value")?
        .as_array()?
        .iter()
        .filter_map(|metric| metric.get("timeseries")?.as_array())
        .flatten()
        .filter_map(|series| series.get("data")?.as_array())
        .flatten()
        .filter_map(|point| point.get(aggregation)?.as_f64())
        .collect();
    if points.is_empty() {
        return None;
    }
    Some(points.iter().sum::<f64>() / points.len() as f64)
}

#[async_trait]
impl ResourceFilter for MetricFilter {
    fn name(&self) -> &'static str {
        "metric"
    }

    async fn matches(
        &self,
        client: &ArmClient,
        record: &ResourceRecord,
        params: &Value,
    ) -> Result<bool> {
        let metric = param_str(params, "metric")
            .ok_or_else(|| Error::InvalidParams("metric filter requires 'metric'".into()))?;
        let threshold = param_f64(params, "threshold")
            .ok_or_else(|| Error::InvalidParams("metric filter requires 'threshold'".into()))?;
        let op = param_str(params, "op").unwrap_or("ge");
        let aggregation = param_str(params, "aggregation").unwrap_or("average");
        let timeframe = param_i64(params, "timeframe").unwrap_or(24);

        let Some(id) = record_id(record) else {
            return Ok(false);
        };

        let end = Utc::now();
        let start = end - Duration::hours(timeframe);
        let url = client.resource_url_with_params(
            &format!("{id}/providers/microsoft.insights/metrics"),
            METRICS_API_VERSION,
            &[
                ("metricnames", metric),
                ("aggregation", aggregation),
                (
                    "timespan",
                    &format!(
                        "{}/{}",
                        start.format("%Y-%m-%dT%H:%M:%SZ"),
                        end.format("%Y-%m-%dT%H:%M:%SZ")
                    ),
                ),
            ],
        )?;
        let response = client.get(&url).await?;

        match aggregate(&response, aggregation) {
            Some(value) => compare(op, value, threshold),
            // No data points in the window: nothing to compare against.
            None => Ok(false),
        }
    }
}

/// Match records by their policy compliance state.
pub struct PolicyCompliantFilter;

#[async_trait]
impl ResourceFilter for PolicyCompliantFilter {
    fn name(&self) -> &'static str {
        "policy-compliant"
    }

    async fn matches(
        &self,
        client: &ArmClient,
        record: &ResourceRecord,
        params: &Value,
    ) -> Result<bool> {
        let want_compliant = param_bool(params, "compliant").unwrap_or(true);
        let Some(id) = record_id(record) else {
            return Ok(false);
        };

        let url = client.resource_url(
            &format!(
                "{id}/providers/Microsoft.PolicyInsights/policyStates/latest/queryResults"
            ),
            POLICY_STATES_API_VERSION,
        );
        let response = client.post(&url, None).await?;
        let states = response
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Enumeration("policy states response missing 'value'".into()))?;

        let compliant = states.iter().all(|state| {
            state
                .get("complianceState")
                .and_then(Value::as_str)
                .is_some_and(|s| s.eq_ignore_ascii_case("compliant"))
        });
        Ok(compliant == want_compliant)
    }
}

/// Match records by whether diagnostic settings are configured. Only bound
/// to types whose descriptor declares diagnostic-settings support.
pub struct DiagnosticSettingsFilter;

#[async_trait]
impl ResourceFilter for DiagnosticSettingsFilter {
    fn name(&self) -> &'static str {
        "diagnostic-settings"
    }

    async fn matches(
        &self,
        client: &ArmClient,
        record: &ResourceRecord,
        params: &Value,
    ) -> Result<bool> {
        let want_enabled = param_bool(params, "enabled").unwrap_or(true);
        let Some(id) = record_id(record) else {
            return Ok(false);
        };

        let url = client.resource_url(
            &format!("{id}/providers/Microsoft.Insights/diagnosticSettings"),
            DIAGNOSTICS_API_VERSION,
        );
        let response = client.get(&url).await?;
        let configured = response
            .get("value")
            .and_then(Value::as_array)
            .is_some_and(|settings| !settings.is_empty());
        Ok(configured == want_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aggregate_averages_all_series_points() {
        let response = json!({
            "value": [{
                "timeseries": [{
                    "data": [
                        { "average": 10.0 },
                        { "average": 20.0 },
                        { "timeStamp": "2026-01-01T00:00:00Z" }
                    ]
                }]
            }]
        });
        assert_eq!(aggregate(&response, "average"), Some(15.0));
    }

    #[test]
    fn aggregate_without_points_is_none() {
        assert_eq!(aggregate(&json!({ "value": [] }), "average"), None);
    }

    #[test]
    fn comparison_ops() {
        assert!(compare("lt", 1.0, 2.0).unwrap());
        assert!(compare("ge", 2.0, 2.0).unwrap());
        assert!(!compare("gt", 2.0, 2.0).unwrap());
        assert!(compare("nope", 1.0, 1.0).is_err());
    }

    #[tokio::test]
    async fn marked_for_op_matches_due_marker() {
        let client = ArmClient::with_token("http://localhost", "S1", "t");
        let record = json!({
            "id": "/subscriptions/S1/resourceGroups/RG/providers/Microsoft.Example/widgets/w",
            "tags": { DEFAULT_STATUS_TAG: format!(
                "delete@{}",
                Utc::now().date_naive().format("%Y/%m/%d")
            ) }
        });
        let due = TagActionFilter
            .matches(&client, &record, &json!({ "op": "delete" }))
            .await
            .unwrap();
        assert!(due);

        let other_op = TagActionFilter
            .matches(&client, &record, &json!({ "op": "stop" }))
            .await
            .unwrap();
        assert!(!other_op);
    }

    #[tokio::test]
    async fn marked_for_op_ignores_future_marker() {
        let client = ArmClient::with_token("http://localhost", "S1", "t");
        let record = json!({
            "id": "/subscriptions/S1/resourceGroups/RG/providers/Microsoft.Example/widgets/w",
            "tags": { DEFAULT_STATUS_TAG: "delete@2999/01/01" }
        });
        let due = TagActionFilter
            .matches(&client, &record, &json!({}))
            .await
            .unwrap();
        assert!(!due);
    }

    #[tokio::test]
    async fn unmarked_record_never_matches() {
        let client = ArmClient::with_token("http://localhost", "S1", "t");
        let record = json!({ "id": "/x", "tags": {} });
        assert!(!TagActionFilter
            .matches(&client, &record, &json!({}))
            .await
            .unwrap());
    }
}
