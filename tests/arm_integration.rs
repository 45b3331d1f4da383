//! Integration tests for the resource managers against a mocked ARM
//! endpoint.
//!
//! These verify enumeration (including pagination and the child walk),
//! augmentation, per-id fetches, and the error classification the managers
//! rely on.

use azgov::arm::client::ArmClient;
use azgov::error::Error;
use azgov::manager::{ChildResourceManager, Manager, ResourceManager};
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VM_ID: &str =
    "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/vm1";
const SERVER_ID: &str =
    "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.Sql/servers/srv1";

fn client(server: &MockServer) -> ArmClient {
    ArmClient::with_token(&server.uri(), "S1", "test-token")
}

#[tokio::test]
async fn enumerate_augments_resource_group_from_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/S1/providers/Microsoft.Compute/virtualMachines"))
        .and(query_param("api-version", "2024-07-01"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": VM_ID, "name": "vm1", "location": "eastus" },
                { "name": "no-id-record", "location": "westus" }
            ]
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("vm", client(&server)).unwrap();
    let records = manager.resources().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["resourceGroup"], "RG1");
    // The record without an id passes through untouched.
    assert!(records[1].get("resourceGroup").is_none());
}

#[tokio::test]
async fn enumerate_follows_next_link_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/S1/providers/Microsoft.Compute/virtualMachines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": VM_ID, "name": "vm1" }],
            "nextLink": format!("{}/vm-page-2", server.uri())
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/vm-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "/subscriptions/S1/resourceGroups/RG2/providers/Microsoft.Compute/virtualMachines/vm2",
                "name": "vm2"
            }]
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("vm", client(&server)).unwrap();
    let records = manager.resources().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["resourceGroup"], "RG2");
}

#[tokio::test]
async fn malformed_list_response_is_an_enumeration_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/S1/providers/Microsoft.Compute/virtualMachines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("vm", client(&server)).unwrap();
    assert!(matches!(
        manager.enumerate().await.unwrap_err(),
        Error::Enumeration(_)
    ));
}

#[tokio::test]
async fn rejected_credentials_surface_as_provider_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "InvalidAuthenticationToken" }
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("vm", client(&server)).unwrap();
    assert!(matches!(
        manager.enumerate().await.unwrap_err(),
        Error::ProviderUnavailable { .. }
    ));
}

#[tokio::test]
async fn get_resources_distinguishes_absent_from_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "ResourceNotFound" }
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("armresource", client(&server)).unwrap();
    let missing =
        "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/gone"
            .to_string();
    match manager.get_resources(&[missing.clone()]).await.unwrap_err() {
        Error::ResourceNotFound { id } => assert_eq!(id, missing),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn one_missing_id_does_not_abort_the_others() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(VM_ID))
        .and(query_param("api-version", "2024-07-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": VM_ID, "name": "vm1", "location": "eastus"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "ResourceNotFound" }
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("armresource", client(&server)).unwrap();
    let ids = vec![
        VM_ID.to_string(),
        "/subscriptions/S1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/gone"
            .to_string(),
    ];
    let records = manager.get_resources(&ids).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "vm1");
    assert_eq!(records[0]["resourceGroup"], "RG1");
}

#[tokio::test]
async fn duplicate_ids_yield_duplicate_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(VM_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": VM_ID, "name": "vm1"
        })))
        .mount(&server)
        .await;

    let manager = ResourceManager::new("armresource", client(&server)).unwrap();
    let ids = vec![VM_ID.to_string(), VM_ID.to_string()];
    let records = manager.get_resources(&ids).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn child_enumeration_walks_parents_and_annotates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/S1/providers/Microsoft.Sql/servers"))
        .and(query_param("api-version", "2021-11-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": SERVER_ID, "name": "srv1", "location": "eastus" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{SERVER_ID}/databases")))
        .and(query_param("api-version", "2021-11-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": format!("{SERVER_ID}/databases/db1"),
                "name": "db1",
                "location": "eastus"
            }]
        })))
        .mount(&server)
        .await;

    let manager = ChildResourceManager::new("sqldatabase", client(&server)).unwrap();
    let records = manager.resources().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["parentId"], SERVER_ID);
    assert_eq!(records[0]["resourceGroup"], "RG1");
}

#[tokio::test]
async fn manager_dispatch_enumerates_children_transparently() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/S1/providers/Microsoft.Sql/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": SERVER_ID, "name": "srv1" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{SERVER_ID}/databases")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": format!("{SERVER_ID}/databases/db1"), "name": "db1" },
                { "id": format!("{SERVER_ID}/databases/db2"), "name": "db2" }
            ]
        })))
        .mount(&server)
        .await;

    let manager = Manager::for_type("sqldatabase", client(&server)).unwrap();
    let records = manager.resources().await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn resolved_tag_action_patches_the_tags_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!(
            "{VM_ID}/providers/Microsoft.Resources/tags/default"
        )))
        .and(query_param("api-version", "2021-04-01"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "tags": { "env": "prod" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let arm = client(&server);
    let manager = ResourceManager::new("vm", arm.clone()).unwrap();
    let action = manager.action("tag").unwrap();
    let records = vec![json!({ "id": VM_ID, "name": "vm1", "tags": {} })];
    action
        .apply(&arm, &records, &json!({ "tag": "env", "value": "prod" }))
        .await
        .unwrap();
}

#[tokio::test]
async fn resolved_delete_action_deletes_at_the_type_api_version() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(VM_ID))
        .and(query_param("api-version", "2024-07-01"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let arm = client(&server);
    let manager = ResourceManager::new("vm", arm.clone()).unwrap();
    let action = manager.action("delete").unwrap();
    let records = vec![json!({ "id": VM_ID, "name": "vm1" })];
    action.apply(&arm, &records, &json!({})).await.unwrap();
}

#[tokio::test]
async fn diagnostic_settings_filter_queries_the_settings_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "{VM_ID}/providers/Microsoft.Insights/diagnosticSettings"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "name": "default" }]
        })))
        .mount(&server)
        .await;

    let arm = client(&server);
    let manager = ResourceManager::new("vm", arm.clone()).unwrap();
    let filter = manager.filter("diagnostic-settings").unwrap();
    let record = json!({ "id": VM_ID, "name": "vm1" });

    assert!(filter.matches(&arm, &record, &json!({})).await.unwrap());
    assert!(!filter
        .matches(&arm, &record, &json!({ "enabled": false }))
        .await
        .unwrap());
}
