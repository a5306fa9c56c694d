//! End-to-end checks of `HttpTransport` against a mock Grafana.

use std::collections::BTreeMap;
use std::time::Duration;

use grafana_api::{
    ApiError, DataSource, DataSourceId, GrafanaClient, HttpTransport, Method, QueryRequest,
    QueryTarget, SubQuery, Transport, TransportConfig,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> TransportConfig {
    TransportConfig::new(&server.uri()).unwrap()
}

#[tokio::test]
async fn sends_bearer_token_and_org_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/datasources"))
        .and(header("authorization", "Bearer glsa_test"))
        .and(header("x-grafana-org-id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "uid": "prom", "name": "Prometheus", "type": "prometheus", "access": "proxy"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        GrafanaClient::from_config(&config_for(&server).with_token("glsa_test").with_org_id(2))
            .unwrap();
    let list = client.data_sources().await.unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].uid.as_deref(), Some("prom"));
}

#[tokio::test]
async fn sends_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/datasources/uid/loki"))
        .and(header("authorization", "Basic YWRtaW46YWRtaW4="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(
            {"id": 2, "uid": "loki", "name": "Loki", "type": "loki"}
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        GrafanaClient::from_config(&config_for(&server).with_basic_auth("admin", "admin")).unwrap();
    let ds = client
        .data_source(&DataSourceId::Uid("loki".into()))
        .await
        .unwrap();

    assert_eq!(ds.id, Some(2));
}

#[tokio::test]
async fn create_sends_json_document() {
    let server = MockServer::start().await;
    let mut ds = DataSource::new("logs", "loki", "http://loki:3100");
    ds.set_http_headers([("X-Scope-OrgID", "tenant-a")]);

    Mock::given(method("POST"))
        .and(path("/api/datasources"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "name": "logs",
            "type": "loki",
            "url": "http://loki:3100",
            "access": "proxy",
            "isDefault": false,
            "basicAuth": false,
            "jsonData": {"httpHeaderName1": "X-Scope-OrgID"},
            "secureJsonData": {"httpHeaderValue1": "tenant-a"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 17, "message": "Datasource added", "name": "logs"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GrafanaClient::from_config(&config_for(&server)).unwrap();

    assert_eq!(client.create_data_source(&ds).await.unwrap(), 17);
}

#[tokio::test]
async fn not_found_carries_platform_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/datasources/404"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Data source not found"})),
        )
        .mount(&server)
        .await;

    let client = GrafanaClient::from_config(&config_for(&server)).unwrap();
    let err = client.data_source(&DataSourceId::Id(404)).await.unwrap_err();

    match err {
        ApiError::NotFound { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Data source not found");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn conflict_and_server_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/datasources"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            json!({"message": "data source with the same name already exists"}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/datasources/name/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
        .mount(&server)
        .await;

    let client = GrafanaClient::from_config(&config_for(&server)).unwrap();

    let conflict = client
        .create_data_source(&DataSource::new("dup", "loki", ""))
        .await
        .unwrap_err();
    assert!(matches!(conflict, ApiError::Rejected { status: 409, .. }));

    let server_error = client
        .delete_data_source_by_name("broken")
        .await
        .unwrap_err();
    match server_error {
        ApiError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal failure");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_responses_time_out_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/datasources"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GrafanaClient::from_config(
        &config_for(&server).with_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    let err = client.data_sources().await.unwrap_err();

    assert!(matches!(err, ApiError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = TransportConfig::new(&format!("http://{addr}")).unwrap();
    let client = GrafanaClient::from_config(&config).unwrap();
    let err = client.data_sources().await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn query_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ds/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": {
                "A": {"status": 200, "frames": [{
                    "schema": {"refId": "A", "fields": [{"name": "Time", "type": "time"}]},
                    "data": {"values": [[1, 2, 3]]}
                }]}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GrafanaClient::from_config(&config_for(&server)).unwrap();
    let request = QueryRequest::new("now-1h", "now")
        .with_query(SubQuery::new(QueryTarget::new("prometheus", "prom"), "up").with_ref_id("A"));
    let results = client.query(&request).await.unwrap();

    let frame = &results.get("A").unwrap().frames[0];
    assert_eq!(frame.data.int_column(0), Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn query_parameters_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("type", "dash-db"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config_for(&server)).unwrap();
    let mut query = BTreeMap::new();
    query.insert("type".to_string(), "dash-db".to_string());

    let body = transport
        .execute(Method::Get, "/api/search", Some(&query), None)
        .await
        .unwrap();

    assert_eq!(body, b"[]".to_vec());
}
