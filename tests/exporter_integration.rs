//! Integration tests driving the real HTTP client against a fake Metrics API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ccloud_exporter::model::ModelError;
use ccloud_exporter::server::{AppState, create_router};
use ccloud_exporter::{
    ApiError, Credentials, Exporter, ExporterError, ExporterSettings, MetricsApi,
    MetricsApiClient, ResourceKind, Rule,
};
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

// =============================================================================
// Fake Metrics API
// =============================================================================

const RECEIVED: &str = "io.confluent.kafka.server/received_bytes";
const REQUEST_COUNT: &str = "io.confluent.kafka.server/request_count";
/// `key:secret`, base64 encoded.
const EXPECTED_AUTH: &str = "Basic a2V5OnNlY3JldA==";

#[derive(Default)]
struct FakeApi {
    revoked: AtomicBool,
    queries: Mutex<Vec<Value>>,
    headers: Mutex<Vec<HeaderMap>>,
}

impl FakeApi {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        self.headers.lock().unwrap().push(headers.clone());
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if self.revoked.load(Ordering::SeqCst) || auth != Some(EXPECTED_AUTH) {
            return Err((StatusCode::UNAUTHORIZED, "invalid API key").into_response());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct MetricsParams {
    resource_type: String,
}

async fn resources_handler(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    Json(json!({
        "data": [
            {"type": "kafka", "description": "A Kafka cluster", "labels": [{"key": "kafka.id"}]},
            {"type": "connector", "description": "A connector", "labels": [{"key": "connector.id"}]}
        ]
    }))
    .into_response()
}

async fn metrics_handler(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Query(params): Query<MetricsParams>,
) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    let data = match params.resource_type.as_str() {
        "kafka" => json!([
            {
                "name": RECEIVED,
                "type": "COUNTER_INT64",
                "unit": "By",
                "description": "The delta count of bytes received",
                "labels": [{"key": "topic"}]
            },
            {
                "name": REQUEST_COUNT,
                "description": "The delta count of requests",
                "labels": [{"key": "type"}]
            }
        ]),
        _ => json!([]),
    };
    Json(json!({ "data": data })).into_response()
}

async fn query_handler(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = api.authorize(&headers) {
        return response;
    }
    let metric = body["aggregations"][0]["metric"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    api.queries.lock().unwrap().push(body);

    if metric == REQUEST_COUNT {
        return (StatusCode::TOO_MANY_REQUESTS, "quota exceeded").into_response();
    }
    Json(json!({
        "data": [
            {"metric.topic": "orders", "timestamp": "2020-06-03T13:37:00Z", "value": 10.0},
            {"metric.topic": "payments", "timestamp": "2020-06-03T13:37:00Z", "value": 20.0}
        ]
    }))
    .into_response()
}

/// Start the fake API and return its base URL.
async fn start_fake_api() -> (String, Arc<FakeApi>) {
    let api = Arc::new(FakeApi::default());
    let router = Router::new()
        .route("/v2/metrics/cloud/descriptors/resources", get(resources_handler))
        .route("/v2/metrics/cloud/descriptors/metrics", get(metrics_handler))
        .route("/v2/metrics/cloud/query", post(query_handler))
        .with_state(Arc::clone(&api));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), api)
}

// =============================================================================
// Test Helpers
// =============================================================================

fn client(base_url: &str, secret: &str) -> Arc<MetricsApiClient> {
    Arc::new(
        MetricsApiClient::new(
            base_url,
            Credentials::new("key", secret),
            std::time::Duration::from_secs(5),
        )
        .expect("Failed to build client"),
    )
}

fn rule(metrics: &[&str]) -> Rule {
    Rule::builder(0, ResourceKind::Kafka)
        .resources(["lkc-1"])
        .metrics(metrics.iter().copied())
        .group_by(["kafka.id", "topic", "type"])
        .build()
        .unwrap()
}

fn no_cache() -> ExporterSettings {
    ExporterSettings {
        cache_ttl: std::time::Duration::ZERO,
        ..Default::default()
    }
}

// =============================================================================
// Collection Tests
// =============================================================================

#[tokio::test]
async fn test_end_to_end_collection() {
    let (base_url, fake) = start_fake_api().await;
    let exporter = Exporter::bootstrap(client(&base_url, "secret"), vec![rule(&[RECEIVED])], no_cache())
        .await
        .expect("Failed to bootstrap");

    let samples = exporter.collect().await;
    let data: Vec<_> = samples
        .iter()
        .filter(|s| s.family == "ccloud_metric_received_bytes")
        .collect();

    assert_eq!(data.len(), 2);
    assert_eq!(data[0].label("kafka_id"), Some("lkc-1"));
    assert_eq!(data[0].label("topic"), Some("orders"));
    assert_eq!(data[1].value, 20.0);
    assert!(data.iter().all(|s| s.timestamp.is_some()));

    let queries = fake.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["group_by"], json!(["metric.topic"]));
    assert_eq!(queries[0]["limit"], 1000);
    assert!(queries[0]["intervals"][0].as_str().unwrap().ends_with("/PT1M"));
}

#[tokio::test]
async fn test_request_headers() {
    let (base_url, fake) = start_fake_api().await;
    client(&base_url, "secret")
        .resource_descriptors()
        .await
        .expect("Failed to fetch resources");

    let headers = fake.headers.lock().unwrap()[0].clone();
    let user_agent = headers.get(header::USER_AGENT).unwrap().to_str().unwrap();
    assert!(user_agent.starts_with("ccloud-exporter/"));

    let correlation = headers.get("correlation-context").unwrap().to_str().unwrap();
    assert!(correlation.contains("service.name=ccloud-exporter"));
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (base_url, _fake) = start_fake_api().await;
    let exporter = Exporter::bootstrap(
        client(&base_url, "secret"),
        vec![rule(&[RECEIVED])],
        ExporterSettings::default(),
    )
    .await
    .expect("Failed to bootstrap");

    let app = create_router(AppState {
        exporter: Arc::new(exporter),
    });
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8_lossy(&bytes);
    assert!(body.contains("# HELP ccloud_metric_received_bytes The delta count of bytes received"));
    assert!(body.contains("ccloud_metric_received_bytes{kafka_id=\"lkc-1\",topic=\"payments\"} 20"));
    assert!(body.contains("ccloud_metrics_api_request_latency"));
}

// =============================================================================
// Error Classification Tests
// =============================================================================

#[tokio::test]
async fn test_bootstrap_unauthorized() {
    let (base_url, _fake) = start_fake_api().await;
    let err = Exporter::bootstrap(client(&base_url, "wrong"), vec![rule(&[RECEIVED])], no_cache())
        .await
        .unwrap_err();

    match err {
        ExporterError::Api(api) => {
            assert!(matches!(api, ApiError::Unauthorized { status: 401, .. }));
            assert!(api.is_fatal());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_revoked_credentials_raise_fatal_signal() {
    let (base_url, fake) = start_fake_api().await;
    let exporter = Exporter::bootstrap(client(&base_url, "secret"), vec![rule(&[RECEIVED])], no_cache())
        .await
        .expect("Failed to bootstrap");
    let fatal = exporter.fatal_signal();

    exporter.collect().await;
    assert!(fatal.raised().is_none());

    fake.revoked.store(true, Ordering::SeqCst);
    exporter.collect().await;
    assert!(fatal.raised().is_some());
}

#[tokio::test]
async fn test_rate_limited_query() {
    let (base_url, _fake) = start_fake_api().await;
    let exporter = Exporter::bootstrap(
        client(&base_url, "secret"),
        vec![rule(&[RECEIVED, REQUEST_COUNT])],
        no_cache(),
    )
    .await
    .expect("Failed to bootstrap");

    // The rate-limited metric only contributes its latency sample.
    let samples = exporter.collect().await;
    assert!(!samples.iter().any(|s| s.family == "ccloud_metric_request_count"));
    assert_eq!(
        samples
            .iter()
            .filter(|s| s.family == "ccloud_metric_received_bytes")
            .count(),
        2
    );
    assert!(exporter.fatal_signal().raised().is_none());
}

#[tokio::test]
async fn test_rate_limited_error_classification() {
    let (base_url, _fake) = start_fake_api().await;
    let client = client(&base_url, "secret");
    let exporter_rule = rule(&[REQUEST_COUNT]);

    let metrics = client.metric_descriptors("kafka").await.unwrap();
    let resources = client.resource_descriptors().await.unwrap();
    let metric = metrics.iter().find(|m| m.name == REQUEST_COUNT).unwrap();
    let query = ccloud_exporter::QueryBuilder::for_rule(metric, &resources[0], &exporter_rule)
        .build(&Default::default(), chrono::Utc::now());

    let err = client.query(&query).await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_bootstrap_missing_resource_type() {
    let (base_url, _fake) = start_fake_api().await;
    let ksql = Rule::builder(0, ResourceKind::Ksql)
        .resources(["lksqlc-1"])
        .metrics(["io.confluent.kafka.ksql/streaming_unit_count"])
        .build()
        .unwrap();

    let err = Exporter::bootstrap(client(&base_url, "secret"), vec![ksql], no_cache())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExporterError::Model(ModelError::MissingResourceType(_))
    ));
}
