//! Integration tests against an in-process fake Nautobot + HEC server
//!
//! The server speaks just enough of both APIs: REST list endpoints with
//! `limit`/`offset` and a `next` link, GraphQL, `/api/status/`, and the HEC
//! event and health endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use nautobot_hec_exporter::cli::{self, ExportOptions};
use nautobot_hec_exporter::config::ExporterConfig;
use nautobot_hec_exporter::etl::JobPhase;
use nautobot_hec_exporter::export::RunMode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct Fake {
    devices: Vec<Value>,
    statuses: Vec<Value>,
    hec_status: AtomicU16,
    hec_bodies: Mutex<Vec<String>>,
    nautobot_auth: Mutex<Vec<String>>,
    hec_auth: Mutex<Vec<String>>,
    device_requests: Mutex<Vec<(usize, usize)>>,
}

#[derive(Deserialize)]
struct Paging {
    limit: usize,
    offset: usize,
}

fn auth_header(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn list_page(path: &str, all: &[Value], paging: &Paging) -> Value {
    let results: Vec<Value> = all
        .iter()
        .skip(paging.offset)
        .take(paging.limit)
        .cloned()
        .collect();
    let next = if paging.offset + results.len() < all.len() {
        json!(format!(
            "{}?limit={}&offset={}",
            path,
            paging.limit,
            paging.offset + paging.limit
        ))
    } else {
        Value::Null
    };
    json!({"count": all.len(), "next": next, "previous": null, "results": results})
}

async fn devices(
    State(fake): State<Arc<Fake>>,
    headers: HeaderMap,
    Query(paging): Query<Paging>,
) -> Json<Value> {
    fake.nautobot_auth.lock().unwrap().push(auth_header(&headers));
    fake.device_requests
        .lock()
        .unwrap()
        .push((paging.limit, paging.offset));
    Json(list_page("/api/dcim/devices/", &fake.devices, &paging))
}

async fn statuses(State(fake): State<Arc<Fake>>, Query(paging): Query<Paging>) -> Json<Value> {
    Json(list_page("/api/extras/statuses/", &fake.statuses, &paging))
}

async fn graphql(Json(body): Json<Value>) -> Json<Value> {
    assert!(body["variables"]["limit"].is_number());
    Json(json!({
        "data": {"devices": null},
        "errors": [{"message": "Cannot query field \"face\" on type \"DeviceType\""}]
    }))
}

async fn status() -> Json<Value> {
    Json(json!({"nautobot-version": "2.2.4"}))
}

async fn collector(State(fake): State<Arc<Fake>>, headers: HeaderMap, body: String) -> StatusCode {
    fake.hec_auth.lock().unwrap().push(auth_header(&headers));
    fake.hec_bodies.lock().unwrap().push(body);
    StatusCode::from_u16(fake.hec_status.load(Ordering::SeqCst)).unwrap()
}

async fn health() -> Json<Value> {
    Json(json!({"text": "HEC is healthy", "code": 17}))
}

async fn serve(fake: Arc<Fake>) -> SocketAddr {
    let app = Router::new()
        .route("/api/dcim/devices/", get(devices))
        .route("/api/extras/statuses/", get(statuses))
        .route("/api/graphql/", post(graphql))
        .route("/api/status/", get(status))
        .route("/services/collector/event", post(collector))
        .route("/services/collector/health", get(health))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fake_inventory(hec_status: u16) -> Arc<Fake> {
    Arc::new(Fake {
        devices: vec![
            json!({
                "id": "d1",
                "name": "edge-01",
                "serial": "",
                "status": {"id": "s1", "url": "/api/extras/statuses/s1/"},
                "custom_fields": {"owner": "netops"},
                "created": "2024-03-01T10:00:00.000000Z"
            }),
            json!({"id": "d2", "name": "edge-02", "status": {"id": "s2"}}),
            json!({"id": "d3", "name": "core-01", "status": {"id": "s1"}, "tags": []}),
        ],
        statuses: vec![
            json!({"id": "s1", "name": "Active", "slug": "active"}),
            json!({"id": "s2", "name": "Planned", "slug": "planned"}),
        ],
        hec_status: AtomicU16::new(hec_status),
        ..Fake::default()
    })
}

fn config(addr: SocketAddr, extra: &[(&str, &str)]) -> ExporterConfig {
    let mut vars: HashMap<String, String> = [
        ("NAUTOBOT_URL", format!("http://{}", addr)),
        ("NAUTOBOT_TOKEN", "nb-token".to_string()),
        ("NAUTOBOT_PAGE_SIZE", "2".to_string()),
        ("NAUTOBOT_MAX_RPS", "1000".to_string()),
        (
            "SPLUNK_HEC_URL",
            format!("http://{}/services/collector/event", addr),
        ),
        ("SPLUNK_HEC_TOKEN", "hec-token".to_string()),
        ("SPLUNK_BATCH_SIZE", "2".to_string()),
        ("SPLUNK_RETRIES", "2".to_string()),
        ("SPLUNK_RETRY_DELAY_SECS", "0".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    ExporterConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn devices_only() -> ExportOptions {
    ExportOptions {
        only: vec!["devices".to_string()],
        ..ExportOptions::default()
    }
}

#[tokio::test]
async fn test_export_devices_end_to_end() {
    let fake = fake_inventory(200);
    let addr = serve(fake.clone()).await;

    let report = cli::run_export(&config(addr, &[]), devices_only())
        .await
        .unwrap();

    assert_eq!(report.exit_code(), 0);
    let job = report.job("devices").unwrap();
    assert_eq!(job.status, JobPhase::Done);
    assert_eq!(job.totals.fetched, 3);
    assert_eq!(job.totals.sent, 3);
    assert_eq!(job.batches_sent, 2);
    // Only statuses is served; the other reference tables degrade
    assert!(!job.degraded_tables.contains(&"statuses".to_string()));
    assert!(job.degraded_tables.contains(&"tenants".to_string()));

    assert_eq!(*fake.device_requests.lock().unwrap(), vec![(2, 0), (2, 2)]);
    assert!(
        fake.nautobot_auth
            .lock()
            .unwrap()
            .iter()
            .all(|h| h == "Token nb-token")
    );
    assert!(
        fake.hec_auth
            .lock()
            .unwrap()
            .iter()
            .all(|h| h == "Splunk hec-token")
    );

    let bodies = fake.hec_bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 2);
    let events: Vec<Value> = bodies
        .iter()
        .flat_map(|body| body.lines().map(|line| serde_json::from_str(line).unwrap()))
        .collect();
    assert_eq!(events.len(), 3);

    let first = &events[0];
    assert_eq!(first["index"], "nautobot");
    assert_eq!(first["source"], "nautobot");
    assert_eq!(first["sourcetype"], "nautobot:dcim:device");
    assert_eq!(first["host"], "edge-01");
    assert!(first["time"].is_f64());
    assert_eq!(
        first["event"],
        json!({
            "id": "d1",
            "name": "edge-01",
            "status": "Active",
            "created": "2024-03-01T10:00:00Z"
        })
    );
    assert_eq!(events[1]["event"]["status"], "Planned");
    assert!(events[2]["event"].get("tags").is_none());
}

#[tokio::test]
async fn test_rejected_batches_fail_the_run() {
    let fake = fake_inventory(503);
    let addr = serve(fake.clone()).await;

    let report = cli::run_export(&config(addr, &[("SPLUNK_BATCH_SIZE", "300")]), devices_only())
        .await
        .unwrap();

    let job = report.job("devices").unwrap();
    assert_eq!(job.status, JobPhase::Done);
    assert_eq!(job.totals.sent, 0);
    assert_eq!(job.totals.failed, 3);
    assert_eq!(job.batches_failed, 1);
    assert_eq!(report.exit_code(), 1);
    // One batch, two attempts
    assert_eq!(fake.hec_bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_graphql_errors_fail_the_job() {
    let fake = fake_inventory(200);
    let addr = serve(fake.clone()).await;

    let report = cli::run_export(&config(addr, &[("NAUTOBOT_API", "graphql")]), devices_only())
        .await
        .unwrap();

    let job = report.job("devices").unwrap();
    assert_eq!(job.status, JobPhase::Failed);
    assert!(job.error.as_deref().unwrap().contains("Cannot query field"));
    assert!(fake.hec_bodies.lock().unwrap().is_empty());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_export_writes_json_files() {
    let fake = fake_inventory(200);
    let addr = serve(fake.clone()).await;
    let temp = TempDir::new().unwrap();

    let options = ExportOptions {
        output_dir: Some(temp.path().to_path_buf()),
        mode: RunMode::Concurrent,
        ..devices_only()
    };
    cli::run_export(&config(addr, &[]), options).await.unwrap();

    let content = std::fs::read_to_string(temp.path().join("devices.json")).unwrap();
    let written: Value = serde_json::from_str(&content).unwrap();
    let names: Vec<&str> = written
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["edge-01", "edge-02", "core-01"]);
}

#[tokio::test]
async fn test_auth_checks_both_endpoints() {
    let fake = fake_inventory(200);
    let addr = serve(fake).await;

    cli::test_auth(&config(addr, &[])).await.unwrap();
}

#[tokio::test]
async fn test_auth_with_collector_base_url() {
    let fake = fake_inventory(200);
    let addr = serve(fake).await;
    let base = format!("http://{}/services/collector", addr);

    cli::test_auth(&config(addr, &[("SPLUNK_HEC_URL", base.as_str())]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_job_fails_before_connecting() {
    let fake = fake_inventory(200);
    let addr = serve(fake.clone()).await;

    let options = ExportOptions {
        only: vec!["racks".to_string()],
        ..ExportOptions::default()
    };
    assert!(cli::run_export(&config(addr, &[]), options).await.is_err());
    assert!(fake.device_requests.lock().unwrap().is_empty());
}
