//! Integration tests for the Nautobot exporter.
//!
//! These tests run the exporter against a fake Nautobot served on loopback
//! and scrape the live /metrics endpoint.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;

use gateway_common::{Notification, Path, TypedValue, decode_many};
use gateway_exporter_nautobot::slug::slugify;
use gateway_exporter_nautobot::{
    Exporter, ExporterConfig, InventoryClient, InventoryError, NautobotClient, NautobotExporter,
    SyncPayload,
};

const STATUS_PATH: &str = "/api/plugins/gnmi-status/interfaces/";

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: String,
}

/// In-memory stand-in for the Nautobot interface status plugin.
#[derive(Clone, Default)]
struct FakeNautobot {
    known: Arc<Mutex<HashSet<String>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

async fn handle(
    State(fake): State<FakeNautobot>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    fake.requests.lock().push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    let not_found = (
        StatusCode::NOT_FOUND,
        [("content-type", "application/json")],
        r#"{"detail":"Not found."}"#,
    );

    let Some(rest) = uri.path().strip_prefix(STATUS_PATH) else {
        return not_found.into_response();
    };

    if method == Method::POST && rest.is_empty() {
        let Ok(payloads) = serde_json::from_str::<Vec<SyncPayload>>(&body) else {
            return (StatusCode::BAD_REQUEST, r#"{"detail":"Invalid body."}"#).into_response();
        };
        let mut known = fake.known.lock();
        for p in &payloads {
            known.insert(format!(
                "{}__{}",
                slugify(&p.device_name),
                slugify(&p.interface_name)
            ));
        }
        (StatusCode::CREATED, body).into_response()
    } else if method == Method::PATCH {
        let endpoint = rest.trim_end_matches('/');
        if fake.known.lock().contains(endpoint) {
            (StatusCode::OK, body).into_response()
        } else {
            not_found.into_response()
        }
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, "").into_response()
    }
}

/// Start the fake inventory on a random loopback port.
async fn start_fake_nautobot() -> (FakeNautobot, String) {
    let fake = FakeNautobot::default();
    let router = Router::new().fallback(handle).with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (fake, format!("http://{}", addr))
}

fn client(base_url: &str) -> Arc<NautobotClient> {
    Arc::new(NautobotClient::new(base_url, "secret-token", STATUS_PATH))
}

fn status_update(target: &str, interface: &str, leaf: &str, value: &str) -> Notification {
    Notification::for_target(target).with_update(
        Path::parse(&format!(
            "/interfaces/interface[name={}]/state/{}",
            interface, leaf
        ))
        .unwrap(),
        TypedValue::StringVal(value.to_string()),
    )
}

/// Find a free loopback port.
async fn free_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_not_found_then_created_then_updated() {
    let (fake, base_url) = start_fake_nautobot().await;
    let exporter = NautobotExporter::new(ExporterConfig::default(), client(&base_url));

    exporter
        .export(&status_update("R2", "Management1", "oper-status", "UP"))
        .await;
    exporter
        .export(&status_update("R2", "Management1", "admin-status", "UP"))
        .await;

    let requests = fake.requests.lock().clone();
    let summary: Vec<(Method, &str)> = requests
        .iter()
        .map(|r| (r.method.clone(), r.path.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (
                Method::PATCH,
                "/api/plugins/gnmi-status/interfaces/r2__management1/"
            ),
            (Method::POST, "/api/plugins/gnmi-status/interfaces/"),
            (
                Method::PATCH,
                "/api/plugins/gnmi-status/interfaces/r2__management1/"
            ),
        ]
    );

    for r in &requests {
        assert_eq!(r.authorization.as_deref(), Some("Token secret-token"));
    }

    let created: Vec<SyncPayload> = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(
        created,
        vec![SyncPayload {
            device_name: "R2".to_string(),
            interface_name: "Management1".to_string(),
            interface_admin_status: None,
            interface_oper_status: Some("UP".to_string()),
        }]
    );

    let updated: serde_json::Value = serde_json::from_str(&requests[2].body).unwrap();
    assert_eq!(
        updated,
        serde_json::json!({
            "device_name": "R2",
            "interface_name": "Management1",
            "interface_admin_status": "UP",
            "interface_oper_status": "UP"
        })
    );

    let stats = exporter.collector().stats();
    assert_eq!(stats.sync_failed, 1);
    assert_eq!(stats.interfaces_created, 1);
    assert_eq!(stats.sync_succeeded, 1);
}

#[tokio::test]
async fn test_client_reports_not_found() {
    let (_fake, base_url) = start_fake_nautobot().await;
    let client = client(&base_url);

    let err = client
        .patch_interface_status("r9__eth0", &SyncPayload::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    client
        .post_interfaces_status(&[SyncPayload {
            device_name: "R9".to_string(),
            interface_name: "eth0".to_string(),
            ..Default::default()
        }])
        .await
        .unwrap();
    client
        .patch_interface_status("r9__eth0", &SyncPayload::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unreachable_inventory_is_transport_error() {
    let addr = free_addr().await;
    let client = client(&format!("http://{}", addr));

    let err = client
        .patch_interface_status("r1__eth0", &SyncPayload::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Transport(_)));
}

#[tokio::test]
async fn test_replayed_notifications_are_synchronized() {
    let (fake, base_url) = start_fake_nautobot().await;
    let exporter = NautobotExporter::new(ExporterConfig::default(), client(&base_url));

    let replay = br#"
{"timestamp": 1, "prefix": {"target": "R1"}, "update": [{"path": {"elem": [{"name": "interfaces"}, {"name": "interface", "key": {"name": "Ethernet1/1"}}, {"name": "state"}, {"name": "oper-status"}]}, "val": {"stringVal": "DOWN"}}]}
{"timestamp": 2, "prefix": {"target": "R1"}, "update": [{"path": {"elem": [{"name": "interfaces"}, {"name": "interface", "key": {"name": "Ethernet1/1"}}, {"name": "state"}, {"name": "counters"}, {"name": "in-octets"}]}, "val": {"uintVal": 1234}}]}
"#;
    let notifications: Vec<Notification> = decode_many(replay).unwrap();
    assert_eq!(notifications.len(), 2);

    for notification in &notifications {
        exporter.export(notification).await;
    }

    let requests = fake.requests.lock().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].path,
        "/api/plugins/gnmi-status/interfaces/r1__ethernet1-1/"
    );

    let stats = exporter.collector().stats();
    assert_eq!(stats.updates_received, 2);
    assert_eq!(stats.updates_numeric, 1);
}

#[tokio::test]
async fn test_live_metrics_endpoint() {
    let (_fake, base_url) = start_fake_nautobot().await;
    let schema_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        schema_dir.path().join("openconfig-interfaces.yang"),
        "module openconfig-interfaces {}",
    )
    .unwrap();

    let addr = free_addr().await;
    let mut config = ExporterConfig {
        openconfig_directory: schema_dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };
    config.metrics.listen = addr.to_string();

    let mut exporter = NautobotExporter::new(config, client(&base_url))
        .with_fatal_handler(Arc::new(|_: &str| {}));
    exporter.start(Arc::new(())).await.unwrap();

    exporter
        .export(&status_update("R2", "Management1", "oper-status", "UP"))
        .await;

    let http = reqwest::Client::new();
    let mut body = None;
    for _ in 0..40 {
        if let Ok(resp) = http.get(format!("http://{}/metrics", addr)).send().await {
            assert!(resp.status().is_success());
            body = Some(resp.text().await.unwrap());
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let body = body.expect("metrics endpoint never came up");
    assert!(body.contains("# TYPE interfaces_interface_state_oper_status gauge"));
    assert!(body.contains(
        "interfaces_interface_state_oper_status{interfaces_interface_name=\"Management1\",target=\"R2\",value=\"UP\"} 1"
    ));
    assert!(body.contains("gateway_nautobot_updates_received_total 1"));
    assert!(body.contains("gateway_nautobot_interfaces_created_total 1"));

    let health = http
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());
}

#[tokio::test]
async fn test_start_fails_without_openconfig_modules() {
    let schema_dir = tempfile::tempdir().unwrap();
    let config = ExporterConfig {
        openconfig_directory: schema_dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };

    let mut exporter = NautobotExporter::new(config, client("http://127.0.0.1:1"));
    let err = exporter.start(Arc::new(())).await.unwrap_err();
    assert!(err.to_string().contains("No YANG modules"));
}
