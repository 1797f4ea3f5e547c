#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vigil_api::{
    AssumeConnected, MemoryTokenStore, PanelClient, TokenManager, TokenStore, TransportConfig,
};
use vigil_core::{Notification, Panel, Watchdog};

const DEVICE: &str = "securino";
const POLL: Duration = Duration::from_millis(200);
const RECV_DEADLINE: Duration = Duration::from_secs(5);

async fn setup() -> (MockServer, Panel) {
    let server = MockServer::start().await;
    let base_url: Url = server.uri().parse().unwrap();
    let transport = TransportConfig::default();

    let store = Arc::new(MemoryTokenStore::default());
    store.save(&SecretString::from("fresh-token"));
    let tokens = Arc::new(TokenManager::new(
        transport.build_client().unwrap(),
        base_url.clone(),
        SecretString::from("test-api-key"),
        store,
        Arc::new(AssumeConnected),
    ));
    tokens.load_persisted();

    let client = PanelClient::new(
        base_url,
        DEVICE,
        tokens,
        Arc::new(AssumeConnected),
        &transport,
    )
    .unwrap();
    (server, Panel::new(client))
}

fn mock_get(label: &str, value: f64, last_activity: i64) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/devices/{DEVICE}/{label}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "last_activity": last_activity,
            "last_value": { "timestamp": last_activity, "value": value }
        })))
}

#[tokio::test]
async fn failing_refresh_notifies_request_failed() {
    let (server, panel) = setup().await;
    Mock::given(method("GET"))
        .and(path(format!("/devices/{DEVICE}/state/")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let watchdog = Watchdog::spawn(panel, POLL);
    let mut notifications = watchdog.subscribe();

    let notification = tokio::time::timeout(RECV_DEADLINE, notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification, Notification::RequestFailed);
    assert_eq!(watchdog.digest(), vec!["Status request failed".to_owned()]);

    watchdog.shutdown();
    watchdog.join().await;
}

#[tokio::test]
async fn stale_heartbeat_notifies_offline() {
    let (server, panel) = setup().await;
    // A heartbeat from 1970 is far past the liveness window.
    mock_get("state", 0.0, 1_000).mount(&server).await;
    mock_get("method", 0.0, 1_000).mount(&server).await;
    mock_get("sensor", 0.0, 1_000).mount(&server).await;

    let watchdog = Watchdog::spawn(panel, POLL);
    let mut notifications = watchdog.subscribe();

    let notification = tokio::time::timeout(RECV_DEADLINE, notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification, Notification::Offline);
    assert_eq!(
        watchdog.digest(),
        vec!["Security device is offline".to_owned()]
    );

    watchdog.shutdown();
    watchdog.join().await;
}

#[tokio::test]
async fn acknowledge_resets_the_digest() {
    let (server, panel) = setup().await;
    Mock::given(method("GET"))
        .and(path(format!("/devices/{DEVICE}/state/")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let watchdog = Watchdog::spawn(panel, POLL);
    let mut notifications = watchdog.subscribe();
    tokio::time::timeout(RECV_DEADLINE, notifications.recv())
        .await
        .unwrap()
        .unwrap();

    watchdog.acknowledge_all();
    assert!(watchdog.digest().is_empty());

    watchdog.shutdown();
    watchdog.join().await;
}
