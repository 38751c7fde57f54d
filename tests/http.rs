use axum::{routing::get, Json, Router};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));
static UPSTREAM_FETCHES: AtomicUsize = AtomicUsize::new(0);

/// Stub report endpoint, on its own thread so it outlives each test's runtime.
static UPSTREAM: Lazy<String> = Lazy::new(|| {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind upstream");
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("upstream runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("upstream listener");
            let app = Router::new()
                .route("/report", get(report))
                .route("/broken", get(|| async { "<html>maintenance</html>" }))
                .route(
                    "/failing",
                    get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
                );
            axum::serve(listener, app).await.expect("upstream server");
        });
    });
    format!("http://{addr}")
});

async fn report() -> Json<Value> {
    UPSTREAM_FETCHES.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        {
            "subscriber_id": 101, "subscriber_name": "Alpha LLC", "city_id": "Tashkent",
            "manager_id": "M1", "provaider_tariff_name": "Premium", "subscription_type": "Monthly",
            "billing_period": "month", "connection_date": "2025-05-05T10:00:00",
            "amount": "150.5", "procent_bonus_id": "10", "quantity": 1
        },
        {
            "subscriber_id": 102, "subscriber_name": "Beta", "city_id": "Tashkent",
            "manager_id": "", "provaider_tariff_name": "Basic", "subscription_type": "Monthly",
            "billing_period": "month", "connection_date": "2025-05-06T09:00:00", "amount": 100
        },
        {
            "subscriber_id": 101, "subscriber_name": "Alpha LLC", "city_id": "Samarkand",
            "manager_id": "M2", "provaider_tariff_name": "Premium", "subscription_type": "Yearly",
            "billing_period": "year", "connection_date": "2025-06-01", "amount": null
        },
        {
            "subscriber_id": "103", "subscriber_name": "Gamma", "city_id": "",
            "manager_id": "M1", "provaider_tariff_name": "Basic", "subscription_type": "Monthly",
            "billing_period": "month", "connection_date": "bad-date", "amount": "abc"
        },
        {
            "subscriber_id": 104, "subscriber_name": "Delta", "city_id": "Tashkent",
            "manager_id": "M1", "provaider_tariff_name": "Premium", "subscription_type": "Monthly",
            "billing_period": "month", "connection_date": "2025-05-07T12:00:00", "amount": 49.5
        },
        {
            "subscriber_id": 105, "subscriber_name": "Echo", "city_id": "Все",
            "manager_id": "", "provaider_tariff_name": "Basic", "subscription_type": "Yearly",
            "billing_period": "year", "connection_date": "2025-05-08", "amount": 0
        }
    ]))
}

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server(upstream_path: &str) -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_bi_subscriptions"))
        .env("PORT", port.to_string())
        .env("BI_SOURCE_URL", format!("{}{upstream_path}", *UPSTREAM))
        .env("BI_PASSWORD", "secret")
        .env("BI_FETCH_TIMEOUT_SECS", "5")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = spawn_server("/report").await;
    #[cfg(unix)]
    cleanup::register(server.child.id());
    let server = Arc::new(server);
    *guard = Some(Arc::clone(&server));
    server
}

async fn get_json(client: &Client, url: String, query: &[(&str, &str)]) -> (StatusCode, Value) {
    let response = client.get(url).query(query).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn http_dashboard_aggregates_upstream_rows() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, body) = get_json(
        &client,
        format!("{}/api/dashboard", server.base_url),
        &[("from", "2025-05-01"), ("to", "2025-06-30")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 6);
    assert_eq!(body["filtered_rows"], 6);
    assert_eq!(body["kpis"]["total_subscriptions"], 6);
    assert_eq!(body["kpis"]["unique_subscribers"], 5);
    assert_eq!(body["kpis"]["total_amount"], 300.0);
    assert_eq!(body["coercion"]["failures"]["connection_date"], 1);
    assert_eq!(body["coercion"]["failures"]["amount"], 1);
    assert_eq!(body["options"]["cities"], json!(["Samarkand", "Tashkent", "Все"]));
    assert_eq!(body["options"]["managers"], json!(["M1", "M2"]));

    let months = &body["charts"]["by_month"];
    assert_eq!(months["state"], "series");
    assert_eq!(
        months["points"],
        json!([
            {"label": "2025-05", "value": 4.0},
            {"label": "2025-06", "value": 1.0},
            {"label": "NaT", "value": 1.0}
        ])
    );
    assert_eq!(body["charts"]["top_cities"]["points"][0]["label"], "Tashkent");
    assert_eq!(body["charts"]["top_cities"]["points"][0]["value"], 3.0);
}

#[tokio::test]
async fn http_filters_compose_and_handle_empty_selection() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let url = format!("{}/api/dashboard", server.base_url);
    let range = [("from", "2025-05-01"), ("to", "2025-06-30")];

    let (_, by_city) = get_json(&client, url.clone(), &[range[0], range[1], ("city", "Tashkent")]).await;
    assert_eq!(by_city["filtered_rows"], 3);

    let (_, narrowed) = get_json(
        &client,
        url.clone(),
        &[range[0], range[1], ("city", "Tashkent"), ("tariff", "Premium")],
    )
    .await;
    assert_eq!(narrowed["filtered_rows"], 2);
    assert_eq!(narrowed["total_rows"], 6);

    let (_, wildcard_value) = get_json(&client, url.clone(), &[range[0], range[1], ("city", "Все")]).await;
    assert_eq!(wildcard_value["filtered_rows"], 1);

    let (status, empty) = get_json(&client, url, &[range[0], range[1], ("manager", "M9")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["filtered_rows"], 0);
    assert!(empty["kpis"]["average_bonus"].is_null());
    let charts = empty["charts"].as_object().unwrap();
    assert!(!charts.is_empty());
    assert!(charts.values().all(|chart| chart["state"] == "no_data"));
}

#[tokio::test]
async fn http_records_keep_upstream_order() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, body) = get_json(
        &client,
        format!("{}/api/records", server.base_url),
        &[("from", "2025-05-01"), ("to", "2025-06-30"), ("subscription_type", "Monthly")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["rows"].as_array().unwrap();
    let ids: Vec<&str> = rows.iter().map(|row| row["subscriber_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["101", "102", "103", "104"]);
    assert!(rows[0].get("month").is_none());
    assert_eq!(rows[0]["connection_date"], "2025-05-05T10:00:00");
    assert!(rows[2]["connection_date"].is_null());
    assert_eq!(rows[2]["amount"], 0.0);
}

#[tokio::test]
async fn http_repeated_requests_are_served_from_cache_until_refresh() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let url = format!("{}/api/dashboard", server.base_url);
    let range = [("from", "2025-07-01"), ("to", "2025-07-31")];

    let before = UPSTREAM_FETCHES.load(Ordering::SeqCst);
    let (_, first) = get_json(&client, url.clone(), &range).await;
    let (_, second) = get_json(&client, url.clone(), &range).await;
    assert_eq!(first, second);
    assert_eq!(UPSTREAM_FETCHES.load(Ordering::SeqCst), before + 1);

    let response = client
        .post(format!("{}/api/refresh", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    get_json(&client, url, &range).await;
    assert_eq!(UPSTREAM_FETCHES.load(Ordering::SeqCst), before + 2);
}

#[tokio::test]
async fn http_rejects_inverted_range() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let (status, body) = get_json(
        &client,
        format!("{}/api/dashboard", server.base_url),
        &[("from", "2025-06-30"), ("to", "2025-05-01")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("after"));
}

#[tokio::test]
async fn http_malformed_upstream_body_is_bad_gateway() {
    let _guard = TEST_LOCK.lock().await;
    let server = spawn_server("/broken").await;
    let client = Client::new();

    let (status, body) = get_json(
        &client,
        format!("{}/api/dashboard", server.base_url),
        &[("from", "2025-05-01"), ("to", "2025-05-31")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("decode error"));

    let page = client.get(format!("{}/", server.base_url)).send().await.unwrap();
    assert!(page.status().is_success());
}

#[tokio::test]
async fn http_upstream_error_status_is_bad_gateway() {
    let _guard = TEST_LOCK.lock().await;
    let server = spawn_server("/failing").await;
    let client = Client::new();

    let (status, body) = get_json(
        &client,
        format!("{}/api/records", server.base_url),
        &[("from", "2025-05-01"), ("to", "2025-05-31")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("transport error"));
    assert!(message.contains("500"));
}
