//! Action-router dispatch tests. The app state uses a lazily-connecting pool,
//! so only paths that never reach the store (validation, admin status,
//! preflight) are exercised here.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};

use xau_engine::api::{create_router, AppState};
use xau_engine::config::{Database, Email, MarketData, Provider, Server, Settings};
use xau_engine::execution::create_executor;
use xau_engine::market::MarketDataClient;
use xau_engine::notify::EmailNotifier;
use xau_engine::store::Store;

fn test_settings() -> Settings {
    Settings {
        database: Database {
            url: "postgresql://localhost/xau_engine_test".to_string(),
            max_connections: 2,
            min_connections: 1,
            acquire_timeout_secs: 1,
        },
        server: Server {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        market_data: MarketData {
            api_key: "test-key".to_string(),
            base_url: "http://localhost:0".to_string(),
            timeout_secs: 1,
        },
        provider: Provider {
            provider_type: "SIMULATED".to_string(),
            bridge_url: None,
            bridge_api_key: None,
            timeout_secs: 1,
            magic_number: 880_021,
        },
        email: Email {
            sendgrid_api_key: None,
            from_email: None,
            recipient: None,
            timeout_secs: 1,
        },
    }
}

fn test_app(settings: Settings) -> Router {
    let pool = Store::connect_lazy(&settings.database.url).expect("lazy pool");
    let store = Store::new(pool);
    let market = Arc::new(MarketDataClient::new(&settings.market_data).expect("market client"));
    let executor =
        create_executor(&settings.provider, store.clone(), market.clone()).expect("executor");
    let notifier = Arc::new(EmailNotifier::new(&settings.email).expect("notifier"));

    let state = AppState {
        settings: Arc::new(settings),
        store,
        market,
        executor,
        notifier,
    };

    create_router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

async fn post_action(app: Router, payload: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/actions")
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn health_endpoint_answers() {
    let app = test_app(test_settings());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_action_is_a_descriptive_bad_request() {
    let app = test_app(test_settings());
    let (status, body) = post_action(
        app,
        json!({ "action": "do_something_else", "data": {} }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("unknown action"));
    assert!(message.contains("do_something_else"));
}

#[tokio::test]
async fn backtest_without_dates_is_rejected() {
    let app = test_app(test_settings());
    let (status, body) = post_action(
        app,
        json!({ "action": "run_backtest_action", "data": { "symbol": "XAUUSD" } }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid request payload"));
}

#[tokio::test]
async fn backtest_with_bad_timeframe_is_rejected() {
    let app = test_app(test_settings());
    let (status, body) = post_action(
        app,
        json!({
            "action": "run_backtest_action",
            "data": {
                "timeframe": "2h",
                "startDate": "2025-01-01",
                "endDate": "2025-02-01"
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unknown timeframe"));
}

#[tokio::test]
async fn update_prices_with_bad_interval_is_rejected() {
    let app = test_app(test_settings());
    let (status, body) = post_action(
        app,
        json!({ "action": "update_prices", "data": { "interval": "4h" } }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unknown interval"));
}

#[tokio::test]
async fn admin_env_status_reports_presence_flags_only() {
    let app = test_app(test_settings());
    let (status, body) = post_action(
        app,
        json!({ "action": "admin_get_env_variables_status" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["provider"], json!("simulated"));
    assert_eq!(body["variables"]["DATABASE_URL"], json!(true));
    assert_eq!(body["variables"]["MT_BRIDGE_URL"], json!(false));
    assert_eq!(body["variables"]["SENDGRID_API_KEY"], json!(false));
}

#[tokio::test]
async fn metatrader_without_bridge_runs_on_the_simulator() {
    let mut settings = test_settings();
    settings.provider.provider_type = "METATRADER".to_string();
    // bridge_url / bridge_api_key stay unset: the factory must fall back.
    let app = test_app(settings);

    let (status, body) = post_action(
        app,
        json!({ "action": "admin_get_env_variables_status" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], json!("simulated"));
}

#[tokio::test]
async fn envelope_without_action_is_a_client_error() {
    let app = test_app(test_settings());
    let (status, _) = post_action(app, json!({ "data": {} })).await;
    assert!(status.is_client_error(), "got {}", status);
}

#[tokio::test]
async fn preflight_is_answered_without_dispatch() {
    let app = test_app(test_settings());
    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/actions")
                .header("Origin", "http://localhost:5173")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
