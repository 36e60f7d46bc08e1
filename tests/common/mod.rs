//! Shared harness for integration tests: the full router wired to a mock
//! gift card backend and a scripted secondary payment processor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use wiremock::MockServer;

use giftcard_checkout_api as api;

use api::errors::ServiceError;
use api::services::payments::{PaymentData, PaymentProcessor};

#[derive(Clone, Copy)]
pub enum ChargeOutcome {
    Approve,
    Decline,
    Fail,
}

/// Deterministic stand-in for the secondary payment processor.
pub struct ScriptedProcessor {
    outcome: ChargeOutcome,
    calls: AtomicUsize,
}

impl ScriptedProcessor {
    pub fn new(outcome: ChargeOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn charge(&self, _payment: &PaymentData, _amount: Decimal) -> Result<bool, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            ChargeOutcome::Approve => Ok(true),
            ChargeOutcome::Decline => Ok(false),
            ChargeOutcome::Fail => Err(ServiceError::InternalError(
                "downstream order creation failed".into(),
            )),
        }
    }
}

pub struct TestApp {
    router: Router,
    pub gift_card_server: MockServer,
    pub processor: Arc<ScriptedProcessor>,
    _event_rx: mpsc::Receiver<api::events::Event>,
}

impl TestApp {
    pub async fn new(outcome: ChargeOutcome) -> Self {
        let gift_card_server = MockServer::start().await;
        let config = test_config(&gift_card_server.uri());

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = api::events::EventSender::new(event_tx);

        let processor = ScriptedProcessor::new(outcome);
        let services = api::handlers::AppServices::with_payment_processor(
            &config,
            event_sender.clone(),
            processor.clone(),
        )
        .expect("service construction");

        let state = api::AppState {
            config,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", api::api_v1_routes())
            .with_state(state);

        Self {
            router,
            gift_card_server,
            processor,
            _event_rx: event_rx,
        }
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Seeds a cart through the API and returns its id.
    pub async fn create_cart(&self, payload: Value) -> String {
        let response = self
            .request(Method::POST, "/api/v1/carts", Some(payload))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        body["data"]["id"].as_str().expect("cart id").to_string()
    }

    /// Idempotency keys of all transaction calls the mock gift card service
    /// received, in request order.
    pub async fn recorded_idempotency_keys(&self) -> Vec<String> {
        self.gift_card_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|req| {
                let body: Value = serde_json::from_slice(&req.body).ok()?;
                body["transaction"]["idempotencyKey"]
                    .as_str()
                    .map(str::to_string)
            })
            .collect()
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn test_config(gift_card_base: &str) -> api::config::AppConfig {
    // Deserialized rather than struct-literal so the config stays buildable
    // when optional fields grow.
    serde_json::from_value(serde_json::json!({
        "host": "127.0.0.1",
        "port": 0,
        "environment": "development",
        "gift_card_api_base_url": format!("{}/gift-cards", gift_card_base),
        "gift_card_api_token": "test-token",
        "gift_card_account_id": "acct-test",
        "source_tenant_id": "tenant-test",
        "source_channel_id": "channel-test",
        "payment_latency_ms": 0
    }))
    .expect("test config")
}
