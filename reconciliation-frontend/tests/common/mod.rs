//! Common test utilities for reconciliation-frontend integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use reconciliation_frontend::config::{
    ErpApiSettings, ReconciliationSettings, ServerSettings, Settings, TelemetrySettings,
};
use reconciliation_frontend::startup::build_router;
use reconciliation_frontend::AppState;
use serde_json::{json, Value};
use std::sync::Once;
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,reconciliation_frontend=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_settings(erp_base_url: &str) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        erp_api: ErpApiSettings {
            base_url: erp_base_url.to_string(),
            timeout_secs: 5,
        },
        reconciliation: ReconciliationSettings::default(),
        telemetry: TelemetrySettings::default(),
    }
}

/// Router wired against a wiremock ERP backend.
pub struct TestApp {
    pub erp: MockServer,
    pub state: AppState,
    pub router: Router,
}

pub async fn spawn_app() -> TestApp {
    init_tracing();

    let erp = MockServer::start().await;
    let state = AppState::from_settings(test_settings(&erp.uri()))
        .expect("Failed to build app state");
    let router = build_router(state.clone());

    TestApp { erp, state, router }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request_as("clerk-1", method, uri, body).await
    }

    pub async fn request_as(
        &self,
        user_id: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .header("x-user-id", user_id);
        self.send(builder, body).await
    }

    pub async fn request_anonymous(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        self.send(builder, None).await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn mount_transaction(&self, transaction: Value) {
        let id = transaction["id"].as_str().unwrap().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/banking/transactions/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(success(transaction)))
            .mount(&self.erp)
            .await;
    }

    pub async fn mount_suggestions(&self, transaction_id: &str, candidates: Value) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/api/v1/banking/transactions/{}/suggestions",
                transaction_id
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(success(candidates)))
            .mount(&self.erp)
            .await;
    }
}

pub fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

pub fn error_envelope(code: &str, message: &str) -> Value {
    json!({ "status": "error", "code": code, "message": message })
}

pub fn transaction(id: &str, total: &str, already_allocated: &str) -> Value {
    json!({
        "id": id,
        "description": "Incoming transfer",
        "date": "2026-03-02",
        "total": total,
        "currency": "EUR",
        "already_allocated": already_allocated
    })
}

pub fn candidate(document_id: &str, outstanding: &str, score: u8) -> Value {
    json!({
        "document_type": "sales_invoice",
        "document_id": document_id,
        "document_name": format!("Invoice {}", document_id),
        "party_name": "Acme GmbH",
        "due_date": "2026-02-28",
        "outstanding_amount": outstanding,
        "match_score": score,
        "match_reasons": ["amount", "reference"]
    })
}
