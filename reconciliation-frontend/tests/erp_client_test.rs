mod common;

use common::{candidate, error_envelope, success, test_settings, transaction};
use reconciliation_frontend::models::{AuthContext, DocumentType};
use reconciliation_frontend::reconcile::ledger::AllocationLine;
use reconciliation_frontend::reconcile::{
    ReconciliationGateway, SuggestionSource, TransactionSource,
};
use reconciliation_frontend::services::erp_client::{ClientError, ErpClient};
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn auth() -> AuthContext {
    AuthContext {
        access_token: "tok-42".to_string(),
        user_id: Some("clerk-7".to_string()),
        request_id: Some("req-1".to_string()),
    }
}

async fn client() -> (MockServer, ErpClient) {
    common::init_tracing();
    let server = MockServer::start().await;
    let erp = ErpClient::new(&test_settings(&server.uri()).erp_api).unwrap();
    (server, erp)
}

#[tokio::test]
async fn fetches_transaction_with_caller_headers() {
    let (server, erp) = client().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/banking/transactions/BT-1"))
        .and(header("authorization", "Bearer tok-42"))
        .and(header("x-user-id", "clerk-7"))
        .and(header("x-request-id", "req-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success(transaction("BT-1", "2000.00", "150.00"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let txn = erp.transaction(&auth(), "BT-1").await.unwrap();

    assert_eq!(txn.id, "BT-1");
    assert_eq!(txn.total, Decimal::new(200000, 2));
    assert_eq!(txn.already_allocated, Decimal::new(15000, 2));
    assert_eq!(txn.currency, "EUR");
}

#[tokio::test]
async fn suggestions_are_sorted_by_score_and_limited() {
    let (server, erp) = client().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/banking/transactions/BT-1/suggestions"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!([
            candidate("SI-LOW", "100", 40),
            candidate("SI-TOP", "800", 95),
            candidate("SI-MID", "300", 70),
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = erp.suggestions(&auth(), "BT-1", 2).await.unwrap();

    let ids: Vec<_> = candidates.iter().map(|c| c.document_id.as_str()).collect();
    assert_eq!(ids, vec!["SI-TOP", "SI-MID"]);
    assert_eq!(candidates[0].document_type, DocumentType::SalesInvoice);
    assert_eq!(candidates[0].match_reasons, vec!["amount", "reference"]);
}

#[tokio::test]
async fn out_of_range_score_is_rejected() {
    let (server, erp) = client().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/banking/transactions/BT-1/suggestions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success(json!([candidate("SI-1", "10", 140)]))),
        )
        .mount(&server)
        .await;

    let result = erp.suggestions(&auth(), "BT-1", 10).await;
    assert!(matches!(result, Err(ClientError::InvalidPayload(_))));
}

#[tokio::test]
async fn error_envelope_becomes_rejected() {
    let (server, erp) = client().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/banking/transactions/BT-404"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(error_envelope("NOT_FOUND", "no such transaction")),
        )
        .mount(&server)
        .await;

    let err = erp.transaction(&auth(), "BT-404").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "no such transaction");
}

#[tokio::test]
async fn non_envelope_failure_keeps_status() {
    let (server, erp) = client().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/banking/transactions/BT-1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = erp.transaction(&auth(), "BT-1").await.unwrap_err();

    match err {
        ClientError::UnexpectedStatus { status, body } => {
            assert_eq!(status.as_u16(), 502);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn reconcile_posts_every_line_in_one_request() {
    let (server, erp) = client().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/banking/transactions/BT-1/reconcile"))
        .and(header("authorization", "Bearer tok-42"))
        .and(body_json(json!({
            "allocations": [
                { "document_type": "sales_invoice", "document_id": "SI-1", "amount": 800.0 },
                { "document_type": "credit_note", "document_id": "CN-9", "amount": 12.5 }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success(json!({ "reference": "JV-0001" }))))
        .expect(1)
        .mount(&server)
        .await;

    let lines = vec![
        AllocationLine {
            document_type: DocumentType::SalesInvoice,
            document_id: "SI-1".to_string(),
            amount: Decimal::new(800, 0),
        },
        AllocationLine {
            document_type: DocumentType::CreditNote,
            document_id: "CN-9".to_string(),
            amount: Decimal::new(125, 1),
        },
    ];

    erp.reconcile(&auth(), "BT-1", &lines).await.unwrap();
}

#[tokio::test]
async fn reconcile_failure_surfaces_backend_message() {
    let (server, erp) = client().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/banking/transactions/BT-1/reconcile"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(error_envelope("OVER_ALLOCATED", "amount exceeds outstanding")),
        )
        .mount(&server)
        .await;

    let lines = vec![AllocationLine {
        document_type: DocumentType::SalesInvoice,
        document_id: "SI-1".to_string(),
        amount: Decimal::ONE,
    }];

    let err = erp.reconcile(&auth(), "BT-1", &lines).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { ref code, .. } if code == "OVER_ALLOCATED"));
    assert!(!err.is_not_found());
}
