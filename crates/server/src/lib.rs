pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod telemetry;

use std::sync::Arc;

use ledgerline_import::OfxImporter;

pub use error::{ApiError, Result};
pub use router::create_router;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub importer: Arc<OfxImporter>,
}

impl AppState {
    pub fn new(importer: OfxImporter) -> Self {
        Self {
            importer: Arc::new(importer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
        Router,
    };
    use ledgerline_import::CategoryRuleEngine;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const STATEMENT: &str = "OFXHEADER:100\nDATA:OFXSGML\n\n<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS>\
        <CURDEF>USD<BANKTRANLIST>\
        <STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20240115<TRNAMT>-42.50<FITID>A1<NAME>STARBUCKS<MEMO>Coffee</STMTTRN>\
        <STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20240116<TRNAMT>oops<FITID>A2</STMTTRN>\
        </BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>";

    fn app() -> Router {
        create_router(AppState::new(OfxImporter::new()), 64 * 1024)
    }

    fn post_json(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/import/ofx")
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_check() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn import_returns_result() {
        let payload = json!({ "file_content": STATEMENT, "account_id": "acc-1" });
        let (status, body) = send(app(), post_json(payload.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["statistics"],
            json!({ "totalRecords": 2, "successfulRecords": 1, "failedRecords": 1 })
        );
        assert_eq!(body["errors"], json!([r#"Transaction 2: Invalid amount: "oops""#]));

        let tx = &body["transactions"][0];
        assert_eq!(tx["accountId"], "acc-1");
        assert_eq!(tx["amount"], json!(42.5));
        assert_eq!(tx["kind"], "DEBIT");
        assert_eq!(tx["transactedDate"], "2024-01-15");
        assert_eq!(tx["description"], "Coffee");
        assert_eq!(tx["name"], "STARBUCKS");
        assert_eq!(tx["currency"], "USD");
        assert!(tx.get("categoryId").is_none());
    }

    #[tokio::test]
    async fn import_applies_configured_rules() {
        let rules = CategoryRuleEngine::from_toml(
            "[[rule]]\nname = \"Coffee\"\npattern = \"starbucks\"\ncategory_id = \"food:coffee\"\n",
        )
        .unwrap();
        let app = create_router(AppState::new(OfxImporter::new().with_rules(rules)), 64 * 1024);
        let payload = json!({ "file_content": STATEMENT, "account_id": "acc-1" });
        let (status, body) = send(app, post_json(payload.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactions"][0]["categoryId"], "food:coffee");
    }

    #[tokio::test]
    async fn empty_content_is_bad_request() {
        let payload = json!({ "file_content": "", "account_id": "acc-1" });
        let (status, body) = send(app(), post_json(payload.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["category"], "invalidcontent");
        assert_eq!(body["error"]["entity"], "ofx_import");
    }

    #[tokio::test]
    async fn garbage_is_parse_error() {
        let payload = json!({ "file_content": "<OFX>garbage", "account_id": "acc-1" });
        let (status, body) = send(app(), post_json(payload.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["category"], "parseerror");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse OFX file: "));
    }

    #[tokio::test]
    async fn missing_account_is_invalid_request() {
        let payload = json!({ "file_content": STATEMENT });
        let (status, body) = send(app(), post_json(payload.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["category"], "invalidrequest");
    }

    #[tokio::test]
    async fn wrong_typed_field_is_invalid_request() {
        let payload = json!({ "file_content": 42, "account_id": "acc-1" });
        let (status, body) = send(app(), post_json(payload.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["category"], "invalidrequest");
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_request() {
        let (status, body) = send(app(), post_json("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["category"], "invalidrequest");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = create_router(AppState::new(OfxImporter::new()), 256);
        let payload = json!({ "file_content": "x".repeat(1024), "account_id": "acc-1" });
        let (status, body) = send(app, post_json(payload.to_string())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["category"], "payloadtoolarge");
    }
}
