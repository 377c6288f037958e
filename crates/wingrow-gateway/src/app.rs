use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use wingrow_claims::ClaimService;
use wingrow_core::{ClaimStore, InventoryStore};
use wingrow_inventory::{IssueRequestService, StockLedger};
use wingrow_platform::TokenVerifier;

use crate::{claims, inventory};

#[derive(Clone)]
pub struct AppState {
    pub claims: ClaimService,
    pub ledger: StockLedger,
    pub requests: IssueRequestService,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(
        claim_store: Arc<dyn ClaimStore>,
        inventory_store: Arc<dyn InventoryStore>,
        verifier: TokenVerifier,
    ) -> Self {
        Self {
            claims: ClaimService::new(claim_store),
            ledger: StockLedger::new(inventory_store.clone()),
            requests: IssueRequestService::new(inventory_store),
            verifier,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/claims",
            get(claims::list_claims).post(claims::create_draft),
        )
        .route("/claims/approvals", get(claims::list_approvals))
        .route("/claims/approvals/pending", get(claims::pending_approvals))
        .route("/claims/{claim_id}", get(claims::get_claim))
        .route("/claims/{claim_id}/items", post(claims::add_item))
        .route(
            "/claims/{claim_id}/items/{index}",
            delete(claims::remove_item),
        )
        .route("/claims/{claim_id}/submit", post(claims::submit))
        .route("/claims/{claim_id}/approve", post(claims::approve))
        .route("/claims/{claim_id}/reject", post(claims::reject))
        .route("/claims/{claim_id}/mark-paid", post(claims::mark_paid))
        .route("/inventory/items", get(inventory::list_items))
        .route("/inventory/items/{item_id}", patch(inventory::patch_item))
        .route("/inventory/seed", post(inventory::seed_catalog))
        .route(
            "/inventory/requests",
            get(inventory::list_requests).post(inventory::create_request),
        )
        .route(
            "/inventory/requests/{request_id}/approve",
            post(inventory::approve_request),
        )
        .route(
            "/inventory/requests/{request_id}/reject",
            post(inventory::reject_request),
        )
        .route(
            "/inventory/requests/{request_id}/payments",
            post(inventory::record_payment),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{
            Method, Request, StatusCode,
            header::{AUTHORIZATION, CONTENT_TYPE},
        },
    };
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wingrow_core::Role;
    use wingrow_store::MemoryStore;

    use super::*;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    struct Harness {
        router: Router,
        verifier: TokenVerifier,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let verifier = TokenVerifier::new(SECRET, None).unwrap();
            let state = AppState::new(store.clone(), store, verifier.clone());
            Self {
                router: build_router(state),
                verifier,
            }
        }

        fn token(&self, user_id: &str, role: Role) -> String {
            self.verifier
                .issue(user_id, role, Duration::minutes(10))
                .unwrap()
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let content_type = body.as_ref().map(|_| "application/json");
            let body = body.map(|body| body.to_string()).unwrap_or_default();
            self.send_raw(method, uri, token, content_type, body).await
        }

        async fn send_raw(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            content_type: Option<&str>,
            body: String,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
            }
            if let Some(content_type) = content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            let request = builder.body(Body::from(body)).unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }
    }

    #[tokio::test]
    async fn healthz_needs_no_token() {
        let harness = Harness::new();
        let (status, _) = harness.send(Method::GET, "/healthz", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn requests_without_a_valid_token_are_unauthorized() {
        let harness = Harness::new();

        let (status, body) = harness.send(Method::GET, "/claims", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], json!("UNAUTHORIZED"));

        let (status, _) = harness
            .send(Method::GET, "/inventory/items", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn organizers_cannot_use_manager_routes() {
        let harness = Harness::new();
        let organizer = harness.token("u1", Role::Organizer);

        let (status, body) = harness
            .send(Method::POST, "/inventory/seed", Some(&organizer), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], json!("FORBIDDEN"));

        let (status, _) = harness
            .send(Method::GET, "/claims/approvals", Some(&organizer), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn claim_moves_from_draft_to_paid() {
        let harness = Harness::new();
        let organizer = harness.token("u1", Role::Organizer);
        let manager = harness.token("m1", Role::Manager);

        let (status, body) = harness
            .send(Method::POST, "/claims", Some(&organizer), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let claim_id = body["claimId"].as_str().unwrap().to_string();

        let items_uri = format!("/claims/{claim_id}/items");
        harness
            .send(
                Method::POST,
                &items_uri,
                Some(&organizer),
                Some(json!({ "date": "2024-01-01", "amount": 100 })),
            )
            .await;
        let (status, body) = harness
            .send(
                Method::POST,
                &items_uri,
                Some(&organizer),
                Some(json!({ "date": "2024-01-02", "amount": "50", "category": "Travel" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalAmount"], json!("150"));
        assert_eq!(body["items"].as_array().unwrap().len(), 2);

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/claims/{claim_id}/submit"),
                Some(&organizer),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("SUBMITTED"));

        let (_, body) = harness
            .send(Method::GET, "/claims/approvals/pending", Some(&manager), None)
            .await;
        assert_eq!(body["claims"][0]["id"], json!(claim_id));

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/claims/{claim_id}/approve"),
                Some(&manager),
                Some(json!({ "comment": "ok" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("APPROVED"));

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/claims/{claim_id}/mark-paid"),
                Some(&manager),
                Some(json!({ "paymentRef": "TX1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("PAID"));
        assert_eq!(body["paymentRef"], json!("TX1"));

        let (_, body) = harness
            .send(
                Method::GET,
                "/claims?status=APPROVED",
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(body["claims"][0]["id"], json!(claim_id));

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/claims/{claim_id}/approve"),
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("INVALID_STATE"));
    }

    #[tokio::test]
    async fn claims_are_private_to_their_owner() {
        let harness = Harness::new();
        let owner = harness.token("u1", Role::Organizer);
        let other = harness.token("u2", Role::Organizer);

        let (_, body) = harness
            .send(Method::POST, "/claims", Some(&owner), None)
            .await;
        let claim_uri = format!("/claims/{}", body["claimId"].as_str().unwrap());

        let (status, _) = harness
            .send(Method::GET, &claim_uri, Some(&other), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("{claim_uri}/items"),
                Some(&other),
                Some(json!({ "date": "2024-01-01", "amount": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], json!("NOT_FOUND"));

        let (status, _) = harness
            .send(Method::GET, "/claims/not-a-uuid", Some(&owner), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn issue_request_settles_against_frozen_cost() {
        let harness = Harness::new();
        let organizer = harness.token("u1", Role::Organizer);
        let manager = harness.token("m1", Role::Manager);

        let (status, body) = harness
            .send(Method::POST, "/inventory/seed", Some(&manager), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let table = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|item| item["name"] == json!("Table"))
            .unwrap()
            .clone();
        let item_id = table["id"].as_str().unwrap().to_string();

        let (status, body) = harness
            .send(
                Method::PATCH,
                &format!("/inventory/items/{item_id}"),
                Some(&manager),
                Some(json!({ "stock": 20, "unitPrice": 10 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unitPrice"], json!("10"));

        let (status, body) = harness
            .send(
                Method::POST,
                "/inventory/requests",
                Some(&organizer),
                Some(json!({ "itemId": item_id, "qty": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("PENDING"));
        let request_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/inventory/requests/{request_id}/approve"),
                Some(&manager),
                Some(json!({ "issuedQty": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request"]["totalCost"], json!("40"));
        assert_eq!(body["request"]["issuedQty"], json!(4));
        assert_eq!(body["item"]["stock"], json!(16));

        let payments_uri = format!("/inventory/requests/{request_id}/payments");
        let (_, body) = harness
            .send(
                Method::POST,
                &payments_uri,
                Some(&organizer),
                Some(json!({ "amount": 15 })),
            )
            .await;
        assert_eq!(body["amountPaid"], json!("15"));
        assert_eq!(body["amountPending"], json!("25"));

        let (_, body) = harness
            .send(
                Method::POST,
                &payments_uri,
                Some(&organizer),
                Some(json!({ "amount": 30 })),
            )
            .await;
        assert_eq!(body["amountPaid"], json!("45"));
        assert_eq!(body["amountPending"], json!("0"));
        assert_eq!(body["settlementStatus"], json!("PAID"));

        let (_, body) = harness
            .send(
                Method::GET,
                "/inventory/requests?mine=true",
                Some(&organizer),
                None,
            )
            .await;
        assert_eq!(body["requests"][0]["id"], json!(request_id));
        assert_eq!(body["requests"][0]["settlementStatus"], json!("PAID"));
    }

    #[tokio::test]
    async fn overdrawn_approval_reports_insufficient_stock() {
        let harness = Harness::new();
        let organizer = harness.token("u1", Role::Organizer);
        let manager = harness.token("m1", Role::Manager);

        let (_, body) = harness
            .send(Method::POST, "/inventory/seed", Some(&manager), None)
            .await;
        let item_id = body["items"][0]["id"].as_str().unwrap().to_string();
        harness
            .send(
                Method::PATCH,
                &format!("/inventory/items/{item_id}"),
                Some(&manager),
                Some(json!({ "stock": 2 })),
            )
            .await;

        let (_, body) = harness
            .send(
                Method::POST,
                "/inventory/requests",
                Some(&organizer),
                Some(json!({ "itemId": item_id, "qty": 5 })),
            )
            .await;
        let request_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/inventory/requests/{request_id}/approve"),
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("INSUFFICIENT_STOCK"));

        let (_, body) = harness
            .send(Method::GET, "/inventory/items", Some(&organizer), None)
            .await;
        let item = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|item| item["id"] == json!(item_id))
            .unwrap()
            .clone();
        assert_eq!(item["stock"], json!(2));
    }

    #[tokio::test]
    async fn malformed_bodies_are_validation_errors() {
        let harness = Harness::new();
        let organizer = harness.token("u1", Role::Organizer);
        let manager = harness.token("m1", Role::Manager);

        let (_, body) = harness
            .send(Method::POST, "/claims", Some(&organizer), None)
            .await;
        let claim_id = body["claimId"].as_str().unwrap().to_string();
        let items_uri = format!("/claims/{claim_id}/items");

        let cases = [
            (Some("application/json"), r#"{"date":20240101,"amount":5}"#),
            (Some("application/json"), "{oops"),
            (None, r#"{"date":"2024-01-01","amount":5}"#),
            (Some("text/plain"), r#"{"date":"2024-01-01","amount":5}"#),
        ];
        for (content_type, raw) in cases {
            let (status, body) = harness
                .send_raw(
                    Method::POST,
                    &items_uri,
                    Some(&organizer),
                    content_type,
                    raw.to_string(),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {raw}");
            assert_eq!(body["kind"], json!("VALIDATION_ERROR"));
            assert!(body["message"].as_str().is_some_and(|message| !message.is_empty()));
        }

        let (status, body) = harness
            .send_raw(
                Method::POST,
                &format!("/claims/{claim_id}/approve"),
                Some(&manager),
                Some("application/json"),
                r#"{"comment": 5}"#.to_string(),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("VALIDATION_ERROR"));

        let (_, body) = harness
            .send(Method::GET, &format!("/claims/{claim_id}"), Some(&organizer), None)
            .await;
        assert_eq!(body["items"], json!([]));
        assert_eq!(body["status"], json!("DRAFT"));
    }

    #[tokio::test]
    async fn item_removal_hides_foreign_drafts_before_checking_the_index() {
        let harness = Harness::new();
        let owner = harness.token("u1", Role::Organizer);
        let other = harness.token("u2", Role::Organizer);

        let (_, body) = harness
            .send(Method::POST, "/claims", Some(&owner), None)
            .await;
        let claim_id = body["claimId"].as_str().unwrap().to_string();
        harness
            .send(
                Method::POST,
                &format!("/claims/{claim_id}/items"),
                Some(&owner),
                Some(json!({ "date": "2024-01-01", "amount": 5 })),
            )
            .await;

        let (status, body) = harness
            .send(
                Method::DELETE,
                &format!("/claims/{claim_id}/items/abc"),
                Some(&other),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], json!("NOT_FOUND"));

        let (status, body) = harness
            .send(
                Method::DELETE,
                &format!("/claims/{claim_id}/items/abc"),
                Some(&owner),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("VALIDATION_ERROR"));

        let (status, body) = harness
            .send(
                Method::DELETE,
                &format!("/claims/{claim_id}/items/0"),
                Some(&owner),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalAmount"], json!("0"));
    }

    #[tokio::test]
    async fn unaffordable_approval_is_a_validation_error() {
        let harness = Harness::new();
        let organizer = harness.token("u1", Role::Organizer);
        let manager = harness.token("m1", Role::Manager);

        let (_, body) = harness
            .send(Method::POST, "/inventory/seed", Some(&manager), None)
            .await;
        let item_id = body["items"][0]["id"].as_str().unwrap().to_string();
        let (status, _) = harness
            .send(
                Method::PATCH,
                &format!("/inventory/items/{item_id}"),
                Some(&manager),
                Some(json!({ "unitPrice": "10000000000000" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = harness
            .send(
                Method::POST,
                "/inventory/requests",
                Some(&organizer),
                Some(json!({ "itemId": item_id, "qty": 2 })),
            )
            .await;
        let request_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = harness
            .send(
                Method::POST,
                &format!("/inventory/requests/{request_id}/approve"),
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("VALIDATION_ERROR"));

        let (_, body) = harness
            .send(Method::GET, "/inventory/requests", Some(&manager), None)
            .await;
        assert_eq!(body["requests"][0]["status"], json!("PENDING"));
        let (_, body) = harness
            .send(Method::GET, "/inventory/items", Some(&manager), None)
            .await;
        let item = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|item| item["id"] == json!(item_id))
            .unwrap()
            .clone();
        assert_eq!(item["stock"], json!(20));
    }
}
