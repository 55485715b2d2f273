use chrono::{Duration as ChronoDuration, Utc};
use depot_auth::{JwtClaims, Role};
use depot_core::{TenantId, UserId};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = depot_api::app::build_in_memory_app(SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn create_part(&self, token: &str, name: &str, quantity: u64) -> String {
        let (status, body) = self
            .post(token, "/parts", json!({ "name": name, "quantity": quantity }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn quantity(&self, token: &str, part_id: &str) -> u64 {
        let (status, body) = self.get(token, &format!("/parts/{part_id}")).await;
        assert_eq!(status, StatusCode::OK);
        body["quantity"].as_u64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, roles: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles: roles.iter().map(|r| Role::new(*r)).collect(),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn movement(kind: &str, part_id: &str, quantity: i64) -> Value {
    json!({
        "type": kind,
        "part_id": part_id,
        "quantity": quantity,
        "description": "black box",
    })
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/transactions")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = srv.get("garbage", "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn tenant_and_user_are_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, &["storekeeper"]);

    let (status, body) = srv.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "storekeeper"));
    assert!(
        body["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p == "inventory.transactions.cancel")
    );
}

#[tokio::test]
async fn record_movements_and_reject_overdraw() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = mint_jwt(tenant, &["admin"]);
    let part_id = srv.create_part(&admin, "Oil filter", 0).await;

    let (status, body) = srv
        .post(&admin, "/transactions", movement("arrival", &part_id, 10))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["type"], "arrival");
    assert_eq!(body["part_name"], "Oil filter");
    assert_eq!(body["status"], "active");

    let (status, body) = srv
        .post(&admin, "/transactions", movement("expense", &part_id, 11))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["available"], 10);

    let (status, body) = srv
        .post(&admin, "/transactions", movement("expense", &part_id, 0))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv
        .post(&admin, "/transactions", movement("expense", &TenantId::new().to_string(), 1))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["resource"], "part");

    assert_eq!(srv.quantity(&admin, &part_id).await, 10);
}

#[tokio::test]
async fn batch_is_atomic_and_reports_failing_indexes() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = mint_jwt(tenant, &["admin"]);
    let part_id = srv.create_part(&admin, "Bearing", 5).await;

    let (status, body) = srv
        .post(
            &admin,
            "/transactions/batch",
            json!({ "transactions": [
                movement("expense", &part_id, 3),
                movement("expense", &part_id, 3),
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "batch_validation_error");
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["index"], 1);
    assert_eq!(errors[0]["code"], "insufficient_stock");
    assert_eq!(errors[0]["available"], 2);
    assert_eq!(srv.quantity(&admin, &part_id).await, 5);

    let (status, body) = srv
        .post(
            &admin,
            "/transactions/batch",
            json!({ "transactions": [
                movement("arrival", &part_id, 2),
                movement("expense", &part_id, 7),
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(srv.quantity(&admin, &part_id).await, 0);

    let (status, body) = srv
        .post(
            &admin,
            "/transactions/batch",
            json!({ "transactions": [movement("arrival", &part_id, 1), 1] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "batch_validation_error");
    assert_eq!(body["errors"][0]["index"], 1);
    assert_eq!(body["errors"][0]["code"], "validation_error");
    assert_eq!(srv.quantity(&admin, &part_id).await, 0);

    let oversized: Vec<Value> = (0..101).map(|_| movement("arrival", &part_id, 1)).collect();
    let (status, body) = srv
        .post(&admin, "/transactions/batch", json!({ "transactions": oversized }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn cancel_clamps_and_history_reflects_status() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = mint_jwt(tenant, &["admin"]);
    let part_id = srv.create_part(&admin, "Belt", 0).await;

    let (_, arrival) = srv
        .post(&admin, "/transactions", movement("arrival", &part_id, 20))
        .await;
    let arrival_id = arrival["id"].as_str().unwrap().to_string();
    srv.post(&admin, "/transactions", movement("expense", &part_id, 5))
        .await;

    let (status, body) = srv
        .post(&admin, &format!("/transactions/{arrival_id}/cancel"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let cancel_path = format!("/transactions/{arrival_id}/cancel");
    let (status, body) = srv
        .post(&admin, &cancel_path, json!({ "reason": "wrong delivery" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["part_quantity"], 0);
    assert_eq!(body["clamped"], true);
    assert_eq!(body["drift"], 5);
    assert_eq!(body["transaction"]["status"], "cancelled");
    assert_eq!(body["transaction"]["cancellation_reason"], "wrong delivery");

    let (status, body) = srv
        .post(&admin, &cancel_path, json!({ "reason": "again" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already_cancelled");

    let (status, body) = srv.get(&admin, "/transactions?status=cancelled").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], arrival_id.as_str());

    let (_, body) = srv.get(&admin, "/transactions?limit=1").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["items"][0]["type"], "expense");

    let (status, body) = srv.get(&admin, &format!("/parts/{part_id}/reconciliation")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledger_sum"], -5);
    assert_eq!(body["drift"], 5);
    assert_eq!(body["consistent"], false);

    let (status, _) = srv.get(&admin, "/transactions?status=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn viewer_can_read_but_not_write() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = mint_jwt(tenant, &["admin"]);
    let viewer = mint_jwt(tenant, &["viewer"]);
    let part_id = srv.create_part(&admin, "Gasket", 3).await;

    let (status, body) = srv
        .post(&viewer, "/transactions", movement("expense", &part_id, 1))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = srv.get(&viewer, "/transactions").await;
    assert_eq!(status, StatusCode::OK);

    let storekeeper = mint_jwt(tenant, &["storekeeper"]);
    let (status, _) = srv
        .post(&storekeeper, "/parts", json!({ "name": "Not allowed" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_reads_and_writes() {
    let srv = TestServer::spawn().await;
    let token1 = mint_jwt(TenantId::new(), &["admin"]);
    let token2 = mint_jwt(TenantId::new(), &["admin"]);
    let part_id = srv.create_part(&token1, "Valve", 4).await;

    let (status, txn) = srv
        .post(&token1, "/transactions", movement("expense", &part_id, 1))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let txn_id = txn["id"].as_str().unwrap();

    let (status, _) = srv.get(&token2, &format!("/transactions/{txn_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv
        .post(&token2, "/transactions", movement("expense", &part_id, 1))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv
        .post(&token2, &format!("/transactions/{txn_id}/cancel"), json!({ "reason": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = srv.get(&token2, "/transactions").await;
    assert_eq!(body["total"], 0);
    assert_eq!(srv.quantity(&token1, &part_id).await, 3);
}

#[tokio::test]
async fn equipment_reference_must_exist() {
    let srv = TestServer::spawn().await;
    let admin = mint_jwt(TenantId::new(), &["admin"]);
    let part_id = srv.create_part(&admin, "Chain", 4).await;

    let mut body = movement("expense", &part_id, 1);
    body["equipment_id"] = json!(TenantId::new().to_string());
    let (status, err) = srv.post(&admin, "/transactions", body.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["resource"], "equipment");

    let (status, eq) = srv.post(&admin, "/equipment", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    body["equipment_id"] = eq["id"].clone();
    let (status, txn) = srv.post(&admin, "/transactions", body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(txn["equipment_id"], eq["id"]);
}
