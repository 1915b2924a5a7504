use chrono::{Duration as ChronoDuration, Utc};
use arkpos_api::config::AppConfig;
use arkpos_auth::{JwtClaims, Role, UserId};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = arkpos_api::app::build_app(&AppConfig::in_memory(JWT_SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn register(&self, name: &str, ci: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({
                "full_name": name,
                "ci": ci,
                "email": email,
                "password": "secreto1",
                "confirm_password": "secreto1",
            }))
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, identifier: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Registers the first account (the admin) and returns its token.
    async fn admin_token(&self) -> String {
        assert_eq!(
            self.register("Rosa Flores", "4567890", "rosa@tienda.bo").await.status(),
            StatusCode::CREATED
        );
        let res = self.login("rosa@tienda.bo", "secreto1").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Read models are updated asynchronously; poll until `check` accepts the body.
    async fn eventually(&self, path: &str, token: &str, check: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..100 {
            let res = self.get(path, token).await;
            if res.status() == StatusCode::OK {
                let body: Value = res.json().await.unwrap();
                if check(&body) {
                    return body;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("{path} did not reach the expected state in time");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(roles: Vec<Role>) -> String {
    let claims = JwtClaims::new(UserId::generate(), "Tester", roles, Utc::now(), ChronoDuration::minutes(10));
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = srv.get("/products", "not-a-jwt").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_account_is_admin_and_later_ones_are_cashiers() {
    let srv = TestServer::spawn().await;

    let res = srv.register("Rosa Flores", "4567890", "rosa@tienda.bo").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let admin: Value = res.json().await.unwrap();
    assert_eq!(admin["role"], "admin");

    let res = srv.register("Luis Mamani", "1234567", "luis@tienda.bo").await;
    let cashier: Value = res.json().await.unwrap();
    assert_eq!(cashier["role"], "cashier");

    // Email and CI are unique.
    let res = srv.register("Otra Rosa", "7654321", "ROSA@tienda.bo").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Login works with the CI too, and the token carries the name and role.
    let res = srv.login("1234567", "secreto1").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap();

    let res = srv.get("/whoami", token).await;
    let whoami: Value = res.json().await.unwrap();
    assert_eq!(whoami["name"], "Luis Mamani");
    assert_eq!(whoami["roles"], json!(["cashier"]));
}

#[tokio::test]
async fn login_distinguishes_unknown_users_from_wrong_passwords() {
    let srv = TestServer::spawn().await;
    srv.register("Rosa Flores", "4567890", "rosa@tienda.bo").await;

    let res = srv.login("nadie@tienda.bo", "secreto1").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "user_not_found");

    let res = srv.login("rosa@tienda.bo", "otra-clave").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_password");
}

#[tokio::test]
async fn registration_is_validated_before_dispatch() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({
            "full_name": "Rosa Flores",
            "ci": "4567890",
            "email": "rosa@tienda.bo",
            "password": "secreto1",
            "confirm_password": "secreto2",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn cashiers_cannot_buy_stock_or_manage_users() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(vec![Role::cashier()]);

    let res = srv
        .post(
            "/purchases",
            &token,
            json!({
                "supplier_id": UserId::generate(),
                "lines": [{ "code": "X-1", "name": "X", "quantity": 1, "purchase_price": 100, "sale_price": 200 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.get("/users", &token).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Reading the catalog is fine.
    let res = srv.get("/products", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn purchase_sale_void_and_cash_cut() {
    let srv = TestServer::spawn().await;
    let token = srv.admin_token().await;

    // Supplier + purchase that introduces a new product.
    let res = srv
        .post("/suppliers", &token, json!({ "name": "Textiles Andinos", "tax_id": "1020304050" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let supplier: Value = res.json().await.unwrap();

    let res = srv
        .post(
            "/purchases",
            &token,
            json!({
                "supplier_id": supplier["party_id"],
                "lines": [{
                    "code": "POL-01",
                    "name": "Polera algodón",
                    "color": "Azul",
                    "quantity": 10,
                    "purchase_price": 1800,
                    "sale_price": 3000,
                }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let products = srv
        .eventually("/products?q=pol", &token, |b| b.as_array().is_some_and(|a| a.len() == 1))
        .await;
    let product = &products[0];
    assert_eq!(product["stock"], 10);
    let product_id = product["product_id"].clone();

    // Quote, then sell three for cash.
    let cart = json!({
        "lines": [{ "product_id": product_id, "quantity": 3 }],
        "payment_method": "cash",
        "cash_received": 10000,
    });
    let res = srv.post("/sales/quote", &token, cart.clone()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let quote: Value = res.json().await.unwrap();
    assert_eq!(quote["totals"]["total"], 9000);
    assert_eq!(quote["totals"]["change"], 1000);

    let res = srv.post("/sales/checkout", &token, cart).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let sale: Value = res.json().await.unwrap();
    assert_eq!(sale["ticket"]["total"], 9000);
    assert_eq!(sale["ticket"]["cashier_name"], "Rosa Flores");
    let sale_id = sale["sale_id"].as_str().unwrap().to_string();

    let product_path = format!("/products/{}", product_id.as_str().unwrap());
    srv.eventually(&product_path, &token, |b| b["stock"] == 7).await;

    // Selling more than what is left is refused.
    let res = srv
        .post(
            "/sales/checkout",
            &token,
            json!({ "lines": [{ "product_id": product_id, "quantity": 8 }], "payment_method": "card" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let cut = srv
        .eventually("/reports/cash-cut", &token, |b| b["sale_count"] == 1)
        .await;
    assert_eq!(cut["total"], 9000);

    // Voiding puts the stock back and drops the sale from the tally.
    let res = srv
        .post(&format!("/sales/{sale_id}/void"), &token, json!({ "reason": "cliente devolvió" }))
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    srv.eventually(&product_path, &token, |b| b["stock"] == 10).await;
    srv.eventually("/reports/cash-cut", &token, |b| b["sale_count"] == 0).await;

    let res = srv
        .post(&format!("/sales/{sale_id}/void"), &token, json!({ "reason": "otra vez" }))
        .await;
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn suppliers_with_purchases_cannot_be_removed() {
    let srv = TestServer::spawn().await;
    let token = srv.admin_token().await;

    let res = srv.post("/suppliers", &token, json!({ "name": "Importadora Sur" })).await;
    let supplier: Value = res.json().await.unwrap();
    let supplier_id = supplier["party_id"].as_str().unwrap().to_string();

    let res = srv
        .post(
            "/purchases",
            &token,
            json!({
                "supplier_id": supplier_id,
                "lines": [{ "code": "GOR-7", "name": "Gorra", "quantity": 4, "purchase_price": 900, "sale_price": 1500 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    srv.eventually("/purchases", &token, |b| b.as_array().is_some_and(|a| a.len() == 1))
        .await;

    let res = srv
        .client
        .delete(srv.url(&format!("/suppliers/{supplier_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn product_form_requires_opening_stock_and_unique_codes() {
    let srv = TestServer::spawn().await;
    let token = srv.admin_token().await;

    let product = json!({
        "code": "CHA-1",
        "name": "Chamarra",
        "purchase_price": 12000,
        "sale_price": 18000,
    });
    let res = srv.post("/products", &token, product.clone()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let mut with_stock = product.clone();
    with_stock["opening_stock"] = json!(2);
    let res = srv.post("/products", &token, with_stock.clone()).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    with_stock["code"] = json!("cha-1");
    let res = srv.post("/products", &token, with_stock).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let low = srv
        .eventually("/inventory/low-stock", &token, |b| b.as_array().is_some_and(|a| !a.is_empty()))
        .await;
    assert_eq!(low[0]["code"], "CHA-1");
}

#[tokio::test]
async fn company_profile_heads_the_ticket() {
    let srv = TestServer::spawn().await;
    let token = srv.admin_token().await;

    let res = srv.get("/company", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), Value::Null);

    let res = srv
        .client
        .put(srv.url("/company"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Tienda Sol", "phones": "2-2456789" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .post(
            "/products",
            &token,
            json!({ "code": "MED-2", "name": "Medias", "purchase_price": 500, "sale_price": 1000, "opening_stock": 5 }),
        )
        .await;
    let created: Value = res.json().await.unwrap();

    let res = srv
        .post(
            "/sales/checkout",
            &token,
            json!({
                "lines": [{ "product_id": created["product_id"], "quantity": 1 }],
                "payment_method": "qr",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let sale: Value = res.json().await.unwrap();
    assert_eq!(sale["ticket"]["header"]["company_name"], "Tienda Sol");
}

#[tokio::test]
async fn suspension_revokes_tokens_already_issued() {
    let srv = TestServer::spawn().await;
    let admin = srv.admin_token().await;

    let res = srv.register("Luis Mamani", "1234567", "luis@tienda.bo").await;
    let cashier: Value = res.json().await.unwrap();
    let cashier_id = cashier["user_id"].as_str().unwrap().to_string();
    let res = srv.login("luis@tienda.bo", "secreto1").await;
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(srv.get("/whoami", &token).await.status(), StatusCode::OK);

    let res = srv.post(&format!("/users/{cashier_id}/suspend"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let mut status = StatusCode::OK;
    for _ in 0..100 {
        status = srv.get("/whoami", &token).await.status();
        if status == StatusCode::FORBIDDEN {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, StatusCode::FORBIDDEN);

    let res = srv.get("/products", &token).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "user_suspended");

    // New sessions are refused too, and reactivation restores the old token.
    assert_eq!(srv.login("luis@tienda.bo", "secreto1").await.status(), StatusCode::FORBIDDEN);
    let res = srv.post(&format!("/users/{cashier_id}/reactivate"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    srv.eventually("/whoami", &token, |body| body["name"] == "Luis Mamani").await;
}
