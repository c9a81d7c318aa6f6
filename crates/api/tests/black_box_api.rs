use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;

use webmarket_api::app::services::AppServices;
use webmarket_core::{CartKey, ProductId};
use webmarket_infra::catalog::{InMemoryCatalog, ProductInfo, ProductLookup};
use webmarket_infra::CartConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(&CartConfig::default()).await.0
    }

    async fn spawn_with(config: &CartConfig) -> (Self, Arc<AppServices>) {
        // Same router as prod, in-memory catalog, ephemeral port.
        let catalog = InMemoryCatalog::with_products([
            ProductInfo::new(ProductId::new(1), "Notebook", Decimal::new(350, 2)),
            ProductInfo::new(ProductId::new(2), "Pencil", Decimal::new(75, 2)),
        ]);
        let lookup: Arc<dyn ProductLookup> = Arc::new(catalog);
        let (services, _workers) =
            webmarket_api::app::services::build_services_with(lookup, config)
                .expect("failed to wire services");
        let app = webmarket_api::app::build_app(Arc::clone(&services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (Self { base_url, handle }, services)
    }

    fn cart_url(&self, path: &str) -> String {
        format!("{}/api/v1/cart{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get_json(client: &reqwest::Client, url: String) -> serde_json::Value {
    let res = client.get(url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

fn quantity(cart: &serde_json::Value, product_id: u64) -> Option<u64> {
    cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|line| line["product_id"] == product_id)
        .and_then(|line| line["quantity"].as_u64())
}

#[tokio::test]
async fn generate_returns_fresh_tokens() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let a = get_json(&client, srv.cart_url("/generate")).await;
    let b = get_json(&client, srv.cart_url("/generate")).await;

    let a = a["value"].as_str().unwrap().to_string();
    let b = b["value"].as_str().unwrap().to_string();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}

#[tokio::test]
async fn anonymous_cart_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = get_json(&client, srv.cart_url("/generate")).await["value"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..2 {
        let res = client
            .post(srv.cart_url(&format!("/{token}/add/1")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = client
        .post(srv.cart_url(&format!("/{token}/add/2?qty=3")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cart = get_json(&client, srv.cart_url(&format!("/{token}"))).await;
    assert_eq!(quantity(&cart, 1), Some(2));
    assert_eq!(quantity(&cart, 2), Some(3));
    assert_eq!(cart["total_quantity"], 5);

    client
        .post(srv.cart_url(&format!("/{token}/decrement/1")))
        .send()
        .await
        .unwrap();
    client
        .post(srv.cart_url(&format!("/{token}/remove/2")))
        .send()
        .await
        .unwrap();
    let cart = get_json(&client, srv.cart_url(&format!("/{token}"))).await;
    assert_eq!(quantity(&cart, 1), Some(1));
    assert_eq!(quantity(&cart, 2), None);

    let res = client
        .post(srv.cart_url(&format!("/{token}/clear")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart = get_json(&client, srv.cart_url(&format!("/{token}"))).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_product_is_404_and_cart_untouched() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.cart_url("/x/add/999"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "product_not_found");

    let cart = get_json(&client, srv.cart_url("/x")).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.cart_url("/bad%20token/add/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn username_selects_user_cart_and_merge_folds_guest_cart() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Guest cart {1:2}
    for _ in 0..2 {
        client
            .post(srv.cart_url("/anon1/add/1"))
            .send()
            .await
            .unwrap();
    }
    // User cart {1:1, 2:1}; the path token is ignored when username is sent.
    for product in [1, 2] {
        let res = client
            .post(srv.cart_url(&format!("/ignored/add/{product}")))
            .header("username", "user42")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client
        .post(srv.cart_url("/anon1/merge"))
        .header("username", "user42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(quantity(&body["cart"], 1), Some(3));
    assert_eq!(quantity(&body["cart"], 2), Some(1));

    let user_cart = client
        .get(srv.cart_url("/whatever"))
        .header("username", "user42")
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(user_cart["total_quantity"], 4);

    // The guest cart is gone: reading it starts a new empty one.
    let guest = get_json(&client, srv.cart_url("/anon1")).await;
    assert_eq!(guest["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn merge_requires_identity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.cart_url("/anon1/merge"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cart_activity_reaches_analytics() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(srv.cart_url("/shopper/add/2"))
        .send()
        .await
        .unwrap();

    // Events flow through the background publisher; poll until they land.
    let url = format!("{}/api/v1/analytics/products/2", srv.base_url);
    for _ in 0..100 {
        let res = client.get(&url).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            assert_eq!(body["added"], 1);
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("analytics did not observe the add within timeout");
}

#[tokio::test]
async fn tokenless_request_is_issued_a_cart() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let cart = get_json(&client, format!("{}/api/v1/cart", srv.base_url)).await;
    let token = cart["issued_token"].as_str().unwrap().to_string();
    assert_eq!(cart["key"], token.as_str());

    let again = get_json(&client, srv.cart_url(&format!("/{token}"))).await;
    assert!(again.get("issued_token").is_none());
}

#[tokio::test]
async fn health_reports_event_counters() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.cart_url("/shopper/add/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let url = format!("{}/health", srv.base_url);
    for _ in 0..100 {
        let body = get_json(&client, url.clone()).await;
        assert_eq!(body["status"], "ok");
        if body["events"]["delivered"] == 1 {
            assert_eq!(body["events"]["enqueued"], 1);
            assert_eq!(body["events"]["dropped"], 0);
            assert_eq!(body["events"]["failed"], 0);
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("publisher never reported the delivered event");
}

#[tokio::test]
async fn contended_cart_is_503_and_recovers() {
    let config = CartConfig::default().with_lock_timeout(Duration::from_millis(50));
    let (srv, services) = TestServer::spawn_with(&config).await;
    let client = reqwest::Client::new();

    let held = services
        .cart
        .store()
        .locks()
        .lock(&CartKey::from_raw("busy"))
        .unwrap();
    let res = client
        .post(srv.cart_url("/busy/add/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unavailable");
    drop(held);

    let res = client
        .post(srv.cart_url("/busy/add/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart = get_json(&client, srv.cart_url("/busy")).await;
    assert_eq!(quantity(&cart, 1), Some(1));
}
