//! Storefront flows driven over HTTP: cart in the session, checkout
//! hand-off, protected and signed-in account pages.

#![allow(clippy::unwrap_used)]

use alpine_guardian_integration_tests::{browser, spawn_storefront, storefront_config};
use mockito::Matcher;
use reqwest::StatusCode;
use serde_json::json;

async fn mock_settings(server: &mut mockito::Server) {
    server
        .mock("GET", "/rest/v1/SiteSettings")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
}

async fn mock_product(server: &mut mockito::Server, stripe_price_id: Option<&str>) {
    let product = json!({
        "id": "p1",
        "name": "Avalanche Kit",
        "price": 120.0,
        "description": "Probe, shovel and beacon.",
        "stripe_price_id": stripe_price_id,
        "variations": [
            {"name": "Band", "options": [
                {"value": "VHF", "price_adjustment": 0.0},
                {"value": "UHF", "price_adjustment": 15.0}
            ]}
        ]
    });
    server
        .mock("GET", "/rest/v1/Product")
        .match_query(Matcher::UrlEncoded("id".into(), "eq.p1".into()))
        .with_status(200)
        .with_body(json!([product]).to_string())
        .create_async()
        .await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let backend = mockito::Server::new_async().await;
    let app = spawn_storefront(storefront_config(&backend.url())).await;

    let resp = browser().get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_cart_persists_across_requests_and_checkout_redirects() {
    let mut backend = mockito::Server::new_async().await;
    mock_settings(&mut backend).await;
    mock_product(&mut backend, Some("price_kit")).await;
    let checkout = backend
        .mock("POST", "/functions/v1/create-checkout-session")
        .match_body(Matcher::PartialJson(json!({
            "items": [{"priceId": "price_kit", "quantity": 2, "isSubscription": false}]
        })))
        .with_status(200)
        .with_body(
            json!({"sessionId": "cs_test_9", "url": "https://pay.example/cs_test_9"}).to_string(),
        )
        .create_async()
        .await;

    let app = spawn_storefront(storefront_config(&backend.url())).await;
    let client = browser();

    let resp = client
        .post(app.url("/cart/add"))
        .form(&[("product_id", "p1"), ("quantity", "2"), ("opt:Band", "UHF")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/Checkout");

    let page = client
        .get(app.url("/Checkout"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Avalanche Kit"));
    assert!(page.contains("$270.00"));

    let resp = client.post(app.url("/checkout/pay")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "https://pay.example/cs_test_9");
    checkout.assert_async().await;
}

#[tokio::test]
async fn test_checkout_refuses_line_without_price_reference() {
    let mut backend = mockito::Server::new_async().await;
    mock_settings(&mut backend).await;
    mock_product(&mut backend, None).await;
    let checkout = backend
        .mock("POST", "/functions/v1/create-checkout-session")
        .expect(0)
        .create_async()
        .await;

    let app = spawn_storefront(storefront_config(&backend.url())).await;
    let client = browser();

    client
        .post(app.url("/cart/add"))
        .form(&[("product_id", "p1")])
        .send()
        .await
        .unwrap();

    let resp = client.post(app.url("/checkout/pay")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await.unwrap();
    assert!(page.contains("has no payment price configured"));
    checkout.assert_async().await;
}

#[tokio::test]
async fn test_payment_success_clears_cart() {
    let mut backend = mockito::Server::new_async().await;
    mock_settings(&mut backend).await;
    mock_product(&mut backend, Some("price_kit")).await;

    let app = spawn_storefront(storefront_config(&backend.url())).await;
    let client = browser();

    client
        .post(app.url("/cart/add"))
        .form(&[("product_id", "p1")])
        .send()
        .await
        .unwrap();

    let resp = client
        .get(app.url("/checkout/success?session_id=cs_test_9"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.post(app.url("/checkout/pay")).send().await.unwrap();
    let page = resp.text().await.unwrap();
    assert!(page.contains("Your cart is empty."));
}

#[tokio::test]
async fn test_account_pages_require_sign_in() {
    let mut backend = mockito::Server::new_async().await;
    mock_settings(&mut backend).await;
    let app = spawn_storefront(storefront_config(&backend.url())).await;
    let client = browser();

    for path in ["/Dashboard", "/UserProfile", "/OrderHistory"] {
        let resp = client.get(app.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(resp.headers()["location"], "/CustomLogin", "{path}");
    }
}

#[tokio::test]
async fn test_unknown_path_renders_not_found() {
    let mut backend = mockito::Server::new_async().await;
    mock_settings(&mut backend).await;
    let app = spawn_storefront(storefront_config(&backend.url())).await;

    let resp = browser()
        .get(app.url("/NoSuchPage"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

async fn mock_signed_in_visitor(server: &mut mockito::Server) {
    server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
        .with_status(200)
        .with_body(
            json!({
                "access_token": "jwt-sam",
                "refresh_token": "refresh-sam",
                "expires_in": 3600,
                "user": {
                    "id": "u-sam",
                    "email": "sam@resort.com",
                    "user_metadata": {"full_name": "Sam Rider"}
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/rest/v1/Account")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
}

#[tokio::test]
async fn test_signed_in_visitor_sees_dashboard_and_order_history() {
    let mut backend = mockito::Server::new_async().await;
    mock_settings(&mut backend).await;
    mock_signed_in_visitor(&mut backend).await;
    let orders = backend
        .mock("GET", "/rest/v1/Order")
        .match_query(Matcher::UrlEncoded(
            "customer_email".into(),
            "eq.sam@resort.com".into(),
        ))
        .match_header("authorization", "Bearer jwt-sam")
        .with_status(200)
        .with_body(
            json!([
                {"id": "a1b2c3d4e5", "customer_name": "Sam Rider", "customer_email": "sam@resort.com",
                 "items": [{"id": "p1", "name": "Avalanche Kit", "price": 60.0, "quantity": 2}],
                 "total": 120.0, "status": "completed", "created_date": "2026-02-14T09:30:00Z"},
                {"id": "f9e8d7c6b5", "customer_name": "Sam Rider", "customer_email": "sam@resort.com",
                 "items": [{"id": "p2", "name": "Radio Beacon", "price": 45.5, "quantity": 1}],
                 "total": 45.5, "status": "pending", "created_date": "2026-02-10T16:00:00Z"}
            ])
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let app = spawn_storefront(storefront_config(&backend.url())).await;
    let client = browser();

    let resp = client
        .post(app.url("/CustomLogin"))
        .form(&[("email", "sam@resort.com"), ("password", "powder-day")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], "/Dashboard");

    let resp = client.get(app.url("/Dashboard")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await.unwrap();
    assert!(page.contains("Welcome back, Sam Rider"));
    assert!(page.contains(r#"Total Orders</span><span class="value">2<"#));
    assert!(page.contains(r#"Pending</span><span class="value">1<"#));
    assert!(page.contains(r#"Completed</span><span class="value">1<"#));
    assert!(page.contains("#A1B2C3D4"));
    assert!(!page.contains("alert error"));

    let resp = client.get(app.url("/OrderHistory")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page = resp.text().await.unwrap();
    assert!(page.contains("#A1B2C3D4"));
    assert!(page.contains("#F9E8D7C6"));
    assert!(page.contains("Feb 14, 2026"));
    assert!(page.contains("$120.00"));
    assert!(page.contains("$45.50"));
    assert!(page.contains("status-pending"));
    orders.assert_async().await;
}
