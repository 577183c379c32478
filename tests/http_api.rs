mod common;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{app_state, category, money, product};
use opensase_storefront::api::{router, AppState, SESSION_HEADER, USER_HEADER};

async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn add_to_cart(session: &str, product_id: Uuid, quantity: i64) -> Request<Body> {
    let payload = json!({"product_id": product_id, "quantity": quantity});
    Request::post("/api/v1/cart/add")
        .header("content-type", "application/json")
        .header(SESSION_HEADER, session)
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn seeded() -> (AppState, Uuid) {
    let state = app_state();
    let cat = category(&state, "Tools").await;
    let hammer = product(&state, &cat, "Hammer", money(1000), Some(money(800)), 3).await;
    (state, hammer.product.id)
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = router(app_state());
    let resp = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "healthy");
}

#[tokio::test]
async fn anonymous_caller_gets_a_session_key() {
    let app = router(app_state());
    let resp = app.oneshot(Request::get("/api/v1/cart").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let key = resp.headers().get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
    assert!(key.is_some_and(|k| !k.is_empty()));
    let body = body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["items"], json!([]));
}

#[tokio::test]
async fn add_then_summary_over_http() {
    let (state, product_id) = seeded().await;
    let app = router(state);

    let req = add_to_cart("s-1", product_id, 2);
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()[SESSION_HEADER], "s-1");
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Item added to cart.");
    assert_eq!(body["data"]["quantity"], 2);

    let req = Request::get("/api/v1/cart/summary").header(SESSION_HEADER, "s-1").body(Body::empty()).unwrap();
    let body = body_json(app.oneshot(req).await.unwrap()).await;
    assert_eq!(body["data"]["total_items"], 2);
    // subtotal 16.00, discount 4.00
    assert_eq!(body["data"]["total"], "12.00");
}

#[tokio::test]
async fn insufficient_stock_is_a_bad_request() {
    let (state, product_id) = seeded().await;
    let app = router(state);

    let req = add_to_cart("s-1", product_id, 4);
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Only 3 items available in stock, 4 requested");
}

#[tokio::test]
async fn unknown_cart_item_is_not_found() {
    let app = router(app_state());
    let uri = format!("/api/v1/cart/remove/{}", Uuid::new_v4());
    let req = Request::delete(uri).header(SESSION_HEADER, "s-1").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn merge_requires_an_authenticated_user() {
    let app = router(app_state());
    let req = Request::post("/api/v1/cart/merge").header(SESSION_HEADER, "s-1").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn merge_folds_the_session_cart_into_the_user_cart() {
    let (state, product_id) = seeded().await;
    let app = router(state);
    let user_id = Uuid::new_v4();

    let req = add_to_cart("anon", product_id, 2);
    app.clone().oneshot(req).await.unwrap();

    let req = Request::post("/api/v1/cart/merge")
        .header(USER_HEADER, user_id.to_string())
        .header(SESSION_HEADER, "anon")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Carts merged successfully.");
    assert_eq!(body["data"]["outcome"], "merged");

    let req = Request::get("/api/v1/cart/summary").header(USER_HEADER, user_id.to_string()).body(Body::empty()).unwrap();
    let body = body_json(app.clone().oneshot(req).await.unwrap()).await;
    assert_eq!(body["data"]["total_items"], 2);

    let req = Request::post("/api/v1/cart/merge")
        .header(USER_HEADER, user_id.to_string())
        .header(SESSION_HEADER, "anon")
        .body(Body::empty())
        .unwrap();
    let body = body_json(app.oneshot(req).await.unwrap()).await;
    assert_eq!(body["message"], "No anonymous cart to merge.");
}

#[tokio::test]
async fn malformed_user_header_is_rejected() {
    let app = router(app_state());
    let req = Request::get("/api/v1/cart").header(USER_HEADER, "not-a-uuid").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_pages_are_served_by_slug() {
    let (state, _) = seeded().await;
    let app = router(state);

    let resp = app.clone().oneshot(Request::get("/api/v1/products/hammer").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["name"], "Hammer");
    assert_eq!(body["data"]["current_price"], "8.00");

    let resp = app.clone().oneshot(Request::get("/api/v1/products?per_page=5").body(Body::empty()).unwrap()).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["per_page"], 5);

    let resp = app.oneshot(Request::get("/api/v1/products/missing").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
