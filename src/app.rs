use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{availability, checkout, confirmation, discounts, menu, orders, pricing};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(availability::router())
                .merge(menu::router())
                .merge(pricing::router())
                .merge(orders::router())
                .merge(discounts::router())
                .merge(checkout::router())
                .merge(confirmation::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::sign;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use time::OffsetDateTime;
    use tower::ServiceExt;

    fn admin_token(email: &str) -> String {
        let claims = json!({
            "sub": "user-1",
            "aud": "authenticated",
            "exp": OffsetDateTime::now_utc().unix_timestamp() + 600,
            "email": email,
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret")).unwrap()
    }

    async fn call(req: Request<Body>) -> (StatusCode, Value) {
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let res = build_app(AppState::fake())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_require_a_token() {
        let (status, body) = call(json_post(
            "/api/availability",
            json!({"date": "2026-10-20", "timeSlots": ["10:00"]}),
        ))
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[tokio::test]
    async fn non_allowlisted_admin_is_forbidden() {
        let req = Request::get("/api/admin/discounts")
            .header(header::AUTHORIZATION, format!("Bearer {}", admin_token("intruder@example.com")))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Not an allowed admin");
    }

    #[tokio::test]
    async fn admin_listing_rejects_unknown_tab() {
        let req = Request::get("/api/admin/orders?tab=archive")
            .header(header::AUTHORIZATION, format!("Bearer {}", admin_token("owner@bakery.test")))
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown tab: archive");
    }

    #[tokio::test]
    async fn availability_lookup_needs_a_date() {
        let (status, body) = call(Request::get("/api/availability").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "date is required");
    }

    #[tokio::test]
    async fn order_outside_window_reports_closed_date() {
        let (status, body) = call(json_post(
            "/api/order",
            json!({
                "customerEmail": "ada@example.com",
                "customerName": "Ada",
                "pickupDate": "2001-01-01",
                "pickupTime": "10:00",
                "cart": [{"menuItemId": uuid::Uuid::new_v4(), "variant": "full", "quantity": 1}]
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unable to order for this date");
    }

    #[tokio::test]
    async fn checkout_requires_order_id() {
        let (status, body) = call(json_post("/api/checkout", json!({"tipCents": 100}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing orderId");
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected_without_detail() {
        let payload = json!({"id": "evt_1", "type": "checkout.session.completed", "data": {"object": {}}}).to_string();
        let req = Request::post("/api/webhook")
            .header("stripe-signature", "t=1,v1=deadbeef")
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid webhook signature"}));
    }

    #[tokio::test]
    async fn webhook_acknowledges_unhandled_events() {
        let payload = json!({"id": "evt_2", "type": "customer.created", "data": {"object": {"id": "cus_1"}}}).to_string();
        let header = sign(payload.as_bytes(), "whsec_test", OffsetDateTime::now_utc().unix_timestamp());
        let req = Request::post("/api/webhook")
            .header("stripe-signature", header)
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"received": true}));
    }
}
