// Drives the router in-process, without a listener or database.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use fleet_api_rust::app::app;
use fleet_api_rust::auth::{generate_jwt, Claims};
use tower::ServiceExt;

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn tenant_token() -> String {
    let claims = Claims::new(
        1,
        "acme".into(),
        "fleet_acme".into(),
        1,
        "admin".into(),
        "admin".into(),
    );
    generate_jwt(&claims).unwrap()
}

#[tokio::test]
async fn root_token_cannot_reach_tenant_api() {
    let token = generate_jwt(&Claims::root("operator".into(), 1)).unwrap();

    let res = app().oneshot(get("/api/vehicles", Some(&token))).await.unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_token_cannot_reach_root_api() {
    let res = app()
        .oneshot(get("/api/root/companies", Some(&tenant_token())))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_bearer_prefix_is_unauthorized() {
    let req = Request::builder()
        .uri("/api/analytics/dashboard")
        .header(header::AUTHORIZATION, tenant_token())
        .body(Body::empty())
        .unwrap();

    let res = app().oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let res = app().oneshot(get("/api/nope", None)).await.unwrap();

    // Auth layers wrap matched routes only
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
