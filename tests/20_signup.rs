mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn signup_reports_every_invalid_field() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(format!("{}/auth/signup", server.base_url))
        .json(&json!({
            "company_name": "",
            "subdomain": "admin",
            "email": "not-an-email",
            "admin_username": "boss",
            "password": "short",
            "confirm_password": "different"
        }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields = body["field_errors"].as_object().expect("field_errors object");
    for field in ["company_name", "subdomain", "email"] {
        assert!(fields.contains_key(field), "missing {} in {:?}", field, fields);
    }
    Ok(())
}

#[tokio::test]
async fn reserved_subdomain_is_unavailable() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(format!("{}/auth/check-subdomain/admin", server.base_url)).await?;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["subdomain"], "admin");
    assert_eq!(body["data"]["available"], false);
    assert!(body["data"]["reason"].is_string());
    Ok(())
}

#[tokio::test]
async fn login_requires_credentials() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "username": "", "password": "" }))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn taken_subdomain_conflicts() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let client = reqwest::Client::new();
    let subdomain = common::unique_subdomain("dup");
    let url = format!("{}/auth/signup", server.base_url);

    // Two signups for the same subdomain at once: the loser gets 409, never 500
    let (a, b) = tokio::join!(
        client.post(&url).json(&common::signup_body(&subdomain)).send(),
        client.post(&url).json(&common::signup_body(&subdomain)).send(),
    );
    let mut statuses = vec![a?.status(), b?.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let res = client.post(&url).json(&common::signup_body(&subdomain)).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = reqwest::get(format!("{}/auth/check-subdomain/{}", server.base_url, subdomain)).await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["available"], false);
    Ok(())
}

#[tokio::test]
async fn failed_provisioning_frees_the_subdomain() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_ready(server).await? {
        return Ok(());
    }
    let subdomain = common::unique_subdomain("rb");
    let mut body = common::signup_body(&subdomain);
    // Longer than the employees.username column, so the admin insert fails
    // after the company row and its database exist
    body["admin_username"] = json!("a".repeat(120));

    let res = reqwest::Client::new()
        .post(format!("{}/auth/signup", server.base_url))
        .json(&body)
        .send()
        .await?;
    assert!(res.status().is_server_error(), "expected provisioning failure, got {}", res.status());

    let res = reqwest::get(format!("{}/auth/check-subdomain/{}", server.base_url, subdomain)).await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["available"], true);
    Ok(())
}
