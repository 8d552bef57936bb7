mod common;

use anyhow::Result;
use reqwest::{redirect, StatusCode};

#[tokio::test]
async fn protected_api_rejects_anonymous_callers() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/devis/analyze", server.base_url))
        .body("%PDF-1.4 does not matter, gated first")
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "AUTH_REQUIRED");
    Ok(())
}

#[tokio::test]
async fn protected_page_redirects_anonymous_callers_to_login() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .build()?;

    let res = client
        .get(format!("{}/dashboard", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()["location"], "/login");
    Ok(())
}

#[tokio::test]
async fn whoami_behind_wrapper_requires_auth() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/auth/whoami", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "AUTH_REQUIRED");
    Ok(())
}
