use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use urlencoding::{decode, encode};

const INTERLOCK_URL: &str = "https://chzzk.naver.com/account-interlock";
const TOKEN_URL: &str = "https://openapi.chzzk.naver.com/auth/v1/token";

/// Access/refresh token pair from the code exchange
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    content: TokenContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenContent {
    access_token: String,
    refresh_token: String,
}

/// Build the account-interlock authorization URL the operator opens in a
/// browser
pub fn authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{INTERLOCK_URL}?clientId={client_id}&redirectUri={}&state={state}",
        encode(redirect_uri)
    )
}

/// Extract `code` and `state` from the redirect URL the browser landed on
pub fn extract_code(redirect_url: &str) -> Result<(String, String)> {
    let query = redirect_url
        .split_once('?')
        .map(|(_, q)| q)
        .unwrap_or(redirect_url);
    let query = query.split('#').next().unwrap_or_default();

    let params: HashMap<&str, String> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k, decode(v).map(|s| s.into_owned()).unwrap_or_else(|_| v.to_string())))
        .collect();

    if let Some(error) = params.get("error") {
        bail!("Authorization was rejected: {error}");
    }

    match (params.get("code"), params.get("state")) {
        (Some(code), Some(state)) => Ok((code.clone(), state.clone())),
        _ => bail!("Redirect URL carries no code/state parameters"),
    }
}

/// Exchange the authorization code for a token pair
pub async fn exchange_code(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    state: &str,
) -> Result<TokenPair> {
    let response = client
        .post(TOKEN_URL)
        .json(&serde_json::json!({
            "grantType": "authorization_code",
            "clientId": client_id,
            "clientSecret": client_secret,
            "code": code,
            "state": state,
        }))
        .send()
        .await
        .context("Failed to request access token")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        bail!("Token exchange failed: {status} - {text}");
    }

    let envelope: TokenEnvelope = response
        .json()
        .await
        .context("Failed to parse token response")?;

    Ok(TokenPair {
        access_token: envelope.content.access_token,
        refresh_token: envelope.content.refresh_token,
    })
}
