//! `delegatedFetch` — builds an HTTP request with `{{secret}}` substituted
//! into its URL, headers, and body, and returns the response unchanged.
//! The plaintext never appears in the returned structure; what the remote
//! server chooses to echo back is outside this crate's contract.

use vaultkeeper_capability::token::CapabilityToken;
use vaultkeeper_core::error::{Error, Result};

use crate::substitute::substitute;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

pub async fn delegated_fetch(token: &CapabilityToken, request: &FetchRequest) -> Result<FetchResponse> {
    let claims = token.claims().await?;
    let secret = &claims.val;

    let url = substitute(&request.url, secret);
    let body = request.body.as_deref().map(|b| substitute(b, secret));
    let headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), substitute(v, secret)))
        .collect();

    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| Error::MalformedClaims {
            reason: format!("invalid HTTP method: {}", request.method),
        })?;

    let client = reqwest::Client::new();
    let mut builder = client.request(method, &url);
    for (key, value) in &headers {
        builder = builder.header(key, value);
    }
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(|e| Error::Setup {
        dependency: format!("http transport: {e}"),
    })?;

    let status = response.status().as_u16();
    let response_headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = response.text().await.map_err(|e| Error::Setup {
        dependency: format!("http body read: {e}"),
    })?;

    Ok(FetchResponse {
        status,
        headers: response_headers,
        body,
    })
}
