//! Basic authentication header built from the credentials embedded in the
//! endpoint URL.

use crate::client::endpoint::Credentials;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

pub(crate) fn build_auth_headers(credentials: Option<&Credentials>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let Some(credentials) = credentials else {
        return Ok(headers);
    };

    let raw = format!("{}:{}", credentials.user, credentials.password);
    let encoded = BASE64_STANDARD.encode(raw);
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .context("failed to build Authorization header")?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
