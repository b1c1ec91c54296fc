//! API credential handling.

use crate::error::{GatewayError, GatewayResult};
use reqwest::Url;
use std::fmt;
use zeroize::Zeroizing;

/// Header carrying the API key on request/response calls.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Query parameter carrying the API key on the push stream URL.
pub const API_KEY_QUERY: &str = "api_key";

/// Operator API key. Wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    /// `None` for an empty or whitespace-only key.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = Zeroizing::new(key.into());
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Push stream URL with the API key attached as a query parameter.
pub fn stream_url(base: &str, api_key: Option<&ApiKey>) -> GatewayResult<String> {
    let mut url = Url::parse(base).map_err(|e| GatewayError::Url(format!("{base}: {e}")))?;
    if let Some(key) = api_key {
        url.query_pairs_mut().append_pair(API_KEY_QUERY, key.expose());
    }
    Ok(url.to_string())
}
