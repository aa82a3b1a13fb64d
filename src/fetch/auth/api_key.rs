use crate::error::StoreError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects a credential as an HTTP header.
///
/// The header is validated once at construction, so every request gets the
/// same already-parsed value.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    /// Uses `Authorization: Bearer <token>`, as the document store expects
    /// for OAuth access tokens (and the emulator accepts with `owner`).
    pub fn bearer(inner: C, token: &str) -> Result<Self, StoreError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| StoreError::InvalidRequest(format!("bearer token: {e}")))?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name: AUTHORIZATION,
            value,
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
