mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// POSTs `body` as JSON and decodes a JSON response.
///
/// Non-success statuses become [`StoreError::Status`] carrying the response
/// body, which is where the store explains missing indexes and the like.
pub async fn post_json<C, B, R>(client: &C, url: &str, body: &B) -> Result<R, StoreError>
where
    C: HttpClient + ?Sized,
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut req = reqwest::Request::new(
        reqwest::Method::POST,
        url.parse()
            .map_err(|e| StoreError::InvalidRequest(format!("url '{url}': {e}")))?,
    );
    req.headers_mut().insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = client.execute(req).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}
