mod builder;

use crate::error::{ClientError, Result};
pub use builder::ClientBuilder;
use rquest::Client as RquestClient;
use std::time::Duration;
use url::Url;

#[derive(Debug)]
pub struct ClientResponse {
    pub status: u16,
    pub content: String,
}

#[derive(Clone)]
pub struct Client {
    inner: RquestClient,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// GETs `url`, failing on transport errors, non-2xx statuses, or when the
    /// whole exchange (headers and body) takes longer than `timeout`.
    pub async fn get(&self, url: &Url, timeout: Duration) -> Result<ClientResponse> {
        match tokio::time::timeout(timeout, self.request(url)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout.into()),
        }
    }

    async fn request(&self, url: &Url) -> Result<ClientResponse> {
        let response = self
            .inner
            .get(url.as_str())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let is_success = response.status().is_success();
        let content = response.text().await.map_err(|e| {
            ClientError::RequestFailed(format!("Failed to get response text: {}", e))
        })?;

        if !is_success {
            return Err(ClientError::ResponseError {
                status_code: status,
                message: content,
            }
            .into());
        }

        Ok(ClientResponse { status, content })
    }
}

fn classify_error(e: rquest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::RequestFailed(e.to_string())
    }
}
