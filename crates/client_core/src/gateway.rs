//! HTTP adapter for the CAT62 transform service.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use thiserror::Error;
use tracing::debug;
use url::Url;

use shared::domain::SelectedFile;
use shared::error::ApiErrorBody;
use shared::protocol::{DecodeResponse, HealthResponse};

/// Failure of a single gateway call. `Status` means the service answered
/// with a non-2xx code; `Transport` covers everything that kept a usable
/// response from arriving at all (connect errors, timeouts, bad bodies).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("transform service returned HTTP {status}")]
    Status { status: u16, detail: Option<String> },
    #[error("transform service call failed: {message}")]
    Transport { message: String },
}

impl GatewayError {
    /// Human-readable message for display in session state. Service-provided
    /// detail wins when present; otherwise fall back to the bare status code
    /// or, for transports with no message, a generic placeholder.
    pub fn display_message(&self) -> String {
        match self {
            GatewayError::Status { status, detail } => match detail {
                Some(detail) if !detail.trim().is_empty() => detail.clone(),
                _ => format!("HTTP {status}"),
            },
            GatewayError::Transport { message } => {
                if message.trim().is_empty() {
                    "Unknown error".to_owned()
                } else {
                    message.clone()
                }
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport {
            message: err.to_string(),
        }
    }
}

/// Remote operations the session controller depends on. Implemented by
/// [`HttpTransformGateway`] in production and by scripted doubles in tests.
#[async_trait]
pub trait TransformGateway: Send + Sync {
    async fn decode_to_structured(
        &self,
        file: &SelectedFile,
    ) -> Result<DecodeResponse, GatewayError>;

    async fn encode_to_binary(&self, file: &SelectedFile) -> Result<Vec<u8>, GatewayError>;

    async fn health_check(&self) -> Result<HealthResponse, GatewayError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpGatewayOptions {
    pub base_url: String,
    /// Calendar date (`YYYY-MM-DD`) forwarded to the decode endpoint so the
    /// service can rebuild full ISO timestamps from time-of-day fields.
    pub reference_date: Option<String>,
    pub request_timeout: Option<Duration>,
}

pub struct HttpTransformGateway {
    http: Client,
    base_url: String,
    reference_date: Option<String>,
}

impl HttpTransformGateway {
    pub fn new(options: HttpGatewayOptions) -> anyhow::Result<Self> {
        let base_url = options.base_url.trim_end_matches('/').to_owned();
        Url::parse(&base_url)
            .with_context(|| format!("invalid transform service url: {base_url}"))?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build http client for transform gateway")?;

        Ok(Self {
            http,
            base_url,
            reference_date: options.reference_date,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl TransformGateway for HttpTransformGateway {
    async fn decode_to_structured(
        &self,
        file: &SelectedFile,
    ) -> Result<DecodeResponse, GatewayError> {
        debug!(
            file = %file.name,
            bytes = file.size_bytes(),
            "gateway: posting file for decode"
        );
        let mut request = self
            .http
            .post(self.endpoint("decode"))
            .multipart(upload_form(file));
        if let Some(reference_date) = &self.reference_date {
            request = request.query(&[("reference_date", reference_date.as_str())]);
        }
        let response = check_status(request.send().await?).await?;
        let decoded = response.json::<DecodeResponse>().await?;
        debug!(count = decoded.count, "gateway: decode response received");
        Ok(decoded)
    }

    async fn encode_to_binary(&self, file: &SelectedFile) -> Result<Vec<u8>, GatewayError> {
        debug!(
            file = %file.name,
            bytes = file.size_bytes(),
            "gateway: posting file for encode"
        );
        let response = self
            .http
            .post(self.endpoint("encode"))
            .multipart(upload_form(file))
            .send()
            .await?;
        let response = check_status(response).await?;
        let payload = response.bytes().await?;
        debug!(bytes = payload.len(), "gateway: encode response received");
        Ok(payload.to_vec())
    }

    async fn health_check(&self) -> Result<HealthResponse, GatewayError> {
        let response = self.http.get(self.endpoint("health")).send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<HealthResponse>().await?)
    }
}

/// The service expects exactly one multipart part named `file`. The original
/// filename rides along but the service transforms whatever bytes arrive.
fn upload_form(file: &SelectedFile) -> multipart::Form {
    let part = multipart::Part::bytes(file.bytes.clone()).file_name(file.name.clone());
    multipart::Form::new().part("file", part)
}

async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // Service errors carry a JSON `{"detail": ...}` body. Anything else
    // (proxy pages, empty bodies) is reported by status code alone.
    let detail = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail)
        .filter(|detail| !detail.trim().is_empty());
    Err(GatewayError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
