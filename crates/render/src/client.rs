//! Reqwest-backed client for the rendering service's HTTP API.
//!
//! The service accepts a multipart `POST /v1/generations` carrying the
//! source image plus prompt/aspect-ratio fields, and responds with the
//! rendered artifact bytes on success or a JSON error body otherwise.

use crate::ImageProvider;

/// HTTP client for the rendering service.
pub struct RenderClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Errors from the rendering service client.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Render request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Render service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },
}

impl RenderClient {
    /// Create a new client for the rendering service.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://render.internal`.
    /// * `api_key` - Bearer token sent on every request.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`] (shares
    /// its connection pool).
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    /// Base HTTP URL of the rendering service.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Return the response unchanged on a success status, or a
    /// [`RenderError::Api`] carrying the status and body text otherwise.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RenderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RenderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ImageProvider for RenderClient {
    async fn generate(
        &self,
        source_image: &[u8],
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let form = reqwest::multipart::Form::new()
            .part(
                "image",
                reqwest::multipart::Part::bytes(source_image.to_vec())
                    .file_name("source.png")
                    .mime_str("image/png")?,
            )
            .text("prompt", prompt.to_string())
            .text("aspect_ratio", aspect_ratio.to_string());

        let response = self
            .client
            .post(format!("{}/v1/generations", self.api_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;

        tracing::debug!(
            artifact_bytes = bytes.len(),
            aspect_ratio,
            "Received rendered artifact",
        );

        Ok(bytes.to_vec())
    }
}
