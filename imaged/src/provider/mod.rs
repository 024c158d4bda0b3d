//! Hosted image-generation provider
//!
//! Talks to an OpenAI-compatible images API:
//! - `POST {base_url}/images/generations` returns a URL per generated image
//! - the URL is then fetched with a plain GET
//!
//! Every call is a single attempt. There is no retry, and no timeout unless
//! `provider.timeout_secs` is configured.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProviderConfig;

/// Errors from the provider round trip
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("image provider API key not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },
    #[error("provider returned no image")]
    NoImage,
}

/// Image generation request
#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
}

/// Image generation response
#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageUrl>,
}

#[derive(Debug, Deserialize)]
struct ImageUrl {
    url: Option<String>,
}

/// OpenAI-style error envelope
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for the hosted image API
#[derive(Debug)]
pub struct ImageClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: Option<String>,
    /// Fixed request parameters
    settings: ProviderConfig,
}

impl ImageClient {
    /// Create a new client from provider settings
    pub fn new(settings: ProviderConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            settings,
        })
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request one image for `prompt` and return its URL
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::NotConfigured)?;

        let request = ImageRequest {
            model: &self.settings.model,
            prompt,
            n: 1,
            size: &self.settings.size,
            quality: &self.settings.quality,
        };

        debug!(
            "Sending image generation request ({} {} {})",
            request.model, request.size, request.quality
        );

        let response = self
            .client
            .post(format!(
                "{}/images/generations",
                self.settings.base_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error("image generation", response).await);
        }

        let image_response: ImageResponse = response.json().await?;

        image_response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or(ProviderError::NoImage)
    }

    /// Download the generated image
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        debug!("Downloading image from: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(status_error("image download", response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Turn a non-success response into an error, keeping the provider's message
async fn status_error(endpoint: &'static str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!("{} error: {} - {}", endpoint, status, body);

    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    ProviderError::Status {
        endpoint,
        status,
        message,
    }
}
