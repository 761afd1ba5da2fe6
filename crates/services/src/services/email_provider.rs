//! Transactional email provider client (Resend).

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, Error)]
pub enum EmailProviderError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("invalid api key: {0}")]
    InvalidApiKey(String),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl EmailProviderError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited(_) => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// One message, addressed to a single recipient.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SendReceipt {
    pub id: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, EmailProviderError>;
}

#[derive(Debug, Clone)]
pub struct ResendClient {
    http: Client,
    api_key: SecretString,
    endpoint: String,
}

impl ResendClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(api_key: SecretString) -> Result<Self, EmailProviderError> {
        Self::with_endpoint(api_key, RESEND_API_URL.to_string())
    }

    /// Point the client at a different base URL (local relay, test server).
    pub fn with_endpoint(api_key: SecretString, endpoint: String) -> Result<Self, EmailProviderError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("todo-reminders/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmailProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            endpoint,
        })
    }

    async fn send_request(&self, email: &OutboundEmail) -> Result<SendReceipt, EmailProviderError> {
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(email)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let body = res.text().await.map_err(map_reqwest_error)?;
                serde_json::from_str::<SendReceipt>(&body)
                    .map_err(|e| EmailProviderError::MalformedResponse(format!("{e}: {body}")))
            }
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(classify_failure(status, body))
            }
        }
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, EmailProviderError> {
        (|| async { self.send_request(email).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_delay(Duration::from_secs(5))
                    .with_max_times(2)
                    .with_jitter(),
            )
            .when(|e: &EmailProviderError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    to = ?email.to,
                    "Email provider call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}

/// 403 stays a plain `Http` error: the provider uses it for unverified
/// sending domains, which callers report differently from a bad key.
fn classify_failure(status: StatusCode, body: String) -> EmailProviderError {
    match status {
        StatusCode::UNAUTHORIZED => EmailProviderError::InvalidApiKey(body),
        StatusCode::TOO_MANY_REQUESTS => EmailProviderError::RateLimited(body),
        s => EmailProviderError::Http {
            status: s.as_u16(),
            body,
        },
    }
}

fn map_reqwest_error(e: reqwest::Error) -> EmailProviderError {
    if e.is_timeout() {
        EmailProviderError::Timeout
    } else {
        EmailProviderError::Transport(e.to_string())
    }
}
