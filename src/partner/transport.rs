//! Outbound delivery of partner envelopes.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::crypto::PartnerEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("partner did not answer in time")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    /// Non-success HTTP status without an envelope body
    #[error("partner answered with HTTP {0}")]
    Status(u16),

    #[error("partner response is not an envelope")]
    Malformed,
}

/// Sends an envelope to a partner and returns the partner's response envelope.
#[async_trait]
pub trait PartnerTransport: Send + Sync {
    async fn send(&self, url: &str, envelope: &PartnerEnvelope) -> Result<PartnerEnvelope, TransportError>;
}

pub struct HttpPartnerTransport {
    client: reqwest::Client,
}

impl HttpPartnerTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PartnerTransport for HttpPartnerTransport {
    async fn send(&self, url: &str, envelope: &PartnerEnvelope) -> Result<PartnerEnvelope, TransportError> {
        let response = self
            .client
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        // Business failures still come back as signed envelopes
        match serde_json::from_slice::<PartnerEnvelope>(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(TransportError::Status(status.as_u16())),
            Err(_) => Err(TransportError::Malformed),
        }
    }
}
