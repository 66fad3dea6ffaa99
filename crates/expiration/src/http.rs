//! HTTP canceller: drives cancellation through the internal endpoint.
//!
//! This is the deployment shape where the consumer runs apart from the
//! API process: cancellation goes over HTTP, authenticated by a static
//! service credential rather than an end-user session.

use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use serde::Deserialize;

use crate::consumer::{CancelError, CancelOutcome, Canceller};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct CancelResponse {
    status: String,
}

/// Canceller calling `POST {base_url}/internal/orders/{id}/cancel`.
#[derive(Clone)]
pub struct HttpCanceller {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCanceller {
    /// Creates a canceller against the given API base URL, authenticated
    /// with the internal service key.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Canceller for HttpCanceller {
    async fn cancel(&self, order_id: OrderId) -> Result<CancelOutcome, CancelError> {
        let url = format!(
            "{}/internal/orders/{}/cancel",
            self.base_url.trim_end_matches('/'),
            order_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| CancelError::Transient(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let outcome = match response.json::<CancelResponse>().await {
                Ok(body) if body.status == "already_closed" => CancelOutcome::AlreadyClosed,
                _ => CancelOutcome::Canceled,
            };
            return Ok(outcome);
        }

        // 5xx is the retryable class; everything else is final for this
        // message.
        if status.is_server_error() {
            Err(CancelError::Transient(format!(
                "internal endpoint returned {status}"
            )))
        } else {
            Err(CancelError::Permanent(format!(
                "internal endpoint returned {status}"
            )))
        }
    }
}
