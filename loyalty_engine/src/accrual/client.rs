use std::time::Duration;

use async_trait::async_trait;
use log::*;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};

use super::{AccrualApi, AccrualError, AccrualResult};
use crate::db_types::OrderNumber;

/// HTTP client for the accrual authority.
#[derive(Clone)]
pub struct AccrualClient {
    base_url: String,
    client: Client,
}

impl AccrualClient {
    /// Creates a new client. `request_timeout` is a backstop applied to every request by the HTTP client itself; the
    /// deadline passed to [`AccrualApi::fetch_accrual`] is usually shorter.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AccrualError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AccrualError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    pub fn url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number.as_str())
    }

    async fn request(&self, number: &OrderNumber) -> Result<AccrualResult, AccrualError> {
        let url = self.url(number);
        trace!("📡️ GET {url}");
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AccrualError::Timeout(Duration::default())
            } else {
                AccrualError::Transport(e.to_string())
            }
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(AccrualError::Authority { status: status.as_u16(), retry_after });
        }
        let result = response.json::<AccrualResult>().await.map_err(|e| AccrualError::Decode(e.to_string()))?;
        if result.order_number != *number {
            return Err(AccrualError::Decode(format!(
                "asked about order {number} but the answer is for order {}",
                result.order_number
            )));
        }
        Ok(result)
    }
}

#[async_trait]
impl AccrualApi for AccrualClient {
    async fn fetch_accrual(&self, number: &OrderNumber, deadline: Duration) -> Result<AccrualResult, AccrualError> {
        let result = match tokio::time::timeout(deadline, self.request(number)).await {
            Ok(Err(AccrualError::Timeout(_))) | Err(_) => Err(AccrualError::Timeout(deadline)),
            Ok(result) => result,
        };
        match &result {
            Ok(r) => debug!("📡️ Accrual authority reports order {number} as {} ({})", r.status, r.accrual),
            Err(e) => debug!("📡️ Accrual lookup for order {number} failed. {e}"),
        }
        result
    }
}
