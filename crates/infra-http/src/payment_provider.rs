// HTTP PaymentProvider Implementation
// YooKassa-style API: GET {base}/payments/{id} with HTTP basic auth.

use async_trait::async_trait;
use carrier_core::domain::ProviderStatus;
use carrier_core::error::{AppError, Result};
use carrier_core::port::PaymentProvider;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the payment provider
#[derive(Debug, Clone)]
pub struct PaymentProviderConfig {
    pub base_url: String,
    pub shop_id: String,
    pub secret_key: String,
    pub timeout: Duration,
}

/// The only field of the provider's payment object the worker reads
#[derive(Debug, Deserialize)]
struct ProviderPayment {
    status: String,
}

pub struct HttpPaymentProvider {
    client: Client,
    config: PaymentProviderConfig,
}

impl HttpPaymentProvider {
    pub fn new(config: PaymentProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn payment_url(&self, external_payment_id: &str) -> String {
        format!(
            "{}/payments/{}",
            self.config.base_url.trim_end_matches('/'),
            external_payment_id
        )
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn fetch_status(&self, external_payment_id: &str) -> Result<ProviderStatus> {
        let url = self.payment_url(external_payment_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Request to payment provider failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "provider payment {}",
                external_payment_id
            )));
        }
        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "Payment provider returned {} for {}",
                status, external_payment_id
            )));
        }

        let payment: ProviderPayment = response.json().await.map_err(|e| {
            AppError::Provider(format!("Unreadable payment provider response: {}", e))
        })?;

        debug!(
            external_payment_id,
            provider_status = %payment.status,
            "Fetched payment status from provider"
        );
        Ok(ProviderStatus::new(payment.status))
    }
}
