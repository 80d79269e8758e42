use std::env;

use crate::gateway::{RedirectUrls, StoreCredentials};

/// Hosted-checkout endpoints, selected by the sandbox/live switch.
pub const SANDBOX_GATEWAY_URL: &str = "https://sandbox.gateway.example/gwprocess/api";
pub const LIVE_GATEWAY_URL: &str = "https://securepay.gateway.example/gwprocess/api";

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub currency: String,
    /// Store account presented to the gateway when opening a session.
    pub store_id: String,
    pub store_password: String,
    /// True selects the sandbox endpoint for session initiation instead of
    /// the live one.
    pub sandbox: bool,
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
    /// Where the gateway posts its server-to-server notification.
    pub notification_url: String,
    /// From-address stamped on receipt emails.
    pub receipt_from_address: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "BDT".to_string()),
            store_id: env::var("GATEWAY_STORE_ID").unwrap_or_else(|_| "teststore".to_string()),
            store_password: env::var("GATEWAY_STORE_PASSWORD")
                .unwrap_or_else(|_| "teststore@pass".to_string()),
            sandbox: env::var("GATEWAY_SANDBOX")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            success_url: env::var("PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3001/payment/success".to_string()),
            fail_url: env::var("PAYMENT_FAIL_URL")
                .unwrap_or_else(|_| "http://localhost:3001/payment/fail".to_string()),
            cancel_url: env::var("PAYMENT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:3001/payment/cancel".to_string()),
            notification_url: env::var("PAYMENT_NOTIFICATION_URL")
                .unwrap_or_else(|_| "http://localhost:3001/payment/ipn".to_string()),
            receipt_from_address: env::var("RECEIPT_FROM_ADDRESS")
                .unwrap_or_else(|_| "tickets@example.com".to_string()),
        }
    }

    pub fn gateway_base_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_GATEWAY_URL
        } else {
            LIVE_GATEWAY_URL
        }
    }

    pub fn store_credentials(&self) -> StoreCredentials {
        StoreCredentials {
            store_id: self.store_id.clone(),
            store_password: self.store_password.clone(),
        }
    }

    pub fn redirect_urls(&self) -> RedirectUrls {
        RedirectUrls {
            success: self.success_url.clone(),
            fail: self.fail_url.clone(),
            cancel: self.cancel_url.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
