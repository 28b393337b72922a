//! Simulated `PayFast` redirect.
//!
//! After an online-payment order is confirmed, the customer would be sent to
//! the gateway with a hidden form. Nothing is posted here; the form is built
//! and returned so the presentation layer can show or open it.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use url::Url;

use spaza_core::Price;

use crate::config::PaymentConfig;

/// Gateway form: where to post and what to post.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentRedirect {
    /// Gateway form endpoint.
    pub action: Url,
    /// Form fields in submission order.
    pub fields: Vec<(String, String)>,
}

impl PaymentRedirect {
    /// Value of a form field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The form as a single GET URL.
    #[must_use]
    pub fn to_url(&self) -> Url {
        let mut url = self.action.clone();
        url.query_pairs_mut().extend_pairs(&self.fields);
        url
    }
}

impl std::fmt::Debug for PaymentRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(key, value)| {
                let value = if key == "merchant_key" {
                    "[REDACTED]"
                } else {
                    value.as_str()
                };
                (key.as_str(), value)
            })
            .collect();
        f.debug_struct("PaymentRedirect")
            .field("action", &self.action.as_str())
            .field("fields", &fields)
            .finish()
    }
}

/// Builds gateway forms from configuration.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    config: PaymentConfig,
}

impl PaymentGateway {
    #[must_use]
    pub const fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    /// Form for paying `amount`, with a payment ID derived from `now`.
    #[must_use]
    pub fn redirect(&self, amount: Price, now: DateTime<Utc>) -> PaymentRedirect {
        let config = &self.config;
        let fields = [
            ("merchant_id", config.merchant_id.clone()),
            ("merchant_key", config.merchant_key.expose_secret().to_string()),
            ("return_url", config.return_url.clone()),
            ("cancel_url", config.cancel_url.clone()),
            ("notify_url", config.notify_url.clone()),
            ("m_payment_id", format!("ORDER_{}", now.timestamp_millis())),
            ("amount", amount.to_fixed()),
        ];

        PaymentRedirect {
            action: config.process_url.clone(),
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;

    fn gateway() -> PaymentGateway {
        PaymentGateway::new(StorefrontConfig::for_base_url("http://localhost:8089").unwrap().payment)
    }

    #[test]
    fn test_redirect_fields() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let redirect = gateway().redirect(Price::from_cents(11999), now);

        assert_eq!(redirect.action.as_str(), "https://sandbox.payfast.co.za/eng/process");
        assert_eq!(redirect.field("merchant_id"), Some("10000100"));
        assert_eq!(redirect.field("m_payment_id"), Some("ORDER_1700000000123"));
        assert_eq!(redirect.field("amount"), Some("119.99"));
        assert_eq!(redirect.field("return_url"), Some("http://localhost:3000/return"));
    }

    #[test]
    fn test_to_url_encodes_fields() {
        let now = DateTime::from_timestamp_millis(0).unwrap();
        let url = gateway().redirect(Price::from_cents(5000), now).to_url();
        let query = url.query().unwrap();
        assert!(query.contains("amount=50.00"));
        assert!(query.contains("return_url=http%3A%2F%2Flocalhost%3A3000%2Freturn"));
    }

    #[test]
    fn test_debug_redacts_merchant_key() {
        let redirect = gateway().redirect(Price::ZERO, Utc::now());
        let debug_output = format!("{redirect:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("46f0cd694581a"));
    }
}
