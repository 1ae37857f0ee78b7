//! Stripe REST client for products, prices and payment links.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Error, Result};

/// Metadata attached to Stripe objects, sorted for stable form bodies.
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PaymentLink {
    pub id: String,
    pub url: String,
}

/// Operations the site needs from the payments API.
#[async_trait]
pub trait Payments: Send + Sync {
    async fn create_product(
        &self,
        name: &str,
        metadata: &Metadata,
        idempotency_key: &str,
    ) -> Result<Product>;

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<Price>;

    async fn create_payment_link(
        &self,
        price_id: &str,
        metadata: &Metadata,
        idempotency_key: &str,
    ) -> Result<PaymentLink>;
}

/// Stripe client over HTTPS with form-encoded bodies.
pub struct StripeClient {
    http_client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(
        http_client: reqwest::Client,
        secret_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            secret_key: secret_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: &str,
    ) -> Result<T> {
        debug!("Stripe POST {}", path);
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if let Some(err) = stripe_error(status, &body) {
            return Err(err);
        }

        Ok(serde_json::from_value(body)?)
    }
}

/// Map a Stripe response to an error, if it is one.
pub fn stripe_error(status: u16, body: &Value) -> Option<Error> {
    let error = body.get("error");
    if (200..300).contains(&status) && error.is_none() {
        return None;
    }

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no error message")
        .to_string();

    Some(Error::Stripe { status, message })
}

fn metadata_params(metadata: &Metadata) -> impl Iterator<Item = (String, String)> + '_ {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
}

/// Form parameters for `POST /products`.
pub fn product_params(name: &str, metadata: &Metadata) -> Vec<(String, String)> {
    let mut params = vec![("name".to_string(), name.to_string())];
    params.extend(metadata_params(metadata));
    params
}

/// Form parameters for `POST /prices`.
pub fn price_params(product_id: &str, unit_amount: i64, currency: &str) -> Vec<(String, String)> {
    vec![
        ("product".to_string(), product_id.to_string()),
        ("unit_amount".to_string(), unit_amount.to_string()),
        ("currency".to_string(), currency.to_string()),
    ]
}

/// Form parameters for `POST /payment_links`. Buyers are always attached as customers.
pub fn payment_link_params(price_id: &str, metadata: &Metadata) -> Vec<(String, String)> {
    let mut params = vec![
        ("line_items[0][price]".to_string(), price_id.to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("customer_creation".to_string(), "always".to_string()),
    ];
    params.extend(metadata_params(metadata));
    params
}

#[async_trait]
impl Payments for StripeClient {
    async fn create_product(
        &self,
        name: &str,
        metadata: &Metadata,
        idempotency_key: &str,
    ) -> Result<Product> {
        self.post("products", &product_params(name, metadata), idempotency_key)
            .await
    }

    async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<Price> {
        self.post(
            "prices",
            &price_params(product_id, unit_amount, currency),
            idempotency_key,
        )
        .await
    }

    async fn create_payment_link(
        &self,
        price_id: &str,
        metadata: &Metadata,
        idempotency_key: &str,
    ) -> Result<PaymentLink> {
        self.post(
            "payment_links",
            &payment_link_params(price_id, metadata),
            idempotency_key,
        )
        .await
    }
}
