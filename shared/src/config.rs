//! Configuration management for the events site Lambda.

use std::env;
use std::fmt;

use crate::{Error, Result};

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
pub const DEFAULT_CURRENCY: &str = "usd";

/// Where a secret comes from: the environment itself, or a Secrets Manager ARN.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    Value(String),
    Arn(String),
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Value(value) => write!(f, "Value({})", mask_secret(value)),
            SecretSource::Arn(arn) => write!(f, "Arn({})", arn),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Notion integration token
    pub notion_token: SecretSource,
    /// Events database id
    pub events_db: String,
    /// People (guests) database id
    pub people_db: String,
    /// Products/tickets database id
    pub products_db: String,
    /// Comments database id
    pub comments_db: String,
    /// Revenue database id, attached to payment links for revenue tracking
    pub revenue_db: Option<String>,
    /// Stripe secret key
    pub stripe_secret_key: SecretSource,
    /// Currency used for ticket prices
    pub currency: String,
    pub notion_api_base: String,
    pub stripe_api_base: String,
    /// Echo masked secrets on error pages
    pub debug_pages: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| Error::Config(format!("{} not set", key)));

        let notion_token = secret_source(&get, "NOTION_TOKEN", "NOTION_TOKEN_SECRET_ARN")?;
        let stripe_secret_key = secret_source(&get, "STRIPE_SECRET_KEY", "STRIPE_SECRET_ARN")?;

        Ok(Self {
            notion_token,
            events_db: require("NOTION_EVENTS_DB")?,
            people_db: require("NOTION_PEOPLE_DB")?,
            products_db: require("NOTION_PRODUCTS_DB")?,
            comments_db: require("NOTION_COMMENTS_DB")?,
            revenue_db: get("NOTION_REVENUE_DB"),
            stripe_secret_key,
            currency: get("STRIPE_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            notion_api_base: get("NOTION_API_BASE")
                .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string()),
            stripe_api_base: get("STRIPE_API_BASE")
                .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
            debug_pages: get("SITE_DEBUG_PAGES")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn secret_source<G>(get: &G, value_key: &str, arn_key: &str) -> Result<SecretSource>
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(value) = get(value_key) {
        return Ok(SecretSource::Value(value));
    }
    get(arn_key).map(SecretSource::Arn).ok_or_else(|| {
        Error::Config(format!("{} or {} must be set", value_key, arn_key))
    })
}

/// Mask a secret down to its last 4 characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("NOTION_TOKEN", "secret_abcdef1234"),
        ("NOTION_EVENTS_DB", "events"),
        ("NOTION_PEOPLE_DB", "people"),
        ("NOTION_PRODUCTS_DB", "products"),
        ("NOTION_COMMENTS_DB", "comments"),
        ("STRIPE_SECRET_KEY", "sk_test_9876"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.currency, "usd");
        assert_eq!(config.notion_api_base, DEFAULT_NOTION_API_BASE);
        assert_eq!(config.revenue_db, None);
        assert!(!config.debug_pages);
        assert_eq!(
            config.stripe_secret_key,
            SecretSource::Value("sk_test_9876".to_string())
        );
    }

    #[test]
    fn test_missing_database_is_config_error() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "NOTION_PEOPLE_DB")
            .collect();
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("NOTION_PEOPLE_DB"));
    }

    #[test]
    fn test_secret_arn_fallback() {
        let mut pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "STRIPE_SECRET_KEY")
            .collect();
        pairs.push(("STRIPE_SECRET_ARN", "arn:aws:secretsmanager:stripe"));
        pairs.push(("SITE_DEBUG_PAGES", "true"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.stripe_secret_key,
            SecretSource::Arn("arn:aws:secretsmanager:stripe".to_string())
        );
        assert!(config.debug_pages);
    }

    #[test]
    fn test_debug_output_masks_secret_values() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret_abcdef1234"));
        assert!(debug.contains("****1234"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk_live_abcdWXYZ"), "****WXYZ");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }
}
