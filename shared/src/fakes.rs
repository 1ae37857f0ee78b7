//! In-memory stand-ins for Notion and Stripe, used by tests.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::notion::{DocumentStore, Page, Parent, QueryPage};
use crate::stripe::{Metadata, PaymentLink, Payments, Price, Product};
use crate::{Config, Error, Result};

/// How a configured write failure should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Notion `validation_error`, as when a property name does not exist
    Schema,
    /// Any other upstream failure
    Upstream,
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Failure::Schema => Error::Notion {
                status: 400,
                code: "validation_error".to_string(),
                message: "Property does not exist".to_string(),
            },
            Failure::Upstream => Error::Notion {
                status: 502,
                code: "service_unavailable".to_string(),
                message: "Notion is unavailable".to_string(),
            },
        }
    }
}

pub struct FakeStore {
    pub databases: Mutex<HashMap<String, Vec<Page>>>,
    pub page_size: usize,
    pub fail_queries: Mutex<HashSet<String>>,
    pub fail_creates: Mutex<HashMap<String, Failure>>,
    pub fail_updates: AtomicBool,
    pub fail_retrieve: AtomicBool,
    pub created: Mutex<Vec<(String, Value)>>,
    pub updates: Mutex<Vec<(String, Value)>>,
    pub query_calls: AtomicU64,
    next_id: AtomicU64,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
            page_size: 100,
            fail_queries: Mutex::new(HashSet::new()),
            fail_creates: Mutex::new(HashMap::new()),
            fail_updates: AtomicBool::new(false),
            fail_retrieve: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            query_calls: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }
}

impl FakeStore {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Add a row to `database_id`; the page's parent is set to match.
    pub async fn insert(&self, database_id: &str, mut page: Page) {
        page.parent.database_id = Some(database_id.to_string());
        self.databases
            .lock()
            .await
            .entry(database_id.to_string())
            .or_default()
            .push(page);
    }

    pub async fn find(&self, page_id: &str) -> Option<Page> {
        self.databases
            .lock()
            .await
            .values()
            .flatten()
            .find(|p| p.id == page_id)
            .cloned()
    }

    pub async fn created_in(&self, database_id: &str) -> Vec<Value> {
        self.created
            .lock()
            .await
            .iter()
            .filter(|(db, _)| db == database_id)
            .map(|(_, props)| props.clone())
            .collect()
    }
}

/// Only the `relation.contains` filter shape is understood; other filters match everything.
fn matches_filter(page: &Page, filter: Option<&Value>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let property = filter.get("property").and_then(Value::as_str);
    let contains = filter
        .get("relation")
        .and_then(|r| r.get("contains"))
        .and_then(Value::as_str);
    match (property, contains) {
        (Some(property), Some(id)) => page.relation_ids(property).iter().any(|r| r == id),
        _ => true,
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<Value>,
        _sorts: Option<Value>,
        start_cursor: Option<String>,
    ) -> Result<QueryPage> {
        self.query_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_queries.lock().await.contains(database_id) {
            return Err(Failure::Upstream.into_error());
        }

        let rows: Vec<Page> = self
            .databases
            .lock()
            .await
            .get(database_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|p| matches_filter(p, filter.as_ref()))
            .collect();

        let start: usize = start_cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(rows.len());
        let has_more = end < rows.len();

        Ok(QueryPage {
            results: rows.get(start..end).map(<[Page]>::to_vec).unwrap_or_default(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page> {
        if self.fail_retrieve.load(Ordering::Relaxed) {
            return Err(Failure::Upstream.into_error());
        }
        self.find(page_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("page {}", page_id)))
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<Page> {
        if let Some(failure) = self.fail_creates.lock().await.get(database_id) {
            return Err(failure.into_error());
        }

        let id = format!("page-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let page = Page {
            id,
            archived: false,
            in_trash: false,
            parent: Parent {
                database_id: Some(database_id.to_string()),
            },
            properties: properties.as_object().cloned().unwrap_or_default(),
        };

        self.created
            .lock()
            .await
            .push((database_id.to_string(), properties));
        self.insert(database_id, page.clone()).await;
        Ok(page)
    }

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<Page> {
        if self.fail_updates.load(Ordering::Relaxed) {
            return Err(Failure::Upstream.into_error());
        }
        self.updates
            .lock()
            .await
            .push((page_id.to_string(), properties.clone()));

        let mut databases = self.databases.lock().await;
        let page = databases
            .values_mut()
            .flatten()
            .find(|p| p.id == page_id)
            .ok_or_else(|| Error::NotFound(format!("page {}", page_id)))?;

        if let Value::Object(props) = properties {
            page.properties.extend(props);
        }
        Ok(page.clone())
    }
}

/// Stripe stand-in. Replays objects for repeated idempotency keys, as Stripe does.
#[derive(Default)]
pub struct FakePayments {
    pub fail: AtomicBool,
    pub calls: AtomicU64,
    pub products: Mutex<HashMap<String, Product>>,
    pub prices: Mutex<HashMap<String, Price>>,
    pub links: Mutex<HashMap<String, PaymentLink>>,
    pub link_metadata: Mutex<Vec<Metadata>>,
    next_id: AtomicU64,
}

impl FakePayments {
    fn check(&self) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return Err(Error::Stripe {
                status: 401,
                message: "Invalid API Key provided".to_string(),
            });
        }
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn created_links(&self) -> usize {
        self.links.lock().await.len()
    }
}

#[async_trait]
impl Payments for FakePayments {
    async fn create_product(
        &self,
        name: &str,
        _metadata: &Metadata,
        idempotency_key: &str,
    ) -> Result<Product> {
        let n = self.check()?;
        let mut products = self.products.lock().await;
        Ok(products
            .entry(idempotency_key.to_string())
            .or_insert_with(|| Product {
                id: format!("prod_{}", n),
                name: name.to_string(),
            })
            .clone())
    }

    async fn create_price(
        &self,
        _product_id: &str,
        unit_amount: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> Result<Price> {
        let n = self.check()?;
        let mut prices = self.prices.lock().await;
        Ok(prices
            .entry(idempotency_key.to_string())
            .or_insert_with(|| Price {
                id: format!("price_{}", n),
                unit_amount: Some(unit_amount),
                currency: currency.to_string(),
            })
            .clone())
    }

    async fn create_payment_link(
        &self,
        _price_id: &str,
        metadata: &Metadata,
        idempotency_key: &str,
    ) -> Result<PaymentLink> {
        let n = self.check()?;
        self.link_metadata.lock().await.push(metadata.clone());
        let mut links = self.links.lock().await;
        Ok(links
            .entry(idempotency_key.to_string())
            .or_insert_with(|| PaymentLink {
                id: format!("plink_{}", n),
                url: format!("https://buy.stripe.com/test_{}", n),
            })
            .clone())
    }
}

/// Build a page in the shape Notion returns from reads.
pub fn page(id: &str, properties: Value) -> Page {
    Page {
        id: id.to_string(),
        archived: false,
        in_trash: false,
        parent: Parent::default(),
        properties: properties.as_object().cloned().unwrap_or_else(Map::new),
    }
}

pub fn event_page(id: &str, name: &str, date: &str, ticket_link: Option<&str>) -> Page {
    page(
        id,
        json!({
            "Name": { "type": "title", "title": [{ "plain_text": name }] },
            "Description": { "type": "rich_text", "rich_text": [{ "plain_text": format!("About {}", name) }] },
            "Date": { "type": "date", "date": { "start": date } },
            "Image": { "type": "files", "files": [] },
            "Ticket Link": { "type": "url", "url": ticket_link },
        }),
    )
}

pub fn ticket_page(id: &str, name: &str, price: Option<f64>, event_ids: &[&str]) -> Page {
    let relation: Vec<Value> = event_ids.iter().map(|id| json!({ "id": id })).collect();
    page(
        id,
        json!({
            "Name": { "type": "title", "title": [{ "plain_text": name }] },
            "Price": { "type": "number", "number": price },
            "Payment Link": { "type": "url", "url": null },
            "Events": { "type": "relation", "relation": relation },
        }),
    )
}

/// Configuration pointing at fixed database ids: `events`, `people`, `products`, `comments`, `revenue`.
pub fn test_config() -> Config {
    Config::from_lookup(|key: &str| {
        let value = match key {
            "NOTION_TOKEN" => "secret_test_notion_token",
            "STRIPE_SECRET_KEY" => "sk_test_stripe_key",
            "NOTION_EVENTS_DB" => "events",
            "NOTION_PEOPLE_DB" => "people",
            "NOTION_PRODUCTS_DB" => "products",
            "NOTION_COMMENTS_DB" => "comments",
            "NOTION_REVENUE_DB" => "revenue",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("test configuration is complete")
}
