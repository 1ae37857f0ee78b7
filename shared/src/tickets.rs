//! Payment link provisioning for paid events.
//!
//! Runs on every event page view. An event that already carries a ticket
//! link is served as-is; otherwise its tickets are looked up in the products
//! database and any priced ticket without a link gets a Stripe product,
//! price and payment link, which are then written back to the ticket. Only
//! single-tier events get the link copied onto the event itself.
//!
//! Every Stripe create call carries an idempotency key derived from what it
//! sends (event, ticket id, product name and price), so repeated or
//! concurrent first views from different Lambda instances converge on the
//! same Stripe objects. The in-process [`LinkMemo`] only saves round trips
//! within one instance.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{fields, Event, Ticket, TicketOffer, TicketStatus};
use crate::notion::{props, DocumentStore};
use crate::stripe::{Metadata, Payments};
use crate::{Config, Result};

/// Payment links created by this instance, keyed by [`memo_key`]. Never evicted.
#[derive(Default)]
pub struct LinkMemo {
    links: RwLock<HashMap<String, String>>,
}

static LINK_MEMO: OnceLock<LinkMemo> = OnceLock::new();

impl LinkMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide memo.
    pub fn global() -> &'static LinkMemo {
        LINK_MEMO.get_or_init(LinkMemo::new)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.links.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, url: String) {
        self.links.write().await.insert(key, url);
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}

/// Everything sent to Stripe that varies per ticket goes into the key, so a
/// renamed or repriced ticket never reuses an idempotency key.
pub fn memo_key(event_id: &str, ticket_id: &str, product_name: &str, unit_amount: i64) -> String {
    format!("{}:{}:{}:{}", event_id, ticket_id, product_name, unit_amount)
}

/// Deterministic Stripe idempotency key for one create step.
pub fn idempotency_key(memo_key: &str, step: &str) -> String {
    let name = format!("{}:{}", memo_key, step);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Work out how tickets for `event` can be bought, creating payment links as needed.
///
/// Never fails: upstream errors are logged and the affected tickets are
/// skipped, so the event page still renders.
pub async fn provision(
    store: &dyn DocumentStore,
    payments: &dyn Payments,
    memo: &LinkMemo,
    config: &Config,
    event: &Event,
) -> TicketStatus {
    if let Some(url) = &event.ticket_link {
        return TicketStatus::Links(vec![TicketOffer {
            name: "Tickets".to_string(),
            price: event.price,
            url: url.clone(),
        }]);
    }

    let tickets = match tickets_for_event(store, config, &event.id).await {
        Ok(tickets) => tickets,
        Err(e) => {
            warn!("Failed to load tickets for event {}: {}", event.id, e);
            return TicketStatus::Unavailable;
        }
    };

    let priced: Vec<(Ticket, i64)> = tickets
        .into_iter()
        .filter_map(|t| t.unit_amount().map(|amount| (t, amount)))
        .collect();

    if priced.is_empty() {
        return TicketStatus::Free;
    }
    let single_tier = priced.len() == 1;

    let mut offers = Vec::new();
    let mut created_any = false;

    for (ticket, unit_amount) in priced {
        let display_name = if ticket.name.is_empty() {
            "Ticket".to_string()
        } else {
            ticket.name.clone()
        };

        if let Some(url) = &ticket.payment_link {
            offers.push(TicketOffer {
                name: display_name,
                price: ticket.price,
                url: url.clone(),
            });
            continue;
        }

        let key = memo_key(
            &event.id,
            &ticket.id,
            &product_name(event, &ticket),
            unit_amount,
        );
        if let Some(url) = memo.get(&key).await {
            offers.push(TicketOffer {
                name: display_name,
                price: ticket.price,
                url,
            });
            continue;
        }

        match create_link(payments, config, event, &ticket, unit_amount, &key).await {
            Ok(url) => {
                info!("Created payment link for ticket {} of event {}", ticket.id, event.id);
                memo.insert(key, url.clone()).await;
                persist_link(store, &ticket.id, fields::product::PAYMENT_LINK, &url).await;
                created_any = true;
                offers.push(TicketOffer {
                    name: display_name,
                    price: ticket.price,
                    url,
                });
            }
            Err(e) => {
                warn!("Failed to create payment link for ticket {}: {}", ticket.id, e);
            }
        }
    }

    if offers.is_empty() {
        return TicketStatus::Unavailable;
    }

    // The event link short-circuits later views, which would hide every other tier.
    if created_any && single_tier {
        persist_link(store, &event.id, fields::event::TICKET_LINK, &offers[0].url).await;
    }

    TicketStatus::Links(offers)
}

async fn tickets_for_event(
    store: &dyn DocumentStore,
    config: &Config,
    event_id: &str,
) -> Result<Vec<Ticket>> {
    let filter = json!({
        "property": fields::product::EVENTS,
        "relation": { "contains": event_id },
    });

    let mut tickets = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .query_database(&config.products_db, Some(filter.clone()), None, cursor.take())
            .await?;
        tickets.extend(
            page.results
                .iter()
                .filter(|p| !p.is_deleted())
                .map(Ticket::from_page),
        );
        cursor = page.next_cursor.filter(|_| page.has_more);
        if cursor.is_none() {
            break;
        }
    }
    Ok(tickets)
}

fn link_metadata(config: &Config, event: &Event, ticket: &Ticket) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("event_id".to_string(), event.id.clone());
    metadata.insert("event_name".to_string(), event.name.clone());
    metadata.insert("ticket_id".to_string(), ticket.id.clone());
    metadata.insert("track_revenue".to_string(), "true".to_string());
    metadata.insert("attach_buyer".to_string(), "true".to_string());
    if let Some(revenue_db) = &config.revenue_db {
        metadata.insert("revenue_db".to_string(), revenue_db.clone());
    }
    metadata
}

fn product_name(event: &Event, ticket: &Ticket) -> String {
    match (event.name.is_empty(), ticket.name.is_empty()) {
        (_, true) => event.name.clone(),
        (true, false) => ticket.name.clone(),
        (false, false) => format!("{}: {}", event.name, ticket.name),
    }
}

async fn create_link(
    payments: &dyn Payments,
    config: &Config,
    event: &Event,
    ticket: &Ticket,
    unit_amount: i64,
    key: &str,
) -> Result<String> {
    let metadata = link_metadata(config, event, ticket);

    let product = payments
        .create_product(
            &product_name(event, ticket),
            &metadata,
            &idempotency_key(key, "product"),
        )
        .await?;

    let price = payments
        .create_price(
            &product.id,
            unit_amount,
            &config.currency,
            &idempotency_key(key, "price"),
        )
        .await?;

    let link = payments
        .create_payment_link(&price.id, &metadata, &idempotency_key(key, "payment_link"))
        .await?;

    Ok(link.url)
}

async fn persist_link(store: &dyn DocumentStore, page_id: &str, property: &str, url: &str) {
    let mut properties = Map::new();
    properties.insert(property.to_string(), props::url(url));
    if let Err(e) = store.update_page(page_id, Value::Object(properties)).await {
        warn!("Failed to save {} on page {}: {}", property, page_id, e);
    }
}
