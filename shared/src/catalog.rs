//! Event catalog reader.

use serde_json::json;
use tracing::info;

use crate::models::{fields, Event};
use crate::notion::DocumentStore;
use crate::{Config, Error, Result};

/// Fetch every event, soonest first, following Notion's pagination cursor.
pub async fn list_events(store: &dyn DocumentStore, config: &Config) -> Result<Vec<Event>> {
    let sorts = json!([{ "property": fields::event::DATE, "direction": "ascending" }]);

    let mut events = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = store
            .query_database(&config.events_db, None, Some(sorts.clone()), cursor.take())
            .await?;

        events.extend(
            page.results
                .iter()
                .filter(|p| !p.is_deleted())
                .map(Event::from_page),
        );

        cursor = page.next_cursor.filter(|_| page.has_more);
        if cursor.is_none() {
            break;
        }
    }

    info!("Loaded {} events", events.len());
    Ok(events)
}

/// Fetch a single event by page id. Pages outside the events database are not events.
pub async fn get_event(store: &dyn DocumentStore, config: &Config, event_id: &str) -> Result<Event> {
    if event_id.trim().is_empty() {
        return Err(Error::NotFound("event".to_string()));
    }

    let page = store.retrieve_page(event_id).await?;
    if page.is_deleted() || !page.belongs_to(&config.events_db) {
        return Err(Error::NotFound(format!("event {}", event_id)));
    }

    Ok(Event::from_page(&page))
}
