//! Notion REST client and property helpers.
//!
//! The events site treats Notion as its document store: events, tickets,
//! guests and comments all live in Notion databases. Reads go through
//! `query_database` / `retrieve_page`, writes through `create_page` /
//! `update_page`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{Error, Result};

/// Notion API version header value.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Maximum characters in a single Notion rich text object.
pub const TEXT_LIMIT: usize = 2000;

/// A Notion page (a database row).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub parent: Parent,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Where a page lives. Only database parents carry an id we care about.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Parent {
    #[serde(default)]
    pub database_id: Option<String>,
}

/// Notion ids compare equal with or without dashes, in either case.
pub fn same_id(a: &str, b: &str) -> bool {
    let normalize = |id: &str| {
        id.chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect::<String>()
    };
    normalize(a) == normalize(b)
}

/// One page of database query results.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Operations the site needs from the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<Value>,
        sorts: Option<Value>,
        start_cursor: Option<String>,
    ) -> Result<QueryPage>;

    async fn retrieve_page(&self, page_id: &str) -> Result<Page>;

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<Page>;

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<Page>;
}

/// Notion client over HTTPS.
pub struct NotionClient {
    http_client: reqwest::Client,
    token: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(http_client: reqwest::Client, token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if let Some(err) = notion_error(status, &body) {
            return Err(err);
        }

        Ok(serde_json::from_value(body)?)
    }
}

/// Map a Notion response to an error, if it is one.
pub fn notion_error(status: u16, body: &Value) -> Option<Error> {
    let is_error_object = body.get("object").and_then(Value::as_str) == Some("error");
    if (200..300).contains(&status) && !is_error_object {
        return None;
    }

    let code = body
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no error message")
        .to_string();

    if code == "object_not_found" {
        return Some(Error::NotFound(message));
    }

    Some(Error::Notion {
        status: body
            .get("status")
            .and_then(Value::as_u64)
            .map(|s| s as u16)
            .unwrap_or(status),
        code,
        message,
    })
}

#[async_trait]
impl DocumentStore for NotionClient {
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<Value>,
        sorts: Option<Value>,
        start_cursor: Option<String>,
    ) -> Result<QueryPage> {
        let mut body = Map::new();
        if let Some(filter) = filter {
            body.insert("filter".to_string(), filter);
        }
        if let Some(sorts) = sorts {
            body.insert("sorts".to_string(), sorts);
        }
        if let Some(cursor) = start_cursor {
            body.insert("start_cursor".to_string(), Value::String(cursor));
        }

        debug!("Querying Notion database {}", database_id);
        let url = format!("{}/databases/{}/query", self.base_url, database_id);
        self.send(self.http_client.post(&url).json(&Value::Object(body)))
            .await
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page> {
        let url = format!("{}/pages/{}", self.base_url, urlencoding::encode(page_id));
        match self.send::<Page>(self.http_client.get(&url)).await {
            // Notion rejects malformed ids with a validation error rather than a 404.
            Err(e) if e.is_schema_mismatch() => Err(Error::NotFound(format!("page {}", page_id))),
            other => other,
        }
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<Page> {
        let url = format!("{}/pages", self.base_url);
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        self.send(self.http_client.post(&url).json(&body)).await
    }

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<Page> {
        let url = format!("{}/pages/{}", self.base_url, urlencoding::encode(page_id));
        let body = json!({ "properties": properties });
        self.send(self.http_client.patch(&url).json(&body)).await
    }
}

/// Concatenate the `plain_text` of a rich text array.
fn plain_text(items: Option<&Value>) -> String {
    items
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

impl Page {
    /// The raw property object, if present.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The Notion type of a property (`title`, `url`, `files`, ...).
    pub fn property_type(&self, name: &str) -> Option<&str> {
        self.property(name)?.get("type")?.as_str()
    }

    pub fn title(&self, name: &str) -> String {
        plain_text(self.property(name).and_then(|p| p.get("title")))
    }

    pub fn rich_text(&self, name: &str) -> String {
        plain_text(self.property(name).and_then(|p| p.get("rich_text")))
    }

    /// Plain text of a title or rich text property, whichever it is.
    pub fn text(&self, name: &str) -> String {
        match self.property_type(name) {
            Some("title") => self.title(name),
            _ => self.rich_text(name),
        }
    }

    pub fn url(&self, name: &str) -> Option<String> {
        self.property(name)?
            .get("url")?
            .as_str()
            .filter(|u| !u.is_empty())
            .map(String::from)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.property(name)?.get("number")?.as_f64()
    }

    /// Start of a date property as Notion sent it (ISO 8601).
    pub fn date_start(&self, name: &str) -> Option<String> {
        self.property(name)?
            .get("date")?
            .get("start")?
            .as_str()
            .map(String::from)
    }

    pub fn relation_ids(&self, name: &str) -> Vec<String> {
        self.property(name)
            .and_then(|p| p.get("relation"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("id").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// URL of the first attachment of a files property, external or Notion-hosted.
    pub fn file_url(&self, name: &str) -> Option<String> {
        let first = self.property(name)?.get("files")?.as_array()?.first()?;
        first
            .get("external")
            .or_else(|| first.get("file"))
            .and_then(|f| f.get("url"))
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(String::from)
    }

    /// True when the page is a row of `database_id`.
    pub fn belongs_to(&self, database_id: &str) -> bool {
        self.parent
            .database_id
            .as_deref()
            .is_some_and(|parent| same_id(parent, database_id))
    }

    /// Notion hides deleted rows behind these flags instead of removing them.
    pub fn is_deleted(&self) -> bool {
        self.archived || self.in_trash
    }
}

/// Builders for property values sent on create/update.
pub mod props {
    use serde_json::{json, Value};

    use super::TEXT_LIMIT;

    /// Truncate to at most `max` characters without splitting a character.
    pub fn truncate_chars(text: &str, max: usize) -> String {
        text.chars().take(max).collect()
    }

    fn text_items(text: &str) -> Value {
        json!([{ "type": "text", "text": { "content": truncate_chars(text, TEXT_LIMIT) } }])
    }

    pub fn title(text: &str) -> Value {
        json!({ "title": text_items(text) })
    }

    pub fn rich_text(text: &str) -> Value {
        json!({ "rich_text": text_items(text) })
    }

    pub fn email(address: &str) -> Value {
        json!({ "email": address })
    }

    pub fn phone(number: &str) -> Value {
        json!({ "phone_number": number })
    }

    pub fn select(name: &str) -> Value {
        json!({ "select": { "name": name } })
    }

    pub fn date(start: &str) -> Value {
        json!({ "date": { "start": start } })
    }

    pub fn url(url: &str) -> Value {
        json!({ "url": url })
    }

    pub fn relation(ids: &[&str]) -> Value {
        let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        json!({ "relation": items })
    }
}
