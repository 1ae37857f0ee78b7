//! Shared data models.

use crate::notion::Page;

/// Notion property names, per database.
pub mod fields {
    pub mod event {
        pub const NAME: &str = "Name";
        pub const DESCRIPTION: &str = "Description";
        pub const DATE: &str = "Date";
        pub const IMAGE: &str = "Image";
        pub const PRICE: &str = "Price";
        pub const TICKET_LINK: &str = "Ticket Link";
    }

    pub mod product {
        pub const NAME: &str = "Name";
        pub const PRICE: &str = "Price";
        pub const PAYMENT_LINK: &str = "Payment Link";
        pub const EVENTS: &str = "Events";
    }

    pub mod person {
        pub const NAME: &str = "Name";
        pub const EMAIL: &str = "Email";
        pub const PHONE: &str = "Phone";
        pub const CONTACT_PREFERENCE: &str = "Contact Preference";
        pub const MEMBERSHIP: &str = "Membership";
        pub const CREATED: &str = "Created";
        pub const EVENTS: &str = "Events";
    }

    pub mod comment {
        pub const TITLE: &str = "Comment";
        pub const MESSAGE: &str = "Message";
        pub const GUEST: &str = "Guest";
        pub const EVENT: &str = "Event";
    }
}

/// An event as rendered by the site.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: String,
    /// ISO date as stored in Notion, empty when unset
    pub date: String,
    /// Empty when the event has no image
    pub image_url: String,
    pub price: Option<f64>,
    pub ticket_link: Option<String>,
}

impl Event {
    pub fn from_page(page: &Page) -> Self {
        use fields::event as f;

        Self {
            id: page.id.clone(),
            name: page.text(f::NAME),
            description: page.text(f::DESCRIPTION),
            date: page.date_start(f::DATE).unwrap_or_default(),
            image_url: image_url(page, f::IMAGE),
            price: page.number(f::PRICE),
            ticket_link: page.url(f::TICKET_LINK),
        }
    }
}

/// The image property has been a url, a file attachment and plain text over
/// the life of the events database; accept all three, in that order.
fn image_url(page: &Page, name: &str) -> String {
    page.url(name)
        .or_else(|| page.file_url(name))
        .or_else(|| Some(page.rich_text(name)).filter(|t| !t.trim().is_empty()))
        .map(|u| u.trim().to_string())
        .unwrap_or_default()
}

/// A ticket row from the products database.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub name: String,
    pub price: Option<f64>,
    pub payment_link: Option<String>,
}

impl Ticket {
    pub fn from_page(page: &Page) -> Self {
        use fields::product as f;

        Self {
            id: page.id.clone(),
            name: page.text(f::NAME),
            price: page.number(f::PRICE),
            payment_link: page.url(f::PAYMENT_LINK),
        }
    }

    /// Price in minor currency units, or `None` when the ticket is free.
    pub fn unit_amount(&self) -> Option<i64> {
        self.price.and_then(to_unit_amount)
    }
}

/// Convert a major-unit price to minor units; non-positive and non-finite prices are free.
pub fn to_unit_amount(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    let cents = (price * 100.0).round();
    (cents >= 1.0).then_some(cents as i64)
}

/// A purchasable ticket shown on the event page.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketOffer {
    pub name: String,
    pub price: Option<f64>,
    pub url: String,
}

/// Outcome of payment link provisioning for one page view.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketStatus {
    Links(Vec<TicketOffer>),
    Free,
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(properties: serde_json::Value) -> Page {
        serde_json::from_value(json!({ "id": "evt-1", "properties": properties })).unwrap()
    }

    #[test]
    fn test_event_from_page() {
        let event = Event::from_page(&page(json!({
            "Name": { "type": "title", "title": [{ "plain_text": "Potluck" }] },
            "Description": { "type": "rich_text", "rich_text": [{ "plain_text": "Bring a dish" }] },
            "Date": { "type": "date", "date": { "start": "2026-11-02" } },
            "Image": { "type": "url", "url": "https://img/potluck.jpg" },
            "Price": { "type": "number", "number": 10 },
            "Ticket Link": { "type": "url", "url": null },
        })));

        assert_eq!(event.id, "evt-1");
        assert_eq!(event.name, "Potluck");
        assert_eq!(event.description, "Bring a dish");
        assert_eq!(event.date, "2026-11-02");
        assert_eq!(event.image_url, "https://img/potluck.jpg");
        assert_eq!(event.price, Some(10.0));
        assert_eq!(event.ticket_link, None);
    }

    #[test]
    fn test_missing_properties_default_to_empty() {
        let event = Event::from_page(&page(json!({})));
        assert_eq!(event.name, "");
        assert_eq!(event.date, "");
        assert_eq!(event.image_url, "");
        assert_eq!(event.price, None);
    }

    #[test]
    fn test_image_from_file_attachment() {
        let event = Event::from_page(&page(json!({
            "Image": { "type": "files", "files": [
                { "type": "file", "file": { "url": "https://s3/img.png" } }
            ]},
        })));
        assert_eq!(event.image_url, "https://s3/img.png");
    }

    #[test]
    fn test_image_with_zero_files_is_empty() {
        let event = Event::from_page(&page(json!({
            "Image": { "type": "files", "files": [] },
        })));
        assert_eq!(event.image_url, "");
    }

    #[test]
    fn test_image_from_text() {
        let event = Event::from_page(&page(json!({
            "Image": { "type": "rich_text", "rich_text": [{ "plain_text": " https://img/t.png " }] },
        })));
        assert_eq!(event.image_url, "https://img/t.png");
    }

    #[test]
    fn test_unit_amount() {
        assert_eq!(to_unit_amount(12.5), Some(1250));
        assert_eq!(to_unit_amount(19.99), Some(1999));
        assert_eq!(to_unit_amount(0.0), None);
        assert_eq!(to_unit_amount(-5.0), None);
        assert_eq!(to_unit_amount(f64::NAN), None);
        assert_eq!(to_unit_amount(0.001), None);
    }
}
