//! HTML pages. Everything interpolated goes through [`escape`].

use chrono::{DateTime, NaiveDate};

use crate::config::mask_secret;
use crate::models::{Event, TicketStatus};

/// Banner shown on the event page after a guestbook submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Thanks,
    SchemaError,
    Error,
}

impl Notice {
    /// Read the `guestbook` / `reason` query flags.
    pub fn from_query(guestbook: Option<&str>, reason: Option<&str>) -> Option<Self> {
        match (guestbook, reason) {
            (Some("thanks"), _) => Some(Notice::Thanks),
            (Some("error"), Some("schema")) => Some(Notice::SchemaError),
            (Some("error"), _) => Some(Notice::Error),
            _ => None,
        }
    }

    fn message(self) -> (&'static str, &'static str) {
        match self {
            Notice::Thanks => ("notice ok", "Thanks for signing the guestbook!"),
            Notice::SchemaError => (
                "notice error",
                "We couldn't save your entry because the guestbook is being updated. Please try again later.",
            ),
            Notice::Error => (
                "notice error",
                "Something went wrong saving your entry. Please try again.",
            ),
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `2026-05-01` → `May 1, 2026`; datetimes also get the local time. Unparseable input is returned as-is.
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return dt.format("%B %-d, %Y at %-I:%M %p").to_string();
    }
    if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return day.format("%B %-d, %Y").to_string();
    }
    date.to_string()
}

pub fn format_price(price: f64, currency: &str) -> String {
    match currency.to_lowercase().as_str() {
        "usd" => format!("${:.2}", price),
        "eur" => format!("€{:.2}", price),
        "gbp" => format!("£{:.2}", price),
        other => format!("{:.2} {}", price, other.to_uppercase()),
    }
}

/// Only http(s) URLs make it into `href`/`src` attributes.
fn safe_url(url: &str) -> Option<String> {
    let lower = url.trim().to_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://")).then(|| escape(url.trim()))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; color: #222; }}
a {{ color: #1a5fb4; }}
.event {{ border-bottom: 1px solid #ddd; padding: 1rem 0; }}
.event img, .hero {{ max-width: 100%; border-radius: 6px; }}
.notice {{ padding: .75rem 1rem; border-radius: 6px; }}
.ok {{ background: #e6f4ea; }}
.error {{ background: #fce8e6; }}
form label {{ display: block; margin: .5rem 0; }}
pre {{ background: #f5f5f5; padding: 1rem; overflow-x: auto; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

pub fn catalog_page(events: &[Event]) -> String {
    let mut body = String::from("<h1>Upcoming events</h1>\n");

    if events.is_empty() {
        body.push_str("<p>No events are scheduled right now. Check back soon!</p>\n");
        return layout("Events", &body);
    }

    for event in events {
        let href = format!("/events/{}", urlencoding::encode(&event.id));
        let image = safe_url(&event.image_url)
            .map(|src| format!("<img src=\"{}\" alt=\"{}\">\n", src, escape(&event.name)))
            .unwrap_or_default();
        let date = if event.date.is_empty() {
            String::new()
        } else {
            format!("<p>{}</p>\n", escape(&format_date(&event.date)))
        };
        body.push_str(&format!(
            "<article class=\"event\">\n{}<h2><a href=\"{}\">{}</a></h2>\n{}</article>\n",
            image,
            escape(&href),
            escape(&event.name),
            date
        ));
    }

    layout("Events", &body)
}

pub fn event_page(
    event: &Event,
    tickets: &TicketStatus,
    notice: Option<Notice>,
    currency: &str,
) -> String {
    let mut body = String::from("<p><a href=\"/events\">&larr; All events</a></p>\n");

    if let Some(notice) = notice {
        let (class, text) = notice.message();
        body.push_str(&format!("<p class=\"{}\">{}</p>\n", class, text));
    }

    body.push_str(&format!("<h1>{}</h1>\n", escape(&event.name)));
    if !event.date.is_empty() {
        body.push_str(&format!("<p><strong>{}</strong></p>\n", escape(&format_date(&event.date))));
    }
    if let Some(src) = safe_url(&event.image_url) {
        body.push_str(&format!(
            "<img class=\"hero\" src=\"{}\" alt=\"{}\">\n",
            src,
            escape(&event.name)
        ));
    }
    for paragraph in event.description.split("\n\n").filter(|p| !p.trim().is_empty()) {
        body.push_str(&format!("<p>{}</p>\n", escape(paragraph.trim()).replace('\n', "<br>")));
    }

    body.push_str(&tickets_section(event, tickets, currency));
    body.push_str(&guestbook_form(&event.id));

    layout(&event.name, &body)
}

fn tickets_section(event: &Event, tickets: &TicketStatus, currency: &str) -> String {
    let mut section = String::from("<section class=\"tickets\">\n<h2>Tickets</h2>\n");
    match tickets {
        TicketStatus::Free => section.push_str("<p>Free event. Just show up!</p>\n"),
        TicketStatus::Unavailable => {
            if let Some(price) = event.price.filter(|p| *p > 0.0) {
                section.push_str(&format!("<p>Price: {}</p>\n", escape(&format_price(price, currency))));
            }
            section.push_str("<p>Tickets are not available right now.</p>\n");
        }
        TicketStatus::Links(offers) => {
            section.push_str("<ul>\n");
            for offer in offers {
                let label = match offer.price {
                    Some(price) => format!("{} ({})", offer.name, format_price(price, currency)),
                    None => offer.name.clone(),
                };
                let item = match safe_url(&offer.url) {
                    Some(href) => format!(
                        "<li>{} &mdash; <a href=\"{}\">Buy ticket</a></li>\n",
                        escape(&label),
                        href
                    ),
                    None => format!("<li>{}</li>\n", escape(&label)),
                };
                section.push_str(&item);
            }
            section.push_str("</ul>\n");
        }
    }
    section.push_str("</section>\n");
    section
}

fn guestbook_form(event_id: &str) -> String {
    format!(
        r#"<section class="guestbook">
<h2>Sign the guestbook</h2>
<form method="post" action="/api/guestbook">
<input type="hidden" name="event_id" value="{event_id}">
<label>Name <input name="name" required></label>
<label>Email <input type="email" name="email" required></label>
<label>Phone <input type="tel" name="phone"></label>
<label>Preferred contact
<select name="contact_preference">
<option>Email</option>
<option>Phone</option>
<option>Text</option>
</select>
</label>
<label>Membership
<select name="membership">
<option>Guest</option>
<option>Member</option>
</select>
</label>
<label>Message <textarea name="message" rows="4"></textarea></label>
<button type="submit">Sign</button>
</form>
</section>
"#,
        event_id = escape(event_id)
    )
}

pub fn not_found_page() -> String {
    layout(
        "Not found",
        "<h1>Not found</h1>\n<p>We couldn't find that page. <a href=\"/events\">See all events</a>.</p>\n",
    )
}

pub fn method_not_allowed_page() -> String {
    layout("Method not allowed", "<h1>Method not allowed</h1>\n")
}

/// Error page that echoes the request input. `secrets` is rendered masked to the
/// last 4 characters and should be empty unless debug pages are enabled.
pub fn debug_page(
    status: u16,
    error: &str,
    input: &[(String, String)],
    secrets: &[(&str, &str)],
) -> String {
    let mut body = format!("<h1>Error {}</h1>\n<p>{}</p>\n", status, escape(error));

    if !input.is_empty() {
        body.push_str("<h2>Input</h2>\n<pre>");
        for (key, value) in input {
            body.push_str(&format!("{} = {}\n", escape(key), escape(value)));
        }
        body.push_str("</pre>\n");
    }

    if !secrets.is_empty() {
        body.push_str("<h2>Configuration</h2>\n<pre>");
        for (name, value) in secrets {
            body.push_str(&format!("{} = {}\n", escape(name), escape(&mask_secret(value))));
        }
        body.push_str("</pre>\n");
    }

    body.push_str("<p><a href=\"/events\">Back to events</a></p>\n");
    layout(&format!("Error {}", status), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketOffer;

    fn event() -> Event {
        Event {
            id: "evt-1".to_string(),
            name: "Tom & Jerry's <Party>".to_string(),
            description: "First line\nsecond line\n\nNew paragraph".to_string(),
            date: "2026-05-01".to_string(),
            image_url: "https://img/party.png".to_string(),
            price: Some(20.0),
            ticket_link: None,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2026-05-01"), "May 1, 2026");
        assert_eq!(
            format_date("2026-05-01T19:30:00.000-04:00"),
            "May 1, 2026 at 7:30 PM"
        );
        assert_eq!(format_date("sometime"), "sometime");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(12.5, "usd"), "$12.50");
        assert_eq!(format_price(3.0, "chf"), "3.00 CHF");
    }

    #[test]
    fn test_notice_from_query() {
        assert_eq!(Notice::from_query(Some("thanks"), None), Some(Notice::Thanks));
        assert_eq!(
            Notice::from_query(Some("error"), Some("schema")),
            Some(Notice::SchemaError)
        );
        assert_eq!(Notice::from_query(Some("error"), None), Some(Notice::Error));
        assert_eq!(Notice::from_query(Some("other"), None), None);
        assert_eq!(Notice::from_query(None, Some("schema")), None);
    }

    #[test]
    fn test_catalog_page_lists_events_escaped() {
        let html = catalog_page(&[event()]);
        assert!(html.contains(r#"<a href="/events/evt-1">Tom &amp; Jerry&#39;s &lt;Party&gt;</a>"#));
        assert!(html.contains("May 1, 2026"));
        assert!(html.contains(r#"src="https://img/party.png""#));
    }

    #[test]
    fn test_catalog_article_markup() {
        let mut e = event();
        e.name = "Gala".to_string();
        e.image_url = String::new();
        e.date = String::new();
        assert!(catalog_page(&[e]).contains(
            "<article class=\"event\">\n<h2><a href=\"/events/evt-1\">Gala</a></h2>\n</article>\n"
        ));
    }

    #[test]
    fn test_catalog_page_empty_state() {
        assert!(catalog_page(&[]).contains("No events are scheduled"));
    }

    #[test]
    fn test_event_page_free() {
        let html = event_page(&event(), &TicketStatus::Free, None, "usd");
        assert!(html.contains("Free event"));
        assert!(!html.contains("Buy ticket"));
        assert!(html.contains(r#"name="event_id" value="evt-1""#));
        assert!(html.contains("First line<br>second line"));
    }

    #[test]
    fn test_event_page_links_and_notice() {
        let tickets = TicketStatus::Links(vec![TicketOffer {
            name: "Adult".to_string(),
            price: Some(12.5),
            url: "https://buy.stripe.com/test_1".to_string(),
        }]);
        let html = event_page(&event(), &tickets, Some(Notice::Thanks), "usd");
        assert!(html.contains(r#"Adult ($12.50) &mdash; <a href="https://buy.stripe.com/test_1">Buy ticket</a>"#));
        assert!(html.contains("Thanks for signing the guestbook!"));
    }

    #[test]
    fn test_event_page_unavailable_shows_price_only() {
        let html = event_page(&event(), &TicketStatus::Unavailable, Some(Notice::SchemaError), "usd");
        assert!(html.contains("Price: $20.00"));
        assert!(html.contains("not available right now"));
        assert!(html.contains("guestbook is being updated"));
    }

    #[test]
    fn test_unsafe_urls_are_dropped() {
        let mut e = event();
        e.image_url = "javascript:alert(1)".to_string();
        let html = event_page(&e, &TicketStatus::Free, None, "usd");
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn test_debug_page_masks_secrets() {
        let input = vec![("name".to_string(), "<b>Ada</b>".to_string())];
        let html = debug_page(
            500,
            "Notion error",
            &input,
            &[("NOTION_TOKEN", "secret_abcdefWXYZ")],
        );
        assert!(html.contains("name = &lt;b&gt;Ada&lt;/b&gt;"));
        assert!(html.contains("NOTION_TOKEN = ****WXYZ"));
        assert!(!html.contains("secret_abcdef"));
    }

    #[test]
    fn test_debug_page_without_secrets() {
        let html = debug_page(400, "missing fields", &[], &[]);
        assert!(html.contains("Error 400"));
        assert!(!html.contains("Configuration"));
    }
}
