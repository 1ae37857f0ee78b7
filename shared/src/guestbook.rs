//! Guestbook writer: guest records, event attendance and comments.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use validator::Validate;

use crate::models::fields;
use crate::notion::{props, DocumentStore};
use crate::{Config, Error, Result};

/// Comment titles keep only this many characters of the message.
pub const COMMENT_TITLE_LEN: usize = 100;

pub const DEFAULT_CONTACT_PREFERENCE: &str = "Email";
pub const DEFAULT_MEMBERSHIP: &str = "Guest";

/// A guestbook form submission.
#[derive(Debug, Clone, Default, Validate)]
pub struct GuestbookForm {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    pub phone: Option<String>,
    pub contact_preference: Option<String>,
    pub membership: Option<String>,
    pub message: Option<String>,
    #[validate(length(min = 1, message = "event id is required"))]
    pub event_id: String,
}

impl GuestbookForm {
    /// Build from decoded form fields. Values are trimmed; blank optionals become `None`.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let required = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        let optional = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Self {
            name: required("name"),
            email: required("email"),
            phone: optional("phone"),
            contact_preference: optional("contact_preference"),
            membership: optional("membership"),
            message: optional("message"),
            event_id: required("event_id"),
        }
    }

    /// Validate, reporting every failing field by name.
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            let mut names: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|k| k.to_string())
                .collect();
            names.sort();
            Error::Validation(format!("missing or invalid fields: {}", names.join(", ")))
        })
    }

    fn guest_properties(&self, created: &str) -> Value {
        use fields::person as f;

        let mut properties = Map::new();
        properties.insert(f::NAME.to_string(), props::title(&self.name));
        properties.insert(f::EMAIL.to_string(), props::email(&self.email));
        if let Some(phone) = &self.phone {
            properties.insert(f::PHONE.to_string(), props::phone(phone));
        }
        properties.insert(
            f::CONTACT_PREFERENCE.to_string(),
            props::select(
                self.contact_preference
                    .as_deref()
                    .unwrap_or(DEFAULT_CONTACT_PREFERENCE),
            ),
        );
        properties.insert(
            f::MEMBERSHIP.to_string(),
            props::select(self.membership.as_deref().unwrap_or(DEFAULT_MEMBERSHIP)),
        );
        properties.insert(f::CREATED.to_string(), props::date(created));
        Value::Object(properties)
    }
}

fn comment_properties(message: &str, guest_id: &str, event_id: &str) -> Value {
    use fields::comment as f;

    let mut properties = Map::new();
    properties.insert(
        f::TITLE.to_string(),
        props::title(&props::truncate_chars(message, COMMENT_TITLE_LEN)),
    );
    properties.insert(f::MESSAGE.to_string(), props::rich_text(message));
    properties.insert(f::GUEST.to_string(), props::relation(&[guest_id]));
    properties.insert(f::EVENT.to_string(), props::relation(&[event_id]));
    Value::Object(properties)
}

/// What a submission wrote. `warnings` lists secondary writes that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub guest_id: String,
    pub comment_id: Option<String>,
    pub warnings: Vec<String>,
}

/// Record a guestbook entry.
///
/// Only creating the guest is fatal. The attendance relation and the comment
/// are follow-up writes: their failures are logged and reported through
/// `Submission::warnings`, and the guest record is left in place.
pub async fn submit(
    store: &dyn DocumentStore,
    config: &Config,
    form: &GuestbookForm,
) -> Result<Submission> {
    form.check()?;

    let created = Utc::now().to_rfc3339();
    let guest = store
        .create_page(&config.people_db, form.guest_properties(&created))
        .await?;
    info!("Created guest {} for event {}", guest.id, form.event_id);

    let mut submission = Submission {
        guest_id: guest.id.clone(),
        ..Submission::default()
    };

    let mut attendance = Map::new();
    attendance.insert(
        fields::person::EVENTS.to_string(),
        props::relation(&[form.event_id.as_str()]),
    );
    if let Err(e) = store.update_page(&guest.id, Value::Object(attendance)).await {
        warn!("Failed to link guest {} to event {}: {}", guest.id, form.event_id, e);
        submission
            .warnings
            .push(format!("attendance not recorded: {}", e));
    }

    if let Some(message) = &form.message {
        match store
            .create_page(
                &config.comments_db,
                comment_properties(message, &guest.id, &form.event_id),
            )
            .await
        {
            Ok(comment) => submission.comment_id = Some(comment.id),
            Err(e) => {
                warn!("Failed to save comment from guest {}: {}", guest.id, e);
                submission.warnings.push(format!("comment not saved: {}", e));
            }
        }
    }

    Ok(submission)
}
