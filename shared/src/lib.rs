//! Shared library for the events site Lambda.
//!
//! Notion holds the events, tickets, guests and comments; Stripe sells the
//! tickets. This crate provides the clients for both, the domain logic that
//! sits between them, and the HTML the site serves.

pub mod catalog;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "fakes"))]
pub mod fakes;
pub mod guestbook;
pub mod http;
pub mod models;
pub mod notion;
pub mod render;
pub mod secrets;
pub mod stripe;
pub mod tickets;

pub use config::Config;
pub use error::{Error, Result};
pub use guestbook::{GuestbookForm, Submission};
pub use models::{Event, Ticket, TicketOffer, TicketStatus};
pub use notion::{DocumentStore, NotionClient};
pub use secrets::Credentials;
pub use stripe::{Payments, StripeClient};
pub use tickets::LinkMemo;
