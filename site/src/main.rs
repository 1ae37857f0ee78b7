//! Events Site Lambda - Serves the event catalog, event pages and guestbook.
//!
//! Endpoints:
//! - GET / and GET /events - Event catalog
//! - GET /events/{id} - Event detail, provisions payment links on first view
//! - POST /api/guestbook - Guestbook submission (form-encoded)

mod routes;

use lambda_http::{run, service_fn, Error};
use shared::{Config, Credentials, DocumentStore, LinkMemo, NotionClient, Payments, StripeClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state, built once per Lambda instance.
pub struct AppState {
    pub config: Config,
    pub credentials: Credentials,
    pub store: Arc<dyn DocumentStore>,
    pub payments: Arc<dyn Payments>,
    pub memo: &'static LinkMemo,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let credentials = Credentials::resolve(&config).await?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let store = NotionClient::new(
            http_client.clone(),
            credentials.notion_token.clone(),
            config.notion_api_base.clone(),
        );
        let payments = StripeClient::new(
            http_client,
            credentials.stripe_secret_key.clone(),
            config.stripe_api_base.clone(),
        );

        info!("Events site configured for events database {}", config.events_db);

        Ok(Self {
            config,
            credentials,
            store: Arc::new(store),
            payments: Arc::new(payments),
            memo: LinkMemo::global(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { routes::handler(state, event).await }
    }))
    .await
}
