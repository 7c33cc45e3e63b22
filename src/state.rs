use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::AppConfig;
use crate::repository::{demo_listing, MemoryReservationStore, PgReservationStore, Store};
use crate::services::notifications::Notifier;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub notifier: Notifier,
}

impl AppState {
    /// Connect the reservation store named by the configuration.
    pub async fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = match config.database_url.as_deref() {
            Some(database_url) => {
                let store = PgReservationStore::connect(&config, database_url).await?;
                tracing::info!("Connected to PostgreSQL reservation store");
                Store::Postgres(store)
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL is not set, bookings are kept in memory and lost on restart"
                );
                let store = MemoryReservationStore::new();
                if config.demo_seed_runtime() {
                    let listing = demo_listing();
                    tracing::info!(listing_id = %listing.id, "Seeded demo listing");
                    store.put_listing(listing).await;
                }
                Store::Memory(store)
            }
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self::with_store(config, store, http_client))
    }

    pub fn with_store(config: AppConfig, store: Store, http_client: reqwest::Client) -> Self {
        let notifier = Notifier::from_config(&config, http_client);
        Self {
            config: Arc::new(config),
            store,
            notifier,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.config.today()
    }
}
