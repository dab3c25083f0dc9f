//! Geocode contacts that were saved without coordinates.
//!
//! Usage: `backfill_coordinates [BATCH_SIZE]` (default 100). Runs until no
//! contact is missing coordinates.

use user_address_api::config::Config;
use user_address_api::db;
use user_address_api::geocoding::{self, AddressParts};

const DEFAULT_BATCH_SIZE: i64 = 100;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    user_address_api::init_tracing(&config.log_level);

    let Some(geocoder) = geocoding::from_config(&config.geocoder)? else {
        return Err("No geocoder configured; set APP_GEOCODER to google or openstreetmap".into());
    };

    let batch_size = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("Invalid batch size: {arg}"))?,
        None => DEFAULT_BATCH_SIZE,
    };

    let pool = user_address_api::connect_database(&config.database_url, 2).await?;

    tracing::info!("Backfilling coordinates with {}", geocoder.name());

    let mut updated = 0usize;
    loop {
        let batch = db::contacts::list_missing_coordinates(&pool, batch_size).await?;
        if batch.is_empty() {
            break;
        }

        for contact in &batch {
            let address = AddressParts {
                street: &contact.street,
                number: &contact.number,
                complement: contact.complement.as_deref(),
                neighborhood: &contact.neighborhood,
                city: &contact.city,
                state: &contact.state,
                cep: &contact.cep,
            };
            let coords = geocoder.locate(&address).await;
            db::contacts::update_coordinates(&pool, contact.id, coords.latitude, coords.longitude)
                .await?;
            updated += 1;
        }

        tracing::info!(updated, "Batch complete");
    }

    tracing::info!(updated, "Backfill finished");
    Ok(())
}
