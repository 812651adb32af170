use anyhow::{Context, Result};

use aerodash_core::{App, AppError, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    aerodash_core::init(&config.logging.filter)?;

    for warning in &config.validate().warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    let mut app = App::new(config).context("Failed to build application")?;
    app.start();

    tracing::info!("aerodash started");

    let locations = app.config().locations.clone();
    for location in &locations {
        let result = app
            .service()
            .fetch_combined(&location.country, &location.state, &location.district)
            .await;

        match result {
            Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            Err(e) => {
                let err = AppError::from(e);
                tracing::error!(
                    "{}/{}/{}: {}",
                    location.country,
                    location.state,
                    location.district,
                    err
                );
                eprintln!(
                    "{}/{}/{}: {}",
                    location.country,
                    location.state,
                    location.district,
                    err.user_message()
                );
            }
        }
    }

    let stats = app.service().cache_stats();
    tracing::info!(
        entries = stats.valid_entries,
        hits = stats.hits,
        misses = stats.misses,
        "Cache statistics"
    );

    // Graceful shutdown
    app.shutdown().await;

    Ok(())
}
