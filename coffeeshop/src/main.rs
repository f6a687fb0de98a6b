use barista_oauth2::{KeySetCache, TokenValidator};
use clap::Parser;
use coffeeshop::{logging, routes, shutdown, Config, DrinkRepository};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let dotenv = dotenvy::dotenv();
    let config = Config::parse();
    logging::init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(err) if err.not_found() => {}
        Err(err) => {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(error, "ignoring unreadable environment file");
        }
    }

    let validator_config = config.validator();
    let keys = KeySetCache::remote(validator_config.jwks_url(), config.refresh_policy())?;
    tracing::info!(
        jwks_url = %validator_config.jwks_url(),
        issuer = %validator_config.issuer(),
        audience = %validator_config.audience,
        algorithm = %validator_config.algorithm,
        "verifying bearer tokens"
    );
    let refresher = config.refresh_interval().map(|interval| {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "refreshing signing keys in the background"
        );
        keys.spawn_refresh(interval)
    });
    let validator = TokenValidator::new(&validator_config, keys);

    let drinks = DrinkRepository::connect(&config.database_url).await?;
    if config.reset_database {
        drinks.reset_with_samples().await?;
    }

    let app = routes::router(drinks.clone(), validator);

    let listener = TcpListener::bind(config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "coffee shop listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    if let Some(refresher) = refresher {
        refresher.abort();
    }
    drinks.close().await;
    Ok(())
}
