use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xau_engine::api::{create_router, AppState};
use xau_engine::config::Settings;
use xau_engine::execution::create_executor;
use xau_engine::market::MarketDataClient;
use xau_engine::notify::EmailNotifier;
use xau_engine::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv::dotenv().is_err() {
        warn!("no .env file found, using process environment");
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xau_engine=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    info!("starting XAU trading engine");

    let settings = Settings::new()?;
    info!("configuration loaded");

    let pool = Store::create_pool(&settings.database).await?;
    let store = Store::new(pool);
    store.test_connection().await?;
    info!("✅ store connection established");

    let market = Arc::new(MarketDataClient::new(&settings.market_data)?);
    let executor = create_executor(&settings.provider, store.clone(), market.clone())?;
    info!(provider = executor.name(), "execution provider ready");

    let notifier = Arc::new(EmailNotifier::new(&settings.email)?);
    if !notifier.is_configured() {
        info!("email notifications disabled (missing configuration)");
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState {
        settings: Arc::new(settings),
        store,
        market,
        executor,
        notifier,
    };

    // Browser clients hit the action endpoint cross-origin; the CORS layer
    // also answers preflight requests without dispatching any action.
    let app = create_router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 engine listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
