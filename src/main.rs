//! Storefront checkout service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::http::{router, AppState};
use storefront_checkout::infrastructure::{NatsEventPublisher, NoopPublisher, PgOrderRepository, PgProductCatalog, PgSessionStore};
use storefront_checkout::ports::EventPublisher;
use storefront_checkout::{CartService, CheckoutCoordinator, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsEventPublisher::new(client, config.order_events_subject.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events will not be published");
                Arc::new(NoopPublisher)
            }
        },
        None => Arc::new(NoopPublisher),
    };

    let catalog = Arc::new(PgProductCatalog::new(db.clone()));
    let carts = CartService::new(catalog.clone(), Arc::new(PgSessionStore::new(db.clone())));
    let checkout = CheckoutCoordinator::new(
        carts.clone(),
        catalog,
        Arc::new(PgOrderRepository::new(db)),
        events,
        config.checkout.clone(),
    );

    let app = router(AppState { carts, checkout: Arc::new(checkout) })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(port = config.port, "storefront checkout listening");
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
