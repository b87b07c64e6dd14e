use anyhow::{Context, Result};
use devfaq_api::{routes::create_router, AppState, Config};
use devfaq_shared::db;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "devfaq_api=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("loading configuration")?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("connecting to the database")?;
    db::run_migrations(&pool)
        .await
        .context("running migrations")?;

    let bind_address = config.bind_address.clone();
    let app = create_router(AppState::new(pool, config));

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("devfaq listening on {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
