//! Sample data loader for local development
//!
//! Usage:
//!   cargo run --bin dummydata          # insert the sample site
//!   cargo run --bin dummydata clear    # wipe every table first
//!
//! Everything runs in one transaction.

use anyhow::{bail, Context, Result};
use devfaq_api::{
    auth::hash_password,
    sites::permissions::{PgPermissionStore, TenantPermissionSet},
    Config,
};
use devfaq_shared::{db, PluginKind, SiteRole};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

const SAMPLE_USERNAME: &str = "demo";
const SAMPLE_EMAIL: &str = "demo@devfaq.com";
const SAMPLE_PASSWORD: &str = "devfaq-demo-password";
const SAMPLE_SUBDOMAIN: &str = "python";

async fn clear(conn: &mut PgConnection) -> Result<()> {
    sqlx::query(
        "TRUNCATE plugin_content, user_site_permissions, site_permissions, sites, \
         email_validations, users CASCADE",
    )
    .execute(conn)
    .await
    .context("clearing tables")?;
    tracing::info!("All tables cleared");
    Ok(())
}

async fn insert_sample(conn: &mut PgConnection) -> Result<()> {
    let password_hash = hash_password(SAMPLE_PASSWORD)?;
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(SAMPLE_USERNAME)
    .bind(SAMPLE_EMAIL)
    .bind(&password_hash)
    .fetch_one(&mut *conn)
    .await
    .context("inserting sample user (run with `clear` to reset)")?;

    sqlx::query("INSERT INTO email_validations (user_id, is_validated) VALUES ($1, TRUE)")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let (site_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO sites (subdomain, description, live, created_by)
        VALUES ($1, $2, TRUE, $3)
        RETURNING id
        "#,
    )
    .bind(SAMPLE_SUBDOMAIN)
    .bind("Frequently asked questions about Python")
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .context("inserting sample site")?;

    {
        let mut permissions = TenantPermissionSet::new(PgPermissionStore::new(&mut *conn));
        permissions.create(SAMPLE_SUBDOMAIN).await?;
        permissions
            .grant(user_id, SAMPLE_SUBDOMAIN, &[SiteRole::Owner])
            .await?;
    }

    let content = [
        (
            PluginKind::Faq,
            json!({
                "question": "How do I create a virtual environment?",
                "answer": "Run `python -m venv .venv` and activate it.",
            }),
            false,
        ),
        (
            PluginKind::FeaturedPackage,
            json!({"name": "requests", "url": "https://pypi.org/project/requests/"}),
            false,
        ),
        (
            PluginKind::News,
            json!({"title": "Python 3.13 released", "body": "Draft announcement."}),
            true,
        ),
    ];
    for (plugin, body, draft) in content {
        sqlx::query(
            r#"
            INSERT INTO plugin_content (site_id, author_id, plugin, content, draft)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(site_id)
        .bind(user_id)
        .bind(plugin.as_str())
        .bind(body)
        .bind(draft)
        .execute(&mut *conn)
        .await?;
    }

    tracing::info!(
        username = SAMPLE_USERNAME,
        subdomain = SAMPLE_SUBDOMAIN,
        "Sample data inserted"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dummydata=info,devfaq_api=info".into()),
        )
        .init();

    let clear_first = match std::env::args().nth(1).as_deref() {
        None => false,
        Some("clear") => true,
        Some(other) => bail!("unknown argument `{}`, usage: dummydata [clear]", other),
    };

    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url, 1).await?;
    db::run_migrations(&pool).await?;

    let mut tx = pool.begin().await?;
    if clear_first {
        clear(&mut *tx).await?;
    }
    insert_sample(&mut *tx).await?;
    tx.commit().await?;

    println!(
        "Sample site `{}` owned by `{}` (password `{}`)",
        SAMPLE_SUBDOMAIN, SAMPLE_USERNAME, SAMPLE_PASSWORD
    );
    Ok(())
}
