use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::{
    app::{UploadMount, build_app},
    blob::LocalBlobStorage,
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    services::auth::AccessGate,
    state::AppState,
    store::{MemoryStore, OrmStore, Store},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let conn = create_orm_conn(url).await?;
            run_migrations(&conn).await?;
            Arc::new(OrmStore::new(conn))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    let blobs = Arc::new(LocalBlobStorage::new(
        &config.upload_dir,
        &config.public_upload_url,
    ));
    let gate = AccessGate::new(&config.auth)?;
    let state = AppState::new(store, blobs, gate);

    let app = build_app(
        state,
        Some(UploadMount {
            url_prefix: config.public_upload_url.clone(),
            dir: config.upload_dir.clone(),
        }),
    );

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
