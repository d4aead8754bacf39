pub mod config;
mod routes;

pub use routes::{build_router, AppState, InnerAppState};

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use securehub_service::AttachmentService;

use config::ServerConfig;

/// Open the database and object store and wire them into the service.
pub async fn build_service(config: &ServerConfig) -> Result<Arc<AttachmentService>> {
    let db = securehub_db::open_database(&config.db_config()).await?;
    let store = securehub_store::create_store(&config.store_config())?;
    let attachments = Arc::new(config.attachment_config());
    Ok(Arc::new(AttachmentService::new(db, store, attachments)))
}

/// Start the reaper in the background and serve HTTP until the listener fails.
pub async fn serve(listener: TcpListener, service: Arc<AttachmentService>) -> Result<()> {
    let reaper = service.reaper();
    let interval = service.config().reaper_interval;
    info!(interval_secs = interval.as_secs(), "starting orphan reaper");
    tokio::spawn(async move { reaper.run(interval).await });

    let app = build_router(Arc::new(InnerAppState { service }));
    axum::serve(listener, app).await?;
    Ok(())
}
