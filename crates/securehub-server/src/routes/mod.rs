pub mod health;

use std::sync::Arc;

use axum::Router;
use securehub_service::AttachmentService;

pub struct InnerAppState {
    pub service: Arc<AttachmentService>,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    Router::new().merge(health::routes()).with_state(state)
}
