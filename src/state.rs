use std::sync::Arc;

use crate::{blob::BlobStorage, services::auth::AccessGate, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStorage>,
    pub gate: Arc<AccessGate>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStorage>, gate: AccessGate) -> Self {
        Self {
            store,
            blobs,
            gate: Arc::new(gate),
        }
    }
}
