use std::sync::Arc;

use crate::services::{dispatcher::Dispatcher, worker_pool::WorkerPool};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&pool)),
            pool,
        }
    }
}
