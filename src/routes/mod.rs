pub mod api;

use std::sync::Arc;

use crate::scheduler::Scheduler;
use crate::store::FileStore;

/// Shared handles for request handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub scheduler: Arc<Scheduler>,
    pub keep_last: usize,
}
