use std::sync::Arc;

use wassist_gateway::Gateway;
use wassist_memory::MemoryBackend;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// `None` when long-term memory is disabled; memory routes answer 503.
    pub memory: Option<Arc<dyn MemoryBackend>>,
}
