use crate::ranking::RankingService;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
///
/// Contains references to shared resources and a cancellation token
/// for graceful shutdown handling.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Weekly ranking refresh and read operations.
    pub ranking: Arc<RankingService>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, ranking: Arc<RankingService>) -> Self {
        Self {
            cancellation_token,
            ranking,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Same shared resources, different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            ranking: Arc::clone(&self.ranking),
        }
    }
}
