//! Application state for the API server.

use std::sync::Arc;

use steeple_core::metrics::MetricsAggregator;
use steeple_storage::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Arc<Database>,
    /// Stateless metrics aggregator (cost model + forecast strategy).
    pub aggregator: Arc<MetricsAggregator>,
}

impl AppState {
    /// Creates application state with the given database.
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            aggregator: Arc::new(MetricsAggregator::new()),
        }
    }

    /// Creates application state with an in-memory database.
    pub fn in_memory() -> Self {
        Self::new(Database::in_memory().expect("Failed to create in-memory database"))
    }

    /// Creates application state with a custom aggregator.
    pub fn with_aggregator(db: Database, aggregator: MetricsAggregator) -> Self {
        Self {
            db: Arc::new(db),
            aggregator: Arc::new(aggregator),
        }
    }
}
