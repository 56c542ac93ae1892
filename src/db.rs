// Connection pool setup.
//
// Sizing constraint: every checkout holds one connection for the whole
// assembly transaction, including the bounded routing call, and webhook
// deliveries plus courier claims arrive in bursts around meal peaks. The
// pool must leave claim traffic headroom while checkouts are in flight;
// deployments tune it per node with DB_POOL_SIZE.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Acquire bound: a courier accept that cannot get a connection must fail
/// fast as a retryable error rather than stall behind saturated checkouts
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Creates the PostgreSQL connection pool for the order core
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
/// * `max_connections` - per-node cap, `None` for the default of 10
pub async fn create_pool(
    database_url: &str,
    max_connections: Option<u32>,
) -> Result<PgPool, sqlx::Error> {
    let max = max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);

    PgPoolOptions::new()
        .max_connections(max)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}
