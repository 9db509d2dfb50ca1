//! Database layer: connection pool, job store and plan catalog

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::Result;

pub mod job_store;
pub mod plan_catalog;

pub use job_store::{JobForProcessing, JobStore, PgJobStore};
pub use plan_catalog::{PgPlanCatalog, PlanCatalog};

/// Create the shared Postgres connection pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}
