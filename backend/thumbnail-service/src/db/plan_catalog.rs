//! Plan catalog - read-only lookup of a plan's thumbnail heights and flags
//!
//! Passed to the orchestrator as an explicit dependency rather than reached
//! through global state, so tests can substitute fixture catalogs.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Plan, ThumbnailSize, UserPlan};

#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Configured heights of a plan, largest first. Order is load bearing:
    /// the generator downscales progressively from the original.
    async fn sizes_for(&self, plan_id: Uuid) -> Result<Vec<u32>>;

    /// Whether the plan keeps the original image after processing
    async fn allows_retain(&self, plan_id: Uuid) -> Result<bool>;

    /// Whether the plan may expose thumbnails through expiring links
    async fn allows_expiring_link(&self, plan_id: Uuid) -> Result<bool>;
}

/// Postgres-backed plan catalog
#[derive(Clone)]
pub struct PgPlanCatalog {
    pool: PgPool,
}

impl PgPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn plan_by_title(&self, title: &str) -> Result<Option<Plan>> {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, title, keeping_original_image, expiring_link
            FROM plans
            WHERE title = $1
            "#,
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }

    pub async fn plan_titles(&self) -> Result<Vec<String>> {
        let titles = sqlx::query_scalar::<_, String>("SELECT title FROM plans ORDER BY title")
            .fetch_all(&self.pool)
            .await?;

        Ok(titles)
    }

    /// Bind a user to a plan, replacing any existing binding. The unique
    /// constraint on `user_id` keeps this a one-row-per-user operation.
    pub async fn bind_user_plan(&self, user_id: Uuid, plan_id: Uuid) -> Result<UserPlan> {
        let binding = sqlx::query_as::<_, UserPlan>(
            r#"
            INSERT INTO user_plans (user_id, plan_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET plan_id = EXCLUDED.plan_id
            RETURNING id, user_id, plan_id
            "#,
        )
        .bind(user_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(binding)
    }
}

#[async_trait]
impl PlanCatalog for PgPlanCatalog {
    async fn sizes_for(&self, plan_id: Uuid) -> Result<Vec<u32>> {
        let sizes = sqlx::query_as::<_, ThumbnailSize>(
            r#"
            SELECT id, plan_id, height
            FROM thumbnail_sizes
            WHERE plan_id = $1
            ORDER BY height DESC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        // the schema rejects negative heights; anything out of range maps to
        // zero, which the generator refuses
        Ok(sizes
            .into_iter()
            .map(|s| u32::try_from(s.height).unwrap_or(0))
            .collect())
    }

    async fn allows_retain(&self, plan_id: Uuid) -> Result<bool> {
        let keeping = sqlx::query_scalar::<_, bool>(
            "SELECT keeping_original_image FROM plans WHERE id = $1",
        )
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(keeping)
    }

    async fn allows_expiring_link(&self, plan_id: Uuid) -> Result<bool> {
        let expiring = sqlx::query_scalar::<_, bool>("SELECT expiring_link FROM plans WHERE id = $1")
            .bind(plan_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(expiring)
    }
}
