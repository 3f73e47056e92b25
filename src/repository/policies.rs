//! Circulation policy repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use super::with_retry;
use crate::{
    error::{AppError, AppResult},
    models::{CirculationPolicy, NewPolicy},
};

#[derive(Clone)]
pub struct PoliciesRepository {
    pool: Pool<Postgres>,
}

impl PoliciesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// The policy in force at `at`: the active row with the latest
    /// `effective_from` not after `at`.
    pub async fn active_at(&self, at: DateTime<Utc>) -> AppResult<CirculationPolicy> {
        let pool = &self.pool;
        with_retry("policies.active_at", || async move {
            sqlx::query_as::<_, CirculationPolicy>(
                r#"
                SELECT * FROM circulation_policies
                WHERE active AND effective_from <= $1
                ORDER BY effective_from DESC
                LIMIT 1
                "#,
            )
            .bind(at)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                AppError::Internal("No active circulation policy configured".to_string())
            })
        })
        .await
    }

    /// Record a new policy version, effective from the given instant (or now)
    pub async fn insert(&self, policy: &NewPolicy) -> AppResult<CirculationPolicy> {
        let pool = &self.pool;
        let effective_from = policy.effective_from.unwrap_or_else(Utc::now);
        with_retry("policies.insert", || async move {
            let created = sqlx::query_as::<_, CirculationPolicy>(
                r#"
                INSERT INTO circulation_policies
                    (default_loan_days, fine_per_day, max_borrow_limit, max_renewals, effective_from, active)
                VALUES ($1, $2, $3, $4, $5, TRUE)
                RETURNING *
                "#,
            )
            .bind(policy.default_loan_days)
            .bind(policy.fine_per_day)
            .bind(policy.max_borrow_limit)
            .bind(policy.max_renewals)
            .bind(effective_from)
            .fetch_one(pool)
            .await?;
            Ok(created)
        })
        .await
    }

    /// Seed the first policy row from configuration when the table is empty.
    /// Called once at startup; a populated table is left untouched.
    pub async fn seed_default(
        &self,
        default_loan_days: i32,
        fine_per_day: Decimal,
        max_borrow_limit: i32,
        max_renewals: i16,
    ) -> AppResult<()> {
        let pool = &self.pool;
        let rows = with_retry("policies.seed_default", || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO circulation_policies
                    (default_loan_days, fine_per_day, max_borrow_limit, max_renewals, effective_from, active)
                SELECT $1, $2, $3, $4, NOW(), TRUE
                WHERE NOT EXISTS (SELECT 1 FROM circulation_policies)
                "#,
            )
            .bind(default_loan_days)
            .bind(fine_per_day)
            .bind(max_borrow_limit)
            .bind(max_renewals)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if rows == 1 {
            tracing::info!("Seeded initial circulation policy from configuration");
        }
        Ok(())
    }
}
