//! Circulation policy service

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{CirculationPolicy, NewPolicy},
    repository::CirculationStore,
};

#[derive(Clone)]
pub struct PolicyService {
    store: Arc<dyn CirculationStore>,
}

impl PolicyService {
    pub fn new(store: Arc<dyn CirculationStore>) -> Self {
        Self { store }
    }

    /// The policy currently in force
    pub async fn current(&self) -> AppResult<CirculationPolicy> {
        self.store.active_policy(Utc::now()).await
    }

    /// Publish a new policy version. Existing versions stay in place for
    /// audit; the effective date decides which record wins at read time.
    pub async fn publish(&self, policy: NewPolicy) -> AppResult<CirculationPolicy> {
        if policy.default_loan_days <= 0 {
            return Err(AppError::Validation(
                "default_loan_days must be positive".to_string(),
            ));
        }
        if policy.fine_per_day < Decimal::ZERO {
            return Err(AppError::Validation(
                "fine_per_day must not be negative".to_string(),
            ));
        }
        if policy.max_borrow_limit <= 0 || policy.max_renewals < 0 {
            return Err(AppError::Validation(
                "max_borrow_limit must be positive and max_renewals non-negative".to_string(),
            ));
        }
        let created = self.store.insert_policy(&policy).await?;
        tracing::info!(
            "Published circulation policy {} effective {}",
            created.id,
            created.effective_from
        );
        Ok(created)
    }
}
