//! Versioned circulation policy (policy-as-data)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Effective-dated circulation policy record.
///
/// The engine reads the active record at call time instead of compiling
/// policy values in, so rate or limit changes take effect without a deploy.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CirculationPolicy {
    pub id: i32,
    pub default_loan_days: i32,
    pub fine_per_day: Decimal,
    pub max_borrow_limit: i32,
    pub max_renewals: i16,
    pub effective_from: DateTime<Utc>,
    pub active: bool,
}

/// New policy version; becomes the active record from `effective_from` on
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewPolicy {
    pub default_loan_days: i32,
    pub fine_per_day: Decimal,
    pub max_borrow_limit: i32,
    pub max_renewals: i16,
    pub effective_from: Option<DateTime<Utc>>,
}
