//! Overdue fine calculation.
//!
//! Pure and deterministic: same inputs, same fine. Damage or loss surcharges
//! are a policy decision layered on top by the caller, never baked in here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const SECS_PER_DAY: i64 = 86_400;

/// Fine for a loan due at `due_date`, evaluated at `reference`.
///
/// Charges `rate_per_day` for every started day past the due date; zero when
/// the reference time is on or before it.
pub fn fine(due_date: DateTime<Utc>, reference: DateTime<Utc>, rate_per_day: Decimal) -> Decimal {
    if reference <= due_date {
        return Decimal::ZERO;
    }
    let late_secs = (reference - due_date).num_seconds();
    let days = (late_secs + SECS_PER_DAY - 1) / SECS_PER_DAY;
    Decimal::from(days) * rate_per_day
}
