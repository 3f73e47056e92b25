//! Circulation policy endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{CirculationPolicy, NewPolicy},
};

use super::AuthenticatedUser;

/// The policy currently in force
#[utoipa::path(
    get,
    path = "/policy",
    tag = "policy",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active circulation policy", body = CirculationPolicy)
    )
)]
pub async fn get_policy(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<CirculationPolicy>> {
    claims.require_librarian()?;

    let policy = state.services.policy.current().await?;
    Ok(Json(policy))
}

/// Publish a new policy version (effective-dated; older versions are kept)
#[utoipa::path(
    post,
    path = "/policy",
    tag = "policy",
    security(("bearer_auth" = [])),
    request_body = NewPolicy,
    responses(
        (status = 201, description = "Policy version published", body = CirculationPolicy),
        (status = 400, description = "Invalid policy values")
    )
)]
pub async fn publish_policy(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(policy): Json<NewPolicy>,
) -> AppResult<(StatusCode, Json<CirculationPolicy>)> {
    claims.require_admin()?;

    let created = state.services.policy.publish(policy).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
