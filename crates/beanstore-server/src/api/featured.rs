use axum::{extract::State, Extension, Json};
use beanstore_core::SelectionOutcome;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{beans::BeanItem, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SelectionResult {
    outcome: SelectionOutcome,
    featured: Option<BeanItem>,
}

pub(super) async fn get_featured(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<BeanItem>>, ApiError> {
    let row = beanstore_db::get_featured_bean(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "no bean is featured"))?;

    Ok(Json(ApiResponse::new(req_id.0, BeanItem::from(row))))
}

/// Runs one selection pass immediately, through the same transaction the
/// daily scheduler uses. `featured` is the bean this pass picked, or `None`
/// when nothing changed.
pub(super) async fn select_featured(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SelectionResult>>, ApiError> {
    let mut rng = StdRng::from_os_rng();
    let outcome = beanstore_db::run_selection_cycle(&state.pool, &mut rng)
        .await
        .map_err(|e| selection_failed(req_id.0.clone(), &e))?;

    let featured = match outcome.featured_id {
        Some(id) if outcome.changed => beanstore_db::get_bean(&state.pool, id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?
            .map(BeanItem::from),
        _ => None,
    };

    tracing::info!(
        previous = ?outcome.previous_featured_id,
        featured = ?outcome.featured_id,
        changed = outcome.changed,
        "featured: manual selection"
    );

    Ok(Json(ApiResponse::new(
        req_id.0,
        SelectionResult { outcome, featured },
    )))
}

/// Any failed pass is reported as a server error.
fn selection_failed(request_id: String, error: &beanstore_db::DbError) -> ApiError {
    tracing::error!(error = %error, "featured: manual selection failed");
    ApiError::new(request_id, "internal_error", "featured selection failed")
}
