use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use beanstore_core::{BeanUpdate, NewBean, ValidationError};
use beanstore_db::BeanRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct BeanItem {
    id: i64,
    name: String,
    cost: String,
    description: String,
    colour: String,
    image: Option<String>,
    is_featured: bool,
    sort_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BeanRow> for BeanItem {
    fn from(row: BeanRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            cost: row.cost,
            description: row.description,
            colour: row.colour,
            image: row.image,
            is_featured: row.is_featured,
            sort_index: row.sort_index,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Body of `POST /api/v1/beans`. Everything is optional at the wire level so
/// missing fields come back as validation errors rather than parse failures.
#[derive(Debug, Deserialize)]
pub(super) struct CreateBeanBody {
    name: Option<String>,
    cost: Option<String>,
    description: Option<String>,
    colour: Option<String>,
    image: Option<String>,
    sort_index: Option<i32>,
}

impl From<CreateBeanBody> for NewBean {
    fn from(body: CreateBeanBody) -> Self {
        Self {
            name: body.name.unwrap_or_default(),
            cost: body.cost.unwrap_or_default(),
            description: body.description.unwrap_or_default(),
            colour: body.colour.unwrap_or_default(),
            image: body.image,
            sort_index: body.sort_index.unwrap_or_default(),
            is_featured: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    pub name: Option<String>,
    pub colour: Option<String>,
    pub cost: Option<String>,
}

fn validation_error(request_id: String, error: &ValidationError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

fn bean_not_found(request_id: String, id: i64) -> ApiError {
    ApiError::new(request_id, "not_found", format!("bean {id} not found"))
}

pub(super) async fn list_beans(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<BeanItem>>>, ApiError> {
    let rows = beanstore_db::list_beans(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(BeanItem::from).collect();
    Ok(Json(ApiResponse::new(req_id.0, data)))
}

pub(super) async fn search_beans(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<BeanItem>>>, ApiError> {
    let rows = beanstore_db::search_beans(
        &state.pool,
        beanstore_db::BeanSearchFilters {
            name: query.name.as_deref(),
            colour: query.colour.as_deref(),
            cost: query.cost.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(BeanItem::from).collect();
    Ok(Json(ApiResponse::new(req_id.0, data)))
}

pub(super) async fn get_bean(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<BeanItem>>, ApiError> {
    let row = beanstore_db::get_bean(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| bean_not_found(req_id.0.clone(), id))?;

    Ok(Json(ApiResponse::new(req_id.0, BeanItem::from(row))))
}

pub(super) async fn create_bean(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateBeanBody>,
) -> Result<(StatusCode, Json<ApiResponse<BeanItem>>), ApiError> {
    let bean = NewBean::from(body);
    beanstore_core::validate_new_bean(&bean).map_err(|e| validation_error(req_id.0.clone(), &e))?;

    let row = beanstore_db::insert_bean(&state.pool, &bean)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(bean_id = row.id, name = %row.name, "bean created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0, BeanItem::from(row))),
    ))
}

pub(super) async fn update_bean(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(update): Json<BeanUpdate>,
) -> Result<Json<ApiResponse<BeanItem>>, ApiError> {
    beanstore_core::validate_bean_update(&update)
        .map_err(|e| validation_error(req_id.0.clone(), &e))?;

    let row = match beanstore_db::update_bean(&state.pool, id, &update).await {
        Ok(row) => row,
        Err(beanstore_db::DbError::NotFound) => return Err(bean_not_found(req_id.0, id)),
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    Ok(Json(ApiResponse::new(req_id.0, BeanItem::from(row))))
}

pub(super) async fn delete_bean(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let deleted = beanstore_db::delete_bean(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if !deleted {
        return Err(bean_not_found(req_id.0, id));
    }

    tracing::info!(bean_id = id, "bean deleted");
    Ok(Json(ApiResponse::new(
        req_id.0,
        serde_json::json!({ "deleted": true }),
    )))
}

pub(super) async fn delete_all_beans(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let deleted = beanstore_db::delete_all_beans(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(deleted, "all beans deleted");
    Ok(Json(ApiResponse::new(
        req_id.0,
        serde_json::json!({ "deleted": deleted }),
    )))
}

/// Seeds the store from the configured seed file. A no-op when the store
/// already holds beans.
pub(super) async fn import_beans(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let path = state.seed_path.as_path();
    let beans = beanstore_core::load_seed_file(path).map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "failed to load seed file");
        ApiError::new(req_id.0.clone(), "internal_error", "failed to load seed file")
    })?;

    let imported = beanstore_db::import_beans(&state.pool, &beans)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let total = beanstore_db::count_beans(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(imported, total, "bean import finished");
    Ok(Json(ApiResponse::new(
        req_id.0,
        serde_json::json!({ "imported": imported, "total": total }),
    )))
}
