//! Database operations for the `beans` table.
//!
//! None of these write `is_featured` except [`import_beans`], which seeds an
//! empty table. Featured transitions go through [`crate::featured`].

use beanstore_core::{BeanUpdate, NewBean};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const BEAN_COLUMNS: &str = "id, name, cost, description, colour, image, is_featured, sort_index, \
                            created_at, updated_at";

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `beans` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BeanRow {
    pub id: i64,
    pub name: String,
    pub cost: String,
    pub description: String,
    pub colour: String,
    pub image: Option<String>,
    pub is_featured: bool,
    pub sort_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional substring filters for [`search_beans`]. All supplied filters must match.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeanSearchFilters<'a> {
    pub name: Option<&'a str>,
    pub colour: Option<&'a str>,
    pub cost: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns every bean, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_beans(pool: &PgPool) -> Result<Vec<BeanRow>, DbError> {
    let rows = sqlx::query_as::<_, BeanRow>(&format!(
        "SELECT {BEAN_COLUMNS} FROM beans ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a single bean by id, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_bean(pool: &PgPool, id: i64) -> Result<Option<BeanRow>, DbError> {
    let row = sqlx::query_as::<_, BeanRow>(&format!(
        "SELECT {BEAN_COLUMNS} FROM beans WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns the currently featured bean, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_featured_bean(pool: &PgPool) -> Result<Option<BeanRow>, DbError> {
    let row = sqlx::query_as::<_, BeanRow>(&format!(
        "SELECT {BEAN_COLUMNS} FROM beans WHERE is_featured ORDER BY id LIMIT 1"
    ))
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Case-insensitive substring search over name, colour and cost, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_beans(
    pool: &PgPool,
    filters: BeanSearchFilters<'_>,
) -> Result<Vec<BeanRow>, DbError> {
    let name = filters.name.and_then(contains_pattern);
    let colour = filters.colour.and_then(contains_pattern);
    let cost = filters.cost.and_then(contains_pattern);

    let rows = sqlx::query_as::<_, BeanRow>(&format!(
        "SELECT {BEAN_COLUMNS} FROM beans \
         WHERE ($1::TEXT IS NULL OR name ILIKE $1) \
           AND ($2::TEXT IS NULL OR colour ILIKE $2) \
           AND ($3::TEXT IS NULL OR cost ILIKE $3) \
         ORDER BY id"
    ))
    .bind(name)
    .bind(colour)
    .bind(cost)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns the number of beans in the store.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_beans(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM beans")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a bean and returns the stored row. New beans are never featured.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_bean(pool: &PgPool, bean: &NewBean) -> Result<BeanRow, DbError> {
    let row = sqlx::query_as::<_, BeanRow>(&format!(
        "INSERT INTO beans (name, cost, description, colour, image, sort_index, is_featured) \
         VALUES ($1, $2, $3, $4, $5, $6, false) \
         RETURNING {BEAN_COLUMNS}"
    ))
    .bind(bean.name.trim())
    .bind(bean.cost.trim())
    .bind(&bean.description)
    .bind(bean.colour.trim())
    .bind(bean.resolved_image())
    .bind(bean.sort_index)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Overlays the supplied, non-blank fields of `update` onto an existing bean.
///
/// A single `UPDATE … RETURNING` avoids a separate read. `is_featured` is
/// left untouched.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no bean has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn update_bean(pool: &PgPool, id: i64, update: &BeanUpdate) -> Result<BeanRow, DbError> {
    let update = update.normalized();

    let row = sqlx::query_as::<_, BeanRow>(&format!(
        "UPDATE beans \
         SET name        = COALESCE($2, name), \
             cost        = COALESCE($3, cost), \
             description = COALESCE($4, description), \
             colour      = COALESCE($5, colour), \
             image       = COALESCE($6, image), \
             updated_at  = NOW() \
         WHERE id = $1 \
         RETURNING {BEAN_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name)
    .bind(update.cost)
    .bind(update.description)
    .bind(update.colour)
    .bind(update.image)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Deletes one bean. Returns whether a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_bean(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM beans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes every bean. Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_all_beans(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM beans").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Seeds an empty store from a batch of beans.
///
/// Runs in one transaction holding the featured-transition lock plus a
/// table lock, so a concurrent import or selection pass cannot interleave.
/// Does nothing and returns `0` if the store already has beans.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the batch is rolled back.
pub async fn import_beans(pool: &PgPool, beans: &[NewBean]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    crate::featured::lock_featured_transitions(&mut tx).await?;

    sqlx::query("LOCK TABLE beans IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beans")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        tracing::info!(existing, "import skipped; store already has beans");
        return Ok(0);
    }

    for bean in beans {
        sqlx::query(
            "INSERT INTO beans (name, cost, description, colour, image, sort_index, is_featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(bean.name.trim())
        .bind(bean.cost.trim())
        .bind(&bean.description)
        .bind(bean.colour.trim())
        .bind(bean.resolved_image())
        .bind(bean.sort_index)
        .bind(bean.is_featured)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(beans.len())
}

/// Wraps `needle` as an `ILIKE` contains-pattern, escaping wildcards.
/// Blank needles mean "no filter".
fn contains_pattern(needle: &str) -> Option<String> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}
