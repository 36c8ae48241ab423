//! Featured-bean transitions.
//!
//! Every pass of the selector runs through [`run_selection_cycle`], whether
//! it was started by the daily scheduler or on demand. A pass is a single
//! transaction: take the transition lock, read the candidates, clear every
//! featured flag, set the chosen one, commit.

use beanstore_core::{plan_selection, Candidate, SelectionOutcome};
use chrono::Utc;
use rand::Rng;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// Key for the transaction-scoped advisory lock that serializes featured
/// transitions across connections.
const FEATURED_TRANSITION_LOCK: i64 = 0x0062_6f74_645f_6c6b;

/// Blocks until this transaction holds the featured-transition lock.
/// Released automatically at commit or rollback.
pub(crate) async fn lock_featured_transitions(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(FEATURED_TRANSITION_LOCK)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Snapshot of `(id, is_featured)` for every bean, ordered by id.
///
/// Rows are read `FOR KEY SHARE`: until the enclosing transaction ends they
/// cannot be deleted, while updates to their descriptive fields still go
/// through. Outside a transaction the lock is released immediately.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_candidates(conn: &mut PgConnection) -> Result<Vec<Candidate>, DbError> {
    let rows = sqlx::query_as::<_, (i64, bool)>(
        "SELECT id, is_featured FROM beans ORDER BY id FOR KEY SHARE",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, is_featured)| Candidate { id, is_featured })
        .collect())
}

/// Apply a featured transition on `conn`.
///
/// With `clear_all` every featured flag is reset first; then
/// `new_featured_id`, if given, is flagged. Callers run this inside a
/// transaction so both steps commit together.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `new_featured_id` no longer exists, or
/// [`DbError::Sqlx`] if a statement fails (including the single-featured
/// unique index rejecting a second flag when `clear_all` is false).
pub async fn apply_featured_transition(
    conn: &mut PgConnection,
    clear_all: bool,
    new_featured_id: Option<i64>,
) -> Result<(), DbError> {
    if clear_all {
        sqlx::query("UPDATE beans SET is_featured = false, updated_at = NOW() WHERE is_featured")
            .execute(&mut *conn)
            .await?;
    }

    if let Some(id) = new_featured_id {
        let result =
            sqlx::query("UPDATE beans SET is_featured = true, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
    }

    Ok(())
}

/// Run one selection cycle against the store.
///
/// Acquires its own pooled connection for the duration of the pass. Returns
/// a no-op outcome (not an error) when no bean is eligible.
///
/// # Errors
///
/// Returns [`DbError`] if the transaction cannot be opened, read, or
/// committed. Nothing is written in that case.
pub async fn run_selection_cycle<R>(pool: &PgPool, rng: &mut R) -> Result<SelectionOutcome, DbError>
where
    R: Rng + Send + ?Sized,
{
    let mut tx = pool.begin().await?;
    lock_featured_transitions(&mut tx).await?;

    let candidates = list_candidates(&mut tx).await?;
    let plan = plan_selection(&candidates, rng);

    if plan.has_integrity_anomaly() {
        tracing::warn!(
            featured_ids = ?plan.featured_before,
            "featured: more than one bean was flagged as featured; clearing all"
        );
    }

    match plan.next_featured {
        Some(next) => {
            apply_featured_transition(&mut tx, true, Some(next)).await?;
            tx.commit().await?;
            tracing::debug!(
                previous = ?plan.previous_featured(),
                next,
                eligible = plan.eligible_count,
                "featured: transition committed"
            );
        }
        None => {
            tx.rollback().await?;
            tracing::debug!(
                total = candidates.len(),
                "featured: no eligible beans; nothing to change"
            );
        }
    }

    Ok(plan.into_outcome(Utc::now()))
}
