use crate::core::{AppError, AppErrorType};
use crate::models::documents::NewDocument;
use crate::models::pagination::PaginationQuery;
use crate::models::requests::{
    CreateRequestPayload, PortalRequest, Priority, RequestStatistics, RequestStatus,
    UpdateRequestPayload, UpdateStatusPayload,
};
use chrono::Utc;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use uuid::Uuid;

const REQUEST_COLUMNS: &str = "id, request_uuid, portal_id, submitted_by, priority, status, \
     comments, reason, additional_comment, reviewed_by, reviewed_at, \
     created_at, updated_at, deleted_at";

const TRANSITION_WITH_REVIEW_SQL: &str = "UPDATE tbl_portal_requests \
     SET status = ?, reason = COALESCE(?, reason), \
     additional_comment = COALESCE(?, additional_comment), \
     reviewed_by = ?, reviewed_at = ?, updated_at = ? \
     WHERE id = ?";

const TRANSITION_SQL: &str = "UPDATE tbl_portal_requests \
     SET status = ?, reason = COALESCE(?, reason), \
     additional_comment = COALESCE(?, additional_comment), \
     updated_at = ? \
     WHERE id = ?";

const SOFT_DELETE_REQUEST_SQL: &str =
    "UPDATE tbl_portal_requests SET deleted_at = ?, updated_at = ? WHERE id = ?";

const SOFT_DELETE_DOCUMENTS_SQL: &str = "UPDATE tbl_portal_request_documents \
     SET deleted_at = ? WHERE request_id = ? AND deleted_at IS NULL";

/// A decision transition stamps the reviewer columns in the same UPDATE as the
/// status; every other transition must leave them untouched.
fn transition_update_sql(next: RequestStatus) -> &'static str {
    if next.records_review() {
        TRANSITION_WITH_REVIEW_SQL
    } else {
        TRANSITION_SQL
    }
}

/// SQL literal list of terminal states, used to make the edit guard part of
/// the UPDATE itself rather than a separate check-then-act read.
fn terminal_status_guard() -> String {
    RequestStatus::ALL
        .iter()
        .filter(|status| status.is_terminal())
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Insert the request and its (already stored) document metadata in one
/// transaction. Every new request starts at Pending.
pub async fn create_request(
    pool: &MySqlPool,
    portal_id: &str,
    submitted_by: i32,
    payload: &CreateRequestPayload,
    documents: &[NewDocument],
) -> Result<PortalRequest, AppError> {
    let request_uuid = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let priority = payload.priority.unwrap_or_default();

    let mut tx = pool.begin().await.map_err(AppError::db_error)?;

    let result = sqlx::query(
        r#"
        INSERT INTO tbl_portal_requests
        (request_uuid, portal_id, submitted_by, priority, status, comments, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&request_uuid)
    .bind(portal_id)
    .bind(submitted_by)
    .bind(priority.as_str())
    .bind(RequestStatus::Pending.as_str())
    .bind(&payload.comments)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(AppError::db_error)?;

    let request_id = result.last_insert_id() as i32;

    for document in documents {
        sqlx::query(
            r#"
            INSERT INTO tbl_portal_request_documents
            (request_id, original_name, storage_path, mime_type, size_bytes, extension, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request_id)
        .bind(&document.original_name)
        .bind(&document.storage_path)
        .bind(&document.mime_type)
        .bind(document.size_bytes)
        .bind(&document.extension)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::db_error)?;
    }

    tx.commit().await.map_err(AppError::db_error)?;

    get_request_by_uuid(pool, &request_uuid)
        .await?
        .ok_or_else(|| AppError::internal_error("Failed to read back created request"))
}

pub async fn get_request_by_uuid(
    pool: &MySqlPool,
    request_uuid: &str,
) -> Result<Option<PortalRequest>, AppError> {
    let request = sqlx::query_as::<_, PortalRequest>(&format!(
        "SELECT {} FROM tbl_portal_requests WHERE request_uuid = ? AND deleted_at IS NULL",
        REQUEST_COLUMNS
    ))
    .bind(request_uuid)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(request)
}

pub async fn get_request_by_id(
    pool: &MySqlPool,
    request_id: i32,
) -> Result<Option<PortalRequest>, AppError> {
    let request = sqlx::query_as::<_, PortalRequest>(&format!(
        "SELECT {} FROM tbl_portal_requests WHERE id = ? AND deleted_at IS NULL",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(request)
}

pub async fn list_requests(
    pool: &MySqlPool,
    status: Option<RequestStatus>,
    priority: Option<Priority>,
    portal_id: Option<&str>,
    submitted_by: Option<i32>,
    pagination: &PaginationQuery,
) -> Result<(Vec<PortalRequest>, i64), AppError> {
    let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
        "SELECT {} FROM tbl_portal_requests WHERE deleted_at IS NULL",
        REQUEST_COLUMNS
    ));
    let mut count_builder: QueryBuilder<MySql> =
        QueryBuilder::new("SELECT COUNT(*) FROM tbl_portal_requests WHERE deleted_at IS NULL");

    for builder in [&mut builder, &mut count_builder] {
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = priority {
            builder.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(portal_id) = portal_id {
            builder.push(" AND portal_id = ").push_bind(portal_id);
        }
        if let Some(submitted_by) = submitted_by {
            builder.push(" AND submitted_by = ").push_bind(submitted_by);
        }
    }

    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(pagination.per_page)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let requests = builder
        .build_query_as::<PortalRequest>()
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)?;

    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)?;

    Ok((requests, total))
}

/// The terminal-state guard is part of the UPDATE: a request approved by a
/// concurrent reviewer between the caller's read and this write stays closed.
pub async fn update_request(
    pool: &MySqlPool,
    request_uuid: &str,
    payload: &UpdateRequestPayload,
) -> Result<PortalRequest, AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query(&format!(
        "UPDATE tbl_portal_requests \
         SET comments = ?, priority = ?, updated_at = ? \
         WHERE request_uuid = ? AND deleted_at IS NULL AND status NOT IN ({})",
        terminal_status_guard()
    ))
    .bind(&payload.comments)
    .bind(payload.priority.as_str())
    .bind(now)
    .bind(request_uuid)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(match get_request_by_uuid(pool, request_uuid).await? {
            Some(request) => AppError {
                message: Some(format!(
                    "A request in status '{}' can no longer be edited",
                    request.status.as_str()
                )),
                cause: None,
                error_type: AppErrorType::InvalidTransition,
            },
            None => AppError::not_found("Request not found"),
        });
    }

    get_request_by_uuid(pool, request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))
}

/// Apply a status transition atomically. The current status is re-read under
/// a row lock so a concurrent reviewer cannot race the graph check, and the
/// reviewed_by/reviewed_at stamp lands in the same UPDATE as the status.
pub async fn update_request_status(
    pool: &MySqlPool,
    request_uuid: &str,
    payload: &UpdateStatusPayload,
    acting_user: i32,
) -> Result<PortalRequest, AppError> {
    let now = Utc::now().naive_utc();
    let next = payload.status;

    let mut tx = pool.begin().await.map_err(AppError::db_error)?;

    let row = sqlx::query(
        "SELECT id, status FROM tbl_portal_requests WHERE request_uuid = ? AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(request_uuid)
    .fetch_optional(&mut *tx)
    .await
    .map_err(AppError::db_error)?
    .ok_or_else(|| AppError::not_found("Request not found"))?;

    let request_id: i32 = row.try_get("id").map_err(AppError::db_error)?;
    let current: String = row.try_get("status").map_err(AppError::db_error)?;
    let current: RequestStatus = current.parse().map_err(AppError::internal_error)?;

    if !current.can_transition_to(next) {
        // Dropping the transaction rolls back; the row is left untouched.
        return Err(AppError::invalid_transition(current.as_str(), next.as_str()));
    }

    let mut query = sqlx::query(transition_update_sql(next))
        .bind(next.as_str())
        .bind(payload.reason.as_deref())
        .bind(payload.additional_comment.as_deref());
    if next.records_review() {
        query = query.bind(acting_user).bind(now);
    }
    query
        .bind(now)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::db_error)?;

    tx.commit().await.map_err(AppError::db_error)?;

    get_request_by_uuid(pool, request_uuid)
        .await?
        .ok_or_else(|| AppError::internal_error("Failed to read back updated request"))
}

/// Soft-delete the request and cascade the soft delete onto its documents in
/// the same transaction. No row is physically erased.
pub async fn soft_delete_request(pool: &MySqlPool, request_uuid: &str) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    let mut tx = pool.begin().await.map_err(AppError::db_error)?;

    let request_id: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM tbl_portal_requests WHERE request_uuid = ? AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(request_uuid)
    .fetch_optional(&mut *tx)
    .await
    .map_err(AppError::db_error)?;

    let request_id = request_id.ok_or_else(|| AppError::not_found("Request not found"))?;

    sqlx::query(SOFT_DELETE_REQUEST_SQL)
        .bind(now)
        .bind(now)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::db_error)?;

    sqlx::query(SOFT_DELETE_DOCUMENTS_SQL)
        .bind(now)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::db_error)?;

    tx.commit().await.map_err(AppError::db_error)?;

    Ok(())
}

/// Counts per status and per priority for the given scope. Pure read.
pub async fn request_statistics(
    pool: &MySqlPool,
    submitted_by: Option<i32>,
) -> Result<RequestStatistics, AppError> {
    let mut stats = RequestStatistics::default();

    let mut status_builder: QueryBuilder<MySql> = QueryBuilder::new(
        "SELECT status, COUNT(*) AS total FROM tbl_portal_requests WHERE deleted_at IS NULL",
    );
    if let Some(submitted_by) = submitted_by {
        status_builder
            .push(" AND submitted_by = ")
            .push_bind(submitted_by);
    }
    status_builder.push(" GROUP BY status");

    for row in status_builder
        .build()
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)?
    {
        let status: String = row.try_get("status").map_err(AppError::db_error)?;
        let count: i64 = row.try_get("total").map_err(AppError::db_error)?;
        let status: RequestStatus = status.parse().map_err(AppError::internal_error)?;
        stats.record_status(status, count);
    }

    let mut priority_builder: QueryBuilder<MySql> = QueryBuilder::new(
        "SELECT priority, COUNT(*) AS total FROM tbl_portal_requests WHERE deleted_at IS NULL",
    );
    if let Some(submitted_by) = submitted_by {
        priority_builder
            .push(" AND submitted_by = ")
            .push_bind(submitted_by);
    }
    priority_builder.push(" GROUP BY priority");

    for row in priority_builder
        .build()
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)?
    {
        let priority: String = row.try_get("priority").map_err(AppError::db_error)?;
        let count: i64 = row.try_get("total").map_err(AppError::db_error)?;
        let priority: Priority = priority.parse().map_err(AppError::internal_error)?;
        stats.record_priority(priority, count);
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    #[test]
    fn review_decisions_stamp_the_reviewer_columns_in_the_same_update() {
        for status in [Approved, Rejected] {
            let sql = transition_update_sql(status);
            assert!(sql.contains("reviewed_by = ?"));
            assert!(sql.contains("reviewed_at = ?"));
            assert!(sql.contains("status = ?"));
        }
    }

    #[test]
    fn other_transitions_leave_the_reviewer_columns_untouched() {
        for status in [Pending, UnderReview, Cancelled, Completed] {
            let sql = transition_update_sql(status);
            assert!(!sql.contains("reviewed_by"));
            assert!(!sql.contains("reviewed_at"));
        }
    }

    #[test]
    fn request_deletion_cascades_to_documents_without_erasing_rows() {
        // Both statements are logical deletes; nothing is ever DELETEd.
        assert!(SOFT_DELETE_REQUEST_SQL.starts_with("UPDATE tbl_portal_requests"));
        assert!(SOFT_DELETE_REQUEST_SQL.contains("deleted_at = ?"));
        assert!(SOFT_DELETE_DOCUMENTS_SQL.starts_with("UPDATE tbl_portal_request_documents"));
        assert!(SOFT_DELETE_DOCUMENTS_SQL.contains("deleted_at = ?"));
        assert!(SOFT_DELETE_DOCUMENTS_SQL.contains("request_id = ?"));
    }

    #[test]
    fn the_edit_guard_excludes_exactly_the_terminal_states() {
        assert_eq!(
            terminal_status_guard(),
            "'Rejected', 'Cancelled', 'Completed'"
        );
    }
}
