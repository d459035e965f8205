use crate::core::AppError;
use crate::models::collaborators::{
    AddCollaboratorRequest, CollaborationStatus, PortalCollaborator, UpdateCollaboratorRequest,
};
use chrono::Utc;
use sqlx::MySqlPool;

const COLLABORATOR_COLUMNS: &str =
    "id, portal_id, user_id, permissions, status, starts_on, ends_on, created_at, updated_at";

/// One row per (portal, user). Adding an existing collaborator refreshes the
/// permission set and dates instead of inserting a duplicate.
pub async fn add_collaborator(
    pool: &MySqlPool,
    portal_id: &str,
    request: &AddCollaboratorRequest,
) -> Result<PortalCollaborator, AppError> {
    let now = Utc::now().naive_utc();
    let permissions = serde_json::to_value(&request.permissions)
        .map_err(|e| AppError::internal_error(format!("Failed to encode permissions: {}", e)))?;

    let existing_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tbl_portal_collaborators WHERE portal_id = ? AND user_id = ?",
    )
    .bind(portal_id)
    .bind(request.user_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)?;

    if existing_count > 0 {
        sqlx::query(
            r#"
            UPDATE tbl_portal_collaborators
            SET permissions = ?, starts_on = ?, ends_on = ?, updated_at = ?
            WHERE portal_id = ? AND user_id = ?
            "#,
        )
        .bind(&permissions)
        .bind(request.starts_on)
        .bind(request.ends_on)
        .bind(now)
        .bind(portal_id)
        .bind(request.user_id)
        .execute(pool)
        .await
        .map_err(AppError::db_error)?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO tbl_portal_collaborators
            (portal_id, user_id, permissions, status, starts_on, ends_on, created_at, updated_at)
            VALUES (?, ?, ?, 'active', ?, ?, ?, ?)
            "#,
        )
        .bind(portal_id)
        .bind(request.user_id)
        .bind(&permissions)
        .bind(request.starts_on)
        .bind(request.ends_on)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::db_error)?;
    }

    get_collaborator(pool, portal_id, request.user_id)
        .await?
        .ok_or_else(|| AppError::internal_error("Failed to read back collaborator"))
}

pub async fn get_collaborator(
    pool: &MySqlPool,
    portal_id: &str,
    user_id: i32,
) -> Result<Option<PortalCollaborator>, AppError> {
    let collaborator = sqlx::query_as::<_, PortalCollaborator>(&format!(
        "SELECT {} FROM tbl_portal_collaborators WHERE portal_id = ? AND user_id = ?",
        COLLABORATOR_COLUMNS
    ))
    .bind(portal_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(collaborator)
}

pub async fn list_collaborators(
    pool: &MySqlPool,
    portal_id: &str,
) -> Result<Vec<PortalCollaborator>, AppError> {
    let collaborators = sqlx::query_as::<_, PortalCollaborator>(&format!(
        "SELECT {} FROM tbl_portal_collaborators WHERE portal_id = ? ORDER BY created_at ASC",
        COLLABORATOR_COLUMNS
    ))
    .bind(portal_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(collaborators)
}

pub async fn update_collaborator(
    pool: &MySqlPool,
    portal_id: &str,
    user_id: i32,
    request: &UpdateCollaboratorRequest,
) -> Result<PortalCollaborator, AppError> {
    let now = Utc::now().naive_utc();

    let permissions = match &request.permissions {
        Some(permissions) => Some(serde_json::to_value(permissions).map_err(|e| {
            AppError::internal_error(format!("Failed to encode permissions: {}", e))
        })?),
        None => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE tbl_portal_collaborators
        SET status = COALESCE(?, status),
            permissions = COALESCE(?, permissions),
            starts_on = COALESCE(?, starts_on),
            ends_on = COALESCE(?, ends_on),
            updated_at = ?
        WHERE portal_id = ? AND user_id = ?
        "#,
    )
    .bind(request.status.map(|status| match status {
        CollaborationStatus::Active => "active",
        CollaborationStatus::Inactive => "inactive",
        CollaborationStatus::Pending => "pending",
        CollaborationStatus::Revoked => "revoked",
    }))
    .bind(permissions)
    .bind(request.starts_on)
    .bind(request.ends_on)
    .bind(now)
    .bind(portal_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Collaborator not found"));
    }

    get_collaborator(pool, portal_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Collaborator not found"))
}
