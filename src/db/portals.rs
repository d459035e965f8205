use crate::core::AppError;
use crate::models::portals::{Portal, PortalTitle};
use chrono::Utc;
use sqlx::MySqlPool;
use uuid::Uuid;

const PORTAL_COLUMNS: &str =
    "id, owner_id, title, description, is_public, created_at, updated_at, deleted_at";

pub async fn create_portal(
    pool: &MySqlPool,
    owner_id: i32,
    title: &PortalTitle,
    description: Option<&str>,
    is_public: bool,
) -> Result<Portal, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO tbl_portals (id, owner_id, title, description, is_public, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(owner_id)
    .bind(title.as_ref())
    .bind(description)
    .bind(is_public)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    get_portal(pool, &id)
        .await?
        .ok_or_else(|| AppError::internal_error("Failed to read back created portal"))
}

pub async fn get_portal(pool: &MySqlPool, portal_id: &str) -> Result<Option<Portal>, AppError> {
    let portal = sqlx::query_as::<_, Portal>(&format!(
        "SELECT {} FROM tbl_portals WHERE id = ? AND deleted_at IS NULL",
        PORTAL_COLUMNS
    ))
    .bind(portal_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(portal)
}

/// Elevated callers see every portal; everyone else sees public portals plus
/// their own.
pub async fn list_portals(
    pool: &MySqlPool,
    caller_id: i32,
    elevated: bool,
) -> Result<Vec<Portal>, AppError> {
    let portals = if elevated {
        sqlx::query_as::<_, Portal>(&format!(
            "SELECT {} FROM tbl_portals WHERE deleted_at IS NULL ORDER BY created_at DESC",
            PORTAL_COLUMNS
        ))
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, Portal>(&format!(
            "SELECT {} FROM tbl_portals WHERE deleted_at IS NULL AND (is_public = 1 OR owner_id = ?) ORDER BY created_at DESC",
            PORTAL_COLUMNS
        ))
        .bind(caller_id)
        .fetch_all(pool)
        .await
    }
    .map_err(AppError::db_error)?;

    Ok(portals)
}

pub async fn update_portal(
    pool: &MySqlPool,
    portal_id: &str,
    title: Option<&PortalTitle>,
    description: Option<&str>,
    is_public: Option<bool>,
) -> Result<Portal, AppError> {
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        UPDATE tbl_portals
        SET title = COALESCE(?, title),
            description = COALESCE(?, description),
            is_public = COALESCE(?, is_public),
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(title.map(|t| t.as_ref().to_string()))
    .bind(description)
    .bind(is_public)
    .bind(now)
    .bind(portal_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    get_portal(pool, portal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Portal not found"))
}

pub async fn soft_delete_portal(pool: &MySqlPool, portal_id: &str) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query(
        "UPDATE tbl_portals SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(portal_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Portal not found"));
    }

    Ok(())
}
