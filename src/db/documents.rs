use crate::core::AppError;
use crate::models::documents::{NewDocument, PortalRequestDocument};
use chrono::Utc;
use sqlx::MySqlPool;

const DOCUMENT_COLUMNS: &str = "id, request_id, original_name, storage_path, mime_type, \
     size_bytes, extension, created_at, deleted_at";

pub async fn insert_document(
    pool: &MySqlPool,
    request_id: i32,
    document: &NewDocument,
) -> Result<PortalRequestDocument, AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query(
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
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    get_document(pool, result.last_insert_id() as i32)
        .await?
        .ok_or_else(|| AppError::internal_error("Failed to read back stored document"))
}

/// Documents in insertion order.
pub async fn list_documents(
    pool: &MySqlPool,
    request_id: i32,
) -> Result<Vec<PortalRequestDocument>, AppError> {
    let documents = sqlx::query_as::<_, PortalRequestDocument>(&format!(
        "SELECT {} FROM tbl_portal_request_documents WHERE request_id = ? AND deleted_at IS NULL ORDER BY id ASC",
        DOCUMENT_COLUMNS
    ))
    .bind(request_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(documents)
}

pub async fn get_document(
    pool: &MySqlPool,
    document_id: i32,
) -> Result<Option<PortalRequestDocument>, AppError> {
    let document = sqlx::query_as::<_, PortalRequestDocument>(&format!(
        "SELECT {} FROM tbl_portal_request_documents WHERE id = ? AND deleted_at IS NULL",
        DOCUMENT_COLUMNS
    ))
    .bind(document_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(document)
}

/// Logical delete only; the stored bytes stay behind as acceptable garbage.
pub async fn soft_delete_document(pool: &MySqlPool, document_id: i32) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query(
        "UPDATE tbl_portal_request_documents SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(document_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Document not found"));
    }

    Ok(())
}
