use crate::core::directory::DirectoryIdentity;
use crate::core::AppError;
use crate::db::roles;
use crate::models::users::{directory_account_action, DirectoryAccountAction, User};
use chrono::Utc;
use sqlx::MySqlPool;

const USER_COLUMNS: &str = "id, email, username, password, status, created_at, updated_at";

pub async fn get_user_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM tbl_users WHERE email = ? AND status = 1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(user)
}

/// Email lookup that also sees deactivated rows. The login upsert needs this:
/// email is unique, so a deactivated account must never be re-inserted.
pub async fn get_user_by_email_any_status(
    pool: &MySqlPool,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM tbl_users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(user)
}

pub async fn get_user_by_id(pool: &MySqlPool, user_id: i32) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM tbl_users WHERE id = ? AND status = 1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    user.ok_or_else(|| AppError::not_found("User not found"))
}

/// Create or refresh a user resolved through the directory, then mirror the
/// directory's role names onto the local role assignments.
pub async fn upsert_directory_user(
    pool: &MySqlPool,
    identity: &DirectoryIdentity,
) -> Result<User, AppError> {
    let now = Utc::now().naive_utc();

    let existing = get_user_by_email_any_status(pool, &identity.email).await?;
    let user = match (directory_account_action(existing.as_ref()), existing) {
        (DirectoryAccountAction::Reuse, Some(user)) => user,
        // The directory is authoritative for these accounts: a locally
        // deactivated user who still resolves there comes back active.
        (DirectoryAccountAction::Reactivate, Some(user)) => {
            sqlx::query("UPDATE tbl_users SET status = 1, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(user.id)
                .execute(pool)
                .await
                .map_err(AppError::db_error)?;

            get_user_by_id(pool, user.id).await?
        }
        _ => {
            let result = sqlx::query(
                r#"
                INSERT INTO tbl_users (email, username, password, status, created_at, updated_at)
                VALUES (?, ?, NULL, 1, ?, ?)
                "#,
            )
            .bind(&identity.email)
            .bind(&identity.username)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map_err(AppError::db_error)?;

            get_user_by_id(pool, result.last_insert_id() as i32).await?
        }
    };

    roles::sync_user_roles(pool, user.id, &identity.roles).await?;

    Ok(user)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hash)
        .map_err(|_| AppError::internal_error("Failed to verify credentials"))
}

/// Logical removal only: the row stays for audit, portals the user owned are
/// released (owner_id nulled) in the same transaction.
pub async fn deactivate_user(pool: &MySqlPool, user_id: i32) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    let mut tx = pool.begin().await.map_err(AppError::db_error)?;

    sqlx::query("UPDATE tbl_users SET status = 0, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::db_error)?;

    sqlx::query("UPDATE tbl_portals SET owner_id = NULL, updated_at = ? WHERE owner_id = ?")
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::db_error)?;

    tx.commit().await.map_err(AppError::db_error)?;

    Ok(())
}
