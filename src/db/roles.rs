use std::collections::BTreeMap;

use crate::core::authorizer::SUPER_ADMIN;
use crate::core::AppError;
use crate::models::roles::{Role, RoleWithPermissions};
use sqlx::{MySqlPool, Row};

pub async fn get_all_roles(pool: &MySqlPool) -> Result<Vec<RoleWithPermissions>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.name, r.description, p.name AS permission
        FROM tbl_roles r
        LEFT JOIN tbl_role_permissions rp ON rp.role_id = r.id
        LEFT JOIN tbl_permissions p ON p.id = rp.permission_id
        ORDER BY r.name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    let mut roles: BTreeMap<i32, RoleWithPermissions> = BTreeMap::new();
    for row in rows {
        let id: i32 = row.try_get("id").map_err(AppError::db_error)?;
        let entry = roles.entry(id).or_insert(RoleWithPermissions {
            id,
            name: row.try_get("name").map_err(AppError::db_error)?,
            description: row.try_get("description").map_err(AppError::db_error)?,
            permissions: Vec::new(),
        });
        let permission: Option<String> = row.try_get("permission").map_err(AppError::db_error)?;
        if let Some(permission) = permission {
            entry.permissions.push(permission);
        }
    }

    Ok(roles.into_values().collect())
}

pub async fn get_role_by_name(pool: &MySqlPool, name: &str) -> Result<Option<Role>, AppError> {
    let role =
        sqlx::query_as::<_, Role>("SELECT id, name, description FROM tbl_roles WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(AppError::db_error)?;

    Ok(role)
}

pub async fn get_user_roles(pool: &MySqlPool, user_id: i32) -> Result<Vec<String>, AppError> {
    let names = sqlx::query_scalar::<_, String>(
        r#"
        SELECT r.name
        FROM tbl_user_roles ur
        JOIN tbl_roles r ON r.id = ur.role_id
        WHERE ur.user_id = ?
        ORDER BY r.name ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(names)
}

/// True when one of the caller's roles grants the permission. SuperAdmin
/// short-circuits without consulting the permission table.
pub async fn user_has_permission(
    pool: &MySqlPool,
    user_id: i32,
    permission: &str,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM tbl_user_roles ur
        JOIN tbl_roles r ON r.id = ur.role_id
        LEFT JOIN tbl_role_permissions rp ON rp.role_id = r.id
        LEFT JOIN tbl_permissions p ON p.id = rp.permission_id
        WHERE ur.user_id = ? AND (r.name = ? OR p.name = ?)
        "#,
    )
    .bind(user_id)
    .bind(SUPER_ADMIN)
    .bind(permission)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(count > 0)
}

pub async fn assign_role(pool: &MySqlPool, user_id: i32, role_id: i32) -> Result<(), AppError> {
    let existing_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tbl_user_roles WHERE user_id = ? AND role_id = ?",
    )
    .bind(user_id)
    .bind(role_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)?;

    if existing_count > 0 {
        return Ok(());
    }

    sqlx::query("INSERT INTO tbl_user_roles (user_id, role_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await
        .map_err(AppError::db_error)?;

    Ok(())
}

/// Lookup both sides by their unique keys, then assign. Used by the
/// `assign_role` CLI and the admin endpoint.
pub async fn assign_role_by_email(
    pool: &MySqlPool,
    email: &str,
    role_name: &str,
) -> Result<(), AppError> {
    let user = crate::db::users::get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let role = get_role_by_name(pool, role_name)
        .await?
        .ok_or_else(|| AppError::not_found("Role not found"))?;

    assign_role(pool, user.id, role.id).await
}

/// Mirror directory role names onto local assignments. Unknown role names are
/// skipped; the directory is not authoritative for the portal's role catalog.
pub async fn sync_user_roles(
    pool: &MySqlPool,
    user_id: i32,
    role_names: &[String],
) -> Result<(), AppError> {
    for name in role_names {
        if let Some(role) = get_role_by_name(pool, name).await? {
            assign_role(pool, user_id, role.id).await?;
        } else {
            tracing::warn!("Directory role '{}' has no local counterpart", name);
        }
    }

    Ok(())
}
