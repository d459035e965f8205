use crate::core::authorizer::{authorize, USER_ADMIN_ROLES};
use crate::core::jwt_auth::JwtMiddleware;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::roles;
use crate::models::roles::AssignRoleRequest;
use actix_web::{get, post, web, HttpResponse, Responder};
use sqlx::MySqlPool;
use tracing::instrument;

#[instrument(name = "List Roles", skip(pool, _auth))]
#[get("")]
pub async fn get_roles(
    pool: web::Data<MySqlPool>,
    _auth: JwtMiddleware,
) -> Result<impl Responder, AppError> {
    let roles = roles::get_all_roles(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Roles retrieved successfully".to_string(),
        data: roles,
        pagination: None,
    }))
}

#[instrument(name = "Assign Role", skip(pool, auth))]
#[post("/assign")]
pub async fn assign_role(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request: web::Json<AssignRoleRequest>,
) -> Result<impl Responder, AppError> {
    authorize(&auth.claims.roles, &USER_ADMIN_ROLES)?;

    roles::assign_role_by_email(pool.get_ref(), &request.email, &request.role).await?;

    tracing::info!(
        "Role '{}' assigned to '{}' by user {}",
        request.role,
        request.email,
        auth.user_id
    );

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: format!("Role '{}' assigned to {}", request.role, request.email),
        data: (),
        pagination: None,
    }))
}
