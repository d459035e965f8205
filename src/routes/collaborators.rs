use crate::core::authorizer::{authorize, PORTAL_ADMIN_ROLES};
use crate::core::jwt_auth::JwtMiddleware;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{collaborators, portals, users};
use crate::models::collaborators::{AddCollaboratorRequest, UpdateCollaboratorRequest};
use crate::models::portals::Portal;
use actix_web::{get, post, put, web, HttpResponse, Responder};
use sqlx::MySqlPool;
use tracing::instrument;

async fn load_managed_portal(
    pool: &MySqlPool,
    auth: &JwtMiddleware,
    portal_id: &str,
) -> Result<Portal, AppError> {
    let portal = portals::get_portal(pool, portal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Portal not found"))?;

    let allowed = portal.owner_id == Some(auth.user_id)
        || authorize(&auth.claims.roles, &PORTAL_ADMIN_ROLES).is_ok();
    if !allowed {
        return Err(AppError::forbidden_error(
            "Only the portal owner or an administrator can manage collaborators",
        ));
    }

    Ok(portal)
}

#[instrument(name = "Add Collaborator", skip(pool, auth, request))]
#[post("/{portal_id}/collaborators")]
pub async fn add_collaborator(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    portal_id: web::Path<String>,
    request: web::Json<AddCollaboratorRequest>,
) -> Result<impl Responder, AppError> {
    load_managed_portal(pool.get_ref(), &auth, &portal_id).await?;

    // The collaborator must be an existing, active user.
    users::get_user_by_id(pool.get_ref(), request.user_id).await?;

    let collaborator =
        collaborators::add_collaborator(pool.get_ref(), &portal_id, &request).await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse {
        success: true,
        message: "Collaborator added successfully".to_string(),
        data: collaborator,
        pagination: None,
    }))
}

#[instrument(name = "List Collaborators", skip(pool, auth))]
#[get("/{portal_id}/collaborators")]
pub async fn list_collaborators(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    portal_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    load_managed_portal(pool.get_ref(), &auth, &portal_id).await?;

    let collaborators = collaborators::list_collaborators(pool.get_ref(), &portal_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Collaborators retrieved successfully".to_string(),
        data: collaborators,
        pagination: None,
    }))
}

#[instrument(name = "Update Collaborator", skip(pool, auth, request))]
#[put("/{portal_id}/collaborators/{user_id}")]
pub async fn update_collaborator(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    path: web::Path<(String, i32)>,
    request: web::Json<UpdateCollaboratorRequest>,
) -> Result<impl Responder, AppError> {
    let (portal_id, user_id) = path.into_inner();

    load_managed_portal(pool.get_ref(), &auth, &portal_id).await?;

    let collaborator =
        collaborators::update_collaborator(pool.get_ref(), &portal_id, user_id, &request).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Collaborator updated successfully".to_string(),
        data: collaborator,
        pagination: None,
    }))
}
