use std::collections::BTreeMap;

use crate::core::authorizer::{authorize, MANAGE_PORTALS, PORTAL_ADMIN_ROLES};
use crate::core::jwt_auth::JwtMiddleware;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{portals, roles};
use crate::models::portals::{CreatePortalRequest, Portal, PortalTitle, UpdatePortalRequest};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sqlx::MySqlPool;
use tracing::instrument;

fn parse_title(raw: String) -> Result<PortalTitle, AppError> {
    PortalTitle::parse(raw).map_err(|message| {
        let mut errors = BTreeMap::new();
        errors.insert("title".to_string(), message);
        AppError::validation(errors)
    })
}

fn can_manage_portal(auth: &JwtMiddleware, portal: &Portal) -> bool {
    portal.owner_id == Some(auth.user_id) || authorize(&auth.claims.roles, &PORTAL_ADMIN_ROLES).is_ok()
}

/// Private portals are invisible to everyone but their owner and admins; every
/// read or write against a portal applies this before anything else.
pub(super) fn portal_visible_to(auth: &JwtMiddleware, portal: &Portal) -> bool {
    portal.is_public || can_manage_portal(auth, portal)
}

#[instrument(name = "Create Portal", skip(pool, auth, request))]
#[post("")]
pub async fn create_portal(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request: web::Json<CreatePortalRequest>,
) -> Result<impl Responder, AppError> {
    authorize(&auth.claims.roles, &PORTAL_ADMIN_ROLES)?;

    let request = request.into_inner();
    let title = parse_title(request.title)?;

    let portal = portals::create_portal(
        pool.get_ref(),
        auth.user_id,
        &title,
        request.description.as_deref(),
        request.is_public,
    )
    .await?;

    Ok(HttpResponse::Created().json(AppSuccessResponse {
        success: true,
        message: "Portal created successfully".to_string(),
        data: portal,
        pagination: None,
    }))
}

#[instrument(name = "List Portals", skip(pool, auth))]
#[get("")]
pub async fn get_portals(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
) -> Result<impl Responder, AppError> {
    let elevated = authorize(&auth.claims.roles, &PORTAL_ADMIN_ROLES).is_ok();
    let portals = portals::list_portals(pool.get_ref(), auth.user_id, elevated).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Portals retrieved successfully".to_string(),
        data: portals,
        pagination: None,
    }))
}

#[instrument(name = "Get Portal", skip(pool, auth))]
#[get("/{portal_id}")]
pub async fn get_portal(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    portal_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let portal = portals::get_portal(pool.get_ref(), &portal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Portal not found"))?;

    if !portal_visible_to(&auth, &portal) {
        return Err(AppError::not_found("Portal not found"));
    }

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Portal retrieved successfully".to_string(),
        data: portal,
        pagination: None,
    }))
}

#[instrument(name = "Update Portal", skip(pool, auth, request))]
#[put("/{portal_id}")]
pub async fn update_portal(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    portal_id: web::Path<String>,
    request: web::Json<UpdatePortalRequest>,
) -> Result<impl Responder, AppError> {
    let portal = portals::get_portal(pool.get_ref(), &portal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Portal not found"))?;

    if !can_manage_portal(&auth, &portal) {
        return Err(AppError::forbidden_error(
            "Only the portal owner or an administrator can update a portal",
        ));
    }

    let request = request.into_inner();
    let title = request.title.map(parse_title).transpose()?;

    let portal = portals::update_portal(
        pool.get_ref(),
        &portal_id,
        title.as_ref(),
        request.description.as_deref(),
        request.is_public,
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Portal updated successfully".to_string(),
        data: portal,
        pagination: None,
    }))
}

#[instrument(name = "Delete Portal", skip(pool, auth))]
#[delete("/{portal_id}")]
pub async fn delete_portal(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    portal_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let portal = portals::get_portal(pool.get_ref(), &portal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Portal not found"))?;

    let allowed = can_manage_portal(&auth, &portal)
        || roles::user_has_permission(pool.get_ref(), auth.user_id, MANAGE_PORTALS).await?;
    if !allowed {
        return Err(AppError::forbidden_error(
            "Only the portal owner or an administrator can delete a portal",
        ));
    }

    portals::soft_delete_portal(pool.get_ref(), &portal_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Portal deleted successfully".to_string(),
        data: (),
        pagination: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jwt_auth::JwtClaims;

    fn caller(user_id: i32, roles: &[&str]) -> JwtMiddleware {
        JwtMiddleware {
            user_id,
            claims: JwtClaims {
                sub: user_id.to_string(),
                email: "someone@example.org".to_string(),
                roles: roles.iter().map(|role| role.to_string()).collect(),
                exp: 0,
            },
        }
    }

    fn portal(owner_id: Option<i32>, is_public: bool) -> Portal {
        let now = chrono::Utc::now().naive_utc();
        Portal {
            id: "4b3c64a5-0b36-4c6d-9f2a-1f1a9a1f0c11".to_string(),
            owner_id,
            title: "Intranet migration portal".to_string(),
            description: None,
            is_public,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn a_public_portal_is_visible_to_any_caller() {
        assert!(portal_visible_to(&caller(2, &[]), &portal(Some(1), true)));
    }

    #[test]
    fn a_private_portal_is_hidden_from_unrelated_callers() {
        assert!(!portal_visible_to(
            &caller(2, &["requestor"]),
            &portal(Some(1), false)
        ));
    }

    #[test]
    fn a_private_portal_is_visible_to_its_owner() {
        assert!(portal_visible_to(&caller(1, &[]), &portal(Some(1), false)));
    }

    #[test]
    fn a_private_portal_is_visible_to_admins() {
        assert!(portal_visible_to(
            &caller(2, &["Admin"]),
            &portal(Some(1), false)
        ));
    }
}
