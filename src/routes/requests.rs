use std::str::FromStr;

use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use futures_util::TryStreamExt;
use sqlx::MySqlPool;
use tracing::instrument;
use validator::Validate;

use crate::{
    core::{
        authorizer::{authorize, is_super_admin, APPROVE_REQUEST, MANAGE_USERS, REVIEWER_ROLES},
        jwt_auth::JwtMiddleware,
        AppError, AppErrorType, AppSuccessResponse, LocalStorage,
    },
    db::{portals, requests, roles},
    routes::portals::portal_visible_to,
    models::{
        documents::{validate_attachment, NewDocument, ValidatedAttachment, MAX_DOCUMENT_SIZE},
        pagination::{PaginationMeta, PaginationQuery},
        requests::{
            CreateRequestPayload, PortalRequest, Priority, RequestFilters, RequestStatus,
            StatisticsQuery, UpdateRequestPayload, UpdateStatusPayload,
        },
    },
};

/// Submitter, assigned reviewer and elevated roles can see and act on a
/// request; everyone else gets a 403.
pub(super) fn can_access_request(auth: &JwtMiddleware, request: &PortalRequest) -> bool {
    request.submitted_by == auth.user_id
        || request.reviewed_by == Some(auth.user_id)
        || authorize(&auth.claims.roles, &REVIEWER_ROLES).is_ok()
}

async fn read_field_bytes(
    field: &mut actix_multipart::Field,
    limit: usize,
    what: &str,
) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(|e| AppError {
        message: Some(format!("Failed to read {} field", what)),
        cause: Some(e.to_string()),
        error_type: AppErrorType::PayloadValidationError,
    })? {
        data.extend_from_slice(&chunk);
        if data.len() > limit {
            return Err(AppError {
                message: Some(format!("{} exceeds the maximum allowed size", what)),
                cause: None,
                error_type: AppErrorType::PayloadValidationError,
            });
        }
    }
    Ok(data)
}

async fn read_text_field(
    field: &mut actix_multipart::Field,
    what: &str,
) -> Result<String, AppError> {
    let data = read_field_bytes(field, 64 * 1024, what).await?;
    String::from_utf8(data).map_err(|e| AppError {
        message: Some(format!("Invalid {} encoding", what)),
        cause: Some(e.to_string()),
        error_type: AppErrorType::PayloadValidationError,
    })
}

#[instrument(name = "Create Portal Request", skip(pool, storage, auth, payload))]
#[post("/{portal_id}/requests")]
pub async fn create_request(
    pool: web::Data<MySqlPool>,
    storage: web::Data<LocalStorage>,
    auth: JwtMiddleware,
    portal_id: web::Path<String>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let portal_id = portal_id.into_inner();

    let portal = portals::get_portal(pool.get_ref(), &portal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Portal not found"))?;

    // Same visibility rule as GET /portals/{id}: filing a request must not
    // confirm a private portal's existence to an unrelated caller.
    if !portal_visible_to(&auth, &portal) {
        return Err(AppError::not_found("Portal not found"));
    }

    let mut comments = String::new();
    let mut priority: Option<Priority> = None;
    let mut attachments: Vec<ValidatedAttachment> = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(|e| AppError {
        message: Some("Invalid multipart payload".to_string()),
        cause: Some(e.to_string()),
        error_type: AppErrorType::PayloadValidationError,
    })? {
        let content_disposition = field.content_disposition();
        let field_name = content_disposition.get_name().unwrap_or("").to_string();

        match field_name.as_str() {
            "comments" => {
                comments = read_text_field(&mut field, "comments").await?;
            }
            "priority" => {
                let raw = read_text_field(&mut field, "priority").await?;
                if !raw.is_empty() {
                    priority = Some(Priority::from_str(&raw).map_err(|e| AppError {
                        message: Some(e),
                        cause: None,
                        error_type: AppErrorType::PayloadValidationError,
                    })?);
                }
            }
            "documents" => {
                let filename = field
                    .content_disposition()
                    .get_filename()
                    .ok_or_else(|| AppError {
                        message: Some("Filename is required for document uploads".to_string()),
                        cause: None,
                        error_type: AppErrorType::PayloadValidationError,
                    })?
                    .to_string();

                let content_type = field
                    .content_type()
                    .map(|ct| ct.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let bytes = read_field_bytes(&mut field, MAX_DOCUMENT_SIZE + 1, "document").await?;
                attachments.push(validate_attachment(&filename, bytes, content_type)?);
            }
            _ => {
                // Skip unknown fields
                while field
                    .try_next()
                    .await
                    .map_err(|_| AppError {
                        message: Some("Failed to skip unknown field".to_string()),
                        cause: None,
                        error_type: AppErrorType::PayloadValidationError,
                    })?
                    .is_some()
                {}
            }
        }
    }

    let request_payload = CreateRequestPayload { comments, priority };
    request_payload.validate()?;

    // Bytes land on disk before any metadata row is written; a failed insert
    // leaves orphans, never dangling metadata.
    let mut documents = Vec::with_capacity(attachments.len());
    for attachment in &attachments {
        let storage_path = storage.store(&attachment.bytes, &attachment.original_name)?;
        documents.push(NewDocument {
            original_name: attachment.original_name.clone(),
            storage_path,
            mime_type: attachment.mime_type.clone(),
            size_bytes: attachment.bytes.len() as i64,
            extension: attachment.extension.clone(),
        });
    }

    let request = requests::create_request(
        pool.get_ref(),
        &portal_id,
        auth.user_id,
        &request_payload,
        &documents,
    )
    .await?;

    tracing::info!(
        "Request {} created against portal {} by user {}",
        request.request_uuid,
        portal_id,
        auth.user_id
    );

    Ok(HttpResponse::Created().json(AppSuccessResponse {
        success: true,
        message: "Request submitted successfully".to_string(),
        data: request,
        pagination: None,
    }))
}

#[instrument(name = "List Portal Requests", skip(pool, auth))]
#[get("")]
pub async fn list_requests(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    filters: web::Query<RequestFilters>,
    mut pagination: web::Query<PaginationQuery>,
) -> Result<impl Responder, AppError> {
    pagination.validate();

    let status = filters
        .status
        .as_deref()
        .map(RequestStatus::from_str)
        .transpose()
        .map_err(|e| AppError {
            message: Some(e),
            cause: None,
            error_type: AppErrorType::PayloadValidationError,
        })?;
    let priority = filters
        .priority
        .as_deref()
        .map(Priority::from_str)
        .transpose()
        .map_err(|e| AppError {
            message: Some(e),
            cause: None,
            error_type: AppErrorType::PayloadValidationError,
        })?;

    // Callers without a reviewer-grade role only ever see their own requests.
    let elevated = authorize(&auth.claims.roles, &REVIEWER_ROLES).is_ok();
    let submitted_by = if filters.mine || !elevated {
        Some(auth.user_id)
    } else {
        None
    };

    let (requests, total) = requests::list_requests(
        pool.get_ref(),
        status,
        priority,
        filters.portal_id.as_deref(),
        submitted_by,
        &pagination,
    )
    .await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Requests retrieved successfully".to_string(),
        data: requests,
        pagination: Some(PaginationMeta::new(
            pagination.page,
            pagination.per_page,
            total,
        )),
    }))
}

#[instrument(name = "Request Statistics", skip(pool, auth))]
#[get("/statistics")]
pub async fn get_request_statistics(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    query: web::Query<StatisticsQuery>,
) -> Result<impl Responder, AppError> {
    let elevated = authorize(&auth.claims.roles, &REVIEWER_ROLES).is_ok();
    let mine = query.scope.as_deref() == Some("mine");

    let submitted_by = if mine || !elevated {
        Some(auth.user_id)
    } else {
        None
    };

    let statistics = requests::request_statistics(pool.get_ref(), submitted_by).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Statistics retrieved successfully".to_string(),
        data: statistics,
        pagination: None,
    }))
}

#[instrument(name = "Get Portal Request", skip(pool, auth))]
#[get("/{request_uuid}")]
pub async fn get_request(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request_uuid: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    if !can_access_request(&auth, &request) {
        return Err(AppError::forbidden_error(
            "You don't have permission to view this request",
        ));
    }

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Request retrieved successfully".to_string(),
        data: request,
        pagination: None,
    }))
}

#[instrument(name = "Update Portal Request", skip(pool, auth, payload))]
#[put("/{request_uuid}")]
pub async fn update_request(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request_uuid: web::Path<String>,
    payload: web::Json<UpdateRequestPayload>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    if !can_access_request(&auth, &request) {
        return Err(AppError::forbidden_error(
            "You don't have permission to edit this request",
        ));
    }

    // Edits stop once the request reaches a terminal state.
    if request.status.is_terminal() {
        return Err(AppError {
            message: Some(format!(
                "A request in status '{}' can no longer be edited",
                request.status.as_str()
            )),
            cause: None,
            error_type: AppErrorType::InvalidTransition,
        });
    }

    let request = requests::update_request(pool.get_ref(), &request_uuid, &payload).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Request updated successfully".to_string(),
        data: request,
        pagination: None,
    }))
}

#[instrument(name = "Update Request Status", skip(pool, auth, payload))]
#[put("/{request_uuid}/status")]
pub async fn update_request_status(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request_uuid: web::Path<String>,
    payload: web::Json<UpdateStatusPayload>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;

    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    let allowed = if is_super_admin(&auth.claims.roles) {
        true
    } else {
        match payload.status {
            // Review-track transitions need the approval permission.
            RequestStatus::UnderReview
            | RequestStatus::Approved
            | RequestStatus::Rejected
            | RequestStatus::Completed => {
                roles::user_has_permission(pool.get_ref(), auth.user_id, APPROVE_REQUEST).await?
            }
            // The submitter can withdraw their own request; admins can cancel
            // anyone's.
            RequestStatus::Cancelled => {
                request.submitted_by == auth.user_id
                    || roles::user_has_permission(pool.get_ref(), auth.user_id, MANAGE_USERS)
                        .await?
            }
            RequestStatus::Pending => false,
        }
    };

    if !allowed {
        return Err(AppError::forbidden_error(
            "You don't have permission to perform this status change",
        ));
    }

    let request =
        requests::update_request_status(pool.get_ref(), &request_uuid, &payload, auth.user_id)
            .await?;

    tracing::info!(
        "Request {} moved to '{}' by user {}",
        request.request_uuid,
        request.status.as_str(),
        auth.user_id
    );

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Request status updated successfully".to_string(),
        data: request,
        pagination: None,
    }))
}

#[instrument(name = "Delete Portal Request", skip(pool, auth))]
#[delete("/{request_uuid}")]
pub async fn delete_request(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request_uuid: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    let allowed = request.submitted_by == auth.user_id
        || is_super_admin(&auth.claims.roles)
        || roles::user_has_permission(pool.get_ref(), auth.user_id, MANAGE_USERS).await?;
    if !allowed {
        return Err(AppError::forbidden_error(
            "You don't have permission to delete this request",
        ));
    }

    requests::soft_delete_request(pool.get_ref(), &request_uuid).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Request deleted successfully".to_string(),
        data: (),
        pagination: None,
    }))
}
