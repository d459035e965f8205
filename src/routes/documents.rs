use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use futures_util::TryStreamExt;
use sqlx::MySqlPool;
use tracing::instrument;

use crate::{
    core::{
        jwt_auth::JwtMiddleware, AppError, AppErrorType, AppSuccessResponse, LocalStorage,
    },
    db::{documents, requests},
    models::documents::{validate_attachment, NewDocument, ValidatedAttachment, MAX_DOCUMENT_SIZE},
    routes::requests::can_access_request,
};

// This endpoint takes exactly one `file` part; a second part is an error, not
// a silent overwrite.
fn accept_single_file(
    slot: &mut Option<ValidatedAttachment>,
    attachment: ValidatedAttachment,
) -> Result<(), AppError> {
    if slot.is_some() {
        return Err(AppError {
            message: Some("Only one file may be uploaded per call".to_string()),
            cause: None,
            error_type: AppErrorType::PayloadValidationError,
        });
    }
    *slot = Some(attachment);
    Ok(())
}

#[instrument(name = "Upload Document", skip(pool, storage, auth, payload))]
#[post("/{request_uuid}/documents")]
pub async fn upload_document(
    pool: web::Data<MySqlPool>,
    storage: web::Data<LocalStorage>,
    auth: JwtMiddleware,
    request_uuid: web::Path<String>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    if !can_access_request(&auth, &request) {
        return Err(AppError::forbidden_error(
            "You don't have permission to attach documents to this request",
        ));
    }

    // No late uploads once a request has reached a terminal state.
    if request.status.is_terminal() {
        return Err(AppError {
            message: Some(format!(
                "Documents cannot be attached to a request in status '{}'",
                request.status.as_str()
            )),
            cause: None,
            error_type: AppErrorType::InvalidTransition,
        });
    }

    let mut attachment = None;

    while let Some(mut field) = payload.try_next().await.map_err(|e| AppError {
        message: Some("Invalid multipart payload".to_string()),
        cause: Some(e.to_string()),
        error_type: AppErrorType::PayloadValidationError,
    })? {
        let content_disposition = field.content_disposition();
        if content_disposition.get_name() != Some("file") {
            continue;
        }

        let filename = content_disposition
            .get_filename()
            .ok_or_else(|| AppError {
                message: Some("Filename is required".to_string()),
                cause: None,
                error_type: AppErrorType::PayloadValidationError,
            })?
            .to_string();

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| AppError {
            message: Some("Failed to read uploaded file".to_string()),
            cause: Some(e.to_string()),
            error_type: AppErrorType::PayloadValidationError,
        })? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > MAX_DOCUMENT_SIZE {
                break;
            }
        }

        accept_single_file(
            &mut attachment,
            validate_attachment(&filename, bytes, content_type)?,
        )?;
    }

    let attachment = attachment.ok_or_else(|| AppError {
        message: Some("No file was provided".to_string()),
        cause: None,
        error_type: AppErrorType::PayloadValidationError,
    })?;

    let storage_path = storage.store(&attachment.bytes, &attachment.original_name)?;

    let document = documents::insert_document(
        pool.get_ref(),
        request.id,
        &NewDocument {
            original_name: attachment.original_name.clone(),
            storage_path,
            mime_type: attachment.mime_type.clone(),
            size_bytes: attachment.bytes.len() as i64,
            extension: attachment.extension.clone(),
        },
    )
    .await?;

    tracing::info!(
        "Document {} attached to request {} by user {}",
        document.id,
        request.request_uuid,
        auth.user_id
    );

    Ok(HttpResponse::Created().json(AppSuccessResponse {
        success: true,
        message: "Document uploaded successfully".to_string(),
        data: document,
        pagination: None,
    }))
}

#[instrument(name = "List Request Documents", skip(pool, auth))]
#[get("/{request_uuid}/documents")]
pub async fn list_request_documents(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    request_uuid: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    if !can_access_request(&auth, &request) {
        return Err(AppError::forbidden_error(
            "You don't have permission to view this request's documents",
        ));
    }

    let documents = documents::list_documents(pool.get_ref(), request.id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Documents retrieved successfully".to_string(),
        data: documents,
        pagination: None,
    }))
}

#[instrument(name = "Delete Document", skip(pool, auth))]
#[delete("/{request_uuid}/documents/{document_id}")]
pub async fn delete_document(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
    path: web::Path<(String, i32)>,
) -> Result<impl Responder, AppError> {
    let (request_uuid, document_id) = path.into_inner();

    let request = requests::get_request_by_uuid(pool.get_ref(), &request_uuid)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    if !can_access_request(&auth, &request) {
        return Err(AppError::forbidden_error(
            "You don't have permission to delete this document",
        ));
    }

    let document = documents::get_document(pool.get_ref(), document_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;
    if document.request_id != request.id {
        return Err(AppError::not_found("Document not found"));
    }

    documents::soft_delete_document(pool.get_ref(), document_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        message: "Document deleted successfully".to_string(),
        data: (),
        pagination: None,
    }))
}

#[instrument(name = "Download Document", skip(pool, storage, auth))]
#[get("/{document_id}/download")]
pub async fn download_document(
    pool: web::Data<MySqlPool>,
    storage: web::Data<LocalStorage>,
    auth: JwtMiddleware,
    document_id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let document_id = document_id.into_inner();

    let document = documents::get_document(pool.get_ref(), document_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;

    let request = requests::get_request_by_id(pool.get_ref(), document.request_id)
        .await?
        .ok_or_else(|| AppError::not_found("Document not found"))?;

    if !can_access_request(&auth, &request) {
        return Err(AppError::forbidden_error(
            "You don't have permission to download this document",
        ));
    }

    let bytes = storage.retrieve(&document.storage_path)?;

    tracing::info!(
        "Document {} downloaded by user {}",
        document.id,
        auth.user_id
    );

    Ok(HttpResponse::Ok()
        .content_type(document.mime_type.as_str())
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", document.original_name),
        ))
        .insert_header(("Content-Length", document.size_bytes.to_string()))
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok, assert_some};

    fn attachment(name: &str) -> ValidatedAttachment {
        ValidatedAttachment {
            original_name: name.to_string(),
            bytes: b"content".to_vec(),
            mime_type: "application/pdf".to_string(),
            extension: "pdf".to_string(),
        }
    }

    #[test]
    fn a_second_file_part_is_rejected_not_silently_dropped() {
        let mut slot = None;
        assert_ok!(accept_single_file(&mut slot, attachment("first.pdf")));

        let error = accept_single_file(&mut slot, attachment("second.pdf")).unwrap_err();
        assert_eq!(error.error_type, AppErrorType::PayloadValidationError);

        // The first upload survives the rejected one.
        let kept = assert_some!(slot);
        assert_eq!(kept.original_name, "first.pdf");
    }

    #[test]
    fn the_first_file_part_fills_the_slot() {
        let mut slot = None;
        assert_ok!(accept_single_file(&mut slot, attachment("scan.pdf")));
        assert!(slot.is_some());
    }
}
