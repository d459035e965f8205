use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::core::AppError;

pub const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024; // 10 MiB

pub const ALLOWED_EXTENSIONS: [&str; 9] = [
    "pdf", "doc", "docx", "xls", "xlsx", "jpg", "jpeg", "png", "txt",
];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PortalRequestDocument {
    pub id: i32,
    #[serde(skip_serializing)]
    pub request_id: i32,
    pub original_name: String,
    #[serde(skip_serializing)]
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub extension: String,
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<NaiveDateTime>,
}

/// An upload that has passed the size and extension gates but has not been
/// stored yet.
#[derive(Debug)]
pub struct ValidatedAttachment {
    pub original_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

/// Metadata for bytes that are already durably stored, ready to be recorded
/// against a request.
#[derive(Debug)]
pub struct NewDocument {
    pub original_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub extension: String,
}

/// Size and extension gates applied before any byte is written. Field errors
/// are keyed on `documents` so a multi-file upload reports one actionable
/// message per failure.
pub fn validate_attachment(
    original_name: &str,
    bytes: Vec<u8>,
    mime_type: String,
) -> Result<ValidatedAttachment, AppError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        let mut errors = BTreeMap::new();
        errors.insert(
            "documents".to_string(),
            format!(
                "'{}' is not an allowed file type (allowed: {})",
                original_name,
                ALLOWED_EXTENSIONS.join(", ")
            ),
        );
        return Err(AppError::validation(errors));
    }

    if bytes.len() > MAX_DOCUMENT_SIZE {
        let mut errors = BTreeMap::new();
        errors.insert(
            "documents".to_string(),
            format!("'{}' exceeds the maximum size of 10 MB", original_name),
        );
        return Err(AppError::validation(errors));
    }

    Ok(ValidatedAttachment {
        original_name: original_name.to_string(),
        bytes,
        mime_type,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok, assert_some};

    #[test]
    fn a_document_of_exactly_the_size_limit_is_accepted() {
        let bytes = vec![0u8; MAX_DOCUMENT_SIZE];
        assert_ok!(validate_attachment(
            "budget.xlsx",
            bytes,
            "application/vnd.ms-excel".to_string()
        ));
    }

    #[test]
    fn one_byte_over_the_limit_is_a_size_validation_error() {
        let bytes = vec![0u8; MAX_DOCUMENT_SIZE + 1];
        let error = validate_attachment("budget.xlsx", bytes, "application/vnd.ms-excel".to_string())
            .unwrap_err();
        let fields = assert_some!(error.field_errors());
        let message = assert_some!(fields.get("documents"));
        assert!(message.contains("maximum size"));
    }

    #[test]
    fn every_allowed_extension_is_accepted() {
        for ext in ALLOWED_EXTENSIONS {
            let name = format!("attachment.{}", ext);
            assert_ok!(validate_attachment(
                &name,
                b"content".to_vec(),
                "application/octet-stream".to_string()
            ));
        }
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        let attachment = assert_ok!(validate_attachment(
            "SCAN.PDF",
            b"content".to_vec(),
            "application/pdf".to_string()
        ));
        assert_eq!(attachment.extension, "pdf");
    }

    #[test]
    fn a_disallowed_extension_is_rejected() {
        assert_err!(validate_attachment(
            "malware.exe",
            b"content".to_vec(),
            "application/octet-stream".to_string()
        ));
    }

    #[test]
    fn a_file_without_an_extension_is_rejected() {
        assert_err!(validate_attachment(
            "README",
            b"content".to_vec(),
            "text/plain".to_string()
        ));
    }
}
