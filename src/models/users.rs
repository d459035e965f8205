use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    // Directory-synced accounts have no local credential.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub status: i8,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// What the login upsert does with a directory-resolved caller. Email is
/// unique, so an existing row is never re-inserted, whatever its status.
#[derive(Debug, PartialEq, Eq)]
pub enum DirectoryAccountAction {
    Create,
    Reuse,
    Reactivate,
}

pub fn directory_account_action(existing: Option<&User>) -> DirectoryAccountAction {
    match existing {
        None => DirectoryAccountAction::Create,
        Some(user) if user.status == 1 => DirectoryAccountAction::Reuse,
        Some(_) => DirectoryAccountAction::Reactivate,
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
}

impl UserProfile {
    pub fn new(user: User, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            roles,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;

    #[test]
    fn a_well_formed_login_payload_passes_validation() {
        let payload = LoginRequest {
            email: SafeEmail().fake(),
            password: "hunter2".to_string(),
        };
        assert_ok!(payload.validate());
    }

    #[test]
    fn a_malformed_email_is_rejected() {
        let payload = LoginRequest {
            email: "not-an-email".to_string(),
            password: "hunter2".to_string(),
        };
        assert_err!(payload.validate());
    }

    fn user_with_status(status: i8) -> User {
        let now = chrono::Utc::now().naive_utc();
        User {
            id: 7,
            email: SafeEmail().fake(),
            username: "amina".to_string(),
            password: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn an_unknown_directory_caller_gets_a_new_account() {
        assert_eq!(
            directory_account_action(None),
            DirectoryAccountAction::Create
        );
    }

    #[test]
    fn an_active_account_is_reused() {
        let user = user_with_status(1);
        assert_eq!(
            directory_account_action(Some(&user)),
            DirectoryAccountAction::Reuse
        );
    }

    #[test]
    fn a_deactivated_account_is_reactivated_never_reinserted() {
        let user = user_with_status(0);
        assert_eq!(
            directory_account_action(Some(&user)),
            DirectoryAccountAction::Reactivate
        );
        // Any existing row keeps its identity; Create is reserved for misses.
        for status in [0, 1] {
            let user = user_with_status(status);
            assert_ne!(
                directory_account_action(Some(&user)),
                DirectoryAccountAction::Create
            );
        }
    }
}
