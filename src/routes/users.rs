use crate::core::jwt_auth::{generate_jwt_token, JwtClaims, JwtMiddleware};
use crate::core::{AppError, AppErrorResponse, AppSuccessResponse, DirectoryClient};
use crate::db::{roles, users};
use crate::models::users::{LoginRequest, LoginResponse, UserProfile};
use actix_web::{get, post, web, HttpResponse, Result};
use chrono::{Duration, Utc};
use sqlx::MySqlPool;
use validator::Validate;

#[tracing::instrument(name = "User Login", skip(pool, directory, request))]
#[post("/login")]
pub async fn login(
    pool: web::Data<MySqlPool>,
    directory: web::Data<DirectoryClient>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    request.validate()?;

    // Directory lookup first; the local credential check is the fallback for
    // accounts the directory does not know about.
    let user = match directory.resolve(&request.email, &request.password).await? {
        Some(identity) => users::upsert_directory_user(&pool, &identity).await?,
        None => {
            let user = match users::get_user_by_email(&pool, &request.email).await? {
                Some(user) => user,
                None => {
                    return Ok(HttpResponse::Unauthorized().json(AppErrorResponse {
                        success: false,
                        message: "Email or password is incorrect".to_string(),
                        errors: None,
                    }));
                }
            };

            let verified = match &user.password {
                Some(hash) => users::verify_password(&request.password, hash).await?,
                None => false,
            };
            if !verified {
                return Ok(HttpResponse::Unauthorized().json(AppErrorResponse {
                    success: false,
                    message: "Email or password is incorrect".to_string(),
                    errors: None,
                }));
            }

            user
        }
    };

    let roles = roles::get_user_roles(&pool, user.id).await?;

    let expires_at = Utc::now() + Duration::hours(24);
    let claims = JwtClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        roles: roles.clone(),
        exp: expires_at.timestamp() as usize,
    };

    let token = generate_jwt_token(&claims)?;

    let response = LoginResponse {
        user: UserProfile::new(user, roles),
        token,
        expires_at,
    };

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        data: response,
        message: "Login successful".to_string(),
        pagination: None,
    }))
}

#[tracing::instrument(name = "Get User Profile", skip(pool, auth))]
#[get("/profile")]
pub async fn get_profile(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
) -> Result<HttpResponse, AppError> {
    let user = users::get_user_by_id(&pool, auth.user_id).await?;
    let roles = roles::get_user_roles(&pool, auth.user_id).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        data: UserProfile::new(user, roles),
        message: "Profile retrieved successfully".to_string(),
        pagination: None,
    }))
}

#[tracing::instrument(name = "Deactivate Account", skip(pool, auth))]
#[post("/deactivate")]
pub async fn deactivate_account(
    pool: web::Data<MySqlPool>,
    auth: JwtMiddleware,
) -> Result<HttpResponse, AppError> {
    users::deactivate_user(&pool, auth.user_id).await?;

    tracing::info!("User {} deactivated their account", auth.user_id);

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        data: (),
        message: "Account deactivated".to_string(),
        pagination: None,
    }))
}
