/// Authenticated user endpoints under `/api/v1/user`.
///
/// The request gate attaches `AuthenticatedUser` to the request; each
/// handler here demands it, so a request that slipped through the gate
/// unauthenticated is still rejected.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::models::{AuthenticatedUser, Capability, Role};
use crate::auth::reset::PasswordResetManager;
use crate::auth::service::AuthService;
use crate::error::{AppError, AuthError, TokenError};

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirmation_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneNumberQuery {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub account_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HasPhoneBody {
    has_phone_number: bool,
}

fn require_user(
    user: Option<web::ReqData<AuthenticatedUser>>,
) -> Result<AuthenticatedUser, AppError> {
    user.map(|u| u.into_inner())
        .ok_or_else(|| TokenError::Invalid.into())
}

pub async fn change_password(
    manager: web::Data<PasswordResetManager>,
    user: Option<web::ReqData<AuthenticatedUser>>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(user)?;
    manager
        .change_password(
            user.id,
            &body.current_password,
            &body.new_password,
            &body.confirmation_password,
        )
        .await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "password changed",
    }))
}

/// Unauthenticated by necessity: the caller has forgotten the password.
pub async fn forgot_password(
    manager: web::Data<PasswordResetManager>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    manager.request(&body.email).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "password reset email sent",
    }))
}

pub async fn reset_password(
    manager: web::Data<PasswordResetManager>,
    query: web::Query<ResetPasswordQuery>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    manager
        .consume(&query.token, &body.new_password, &body.confirm_password)
        .await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "password reset",
    }))
}

pub async fn update_phone_number(
    service: web::Data<AuthService>,
    user: Option<web::ReqData<AuthenticatedUser>>,
    query: web::Query<PhoneNumberQuery>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(user)?;
    service
        .update_phone_number(user.id, &query.phone_number)
        .await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "phone number updated",
    }))
}

pub async fn has_phone_number(
    service: web::Data<AuthService>,
    user: Option<web::ReqData<AuthenticatedUser>>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(user)?;
    let has = service.has_phone_number(user.id).await?;
    Ok(HttpResponse::Ok().json(HasPhoneBody {
        has_phone_number: has,
    }))
}

/// Only principals with the account-management capability may change
/// another account's role.
pub async fn update_role(
    service: web::Data<AuthService>,
    user: Option<web::ReqData<AuthenticatedUser>>,
    body: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, AppError> {
    let user = require_user(user)?;
    if !user.role.has_capability(Capability::ManageAccounts) {
        return Err(AuthError::Forbidden.into());
    }
    service.update_user_role(body.account_id, body.role).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "role updated",
    }))
}
