/// Public authentication endpoints under `/api/v1/auth`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::service::{AuthService, TokenPair};
use crate::auth::Role;
use crate::configuration::JwtSettings;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateQuery {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub role: Role,
    pub expires_in: i64,
}

impl AuthResponse {
    fn from_pair(pair: TokenPair, jwt: &JwtSettings) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            role: pair.role,
            expires_in: jwt.access_token_expiry,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

pub async fn register(
    service: web::Data<AuthService>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let pair = service
        .register(&body.firstname, &body.lastname, &body.email, &body.password)
        .await?;
    Ok(HttpResponse::Created().json(AuthResponse::from_pair(pair, service.jwt_settings())))
}

pub async fn authenticate(
    service: web::Data<AuthService>,
    body: web::Json<AuthenticateRequest>,
) -> Result<HttpResponse, AppError> {
    let pair = service.authenticate(&body.email, &body.password).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from_pair(pair, service.jwt_settings())))
}

/// The refresh token travels in the `Authorization` header, same slot an
/// access token would occupy.
pub async fn refresh_token(
    service: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());
    let pair = service.refresh_token(header).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::from_pair(pair, service.jwt_settings())))
}

pub async fn logout(
    service: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());
    service.logout(header).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "logged out",
    }))
}

/// Activation arrives as a GET with the code in the query string so the
/// mailed link works in a plain browser.
pub async fn activate_account(
    service: web::Data<AuthService>,
    query: web::Query<ActivateQuery>,
) -> Result<HttpResponse, AppError> {
    service.activate_account(&query.code).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "account activated",
    }))
}

pub async fn resend_verification(
    service: web::Data<AuthService>,
    body: web::Json<ResendVerificationRequest>,
) -> Result<HttpResponse, AppError> {
    service.resend_email_verification(&body.email).await?;
    Ok(HttpResponse::Ok().json(MessageBody {
        message: "verification email sent",
    }))
}
