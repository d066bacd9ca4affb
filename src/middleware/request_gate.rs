/// Request gate: per-request bearer-token validation.
///
/// A request without an `Authorization: Bearer` header passes through
/// anonymous; which routes then require a principal is decided at the
/// route layer, not here. A token that decodes but is revoked in the
/// ledger is rejected exactly like an invalid one. Unexpected
/// infrastructure failures are logged and the request proceeds
/// unauthenticated: fail-open, scoped to this middleware only, and safe
/// only because protected handlers demand a principal themselves.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::jwt::decode_token;
use crate::auth::ledger::TokenLedger;
use crate::auth::models::AuthenticatedUser;
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};
use crate::store::AccountDirectory;

/// Everything the gate needs per request.
#[derive(Clone)]
pub struct GateState {
    pub directory: Arc<dyn AccountDirectory>,
    pub ledger: TokenLedger,
    pub jwt: JwtSettings,
}

pub struct RequestGate {
    state: GateState,
}

impl RequestGate {
    pub fn new(state: GateState) -> Self {
        Self { state }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestGateService {
            service: Rc::new(service),
            state: self.state.clone(),
        }))
    }
}

pub struct RequestGateService<S> {
    service: Rc<S>,
    state: GateState,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

fn unauthorized(message: String, code: &'static str) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "message": message,
        "code": code,
    }));
    actix_web::error::InternalError::from_response("Unauthorized", response).into()
}

/// Full validation pipeline for a decoded token: ledger check, then
/// principal resolution. `Ok(None)` means "reject as invalid";
/// `Err` means the infrastructure failed and the fail-open rule applies.
async fn resolve_principal(
    state: &GateState,
    token: &str,
    subject: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    if !state.ledger.is_usable(token).await? {
        return Ok(None);
    }

    let account = match state.directory.find_account_by_email(subject).await? {
        Some(account) => account,
        None => return Ok(None),
    };
    if !account.enabled {
        return Ok(None);
    }

    // Role comes from the store, not the claim: the account row is
    // already loaded to resolve the principal, so the fresher value is
    // free.
    Ok(Some(AuthenticatedUser {
        id: account.id,
        email: account.email,
        role: account.role,
    }))
}

impl<S, B> Service<ServiceRequest> for RequestGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let state = self.state.clone();
        let service = self.service.clone();

        Box::pin(async move {
            // Auth endpoints take no bearer principal; the refresh
            // handler reads the header itself.
            if req.path().starts_with("/api/v1/auth") {
                return service.call(req).await;
            }

            let token = match bearer_token(&req) {
                Some(token) => token,
                None => return service.call(req).await,
            };

            let claims = match decode_token(&token, &state.jwt) {
                Ok(claims) => claims,
                Err(TokenError::Expired { expired_at }) => {
                    tracing::warn!(path = %req.path(), "expired bearer token");
                    return Err(unauthorized(
                        format!("token expired at {}", expired_at.to_rfc3339()),
                        "TOKEN_EXPIRED",
                    ));
                }
                Err(e) => {
                    tracing::warn!(path = %req.path(), error = %e, "rejected bearer token");
                    return Err(unauthorized("invalid token".to_string(), "TOKEN_INVALID"));
                }
            };

            match resolve_principal(&state, &token, &claims.sub).await {
                Ok(Some(user)) => {
                    tracing::debug!(user_id = %user.id, email = %user.email, "request authenticated");
                    req.extensions_mut().insert(user);
                    service.call(req).await
                }
                Ok(None) => {
                    tracing::warn!(path = %req.path(), "unusable or revoked bearer token");
                    Err(unauthorized("invalid token".to_string(), "TOKEN_INVALID"))
                }
                Err(e) => {
                    // Fail open: the request continues without a
                    // principal; protected routes reject it downstream.
                    tracing::error!(error = %e, path = %req.path(), "request gate failure, continuing unauthenticated");
                    service.call(req).await
                }
            }
        })
    }
}
