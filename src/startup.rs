/// Server assembly: wires the injected collaborators into the services,
/// mounts the request gate and declares the route table.

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::auth::reset::PasswordResetManager;
use crate::auth::service::AuthService;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::email_client::NotificationDispatcher;
use crate::middleware::{GateState, RequestGate};
use crate::routes::{auth, health_check, user};
use crate::store::AccountDirectory;

/// Everything the server needs, behind trait objects so tests can swap
/// in deterministic implementations.
pub struct Dependencies {
    pub directory: Arc<dyn AccountDirectory>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub jwt: JwtSettings,
}

pub fn run(listener: TcpListener, deps: Dependencies) -> Result<Server, std::io::Error> {
    let auth_service = AuthService::new(
        deps.directory.clone(),
        deps.hasher.clone(),
        deps.dispatcher.clone(),
        deps.clock.clone(),
        deps.jwt.clone(),
    );
    let gate_state = GateState {
        directory: deps.directory.clone(),
        ledger: auth_service.ledger(),
        jwt: deps.jwt,
    };
    let reset_manager = PasswordResetManager::new(
        deps.directory,
        deps.hasher,
        deps.dispatcher,
        deps.clock,
    );

    let auth_service = web::Data::new(auth_service);
    let reset_manager = web::Data::new(reset_manager);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestGate::new(gate_state.clone()))
            .app_data(auth_service.clone())
            .app_data(reset_manager.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/authenticate", web::post().to(auth::authenticate))
                    .route("/refresh-token", web::post().to(auth::refresh_token))
                    .route("/logout", web::post().to(auth::logout))
                    .route("/activate-account", web::get().to(auth::activate_account))
                    .route(
                        "/resend-verification",
                        web::post().to(auth::resend_verification),
                    ),
            )
            .service(
                web::scope("/api/v1/user")
                    .route("/change-password", web::post().to(user::change_password))
                    .route("/forgot-password", web::post().to(user::forgot_password))
                    .route("/reset-password", web::post().to(user::reset_password))
                    .route("/phone-number", web::put().to(user::update_phone_number))
                    .route("/phone-number", web::get().to(user::has_phone_number))
                    .route("/role", web::put().to(user::update_role)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
