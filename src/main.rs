use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use saraf_auth::auth::password::BcryptHasher;
use saraf_auth::clock::SystemClock;
use saraf_auth::configuration::get_configuration;
use saraf_auth::email_client::EmailDispatcher;
use saraf_auth::startup::{run, Dependencies};
use saraf_auth::store::PgAccountDirectory;
use saraf_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    tracing::info!("Database ready");

    let address = format!("127.0.0.1:{}", configuration.application.port);
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let deps = Dependencies {
        directory: Arc::new(PgAccountDirectory::new(pool)),
        hasher: Arc::new(BcryptHasher::new()),
        dispatcher: Arc::new(EmailDispatcher::new(
            reqwest::Client::new(),
            configuration.email.clone(),
        )),
        clock: Arc::new(SystemClock),
        jwt: configuration.jwt.clone(),
    };

    let server = run(listener, deps)?;
    tracing::info!("Server started successfully");

    server.await
}
