use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use bullride_server::auth::{Admission, AdmissionPolicy, SharedSecretVerifier, TokenVerifier, UnverifiedDecoder};
use bullride_server::baskets::SqliteBasketStore;
use bullride_server::chat::ChatRelay;
use bullride_server::config::{generate_config_template, Args, Config};
use bullride_server::contact::{LogMailer, Mailer, SesMailer};
use bullride_server::stocks::AlpacaClient;
use bullride_server::{db, routes, state};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    // Handle --generate-config: print template and exit
    if args.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&args)?;

    init_tracing(config.json_logs);

    tracing::info!("Bullride server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;

    let verifier: Arc<dyn TokenVerifier> = match &config.token_secret {
        Some(secret) if !secret.is_empty() => {
            tracing::info!("Chat tokens verified with shared secret");
            Arc::new(SharedSecretVerifier::new(secret.as_bytes()))
        }
        _ => {
            tracing::warn!(
                "No token_secret configured: chat tokens are decoded WITHOUT signature checks, \
                 so any client can claim an admin email"
            );
            Arc::new(UnverifiedDecoder)
        }
    };

    let mailer: Arc<dyn Mailer> = match SesMailer::from_config(&config.mail) {
        Some(ses) => {
            tracing::info!(region = %config.mail.region, "Contact mail via SES");
            Arc::new(ses)
        }
        None => {
            tracing::warn!("No mail credentials configured, contact messages will only be logged");
            Arc::new(LogMailer)
        }
    };

    if config.alpaca.key_id.is_none() || config.alpaca.secret_key.is_none() {
        tracing::warn!("Alpaca credentials missing, stock endpoints will fail upstream");
    }
    let market = AlpacaClient::new(&config.alpaca)?;

    let app_state = state::AppState {
        relay: ChatRelay::new(),
        admission: Admission::new(verifier, AdmissionPolicy::new(&config.admin_domain)),
        mailer,
        market: Arc::new(market),
        baskets: Arc::new(SqliteBasketStore::new(db)),
        allowed_origin: HeaderValue::from_str(&config.allowed_origin)?,
    };

    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down");
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bullride_server=info"))
    };

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
