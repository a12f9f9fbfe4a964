//! Demo server putting the site's named limiters in front of a few routes.

use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use clap::Parser;
use clap::ValueEnum;
use nicho_limit::Clock;
use nicho_limit::Limiters;
use nicho_limit::LimitsConfig;
use nicho_limit::Reason;
use nicho_limit::Strategy;
use nicho_limit::SystemClock;
use serde_json::json;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tower_nicho::CleanupTask;
use tower_nicho::GateError;
use tower_nicho::RateLimitHeaders;
use tower_nicho::RateLimitLayer;
use tower_nicho::client_identifier;
use tower_nicho::header_value;

const USER_ID: &str = "x-user-id";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "nicho-gate")]
#[command(about = "Rate limited NichoFy API endpoints")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// YAML file with limiter configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone)]
struct AppState {
    limiters: Limiters,
    clock: Arc<dyn Clock>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting nicho-gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => LimitsConfig::from_file(path)?,
        None => LimitsConfig::default(),
    };
    info!(config = ?args.config, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiters = Limiters::from_config(&config);
    let sweeper = CleanupTask::for_limiters(&limiters, clock.clone(), config.cleanup_interval());

    let app = router(AppState {
        limiters,
        clock: clock.clone(),
    });

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(addr = %args.listen, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("nicho-gate stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn router(state: AppState) -> Router {
    let limiters = &state.limiters;
    let clock = state.clock.clone();

    let login = RateLimitLayer::new(limiters.login())
        .with_clock(clock.clone())
        .with_message("Too many login attempts. Please try again in 15 minutes.");
    let contact = RateLimitLayer::new(limiters.contact())
        .with_clock(clock.clone())
        .with_message("Too many messages sent. Please try again in an hour.");
    let api = RateLimitLayer::new(limiters.api()).with_clock(clock);

    Router::new()
        .route("/api/auth/login", post(accepted).layer(login))
        .route("/api/contact", post(accepted).layer(contact))
        .route("/api/content", post(generate_content))
        .route("/api/health", get(health).layer(api.clone()))
        .route("/api/limits/{name}/{key}", get(limit_stats).layer(api))
        .with_state(state)
}

async fn accepted() -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Content generation is limited per signed-in user when the caller says who
/// that is, per client address otherwise.
async fn generate_content(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GateError> {
    let key = header_value(&headers, USER_ID)
        .map(str::to_owned)
        .unwrap_or_else(|| client_identifier(&headers));

    let limiter = state.limiters.content();
    let now = state.clock.now();
    let decision = limiter.check(&key, now);

    if let ControlFlow::Break(Reason::Overloaded { retry_after }) = decision.flow(now) {
        return Err(GateError::RateLimited {
            limit: limiter.limit(),
            reset_time: decision.reset_time,
            retry_after,
            message: "Content generation quota reached. Please try again later.".to_string(),
        });
    }

    let response = (StatusCode::ACCEPTED, Json(json!({ "status": "queued" }))).into_response();
    Ok(RateLimitHeaders::new(limiter.limit(), &decision).merge_into(response))
}

async fn limit_stats(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let limiter = state.limiters.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    let stats = limiter.stats(&key).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(json!({
        "limiter": name,
        "key": key,
        "count": stats.count,
        "remaining": stats.remaining,
        "resetTime": stats.reset_time,
    })))
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
