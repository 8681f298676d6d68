use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use snapvault_api::middleware::require_auth;
use snapvault_api::{AppState, AppStateInner, auth, groups, photos, users};
use snapvault_core::storage::{Storage, StorageConfig};
use snapvault_db::Database;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Batch uploads carry up to 20 photos of 10 MiB each, plus multipart
/// framing.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snapvault=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("SNAPVAULT_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: SNAPVAULT_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let host = std::env::var("SNAPVAULT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SNAPVAULT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("SNAPVAULT_DB_PATH")
        .unwrap_or_else(|_| "snapvault.db".into())
        .into();

    // Storage backend is resolved once here; nothing downstream branches
    // on the variant.
    let storage_config = match std::env::var("SNAPVAULT_STORAGE_BACKEND")
        .unwrap_or_else(|_| "local".into())
        .as_str()
    {
        "local" => StorageConfig::Local {
            root: std::env::var("SNAPVAULT_STORAGE_DIR")
                .unwrap_or_else(|_| "./uploads".into())
                .into(),
        },
        "remote" => StorageConfig::Remote {
            base_url: required_env("SNAPVAULT_OBJECT_STORE_URL")?,
            bucket: required_env("SNAPVAULT_OBJECT_STORE_BUCKET")?,
            token: required_env("SNAPVAULT_OBJECT_STORE_TOKEN")?,
        },
        other => anyhow::bail!("unknown storage backend '{other}' (expected local or remote)"),
    };

    let db = Database::open(&db_path)?;
    let storage = Storage::init(storage_config).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        storage,
        jwt_secret,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/users/me", get(users::me))
        .route("/users/me", delete(users::delete_account))
        .route("/users/me/bio", put(users::update_bio))
        .route("/users/me/name", put(users::update_name))
        .route("/users/me/email", put(users::update_email))
        .route("/users/me/password", put(users::update_password))
        .route("/users/me/profile-picture", put(users::update_profile_picture))
        .route("/groups", post(groups::create_group))
        .route("/groups/join", post(groups::join_group))
        .route("/groups/my", get(groups::my_groups))
        .route("/groups/{group_id}", get(groups::get_group))
        .route("/groups/{group_id}", put(groups::update_group))
        .route("/groups/{group_id}", delete(groups::delete_group))
        .route("/groups/{group_id}/members", get(groups::list_members))
        .route("/groups/{group_id}/leave", delete(groups::leave_group))
        .route(
            "/groups/{group_id}/members/{user_id}/role",
            put(groups::set_member_role),
        )
        .route("/groups/{group_id}/transfer", post(groups::transfer_ownership))
        .route("/groups/{group_id}/photos", post(photos::upload_photo))
        .route("/groups/{group_id}/photos/batch", post(photos::batch_upload))
        .route("/groups/{group_id}/photos", get(photos::list_photos))
        .route("/photos/{photo_id}", get(photos::get_photo))
        .route("/photos/{photo_id}/data", get(photos::download_photo))
        .route("/photos/{photo_id}/tags", put(photos::update_tags))
        .route("/photos/{photo_id}", delete(photos::delete_photo))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("SnapVault server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn required_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{key} must be set for the remote backend"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
