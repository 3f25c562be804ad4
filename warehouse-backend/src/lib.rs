pub mod error;
pub mod referrer_policy;
pub mod routes;

use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;
use error::AppError;
use routes::health::health;
use routes::project_json::project_json;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use warehouse_config::Config;
use warehouse_database::{get_database_connection, Pool};

#[derive(Clone, FromRef)]
pub struct AppState {
    pool: Pool,
}

// layers are in reverse order, the referrer policy wraps everything else
pub fn setup_server(config: &Config, pool: Pool) -> Router {
    let app = Router::new()
        .route("/_health/", get(health))
        .route("/pypi/:name/json", get(project_json))
        .with_state(AppState { pool });

    let app = app
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http());

    referrer_policy::includeme(app, config)
}

pub async fn run_server(config: Config) -> Result<(), AppError> {
    info!("starting up server...");

    let pool = get_database_connection(&config.database_url)?;
    let app = setup_server(&config, pool);
    let listener = TcpListener::bind(config.bind_address).await?;

    info!(address = %config.bind_address, "started up server...");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    warn!("SHUTDOWN");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            core::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {err}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
