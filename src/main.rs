mod collectors;
mod config;
mod error;
mod models;
mod normalize;
mod regions;
mod routes;
mod scheduler;
mod stats;
mod store;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::collectors::runner::Pipeline;
use crate::config::{Command, Config, LogFormat};
use crate::routes::AppState;
use crate::scheduler::Scheduler;
use crate::store::FileStore;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(store: Arc<FileStore>) -> impl IntoResponse {
    if store.is_ready().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobfeed=info,tower_http=info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn app(state: AppState) -> Router {
    let readyz_store = Arc::clone(&state.store);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(move || readyz(readyz_store.clone())))
        .merge(routes::api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);

    let store = Arc::new(FileStore::new(config.store_config()));

    let sources = collectors::load_sources(&config.sources_file)?;
    let client = collectors::http_client(config.fetch_timeout())?;
    let collectors = collectors::build_collectors(sources, &client);
    tracing::info!("Loaded {} enabled sources", collectors.len());

    let pipeline = Arc::new(Pipeline::new(
        collectors,
        Arc::clone(&store),
        config.keep_last,
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&pipeline),
        config.scrape_interval(),
    ));

    match config.resolved_command() {
        Command::Serve {
            listen_addr,
            autostart,
        } => {
            store.init().await?;
            if autostart {
                scheduler.start();
            }

            let state = AppState {
                store,
                scheduler: Arc::clone(&scheduler),
                keep_last: config.keep_last,
            };

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, app(state))
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutdown signal received, exiting gracefully");
                })
                .await?;
            scheduler.stop();
        }
        Command::Scrape => {
            let summary = pipeline.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Stats => {
            let stats = stats::compute_statistics(&store).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Latest => {
            let jobs = store.load_latest().await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Command::List { backups } => {
            let names = if backups {
                store.list_backups().await?
            } else {
                store.list_available().await?
            };
            for name in names {
                println!("{name}");
            }
        }
        Command::Prune { keep } => {
            let removed = store.prune(keep.unwrap_or(config.keep_last)).await?;
            for name in &removed {
                println!("removed {name}");
            }
        }
        Command::Init => {
            let path = store.init().await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoints() {
        let tmp = TempDir::new().unwrap();
        let state = routes::api::test_support::state(&tmp.path().join("data"), Vec::new());

        let resp = app(state.clone())
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app(state.clone())
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.store.init().await.unwrap();
        let resp = app(state)
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
