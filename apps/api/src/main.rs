mod calibration;
mod cancel;
mod config;
mod corpus;
mod errors;
mod matching;
mod models;
mod recommendation;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::calibration::{startup_calibration, CalibrationStore};
use crate::config::Config;
use crate::corpus::{CatalogCorpusProvider, CorpusProvider};
use crate::models::CalibrationState;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerFit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the corpus catalog and make sure the default dataset loads
    let corpus = Arc::new(CatalogCorpusProvider::new(config.corpus_dir.clone()));
    let default_corpus = corpus
        .load(&config.default_dataset)
        .await
        .with_context(|| format!("failed to load default dataset '{}'", config.default_dataset))?;
    info!(
        "Corpus '{}' loaded: {} occupations, {} descriptors (interest model: {}, relevance gate: {})",
        default_corpus.name(),
        default_corpus.len(),
        default_corpus.descriptor_count(),
        config.interest_model,
        config.relevance_gate
    );

    // Initialize calibration state
    let store = Arc::new(CalibrationStore::new(CalibrationState::defaults(
        &config.default_dataset,
    )));
    if config.calibrate_on_startup {
        let options = config.scoring_options();
        let calibrated =
            tokio::task::spawn_blocking(move || startup_calibration(&default_corpus, options))
                .await?;
        match calibrated {
            Ok(next) => {
                store.commit(next).await?;
            }
            Err(e) => warn!("Startup calibration failed, serving defaults: {e}"),
        }
    } else {
        info!("Startup calibration disabled; serving default thresholds");
    }

    // Build app state
    let state = AppState {
        config: config.clone(),
        corpus,
        calibration: store,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict allowed origins once a frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
