// Main entry point for the signboard translation service

use signboard_translator::{
    api,
    core::{types::AppState, Config},
    pipeline::{FragmentTranslator, ImageComposer, TextExtractor, TranslationPipeline},
    services::{FontResolver, HttpOcrEngine, HttpTranslationEngine, OcrEngine, TranslationEngine},
    storage::Database,
    utils::Metrics,
};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "signboard_translator={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== SIGNBOARD TRANSLATOR ===");
    info!(
        "Config: ocr={} translate={} min_confidence={} concurrency={}",
        config.ocr.endpoint,
        config.translation.endpoint,
        config.extraction.min_confidence,
        config.translation.max_concurrency,
    );

    // History store
    let db = Arc::new(Database::open(Path::new(&config.storage.db_path))?);

    // External capabilities, bound over HTTP
    let ocr_engine: Arc<dyn OcrEngine> = Arc::new(HttpOcrEngine::new(
        &config.ocr.endpoint,
        Duration::from_secs(config.ocr.timeout_secs),
    )?);
    let translation_engine: Arc<dyn TranslationEngine> = Arc::new(HttpTranslationEngine::new(
        &config.translation.endpoint,
        Duration::from_secs(config.translation.timeout_secs),
    )?);

    // Pipeline assembly
    let extractor = TextExtractor::new(ocr_engine, &config.extraction);
    let translator =
        FragmentTranslator::new(translation_engine, config.translation.max_concurrency);
    let font_resolver = FontResolver::new(config.compose.font_path.as_deref());
    let composer = ImageComposer::new(&font_resolver, &config.compose);
    let pipeline = Arc::new(TranslationPipeline::new(extractor, translator, composer));

    let state = AppState {
        config: config.clone(),
        pipeline,
        db,
        metrics: Metrics::new(),
    };

    let app = api::router(state);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET    /                    - Root endpoint");
    info!("  GET    /api/health          - Health check");
    info!("  GET    /metrics             - Prometheus metrics");
    info!("  POST   /api/translate       - Translate an uploaded image");
    info!("  GET    /api/history         - Paginated session history");
    info!("  GET    /api/history/:id     - Single history record");
    info!("  DELETE /api/history/:id     - Delete a history record");
    info!("  DELETE /api/history/clear   - Clear session history");
    info!("  GET    /api/stats           - Session statistics");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
