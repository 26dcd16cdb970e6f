use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tavily_adapter::api::{AppState, create_router};
use tavily_adapter::backend;
use tavily_adapter::config::Config;
use tavily_adapter::extract::ExtractOrchestrator;
use tavily_adapter::fetcher::ContentFetcher;
use tavily_adapter::renderer::{HeadlessRenderer, HttpRenderer, PageRenderer};
use tavily_adapter::sanitizer::ContentSanitizer;
use tavily_adapter::search::SearchService;

/// Tavily-compatible search and extract API on top of SearXNG.
#[derive(Parser, Debug)]
#[command(name = "tavily-adapter", version)]
struct Args {
    /// Address to bind, overrides SERVER_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let sanitizer = Arc::new(ContentSanitizer::default());
    let http_renderer: Arc<dyn PageRenderer> = Arc::new(HttpRenderer::new(
        &config.scraper.user_agent,
        config.scraper.max_page_bytes,
    )?);
    let extract_renderer: Arc<dyn PageRenderer> = match &config.extract.renderer_url {
        Some(url) => Arc::new(HeadlessRenderer::new(
            url,
            config.extract.renderer_token.clone(),
            &config.scraper.user_agent,
            config.scraper.max_page_bytes,
        )?),
        None => http_renderer.clone(),
    };

    let search_backend = backend::from_config(&config.backend, &config.scraper.user_agent)?;
    let fetcher = ContentFetcher::new(http_renderer.clone(), sanitizer.clone(), &config.scraper);
    let search = SearchService::new(search_backend.clone(), fetcher, config.search.clone());
    let mut extract = ExtractOrchestrator::new(
        extract_renderer.clone(),
        sanitizer,
        config.extract.clone(),
        config.scraper.pool_size,
    );
    if config.extract.renderer_url.is_some() {
        extract = extract.with_document_renderer(http_renderer);
    }

    let app = create_router(AppState {
        search: Arc::new(search),
        extract: Arc::new(extract),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "listening on {addr} (backend={}, extract renderer={}, pool size={})",
        search_backend.name(),
        extract_renderer.name(),
        config.scraper.pool_size
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
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
    tracing::info!("shutting down");
}
