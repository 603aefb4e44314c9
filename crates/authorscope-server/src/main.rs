//! AuthorScope
//!
//! Detects AI-generated prose and source code. `serve` runs the HTTP API;
//! `features` prints the linguistic feature vectors used by the text model;
//! `inspect-weights` loads the code model and reports how its weights mapped.

use anyhow::Result;
use authorscope_classifiers::{
    AuthorshipClassifier, CodeAuthorshipClassifier, LinguisticFeatureExtractor,
};
use authorscope_server::{create_router, ConfigOverrides, ServerConfig, ServiceContext};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "authorscope")]
#[command(about = "AI authorship detection for prose and source code", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "authorscope.yaml", env = "AUTHORSCOPE_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve(ServeArgs),

    /// Print linguistic feature vectors as JSON lines
    Features {
        /// Text files to analyse
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Load the code model and print the weight mapping report
    InspectWeights(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Local directory holding the code model
    #[arg(long, env = "AUTHORSCOPE_CODE_MODEL")]
    code_model: Option<PathBuf>,

    /// Text model bundle (JSON)
    #[arg(long, env = "AUTHORSCOPE_TEXT_MODEL")]
    text_model: Option<PathBuf>,
}

impl ServeArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen.clone(),
            port: self.port,
            code_model_dir: self.code_model.clone(),
            text_model_bundle: self.text_model.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    match cli.command {
        None => serve(&cli.config, ServeArgs::default()).await,
        Some(Command::Serve(args)) => serve(&cli.config, args).await,
        Some(Command::Features { files }) => print_features(&files),
        Some(Command::InspectWeights(args)) => inspect_weights(&cli.config, args).await,
    }
}

async fn serve(config_path: &std::path::Path, args: ServeArgs) -> Result<()> {
    info!("Starting AuthorScope");

    // Load configuration
    let config = ServerConfig::load(config_path, &args.overrides())?;
    info!("Configuration loaded successfully");

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Load models before accepting traffic
    let addr: SocketAddr = format!("{}:{}", config.server.listen, config.server.port).parse()?;
    let state = ServiceContext::load(config, Some(metrics_handle)).await?;
    info!(
        "Service context ready (code model: {}, text model: {})",
        state.code.is_some(),
        state.text.is_some()
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    // Graceful shutdown handler
    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn print_features(files: &[PathBuf]) -> Result<()> {
    let extractor = LinguisticFeatureExtractor::new()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for path in files {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        if text.trim().is_empty() {
            warn!("Skipping empty file {}", path.display());
            continue;
        }
        let line = json!({
            "file": path.display().to_string(),
            "features": extractor.extract(&text),
        });
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

async fn inspect_weights(config_path: &std::path::Path, args: ServeArgs) -> Result<()> {
    let config = ServerConfig::load(config_path, &args.overrides())?;
    let code_config = config
        .models
        .code_model
        .ok_or_else(|| anyhow::anyhow!("No code model configured"))?;

    let classifier =
        tokio::task::spawn_blocking(move || CodeAuthorshipClassifier::load(&code_config))
            .await??;

    println!("{}", classifier.load_report().summary(usize::MAX));
    println!("Model parameters ({}):", classifier.parameters().len());
    for parameter in classifier.parameters() {
        println!("  {}: {:?}", parameter.name, parameter.shape);
    }
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("authorscope=debug,authorscope_server=debug,authorscope_classifiers=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("authorscope=info,authorscope_server=info,authorscope_classifiers=info")
        })
    };

    // Logs go to stderr so `features` output stays machine-readable
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "authorscope_requests_total",
        "Total number of requests processed by endpoint"
    );
    metrics::describe_counter!(
        "authorscope_errors_total",
        "Total number of failed requests by endpoint and error type"
    );
    metrics::describe_histogram!(
        "authorscope_inference_latency_us",
        metrics::Unit::Microseconds,
        "Classifier latency in microseconds by model"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
