use clap::Parser;
use llm_data_stream::auth::AppState;
use llm_data_stream::config::Config;
use llm_data_stream::llm_client::LlmClient;
use llm_data_stream::logging::init_logging;
use llm_data_stream::router::build_router;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{Level, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "llm-data-stream")]
#[command(about = "Streams LLM chat output in the AI SDK data stream protocol")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    ip: String,

    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Path to config file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    #[arg(short, long)]
    token: Option<String>,

    /// trace, debug, info, warn, error
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Also write logs to this file, capped at 10 MiB
    #[arg(long)]
    log_file: Option<String>,

    /// socks and http proxy, example: socks5://192.168.0.2:10080
    #[arg(long)]
    proxy: Option<String>,
}

async fn watch_config_file(config_path: &str, config: &Arc<RwLock<Config>>) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel(100);

    let mut watcher = notify::recommended_watcher(move |res| {
        if let Ok(event) = res {
            if let Err(e) = tx.blocking_send(event) {
                eprintln!("Failed to send event: {}", e);
            }
        }
    })?;

    watcher.watch(Path::new(config_path), RecursiveMode::NonRecursive)?;

    while let Some(event) = rx.recv().await {
        if let EventKind::Modify(_) = event.kind {
            info!("Config file modified, attempting to reload");
            match Config::from_file(config_path) {
                Ok(new_config) => {
                    *config.write().await = new_config;
                    info!("Configuration reloaded successfully");
                }
                Err(e) => {
                    error!("Failed to reload configuration: {:#}", e);
                }
            }
        }
    }

    Ok(())
}

fn build_http_client(proxy: Option<&str>) -> anyhow::Result<reqwest::Client> {
    let client_builder = reqwest::Client::builder();
    let client_builder = match proxy {
        Some(proxy) => client_builder.proxy(reqwest::Proxy::all(proxy)?),
        None => client_builder,
    };
    Ok(client_builder.build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = Level::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using INFO level.", args.log_level);
        Level::INFO
    });
    init_logging(log_level, args.log_file.as_deref())?;

    let config_path = args.config.clone();
    let config = Arc::new(RwLock::new(Config::from_file(&config_path)?));
    info!("Configuration loaded successfully from: {}", config_path);

    let config_for_watcher = config.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_config_file(&config_path, &config_for_watcher).await {
            warn!("Config file watcher error: {}", e);
        }
    });

    if let Some(proxy) = &args.proxy {
        info!("Using proxy: {}", proxy);
    }
    let http_client = Arc::new(build_http_client(args.proxy.as_deref())?);

    let app_state = AppState {
        config,
        token: args.token,
        llm_client: Arc::new(LlmClient::new(http_client)),
    };
    let app = build_router(app_state);

    let bind_address = format!("{}:{}", args.ip, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server started on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
