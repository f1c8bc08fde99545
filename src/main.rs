use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use buscapalabras_backend::{
    build_router,
    config::AppConfig,
    database::PostgrestClient,
    llm::ChatCompletionClient,
    storage::Storage,
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "buscapalabras-backend", version, about = "Spanish word-search API")]
struct Args {
    /// Path to a JSON config file (defaults to ~/.buscapalabras/config.json)
    #[arg(long, env = "BUSCAPALABRAS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(long, env = "BUSCAPALABRAS_BIND")]
    bind: Option<String>,

    /// Directory for the history database, overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).await?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    if config.llm.api_key.is_none() {
        log::warn!("No language model API key configured; natural-language queries will fail");
    }
    if config.database.url.is_empty() {
        log::warn!("No database url configured; searches will fail");
    }

    let storage = Arc::new(Storage::new(&config.data_dir).await?);
    let generator = Arc::new(ChatCompletionClient::new(config.llm.clone())?);
    let database = Arc::new(PostgrestClient::new(&config.database)?);
    log::info!(
        "Using model {} with history at {}",
        generator.model(),
        storage.db_path().display()
    );

    let config = Arc::new(config);
    let app_state = AppState::new(config.clone(), storage, generator, database);
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Backend server running on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
