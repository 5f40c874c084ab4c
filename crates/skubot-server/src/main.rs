//! SkuBot: product-catalog chat over a hosted vector index.
//!
//! `skubot` starts the HTTP server; `skubot ingest` rebuilds the index and
//! vocabulary files from the catalog spreadsheet.

use std::sync::Arc;

use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use skubot_chat::OpenAiChatClient;
use skubot_core::SkubotConfig;
use skubot_index::{OpenAiEmbedder, PineconeIndex, VectorIndex};
use skubot_nlu::VocabCache;
use skubot_runtime::TurnEngine;
use state::AppState;

async fn connect_index(config: &SkubotConfig) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let client = Client::new();
    let embedder = Arc::new(OpenAiEmbedder::new(
        client.clone(),
        &config.openai_api_key,
        &config.embed_model,
    ));
    let index = PineconeIndex::connect(
        client,
        &config.pinecone_api_key,
        &config.index_name,
        embedder,
    )
    .await?;
    Ok(Arc::new(index))
}

async fn run_ingest(config: &SkubotConfig) -> anyhow::Result<()> {
    let rows = skubot_ingest::load_rows(&config.data_paths.catalog_xlsx)?;
    let index = connect_index(config).await?;
    let summary = skubot_ingest::run_ingest(rows, &config.data_paths, index.as_ref()).await?;
    info!(
        rows = summary.rows,
        indexed = summary.indexed,
        blank = summary.blank_skus,
        duplicates = summary.duplicates_dropped,
        "ingest finished"
    );
    Ok(())
}

async fn run_server(config: SkubotConfig) -> anyhow::Result<()> {
    let index = connect_index(&config).await?;
    let vocab = Arc::new(VocabCache::load(&config.data_paths)?);
    let renderer = Arc::new(OpenAiChatClient::new(
        &config.openai_api_key,
        &config.chat_model,
        config.temperature,
    ));
    let engine = TurnEngine::new(vocab, Arc::clone(&index), renderer);
    let app = routes::build_router(Arc::new(AppState::new(engine)));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("skubot listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SkubotConfig::from_env()?;
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "ingest" | "--ingest" => return run_ingest(&config).await,
            "--help" | "-h" | "help" => {
                println!("SkuBot product-catalog chat server");
                println!();
                println!("Usage: skubot [command]");
                println!();
                println!("Commands:");
                println!("  (none)    Start the chat server");
                println!("  ingest    Rebuild the vector index and vocabulary from the catalog");
                println!("  help      Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {other}. Use 'skubot help' for usage.");
                std::process::exit(1);
            }
        }
    }

    run_server(config).await
}
