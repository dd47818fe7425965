// Módulos de la aplicación
mod answer;
mod chunking;
mod config;
mod error;
mod ingest;
mod llm;
mod models;
mod rag;
mod vector_store;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigOverrides};
use crate::error::AssistantError;
use crate::llm::LlmManager;
use crate::rag::{Assistant, InitOutcome};

/// Responde preguntas sobre los documentos de un directorio.
#[derive(Debug, Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Question to answer
    #[arg(short, long)]
    question: String,

    /// Recreate vector store
    #[arg(long)]
    recreate: bool,

    #[arg(long, env = "DOCQA_DOCS_DIR")]
    docs_dir: Option<PathBuf>,

    #[arg(long, env = "DOCQA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    top_k: Option<usize>,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    chunk_overlap: Option<usize>,

    #[arg(long)]
    llm_model: Option<String>,

    #[arg(long)]
    embedding_model: Option<String>,

    #[arg(long)]
    temperature: Option<f64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            docs_dir: self.docs_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            top_k: self.top_k,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            llm_model: self.llm_model.clone(),
            embedding_model: self.embedding_model.clone(),
            temperature: self.temperature,
            ..ConfigOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Cargar .env e inicializar logging (a stderr: stdout es para la respuesta)
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(answer) => {
            println!("\nAnswer: {answer}\n");
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<AssistantError>() {
                Some(config_err) if config_err.is_config() => {
                    error!("Configuration error: {config_err}");
                    eprintln!("Error: {config_err}");
                }
                _ => {
                    error!("Unexpected error: {err:#}");
                    eprintln!("Error: Failed to generate answer");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    // 2. Credencial y configuración antes de cualquier trabajo
    let api_key = config::require_api_key()?;
    let cfg = AppConfig::from_env()?.merged(cli.overrides());

    // 3. Backends de embeddings y generación (un único cliente OpenAI)
    let llm_manager = Arc::new(LlmManager::from_config(&cfg, &api_key));

    // 4. Asistente: valida, decide reconstruir o cargar y responde
    let mut assistant = Assistant::new(cfg, llm_manager.clone(), llm_manager)?;
    let outcome = assistant.initialize(cli.recreate).await?;
    if let InitOutcome::Rebuilt { skipped, .. } = &outcome {
        for file in skipped {
            warn!("Omitido {}: {}", file.path.display(), file.reason);
        }
    }
    info!("✅ {outcome}");

    // 5. Pregunta; una respuesta degradada se registra en `ask` y se muestra igual
    Ok(assistant.ask(&cli.question).await?)
}
