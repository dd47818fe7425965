//! Abstracción sobre Rig para embeddings y generación.
//!
//! Los traits `Embedder` y `Generator` son las fronteras con los modelos
//! externos; `LlmManager` los implementa contra OpenAI.

use async_trait::async_trait;
use rig::client::{CompletionClient as _, EmbeddingsClient as _};
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts
use rig::providers::openai;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{EmbeddingError, GenerationError};

/// Función de embedding: un vector de dimensión fija por texto, en orden.
/// Debe ser la misma al construir el índice y al consultarlo.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError>;

    /// Identificador del modelo, que se persiste junto al índice.
    fn model_name(&self) -> &str;
}

/// Petición completa a un modelo de generación.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub temperature: f64,
    /// Instrucciones de sistema con el contexto ya incrustado.
    pub preamble: String,
    pub question: String,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Gestor de LLMs y embeddings sobre OpenAI (vía Rig).
/// El cliente se crea una vez con la clave ya validada.
#[derive(Debug, Clone)]
pub struct LlmManager {
    client: openai::Client,
    pub embedding_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración y la clave de OpenAI.
    pub fn from_config(cfg: &AppConfig, api_key: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
            embedding_model: cfg.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for LlmManager {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        let embedding_model = self.client.embedding_model(&self.embedding_model);

        // Embeddings en bloque (.embed_texts viene de EmbeddingModel)
        let embeddings = embedding_model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        debug!("{} embeddings calculados con {}", embeddings.len(), self.embedding_model);
        Ok(embeddings.into_iter().map(|emb| emb.vec).collect())
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl Generator for LlmManager {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let agent = self
            .client
            .agent(&request.model)
            .preamble(&request.preamble)
            .temperature(request.temperature)
            .build();

        // El límite de tiempo lo aplica `AnswerGenerator` para cualquier backend.
        agent
            .prompt(request.question.as_str())
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))
    }
}
