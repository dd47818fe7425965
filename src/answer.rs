//! Generación de la respuesta final a partir del contexto recuperado.
//!
//! Esta es la única frontera que convierte un error en un resultado: si el
//! modelo falla, se devuelve `FALLBACK_ANSWER`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::GenerationError;
use crate::llm::{GenerationRequest, Generator};
use crate::models::Chunk;

pub const FALLBACK_ANSWER: &str = "Sorry, I encountered an error.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on context.
If you don't know the answer, say you don't know. Keep answers concise.";

/// Respuesta generada, con el error si se tuvo que degradar.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub error: Option<String>,
}

pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
    model: String,
    temperature: f64,
    /// Tiempo máximo por llamada al modelo, sea cual sea el backend.
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(cfg: &AppConfig, generator: Arc<dyn Generator>) -> Self {
        info!("Using OpenAI model: {}", cfg.llm_model);
        Self {
            generator,
            model: cfg.llm_model.clone(),
            temperature: cfg.temperature,
            timeout: Duration::from_secs(cfg.request_timeout_secs),
        }
    }

    /// Nunca falla: ante cualquier error lo registra y devuelve `FALLBACK_ANSWER`.
    pub async fn generate(&self, context: &[Chunk], question: &str) -> String {
        let answer = self.generate_detailed(context, question).await;
        if let Some(reason) = &answer.error {
            error!("Error generating answer: {reason}");
        }
        answer.text
    }

    /// Como `generate`, pero devuelve el motivo de la degradación en vez de registrarlo.
    pub async fn generate_detailed(&self, context: &[Chunk], question: &str) -> GeneratedAnswer {
        let request = self.build_request(context, question);
        let completion = tokio::time::timeout(self.timeout, self.generator.complete(&request))
            .await
            .unwrap_or_else(|_| Err(GenerationError::Timeout(self.timeout.as_secs())));

        match completion {
            Ok(text) => GeneratedAnswer { text, error: None },
            Err(e) => GeneratedAnswer {
                text: FALLBACK_ANSWER.to_string(),
                error: Some(e.to_string()),
            },
        }
    }

    fn build_request(&self, context: &[Chunk], question: &str) -> GenerationRequest {
        let context_text = context
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        GenerationRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            preamble: format!("{SYSTEM_PROMPT}\n\nContext: {context_text}"),
            question: question.to_string(),
        }
    }
}
