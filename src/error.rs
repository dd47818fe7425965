//! Taxonomía de errores del asistente.
//!
//! Todo se propaga hasta `main` salvo dos casos que se absorben en su
//! frontera: los fallos de lectura de un fichero concreto (en `ingest`) y los
//! fallos de generación (en `answer`).

use thiserror::Error;

/// Error devuelto por un backend de embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("fallo del proveedor de embeddings: {0}")]
    Provider(String),

    #[error("número de embeddings ({actual}) distinto al número de textos ({expected})")]
    CountMismatch { expected: usize, actual: usize },
}

/// Error interno de generación; nunca sale de `AnswerGenerator`.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("fallo del modelo de generación: {0}")]
    Provider(String),

    #[error("la llamada al modelo superó el tiempo límite de {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum AssistantError {
    /// Configuración inválida o incompleta (directorio, troceado, credencial).
    #[error("{0}")]
    Config(String),

    #[error("no se pudo construir el índice vectorial: {0}")]
    IndexBuild(String),

    #[error("no se pudo cargar el índice vectorial: {0}")]
    IndexLoad(String),

    /// Violación de contrato: se consultó el índice antes de `create`/`load`.
    #[error("el índice vectorial no está inicializado")]
    NotInitialized,

    #[error("fallo en la recuperación: {0}")]
    Retrieval(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl AssistantError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T, E = AssistantError> = std::result::Result<T, E>;
