//! Índice vectorial persistido en disco para los chunks.
//!
//! API pública:
//!   - `VectorIndex::create(&[Chunk])`: embebe todo y persiste (todo o nada).
//!   - `VectorIndex::load()`: se engancha al índice existente.
//!   - `VectorIndex::retrieve(&str, usize)`: top-k por similitud coseno.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AssistantError, Result};
use crate::llm::Embedder;
use crate::models::{Chunk, ScoredChunk};

/// Versión del formato del fichero del índice.
const INDEX_FORMAT_VERSION: u32 = 1;

/// Máximo de textos por llamada al proveedor de embeddings.
const EMBED_BATCH_SIZE: usize = 64;

/// Chunk persistido con su vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDoc {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedding_model: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    entries: Vec<ChunkDoc>,
}

enum IndexState {
    Uninitialized,
    Ready(PersistedIndex),
}

pub struct VectorIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    state: IndexState,
}

impl VectorIndex {
    pub fn new(path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            path: path.into(),
            embedder,
            state: IndexState::Uninitialized,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, IndexState::Ready(_))
    }

    /// Número de chunks indexados (0 si no está listo).
    pub fn len(&self) -> usize {
        match &self.state {
            IndexState::Ready(index) => index.entries.len(),
            IndexState::Uninitialized => 0,
        }
    }

    /// Embebe todos los chunks y sobrescribe el índice en disco.
    /// Cualquier fallo deja el fichero anterior intacto y el estado sin tocar.
    pub async fn create(&mut self, chunks: &[Chunk]) -> Result<()> {
        info!("creating vector store with {} chunks", chunks.len());

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| AssistantError::IndexBuild(e.to_string()))?;

            if vectors.len() != batch.len() {
                return Err(AssistantError::IndexBuild(format!(
                    "se esperaban {} vectores y llegaron {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            entries.extend(batch.iter().zip(vectors).map(|(chunk, embedding)| ChunkDoc {
                id: Uuid::new_v4().to_string(),
                chunk: chunk.clone(),
                embedding,
            }));
        }

        let dimensions = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            return Err(AssistantError::IndexBuild(format!(
                "dimensión inconsistente: {} frente a {dimensions}",
                bad.embedding.len()
            )));
        }

        let index = PersistedIndex {
            version: INDEX_FORMAT_VERSION,
            embedding_model: self.embedder.model_name().to_string(),
            dimensions,
            created_at: Utc::now(),
            entries,
        };
        self.persist(&index)
            .await
            .map_err(|e| AssistantError::IndexBuild(format!("{}: {e}", self.path.display())))?;

        info!("vector store created successfully ({} vectors, dim {dimensions})", index.entries.len());
        self.state = IndexState::Ready(index);
        Ok(())
    }

    /// Escribe en un fichero temporal y lo renombra sobre el definitivo.
    async fn persist(&self, index: &PersistedIndex) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec(index)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }

    /// Carga el índice persistido sin recalcular embeddings.
    pub async fn load(&mut self) -> Result<()> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AssistantError::IndexLoad(format!("{}: {e}", self.path.display())))?;
        let index: PersistedIndex = serde_json::from_slice(&data)
            .map_err(|e| AssistantError::IndexLoad(format!("{}: {e}", self.path.display())))?;

        if index.version != INDEX_FORMAT_VERSION {
            return Err(AssistantError::IndexLoad(format!(
                "versión de formato {} no soportada",
                index.version
            )));
        }
        if index.embedding_model != self.embedder.model_name() {
            warn!(
                "El índice se construyó con '{}' y se consultará con '{}'; los resultados pueden degradarse. Usa --recreate.",
                index.embedding_model,
                self.embedder.model_name()
            );
        }

        info!(
            "Vector store loaded from disk ({} vectors, creado {})",
            index.entries.len(),
            index.created_at.to_rfc3339()
        );
        self.state = IndexState::Ready(index);
        Ok(())
    }

    /// Devuelve los `k` chunks más parecidos a la consulta, de mayor a menor.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .retrieve_scored(query, k)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let IndexState::Ready(index) = &self.state else {
            return Err(AssistantError::NotInitialized);
        };
        if index.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_batch(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::Retrieval("no se pudo generar embedding de la query".into()))?;

        if query_vec.len() != index.dimensions {
            return Err(AssistantError::Retrieval(format!(
                "la query tiene dimensión {} y el índice {}",
                query_vec.len(),
                index.dimensions
            )));
        }

        let mut scored: Vec<ScoredChunk> = index
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                id: entry.id.clone(),
                score: cosine_similarity(&query_vec, &entry.embedding),
                chunk: entry.chunk.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        for hit in &scored {
            debug!(
                "score {:.4} -> {} ({}#{})",
                hit.score, hit.id, hit.chunk.source, hit.chunk.sequence_index
            );
        }
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
