//! Modelos de dominio (documentos, chunks y resultados de carga).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Documento leído del directorio de entrada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Ruta del fichero de origen.
    pub source: String,
}

/// Trozo contiguo del contenido de un documento.
/// Es la unidad de embedding y de recuperación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    /// Posición del chunk dentro de su documento.
    pub sequence_index: usize,
    /// Desplazamiento (en caracteres) del inicio del chunk en el documento.
    pub start: usize,
}

/// Chunk recuperado junto con su similitud coseno respecto a la consulta.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Identificador estable del chunk dentro del índice persistido.
    pub id: String,
    pub score: f64,
    pub chunk: Chunk,
}

/// Fichero omitido durante la carga, con el motivo.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Resultado de una carga: éxito parcial explícito.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} documentos cargados, {} ficheros omitidos",
            self.documents.len(),
            self.skipped.len()
        )
    }
}
