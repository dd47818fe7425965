//! Orquestación RAG: inicializar (reconstruir o cargar) y preguntar.
//!
//! Flujo:
//!   1. `Assistant::new` valida la configuración y crea índice y generador.
//!   2. `initialize(recreate)` decide entre ingesta completa o carga del
//!      índice persistido, sólo por el flag y la existencia del fichero.
//!   3. `ask` recupera los `top_k` chunks y delega en el generador.

use std::sync::Arc;

use tracing::info;

use crate::{
    answer::AnswerGenerator,
    chunking,
    config::AppConfig,
    error::Result,
    ingest,
    llm::{Embedder, Generator},
    models::SkippedFile,
    vector_store::VectorIndex,
};

/// Qué camino tomó `initialize`.
#[derive(Debug)]
pub enum InitOutcome {
    Rebuilt {
        documents: usize,
        chunks: usize,
        skipped: Vec<SkippedFile>,
    },
    Loaded {
        chunks: usize,
    },
}

impl std::fmt::Display for InitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebuilt {
                documents,
                chunks,
                skipped,
            } => write!(
                f,
                "índice reconstruido: {documents} documentos, {chunks} chunks, {} omitidos",
                skipped.len()
            ),
            Self::Loaded { chunks } => write!(f, "índice cargado: {chunks} chunks"),
        }
    }
}

pub struct Assistant {
    config: AppConfig,
    index: VectorIndex,
    answer_generator: AnswerGenerator,
}

impl Assistant {
    /// Falla en cuanto la configuración es inválida; no hay asistente parcial.
    pub fn new(
        config: AppConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let index = VectorIndex::new(config.vector_store_path(), embedder);
        let answer_generator = AnswerGenerator::new(&config, generator);
        Ok(Self {
            config,
            index,
            answer_generator,
        })
    }

    /// Reconstruye el índice si se pide o si no existe; si no, lo carga.
    pub async fn initialize(&mut self, recreate: bool) -> Result<InitOutcome> {
        if recreate || !self.index.exists() {
            info!(
                "Construyendo el índice desde {} (recreate={recreate})",
                self.config.docs_dir.display()
            );
            let report = ingest::load_documents(&self.config.docs_dir)?;
            let chunks = chunking::split_documents(
                &report.documents,
                self.config.chunk_size,
                self.config.chunk_overlap,
            );
            self.index.create(&chunks).await?;

            Ok(InitOutcome::Rebuilt {
                documents: report.documents.len(),
                chunks: chunks.len(),
                skipped: report.skipped,
            })
        } else {
            info!("Reutilizando el índice en {}", self.index.path().display());
            self.index.load().await?;
            Ok(InitOutcome::Loaded {
                chunks: self.index.len(),
            })
        }
    }

    /// Recupera contexto y genera la respuesta. Los fallos de generación
    /// nunca llegan aquí; los de recuperación sí.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let relevant_chunks = self.index.retrieve(question, self.config.top_k).await?;
        info!("{} chunks relevantes para la pregunta", relevant_chunks.len());
        Ok(self
            .answer_generator
            .generate(&relevant_chunks, question)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{tests::ScriptedGenerator, FALLBACK_ANSWER};
    use crate::error::AssistantError;
    use crate::vector_store::tests::BagOfWordsEmbedder;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::Ordering;

    fn config_for(docs: &Path, cache: &Path) -> AppConfig {
        AppConfig {
            docs_dir: docs.to_path_buf(),
            cache_dir: cache.to_path_buf(),
            ..AppConfig::default()
        }
    }

    fn assistant(cfg: AppConfig, embedder: Arc<BagOfWordsEmbedder>, reply: &str) -> Assistant {
        Assistant::new(cfg, embedder, Arc::new(ScriptedGenerator::ok(reply))).unwrap()
    }

    #[test]
    fn construction_fails_fast_on_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..config_for(dir.path(), dir.path())
        };
        let result = Assistant::new(
            cfg,
            Arc::new(BagOfWordsEmbedder::new(8)),
            Arc::new(ScriptedGenerator::ok("")),
        );
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[tokio::test]
    async fn initialize_rebuilds_then_loads_then_rebuilds_on_request() {
        let docs = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("a.txt"), "Rust has no garbage collector.").unwrap();
        fs::write(docs.path().join("b.md"), "# Tokio\n\nAn async runtime.").unwrap();
        let cfg = config_for(docs.path(), cache.path());

        // Sin índice persistido: ingesta completa.
        let mut first = assistant(cfg.clone(), Arc::new(BagOfWordsEmbedder::new(32)), "x");
        let outcome = first.initialize(false).await.unwrap();
        assert!(matches!(
            outcome,
            InitOutcome::Rebuilt { documents: 2, chunks: 2, .. }
        ));
        assert!(cfg.vector_store_path().is_file());

        // Con índice persistido: sólo carga, sin embeddings de documentos.
        let embedder = Arc::new(BagOfWordsEmbedder::new(32));
        let mut second = assistant(cfg.clone(), embedder.clone(), "x");
        let outcome = second.initialize(false).await.unwrap();
        assert!(matches!(outcome, InitOutcome::Loaded { chunks: 2 }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

        // recreate=true siempre reconstruye.
        fs::write(docs.path().join("c.txt"), "A third document.").unwrap();
        let embedder = Arc::new(BagOfWordsEmbedder::new(32));
        let mut third = assistant(cfg, embedder.clone(), "x");
        let outcome = third.initialize(true).await.unwrap();
        assert!(matches!(
            outcome,
            InitOutcome::Rebuilt { documents: 3, chunks: 3, .. }
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ask_before_initialize_is_a_contract_violation() {
        let docs = tempfile::tempdir().unwrap();
        let cfg = config_for(docs.path(), docs.path());
        let assistant = assistant(cfg, Arc::new(BagOfWordsEmbedder::new(8)), "x");

        assert!(!assistant.index.is_ready());
        let err = assistant.ask("hello?").await.unwrap_err();
        assert!(matches!(err, AssistantError::NotInitialized));
    }

    #[tokio::test]
    async fn end_to_end_single_chunk_is_retrieved_and_answered() {
        let docs = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("a.txt"), "Paris is the capital of France.").unwrap();

        let fake = Arc::new(ScriptedGenerator::ok("Paris."));
        let mut assistant = Assistant::new(
            config_for(docs.path(), cache.path()),
            Arc::new(BagOfWordsEmbedder::new(64)),
            fake.clone(),
        )
        .unwrap();

        let outcome = assistant.initialize(false).await.unwrap();
        assert!(matches!(outcome, InitOutcome::Rebuilt { chunks: 1, .. }));

        let hits = assistant
            .index
            .retrieve("What is the capital of France?", assistant.config.top_k)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Paris is the capital of France.");

        let answer = assistant.ask("What is the capital of France?").await.unwrap();
        assert_eq!(answer, "Paris.");
        let request = fake.last_request.lock().unwrap().clone().unwrap();
        assert!(request.preamble.contains("Paris is the capital of France."));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_fallback() {
        let docs = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("a.txt"), "Some content.").unwrap();

        let mut assistant = Assistant::new(
            config_for(docs.path(), cache.path()),
            Arc::new(BagOfWordsEmbedder::new(16)),
            Arc::new(ScriptedGenerator::failing("network down")),
        )
        .unwrap();
        assistant.initialize(false).await.unwrap();

        assert_eq!(assistant.ask("anything?").await.unwrap(), FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn embedding_failure_during_rebuild_propagates() {
        let docs = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("a.txt"), "Some content.").unwrap();

        let mut assistant = Assistant::new(
            config_for(docs.path(), cache.path()),
            Arc::new(BagOfWordsEmbedder::failing()),
            Arc::new(ScriptedGenerator::ok("x")),
        )
        .unwrap();

        let err = assistant.initialize(false).await.unwrap_err();
        assert!(matches!(err, AssistantError::IndexBuild(_)));
        assert!(!assistant.index.is_ready());
        assert!(!assistant.config.vector_store_path().exists());
    }
}
