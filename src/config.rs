//! Carga, fusión y validación de la configuración del asistente.
//!
//! La configuración es un valor inmutable: "actualizarla" significa construir
//! uno nuevo con `merged` y reconstruir lo que dependa de él.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AssistantError, Result};

/// Subruta fija del índice vectorial dentro de `cache_dir`.
pub const VECTOR_STORE_DIR: &str = "vector_store";
pub const VECTOR_STORE_FILE: &str = "index.json";

/// Configuración completa del asistente.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub docs_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_model: String,
    pub llm_model: String,
    pub temperature: f64,
    pub top_k: usize,
    pub cache_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            chunk_size: 1024,
            chunk_overlap: 128,
            embedding_model: "text-embedding-3-small".to_string(),
            llm_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            top_k: 3,
            cache_dir: PathBuf::from(".cache"),
            request_timeout_secs: 60,
        }
    }
}

/// Valores opcionales que se superponen a una configuración existente.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub docs_dir: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub embedding_model: Option<String>,
    pub llm_model: Option<String>,
    pub temperature: Option<f64>,
    pub top_k: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno `DOCQA_*` (usando
    /// .env si existe), partiendo de los valores por defecto.
    pub fn from_env() -> Result<Self> {
        let overrides = ConfigOverrides {
            docs_dir: env::var("DOCQA_DOCS_DIR").ok().map(PathBuf::from),
            chunk_size: parse_env("DOCQA_CHUNK_SIZE")?,
            chunk_overlap: parse_env("DOCQA_CHUNK_OVERLAP")?,
            embedding_model: env::var("DOCQA_EMBEDDING_MODEL").ok(),
            llm_model: env::var("DOCQA_LLM_MODEL").ok(),
            temperature: parse_env("DOCQA_TEMPERATURE")?,
            top_k: parse_env("DOCQA_TOP_K")?,
            cache_dir: env::var("DOCQA_CACHE_DIR").ok().map(PathBuf::from),
            request_timeout_secs: parse_env("DOCQA_REQUEST_TIMEOUT_SECS")?,
        };
        Ok(Self::default().merged(overrides))
    }

    /// Devuelve una configuración nueva con los valores de `overrides`
    /// aplicados sobre los de `self`.
    pub fn merged(&self, overrides: ConfigOverrides) -> Self {
        let base = self.clone();
        Self {
            docs_dir: overrides.docs_dir.unwrap_or(base.docs_dir),
            chunk_size: overrides.chunk_size.unwrap_or(base.chunk_size),
            chunk_overlap: overrides.chunk_overlap.unwrap_or(base.chunk_overlap),
            embedding_model: overrides.embedding_model.unwrap_or(base.embedding_model),
            llm_model: overrides.llm_model.unwrap_or(base.llm_model),
            temperature: overrides.temperature.unwrap_or(base.temperature),
            top_k: overrides.top_k.unwrap_or(base.top_k),
            cache_dir: overrides.cache_dir.unwrap_or(base.cache_dir),
            request_timeout_secs: overrides
                .request_timeout_secs
                .unwrap_or(base.request_timeout_secs),
        }
    }

    /// Comprueba los invariantes antes de ingerir o consultar nada.
    /// No corrige valores: sólo falla.
    pub fn validate(&self) -> Result<()> {
        if !self.docs_dir.exists() {
            return Err(AssistantError::config(format!(
                "doc dir {} does not exist",
                self.docs_dir.display()
            )));
        }
        if self.chunk_size == 0 {
            return Err(AssistantError::config("chunk_size must be greater than 0"));
        }
        if self.chunk_size <= self.chunk_overlap {
            return Err(AssistantError::config(
                "chunk_size must be greater than chunk_overlap",
            ));
        }
        if self.top_k == 0 {
            return Err(AssistantError::config("top_k must be greater than 0"));
        }
        Ok(())
    }

    /// Ruta del fichero del índice vectorial persistido.
    pub fn vector_store_path(&self) -> PathBuf {
        index_path_in(&self.cache_dir)
    }
}

pub fn index_path_in(cache_dir: &Path) -> PathBuf {
    cache_dir.join(VECTOR_STORE_DIR).join(VECTOR_STORE_FILE)
}

/// Lee la credencial del modelo de generación. Su ausencia es fatal.
pub fn require_api_key() -> Result<String> {
    match env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(AssistantError::config(
            "OPENAI_API_KEY not found. please add to .env file like: OPENAI_API_KEY=\"sk-...\"",
        )),
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AssistantError::config(format!("valor inválido en {name}='{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Los tests que tocan variables de entorno no pueden ir en paralelo.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "OPENAI_API_KEY",
        "DOCQA_DOCS_DIR",
        "DOCQA_CHUNK_SIZE",
        "DOCQA_CHUNK_OVERLAP",
        "DOCQA_EMBEDDING_MODEL",
        "DOCQA_LLM_MODEL",
        "DOCQA_TEMPERATURE",
        "DOCQA_TOP_K",
        "DOCQA_CACHE_DIR",
        "DOCQA_REQUEST_TIMEOUT_SECS",
    ];

    fn clear_docqa_env() {
        for k in ENV_VARS {
            env::remove_var(k);
        }
    }

    fn config_in(dir: &Path, chunk_size: usize, chunk_overlap: usize) -> AppConfig {
        AppConfig {
            docs_dir: dir.to_path_buf(),
            chunk_size,
            chunk_overlap,
            ..AppConfig::default()
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let dir = tempfile::tempdir().unwrap();
        for (size, overlap) in [(100, 100), (50, 80)] {
            let err = config_in(dir.path(), size, overlap).validate().unwrap_err();
            assert!(err.is_config(), "({size}, {overlap}) should fail");
        }
        assert!(config_in(dir.path(), 100, 20).validate().is_ok());
    }

    #[test]
    fn rejects_missing_docs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = config_in(&missing, 100, 20).validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn rejects_zero_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig {
            top_k: 0,
            ..config_in(dir.path(), 100, 20)
        };
        assert!(cfg.validate().unwrap_err().is_config());
    }

    #[test]
    fn merged_builds_a_new_value() {
        let base = AppConfig::default();
        let updated = base.merged(ConfigOverrides {
            top_k: Some(7),
            llm_model: Some("gpt-4o-mini".into()),
            ..ConfigOverrides::default()
        });

        assert_eq!(updated.top_k, 7);
        assert_eq!(updated.llm_model, "gpt-4o-mini");
        assert_eq!(updated.chunk_size, base.chunk_size);
        assert_eq!(base.top_k, 3);
    }

    #[test]
    fn vector_store_path_is_under_cache_dir() {
        let cfg = AppConfig {
            cache_dir: PathBuf::from("/tmp/cache"),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.vector_store_path(),
            PathBuf::from("/tmp/cache/vector_store/index.json")
        );
    }

    #[test]
    fn api_key_missing_or_blank_is_a_config_error() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_docqa_env();

        let err = require_api_key().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("OPENAI_API_KEY not found"));

        for blank in ["", "   "] {
            env::set_var("OPENAI_API_KEY", blank);
            assert!(require_api_key().unwrap_err().is_config(), "{blank:?}");
        }

        env::set_var("OPENAI_API_KEY", "sk-test");
        assert_eq!(require_api_key().unwrap(), "sk-test");

        clear_docqa_env();
    }

    #[test]
    fn from_env_applies_docqa_variables() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_docqa_env();

        env::set_var("DOCQA_TOP_K", " 5 ");
        env::set_var("DOCQA_LLM_MODEL", "gpt-4o-mini");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.top_k, 5);
        assert_eq!(cfg.llm_model, "gpt-4o-mini");
        assert_eq!(cfg.chunk_size, AppConfig::default().chunk_size);

        clear_docqa_env();
    }

    #[test]
    fn from_env_rejects_unparsable_numbers() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_docqa_env();

        env::set_var("DOCQA_CHUNK_SIZE", "abc");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("DOCQA_CHUNK_SIZE"));

        clear_docqa_env();
    }
}
