//! Environment-driven configuration.
//!
//! Required variables are fatal at startup: the process either comes up with
//! a complete configuration or not at all.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Paths to the files produced by ingestion and consumed by chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root documents directory (e.g. `documents/`).
    pub root: PathBuf,
    /// SKU vocabulary (`documents/sku_vocab.json`).
    pub sku_vocab: PathBuf,
    /// Per-field distinct categorical values (`documents/categorical_values.json`).
    pub categorical_values: PathBuf,
    /// Source spreadsheet for ingestion.
    pub catalog_xlsx: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl AsRef<Path>, catalog_xlsx: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            sku_vocab: root.join("sku_vocab.json"),
            categorical_values: root.join("categorical_values.json"),
            catalog_xlsx: catalog_xlsx.as_ref().to_path_buf(),
            root,
        }
    }
}

/// Top-level SkuBot configuration.
#[derive(Debug, Clone)]
pub struct SkubotConfig {
    /// Pinecone API key.
    pub pinecone_api_key: String,
    /// Pinecone index name (host is resolved from it at startup).
    pub index_name: String,
    /// OpenAI API key (embeddings + completions).
    pub openai_api_key: String,
    /// Chat completion model.
    pub chat_model: String,
    /// Sampling temperature for answers.
    pub temperature: f64,
    /// Embedding model.
    pub embed_model: String,
    /// Embedding dimension, derived from the model unless overridden.
    pub embed_dim: usize,
    /// HTTP server port.
    pub port: u16,
    /// Data file paths.
    pub data_paths: DataPaths,
}

fn env_required(name: &str, hint: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "Missing environment variable '{name}'. {hint}"
        ))),
    }
}

fn env_optional(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// Known embedding dimensions per model.
fn model_dim(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        "text-embedding-3-small" => 1536,
        _ => 3072,
    }
}

impl SkubotConfig {
    /// Build configuration from the environment. Fails fast on anything
    /// required; everything else has a sensible default.
    pub fn from_env() -> Result<Self> {
        let pinecone_api_key = env_required(
            "PINECONE_API_KEY",
            "Set it in your .env or deployment secrets.",
        )?;
        let openai_api_key = env_required(
            "OPENAI_API_KEY",
            "Set it in your .env or deployment secrets.",
        )?;
        let index_name = env_required(
            "PINECONE_INDEX_NAME",
            "This is the Pinecone index to query/create.",
        )?;

        let chat_model = env_optional("OPENAI_CHAT_MODEL", "gpt-4o");
        let temperature = env_optional("OPENAI_TEMPERATURE", "0.7")
            .parse()
            .map_err(|_| Error::Config("OPENAI_TEMPERATURE must be a number".into()))?;
        let embed_model = env_optional("EMBED_MODEL", "text-embedding-3-large");
        let embed_dim = match std::env::var("EMBED_DIM") {
            Ok(v) if !v.trim().is_empty() => v
                .parse()
                .map_err(|_| Error::Config("EMBED_DIM must be an integer".into()))?,
            _ => model_dim(&embed_model),
        };
        let port = env_optional("PORT", "3020")
            .parse()
            .map_err(|_| Error::Config("PORT must be a valid port number".into()))?;

        let docs_dir = env_optional("SKUBOT_DOCUMENTS_DIR", "documents");
        let xlsx = env_optional("DATA_XLSX_PATH", "documents/catalog.xlsx");

        Ok(Self {
            pinecone_api_key,
            index_name,
            openai_api_key,
            chat_model,
            temperature,
            embed_model,
            embed_dim,
            port,
            data_paths: DataPaths::new(docs_dir, xlsx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_paths() {
        let paths = DataPaths::new("documents", "documents/catalog.xlsx");
        assert!(paths.sku_vocab.ends_with("sku_vocab.json"));
        assert!(paths.categorical_values.ends_with("categorical_values.json"));
    }

    #[test]
    fn test_model_dims() {
        assert_eq!(model_dim("text-embedding-3-large"), 3072);
        assert_eq!(model_dim("text-embedding-3-small"), 1536);
    }
}
