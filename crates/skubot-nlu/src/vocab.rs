//! Catalog vocabulary: known SKUs, hyphen-insensitive SKU lookup, and the
//! distinct values of each categorical metadata field.
//!
//! Loaded from the two JSON documents that ingestion writes
//! (`sku_vocab.json`, `categorical_values.json`). [`VocabCache`] reloads
//! them when their modification time advances, so a re-ingest is picked up
//! without a restart.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use skubot_core::{DataPaths, Error, Result};

/// Categorical fields the matcher may consult, present even when empty.
pub const CATEGORICAL_FIELDS: &[&str] = &[
    "category",
    "subcategory",
    "material",
    "fiberduplex",
    "fibertype",
    "material_tags",
    "color",
    "wireless",
    "interface",
    "mounting_options",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct SkuVocabFile {
    #[serde(default = "default_version")]
    pub version: u32,
    pub skus: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoricalValuesFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
}

fn default_version() -> u32 {
    1
}

/// Read-only vocabulary built once from the full corpus.
#[derive(Debug, Default)]
pub struct CatalogVocabulary {
    skus: HashSet<String>,
    nohyphen: HashMap<String, String>,
    values: BTreeMap<String, Vec<String>>,
}

impl CatalogVocabulary {
    pub fn from_parts(skus: Vec<String>, values: BTreeMap<String, Vec<String>>) -> Self {
        let skus: Vec<String> = skus.into_iter().map(|s| s.trim().to_uppercase()).collect();
        let mut nohyphen = HashMap::new();
        for s in &skus {
            nohyphen.entry(s.replace('-', "")).or_insert_with(|| s.clone());
        }
        let mut values = values;
        for field in CATEGORICAL_FIELDS {
            values.entry((*field).to_string()).or_default();
        }
        Self {
            skus: skus.into_iter().collect(),
            nohyphen,
            values,
        }
    }

    pub fn load(paths: &DataPaths) -> Result<Self> {
        let sku_file: SkuVocabFile = read_json(&paths.sku_vocab)?;
        let values_file: CategoricalValuesFile = read_json(&paths.categorical_values)?;
        Ok(Self::from_parts(sku_file.skus, values_file.fields))
    }

    pub fn is_known_sku(&self, token: &str) -> bool {
        self.skus.contains(token)
    }

    /// Exact or hyphen-insensitive SKU lookup.
    pub fn resolve_sku(&self, token: &str) -> Option<&str> {
        if let Some(s) = self.skus.get(token) {
            return Some(s.as_str());
        }
        self.nohyphen
            .get(&token.replace('-', ""))
            .map(|s| s.as_str())
    }

    /// Distinct values of a categorical field, sorted; empty for unknown
    /// fields.
    pub fn values_for(&self, field: &str) -> &[String] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn material_tags(&self) -> &[String] {
        self.values_for("material_tags")
    }

    pub fn sku_count(&self) -> usize {
        self.skus.len()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Vocabulary(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Vocabulary(format!("cannot parse {}: {e}", path.display())))
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Mtime-watching wrapper around [`CatalogVocabulary`].
pub struct VocabCache {
    sku_path: PathBuf,
    values_path: PathBuf,
    inner: RwLock<CachedVocab>,
}

struct CachedVocab {
    vocab: Arc<CatalogVocabulary>,
    sku_mtime: Option<SystemTime>,
    values_mtime: Option<SystemTime>,
}

impl VocabCache {
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let vocab = Arc::new(CatalogVocabulary::load(paths)?);
        Ok(Self {
            sku_path: paths.sku_vocab.clone(),
            values_path: paths.categorical_values.clone(),
            inner: RwLock::new(CachedVocab {
                vocab,
                sku_mtime: mtime(&paths.sku_vocab),
                values_mtime: mtime(&paths.categorical_values),
            }),
        })
    }

    /// Current vocabulary, reloaded if either backing file changed on disk.
    /// A failed reload keeps serving the previous snapshot.
    pub fn current(&self) -> Arc<CatalogVocabulary> {
        let sku_mtime = mtime(&self.sku_path);
        let values_mtime = mtime(&self.values_path);
        {
            let inner = self.inner.read();
            if inner.sku_mtime == sku_mtime && inner.values_mtime == values_mtime {
                return Arc::clone(&inner.vocab);
            }
        }
        let paths = DataPaths {
            root: PathBuf::new(),
            sku_vocab: self.sku_path.clone(),
            categorical_values: self.values_path.clone(),
            catalog_xlsx: PathBuf::new(),
        };
        match CatalogVocabulary::load(&paths) {
            Ok(fresh) => {
                let mut inner = self.inner.write();
                inner.vocab = Arc::new(fresh);
                inner.sku_mtime = sku_mtime;
                inner.values_mtime = values_mtime;
                tracing::info!(skus = inner.vocab.sku_count(), "vocabulary reloaded");
                Arc::clone(&inner.vocab)
            }
            Err(e) => {
                tracing::warn!(error = %e, "vocabulary reload failed, keeping previous");
                Arc::clone(&self.inner.read().vocab)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_vocab() -> CatalogVocabulary {
        let mut values = BTreeMap::new();
        values.insert(
            "category".to_string(),
            vec!["cable".to_string(), "docking station".to_string()],
        );
        CatalogVocabulary::from_parts(
            vec!["ABC123".to_string(), "KVM-4P".to_string()],
            values,
        )
    }

    #[test]
    fn test_resolve_sku_hyphen_insensitive() {
        let v = sample_vocab();
        assert_eq!(v.resolve_sku("ABC123"), Some("ABC123"));
        assert_eq!(v.resolve_sku("ABC-123"), Some("ABC123"));
        assert_eq!(v.resolve_sku("KVM4P"), Some("KVM-4P"));
        assert_eq!(v.resolve_sku("NOPE99"), None);
    }

    #[test]
    fn test_values_for_unknown_field_empty() {
        let v = sample_vocab();
        assert_eq!(v.values_for("category").len(), 2);
        assert!(v.values_for("wireless").is_empty());
        assert!(v.values_for("bogus").is_empty());
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path(), dir.path().join("catalog.xlsx"));
        let mut f = std::fs::File::create(&paths.sku_vocab).unwrap();
        write!(f, r#"{{"version": 1, "skus": ["abc123", "XYZ200"]}}"#).unwrap();
        let mut f = std::fs::File::create(&paths.categorical_values).unwrap();
        write!(f, r#"{{"version": 1, "category": ["Cable"]}}"#).unwrap();

        let v = CatalogVocabulary::load(&paths).unwrap();
        assert!(v.is_known_sku("ABC123"));
        assert!(v.is_known_sku("XYZ200"));
        assert_eq!(v.values_for("category"), ["Cable".to_string()]);
    }
}
