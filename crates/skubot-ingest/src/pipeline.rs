//! The ingest pipeline: rows in, index records and vocabulary files out.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::Value;

use skubot_core::{DataPaths, Error, Result};
use skubot_index::{IndexRecord, VectorIndex};
use skubot_nlu::vocab::{CategoricalValuesFile, SkuVocabFile};

use crate::record::{build_metadata, row_to_text, RawRow, CATEGORICAL_COLUMNS};

const UPSERT_BATCH: usize = 100;

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub rows: usize,
    pub indexed: usize,
    pub blank_skus: usize,
    pub duplicates_dropped: usize,
}

/// Transform rows into index records, push them to the vector index, and
/// write the vocabulary files chat loads at query time. Rows without a
/// product number are skipped; a repeated product number keeps its first
/// occurrence.
pub async fn run_ingest(
    rows: Vec<RawRow>,
    paths: &DataPaths,
    index: &dyn VectorIndex,
) -> Result<IngestSummary> {
    let mut summary = IngestSummary {
        rows: rows.len(),
        ..Default::default()
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut skus: BTreeSet<String> = BTreeSet::new();
    let mut values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut records: Vec<IndexRecord> = Vec::new();

    for row in &rows {
        let Some(sku) = row.sku() else {
            summary.blank_skus += 1;
            continue;
        };
        if !seen.insert(sku.clone()) {
            summary.duplicates_dropped += 1;
            tracing::debug!(%sku, "duplicate product number, keeping first row");
            continue;
        }

        let metadata = build_metadata(row);
        for (key, _) in CATEGORICAL_COLUMNS {
            if let Some(Value::String(v)) = metadata.get(*key) {
                values
                    .entry((*key).to_string())
                    .or_default()
                    .insert(v.clone());
            }
        }
        if let Some(Value::Array(tags)) = metadata.get("material_tags") {
            let entry = values.entry("material_tags".to_string()).or_default();
            for t in tags {
                if let Value::String(t) = t {
                    entry.insert(t.clone());
                }
            }
        }

        skus.insert(sku.clone());
        records.push(IndexRecord {
            sku,
            text: row_to_text(row),
            metadata,
        });
    }

    write_vocabulary(paths, &skus, &values)?;

    summary.indexed = records.len();
    let mut batch = 0usize;
    while !records.is_empty() {
        let rest = records.split_off(records.len().min(UPSERT_BATCH));
        let chunk = std::mem::replace(&mut records, rest);
        batch += 1;
        tracing::info!(batch, count = chunk.len(), "upserting batch");
        index.upsert(chunk).await?;
    }

    tracing::info!(
        rows = summary.rows,
        indexed = summary.indexed,
        blank = summary.blank_skus,
        duplicates = summary.duplicates_dropped,
        "ingest complete"
    );
    Ok(summary)
}

fn write_vocabulary(
    paths: &DataPaths,
    skus: &BTreeSet<String>,
    values: &BTreeMap<String, BTreeSet<String>>,
) -> Result<()> {
    std::fs::create_dir_all(&paths.root)?;

    let sku_file = SkuVocabFile {
        version: 1,
        skus: skus.iter().cloned().collect(),
    };
    write_json(&paths.sku_vocab, &sku_file)?;

    let values_file = CategoricalValuesFile {
        version: 1,
        fields: values
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect(),
    };
    write_json(&paths.categorical_values, &values_file)?;
    tracing::info!(
        skus = sku_file.skus.len(),
        fields = values_file.fields.len(),
        "vocabulary files written"
    );
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &std::path::Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Ingest(format!("cannot serialize {}: {e}", path.display())))?;
    std::fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skubot_index::MemoryIndex;
    use skubot_nlu::vocab::CatalogVocabulary;

    fn cable_row(sku: &str, length: &str) -> RawRow {
        let mut row = RawRow::new();
        row.set_text("Product Number", sku);
        row.set_text("Category", "Cable");
        row.set_text("Sub Category", "HDMI Cables");
        row.set_text("CABLELENGTH", length);
        row.set_text("Material", "Copper and PVC");
        row
    }

    #[tokio::test]
    async fn test_run_ingest_writes_vocab_and_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path(), dir.path().join("catalog.xlsx"));
        let index = MemoryIndex::new();

        let rows = vec![cable_row("abc100", "6 ft"), cable_row("XYZ200", "1 m")];
        let summary = run_ingest(rows, &paths, &index).await.unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.blank_skus, 0);
        assert_eq!(summary.duplicates_dropped, 0);

        let vocab = CatalogVocabulary::load(&paths).unwrap();
        assert!(vocab.is_known_sku("ABC100"));
        assert!(vocab.is_known_sku("XYZ200"));
        assert_eq!(vocab.values_for("category"), ["cable".to_string()]);
        assert!(vocab
            .material_tags()
            .contains(&"copper".to_string()));

        let hits = index.search("hdmi cable", 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_run_ingest_skips_blank_and_duplicate_skus() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path(), dir.path().join("catalog.xlsx"));
        let index = MemoryIndex::new();

        let mut blank = RawRow::new();
        blank.set_text("Category", "Cable");
        let rows = vec![
            cable_row("ABC100", "6 ft"),
            blank,
            cable_row("abc100", "2 m"),
        ];
        let summary = run_ingest(rows, &paths, &index).await.unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.blank_skus, 1);
        assert_eq!(summary.duplicates_dropped, 1);

        // the first occurrence's data wins
        let hits = index
            .search("cable", 5, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["cablelength"], 6.0 * 304.8);
    }
}
