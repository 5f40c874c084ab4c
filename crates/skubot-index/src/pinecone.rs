//! Hosted Pinecone index over its REST API.
//!
//! The data-plane host is resolved once from the index name via the control
//! plane at connect time.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use skubot_core::{Error, Filter, Result};

use crate::types::{Embedder, IndexRecord, RecordHit, VectorIndex};

const CONTROL_PLANE: &str = "https://api.pinecone.io";
const UPSERT_BATCH: usize = 100;

pub struct PineconeIndex {
    client: Client,
    api_key: String,
    host: String,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    metadata: serde_json::Map<String, Value>,
}

impl PineconeIndex {
    /// Resolve the index host and return a ready client.
    pub async fn connect(
        client: Client,
        api_key: impl Into<String>,
        index_name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let url = format!("{CONTROL_PLANE}/indexes/{index_name}");
        let resp = client
            .get(&url)
            .header("Api-Key", &api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Index(format!(
                "cannot describe index '{index_name}': {}",
                resp.status()
            )));
        }
        let described: DescribeIndexResponse = resp
            .json()
            .await
            .map_err(|e| Error::Index(format!("bad describe response: {e}")))?;
        tracing::info!(index = index_name, host = %described.host, "pinecone index resolved");
        Ok(Self {
            client,
            api_key,
            host: described.host,
            embedder,
        })
    }

    fn data_url(&self, path: &str) -> String {
        format!("https://{}/{path}", self.host)
    }
}

fn hit_from_match(m: QueryMatch) -> RecordHit {
    let sku = m
        .metadata
        .get("product_number")
        .and_then(Value::as_str)
        .unwrap_or(&m.id)
        .to_string();
    let text = m
        .metadata
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    RecordHit {
        sku,
        text,
        metadata: m.metadata,
        score: m.score,
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<RecordHit>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding for query".into()))?;

        let mut body = json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
        });
        if let Some(f) = filter {
            body["filter"] = f.to_query();
        }
        let resp = self
            .client
            .post(self.data_url("query"))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::Index(format!("query failed ({status}): {detail}")));
        }
        let parsed: QueryResponse = resp
            .json()
            .await
            .map_err(|e| Error::Index(format!("bad query response: {e}")))?;
        Ok(parsed.matches.into_iter().map(hit_from_match).collect())
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        for batch in records.chunks(UPSERT_BATCH) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;

            let vectors: Vec<Value> = batch
                .iter()
                .zip(embeddings)
                .map(|(r, values)| {
                    let mut metadata = r.metadata.clone();
                    metadata.insert("product_number".into(), json!(r.sku));
                    metadata.insert("text".into(), json!(r.text));
                    json!({ "id": r.sku, "values": values, "metadata": metadata })
                })
                .collect();

            let resp = self
                .client
                .post(self.data_url("vectors/upsert"))
                .header("Api-Key", &self.api_key)
                .json(&json!({ "vectors": vectors }))
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let detail = resp.text().await.unwrap_or_default();
                return Err(Error::Index(format!("upsert failed ({status}): {detail}")));
            }
            tracing::debug!(batch = batch.len(), "upserted batch");
        }
        Ok(())
    }
}
