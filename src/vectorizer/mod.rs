// Vectorizer module
// Turns stored text records into an embedding index and answers similarity queries


use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::database::{TextRecord, TextStore, VectorIndex};
use crate::openai::OpenAiClient;
use crate::{RagChatError, Result};

/// One similarity hit, nearest first in a result list
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: i64,
    pub text: String,
    pub distance: f32,
}

/// Outcome of an index build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub batches: usize,
    pub batches_indexed: usize,
    pub batches_skipped: usize,
    pub vectors_added: usize,
}

pub struct Vectorizer {
    client: OpenAiClient,
    store: TextStore,
    index: VectorIndex,
    batch_delay: Duration,
}

impl Vectorizer {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let client = OpenAiClient::new(&config.openai)?;
        let store = TextStore::new(config.mysql.connection_url()?);
        let index = VectorIndex::new(config.openai.embedding_dimension as usize)?;

        Ok(Self::from_parts(client, store, index).with_batch_delay(config.batch_delay()))
    }

    #[inline]
    pub fn from_parts(client: OpenAiClient, store: TextStore, index: VectorIndex) -> Self {
        Self {
            client,
            store,
            index,
            batch_delay: Duration::ZERO,
        }
    }

    /// Pause between embedding batches, to stay under the API rate limit
    #[inline]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn store(&self) -> &TextStore {
        &self.store
    }

    #[inline]
    pub async fn setup_schema(&self, schema_file: &Path) -> Result<()> {
        self.store.setup_schema(schema_file).await
    }

    #[inline]
    pub async fn ingest_from_file(&self, path: &Path) -> Result<Vec<TextRecord>> {
        self.store.ingest_from_file(path).await
    }

    /// Embed a batch of texts. A service failure is logged and yields no vectors.
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        match self.client.embed(texts) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Failed to get embeddings for {} texts: {}", texts.len(), e);
                Vec::new()
            }
        }
    }

    /// Embed `records` in batches of `batch_size` and append them to the index.
    ///
    /// A batch whose embedding request fails is skipped; the remaining batches
    /// are still indexed under their own record ids.
    #[inline]
    pub async fn build_index(
        &mut self,
        records: &[TextRecord],
        batch_size: usize,
    ) -> Result<BuildReport> {
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(batch_size).into());
        }

        let mut report = BuildReport::default();

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(records.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        for (batch_number, batch) in records.chunks(batch_size).enumerate() {
            if batch_number > 0 && !self.batch_delay.is_zero() {
                sleep(self.batch_delay).await;
            }

            report.batches += 1;
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let vectors = self.embed(&texts);

            if vectors.is_empty() {
                warn!(
                    "Skipping batch {} ({} records): no embeddings returned",
                    batch_number + 1,
                    batch.len()
                );
                report.batches_skipped += 1;
                bar.inc(batch.len() as u64);
                continue;
            }

            let ids: Vec<i64> = batch.iter().map(|r| r.id).collect();
            self.index.add_batch(&ids, &vectors)?;

            report.batches_indexed += 1;
            report.vectors_added += vectors.len();
            bar.set_message(format!("batch {}", batch_number + 1));
            bar.inc(batch.len() as u64);
            debug!("Processed batch of {} items", batch.len());
        }

        bar.finish_and_clear();

        info!(
            "Indexed {} vectors from {} batches ({} skipped)",
            report.vectors_added, report.batches, report.batches_skipped
        );
        Ok(report)
    }

    #[inline]
    pub fn save_index(&self, path: &Path) -> Result<()> {
        self.index.save(path)
    }

    #[inline]
    pub fn load_index(&mut self, path: &Path) -> Result<()> {
        self.index = VectorIndex::load(path, self.index.dimension())?;
        Ok(())
    }

    /// The `k` stored texts nearest to `query`, closest first.
    ///
    /// Hits whose record no longer exists in the store are dropped.
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query_vector = self
            .embed(&[query.to_string()])
            .into_iter()
            .next()
            .ok_or_else(|| RagChatError::Service("No embedding returned for query".to_string()))?;

        let neighbors = self.index.search(&query_vector, k)?;
        if neighbors.is_empty() {
            debug!("No neighbours found for query");
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = neighbors.iter().map(|n| n.record_id).collect();
        let records = self.store.get_texts(&ids).await?;

        let results = neighbors
            .iter()
            .filter_map(|neighbor| {
                records
                    .iter()
                    .find(|record| record.id == neighbor.record_id)
                    .map(|record| SearchResult {
                        id: record.id,
                        text: record.text.clone(),
                        distance: neighbor.distance,
                    })
            })
            .collect::<Vec<_>>();

        debug!("Search returned {} results", results.len());
        Ok(results)
    }
}
