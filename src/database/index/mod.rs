
use std::path::Path;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::{RagChatError, Result};

/// A stored vector's record id and its squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub record_id: i64,
    pub distance: f32,
}

/// Append-only nearest-neighbour index over fixed-dimension vectors.
///
/// Every vector is keyed by the id of the text record it embeds.
pub struct VectorIndex {
    inner: Index,
    dimension: usize,
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        let options = IndexOptions {
            dimensions: dimension,
            metric: MetricKind::L2sq,
            quantization: ScalarKind::F32,
            connectivity: 0,
            expansion_add: 0,
            expansion_search: 0,
            multi: false,
        };

        let inner = Index::new(&options)
            .map_err(|e| RagChatError::Index(format!("Failed to create index: {}", e)))?;

        Ok(Self { inner, dimension })
    }

    /// Restore an index written by [`VectorIndex::save`]
    #[inline]
    pub fn load(path: &Path, dimension: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(RagChatError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Index file not found: {}", path.display()),
            )));
        }

        let index = Self::new(dimension)?;
        index
            .inner
            .load(&path_str(path)?)
            .map_err(|e| RagChatError::Index(format!("Failed to load {}: {}", path.display(), e)))?;

        if index.inner.dimensions() != dimension {
            return Err(RagChatError::Index(format!(
                "Index {} has dimension {}, expected {}",
                path.display(),
                index.inner.dimensions(),
                dimension
            )));
        }

        info!(
            "Loaded index with {} vectors from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.inner
            .save(&path_str(path)?)
            .map_err(|e| RagChatError::Index(format!("Failed to save {}: {}", path.display(), e)))?;

        info!("Saved index with {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, record_id: i64) -> bool {
        u64::try_from(record_id).is_ok_and(|key| self.inner.contains(key))
    }

    /// Append vectors keyed by their record ids; `ids` and `vectors` pair up by position
    #[inline]
    pub fn add_batch(&mut self, ids: &[i64], vectors: &[Vec<f32>]) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(RagChatError::Index(format!(
                "Got {} ids for {} vectors",
                ids.len(),
                vectors.len()
            )));
        }

        if let Some(vector) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(RagChatError::Index(format!(
                "Vector has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }

        let needed = self.inner.size() + vectors.len();
        if self.inner.capacity() < needed {
            self.inner
                .reserve(needed.max(self.inner.capacity() * 2))
                .map_err(|e| RagChatError::Index(format!("Failed to reserve capacity: {}", e)))?;
        }

        for (&id, vector) in ids.iter().zip(vectors) {
            let key = u64::try_from(id)
                .map_err(|_| RagChatError::Index(format!("Invalid record id {}", id)))?;
            self.inner
                .add(key, vector.as_slice())
                .map_err(|e| RagChatError::Index(format!("Failed to add id {}: {}", id, e)))?;
        }

        debug!("Index now holds {} vectors", self.len());
        Ok(())
    }

    /// The exact `k` nearest vectors by brute-force scan, closest first
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagChatError::Index(format!(
                "Query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .inner
            .exact_search(query, k.min(self.len()))
            .map_err(|e| RagChatError::Index(format!("Search failed: {}", e)))?;

        let mut neighbors: Vec<Neighbor> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(&key, &distance)| {
                i64::try_from(key)
                    .ok()
                    .map(|record_id| Neighbor { record_id, distance })
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(neighbors)
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.len())
            .finish()
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| RagChatError::Index(format!("Non UTF-8 index path: {}", path.display())))
}
