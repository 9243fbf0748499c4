#[cfg(test)]
mod tests;

pub mod format;

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::{RagError, Result};

/// A search hit: index position and cosine similarity in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub position: usize,
    pub score: f32,
}

/// Exact inner-product index over unit-length vectors.
///
/// Every stored row is L2-normalized on insertion, so inner product equals cosine
/// similarity. Rows are stored row-major in one contiguous buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// L2-normalize `vector` in place.
///
/// Fails on an empty, zero-length or non-finite vector, none of which has a direction.
#[inline]
pub fn normalize(vector: &mut [f32]) -> Result<()> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if vector.is_empty() || !norm.is_finite() || norm == 0.0 {
        return Err(RagError::InvalidVector(format!(
            "cannot normalize vector of length {} with norm {}",
            vector.len(),
            norm
        )));
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    Ok(())
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.max(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The stored (normalized) vector at `position`
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Raw row-major storage, `len() * dimension()` values
    #[inline]
    pub fn as_rows(&self) -> &[f32] {
        &self.data
    }

    /// Normalize and append vectors; positions continue from `len()`.
    ///
    /// All vectors are validated first, so a failure appends nothing.
    #[inline]
    pub fn add<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<()> {
        let mut staged = Vec::with_capacity(vectors.len() * self.dimension);
        for vector in vectors {
            let vector = vector.as_ref();
            if vector.len() != self.dimension {
                return Err(RagError::Dimension {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            let mut row = vector.to_vec();
            normalize(&mut row)?;
            staged.extend_from_slice(&row);
        }

        self.data.extend_from_slice(&staged);
        debug!("Index now holds {} vectors", self.len());
        Ok(())
    }

    /// Top-`k` rows by inner product with the normalized query.
    ///
    /// Scores are non-increasing; equal scores keep ascending position order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if query.len() != self.dimension {
            return Err(RagError::Dimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        normalize(&mut query)?;

        let mut hits: Vec<Hit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Hit {
                position,
                score: dot(row, &query).clamp(-1.0, 1.0),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
        });
        hits.truncate(k);

        Ok(hits)
    }

    #[inline]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        format::encode(format::INDEX_MAGIC, self.dimension, &self.data)
    }

    /// Decode an index, checking it against the configured dimension
    #[inline]
    pub fn from_bytes(bytes: &[u8], expected_dimension: usize) -> Result<Self> {
        let matrix = format::decode(format::INDEX_MAGIC, bytes)?;
        if matrix.dimension != expected_dimension {
            return Err(RagError::CorruptIndex(format!(
                "index dimension {} does not match configured dimension {}",
                matrix.dimension, expected_dimension
            )));
        }

        Ok(Self {
            dimension: matrix.dimension,
            data: matrix.rows,
        })
    }

    #[inline]
    pub fn persist(&self, path: &Path) -> Result<()> {
        format::write_atomic(path, &self.to_bytes()?)?;
        debug!("Persisted {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    #[inline]
    pub fn load(path: &Path, expected_dimension: usize) -> Result<Self> {
        let bytes = fs::read(path)?;
        let index = Self::from_bytes(&bytes, expected_dimension)?;
        debug!("Loaded {} vectors from {}", index.len(), path.display());
        Ok(index)
    }
}
