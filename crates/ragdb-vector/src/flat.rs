use ragdb_core::{EmbeddingVector, Error, Result};

/// Exact (brute force) cosine index over contiguous row-major `f32` storage.
///
/// An index with no rows has dimension 0 until the first append fixes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from rows that must all share one dimension.
    pub fn from_vectors(vectors: &[EmbeddingVector]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::new());
        };
        let dim = first.len();
        if dim == 0 {
            return Err(Error::DimensionMismatch { expected: 1, actual: 0 });
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for v in vectors {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
            }
            data.extend_from_slice(v);
        }
        Ok(Self { dim, data })
    }

    pub(crate) fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if (dim == 0 && !data.is_empty()) || (dim != 0 && data.len() % dim != 0) {
            return Err(Error::IndexCorruption(format!(
                "vector data of {} floats is not a multiple of dimension {dim}",
                data.len()
            )));
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim).filter(|r| !r.is_empty())
    }

    pub(crate) fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Append every row of `other`. Both must have the same dimension unless
    /// one of them is empty.
    pub fn append(&mut self, other: FlatIndex) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.dim != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: other.dim });
        }
        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    /// Top `k` positions by cosine similarity, best first. Equal scores keep
    /// the lower position first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| (position, cosine(query, query_norm, row)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(query: &[f32], query_norm: f32, row: &[f32]) -> f32 {
    let row_norm = norm(row);
    if query_norm == 0.0 || row_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(row).map(|(a, b)| a * b).sum();
    dot / (query_norm * row_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_orders_by_score_then_position() {
        let index = FlatIndex::from_vectors(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![1.0, 1.0],
        ])
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![1, 2, 3, 0]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn k_bounds() {
        let index = FlatIndex::from_vectors(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let err = FlatIndex::from_vectors(&[vec![1.0, 0.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));

        let mut index = FlatIndex::from_vectors(&[vec![1.0, 0.0]]).unwrap();
        let other = FlatIndex::from_vectors(&[vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(index.append(other).is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn append_into_empty_adopts_dimension() {
        let mut index = FlatIndex::new();
        index.append(FlatIndex::from_vectors(&[vec![0.5; 3]]).unwrap()).unwrap();
        assert_eq!(index.dim(), 3);
        assert_eq!(index.row(0), Some(&[0.5, 0.5, 0.5][..]));
        assert_eq!(index.row(1), None);
    }
}
