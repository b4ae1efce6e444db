use crate::{HclusterError, PointId};

/// Row-major matrix of `f32` vectors, the point storage the index reads.
///
/// Rows are stored flattened in one contiguous buffer. Rows are appended,
/// never mutated, so slices handed out by [`Dataset::point`] stay valid for
/// the life of the dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    dim: usize,
    values: Vec<f32>,
}

impl Dataset {
    /// Create an empty dataset holding vectors of `dim` columns.
    pub fn new(dim: usize) -> Result<Self, HclusterError> {
        if dim == 0 {
            return Err(HclusterError::BadParameter(
                "vector dimension must be positive",
            ));
        }
        Ok(Self {
            dim,
            values: Vec::new(),
        })
    }

    /// Create a dataset from a batch of rows. The dimension is taken from the
    /// first row; all rows must share it.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, HclusterError> {
        let dim = rows
            .first()
            .map(|r| r.len())
            .ok_or(HclusterError::BadParameter(
                "cannot infer dimension from an empty row set",
            ))?;
        let mut dataset = Self::new(dim)?;
        dataset.extend(rows)?;
        Ok(dataset)
    }

    /// Append rows to the dataset. Fails if any row's column count differs
    /// from the dataset dimension; no rows are appended in that case.
    pub fn extend(&mut self, rows: &[Vec<f32>]) -> Result<(), HclusterError> {
        for row in rows {
            if row.len() != self.dim {
                return Err(HclusterError::ShapeMismatch {
                    expected: self.dim,
                    got: row.len(),
                });
            }
        }
        self.values.reserve(rows.len() * self.dim);
        for row in rows {
            self.values.extend_from_slice(row);
        }
        Ok(())
    }

    /// Vector for `id`. Panics if `id` is out of range.
    pub fn point(&self, id: PointId) -> &[f32] {
        let start = id as usize * self.dim;
        &self.values[start..start + self.dim]
    }

    /// Number of columns per vector.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    /// Check whether the dataset holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_round_trip_through_flat_storage() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let dataset = Dataset::from_rows(&rows).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.dim(), 2);
        assert_eq!(dataset.point(1), &[3.0, 4.0]);
    }

    #[test]
    fn extend_rejects_mismatched_columns() {
        let mut dataset = Dataset::new(2).unwrap();
        dataset.extend(&[vec![1.0, 2.0]]).unwrap();
        let err = dataset.extend(&[vec![1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(
            err,
            HclusterError::ShapeMismatch {
                expected: 2,
                got: 3
            }
        ));
        // The bad batch must not have been partially applied.
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            Dataset::new(0),
            Err(HclusterError::BadParameter(_))
        ));
    }
}
