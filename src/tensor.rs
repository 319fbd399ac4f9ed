//! Two-dimensional batch tensor
//!
//! Every value flowing through a model is a batch of feature rows stored
//! row-major in a flat `f32` buffer, the layout the layer kernels expect.

use crate::error::{ModelError, Result};
use std::fmt;

/// Row-major `rows × cols` matrix of `f32` values.
///
/// Rows are samples, columns are features.
///
/// # Example
///
/// ```
/// use custom_models::tensor::Tensor;
///
/// let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
/// assert_eq!(t.shape(), (2, 3));
/// assert_eq!(t.row(1), &[4.0, 5.0, 6.0]);
/// ```
#[derive(Clone)]
pub struct Tensor {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
    /// Id of the forward-pass step that produced this tensor, if any.
    origin: Option<u64>,
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.data == other.data
    }
}

impl Tensor {
    /// Wraps a flat buffer, checking that it holds exactly `rows * cols` values.
    pub fn new(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(ModelError::shape(
                "Tensor::new",
                format!("{} values ({}x{})", rows * cols, rows, cols),
                format!("{} values", data.len()),
            ));
        }
        Ok(Self {
            data,
            rows,
            cols,
            origin: None,
        })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0f32; rows * cols],
            rows,
            cols,
            origin: None,
        }
    }

    /// Builds a tensor from equally sized rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ModelError::shape(
                    format!("Tensor::from_rows row {}", i),
                    cols,
                    row.len(),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
            origin: None,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the values.
    ///
    /// Detaches the tensor from the forward-pass step that produced it: once
    /// edited it is no longer that step's output.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        self.origin = None;
        &mut self.data
    }

    pub(crate) fn origin(&self) -> Option<u64> {
        self.origin
    }

    pub(crate) fn with_origin(mut self, origin: u64) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Borrow a single row.
    ///
    /// # Panics
    ///
    /// Panics if `index >= rows`.
    pub fn row(&self, index: usize) -> &[f32] {
        assert!(index < self.rows, "row index {} out of range", index);
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    /// Iterator over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics, so an empty-column tensor yields no rows
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Copies the given rows, in order, into a new tensor.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            if i >= self.rows {
                return Err(ModelError::InvalidArgument(format!(
                    "row index {} out of range for {} rows",
                    i, self.rows
                )));
            }
            data.extend_from_slice(self.row(i));
        }
        Ok(Self {
            data,
            rows: indices.len(),
            cols: self.cols,
            origin: None,
        })
    }

    /// Copies rows `start..end`.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.rows {
            return Err(ModelError::InvalidArgument(format!(
                "row range {}..{} out of range for {} rows",
                start, end, self.rows
            )));
        }
        Ok(Self {
            data: self.data[start * self.cols..end * self.cols].to_vec(),
            rows: end - start,
            cols: self.cols,
            origin: None,
        })
    }

    /// Index of the largest value in each row.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.iter_rows()
            .map(|row| {
                let mut best = 0;
                for (j, &value) in row.iter().enumerate() {
                    if value > row[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<f32> {
        self.iter_rows().map(|row| row.iter().sum()).collect()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(Tensor::new(vec![1.0, 2.0, 3.0], 2, 2).is_err());
        assert!(Tensor::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2).is_ok());
    }

    #[test]
    fn test_from_rows_ragged() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Tensor::from_rows(&rows).is_err());
    }

    #[test]
    fn test_select_and_slice_rows() {
        let t = Tensor::new((0..12).map(|v| v as f32).collect(), 4, 3).unwrap();

        let picked = t.select_rows(&[3, 0]).unwrap();
        assert_eq!(picked.as_slice(), &[9.0, 10.0, 11.0, 0.0, 1.0, 2.0]);

        let sliced = t.slice_rows(1, 3).unwrap();
        assert_eq!(sliced.shape(), (2, 3));
        assert_eq!(sliced.row(0), &[3.0, 4.0, 5.0]);

        assert!(t.slice_rows(3, 5).is_err());
        assert!(t.select_rows(&[4]).is_err());
    }

    #[test]
    fn test_origin_ignored_by_eq_and_cleared_on_write() {
        let t = Tensor::zeros(2, 2).with_origin(7);
        assert_eq!(t.origin(), Some(7));
        assert_eq!(t, Tensor::zeros(2, 2));
        assert_eq!(t.clone().origin(), Some(7));
        assert_eq!(t.slice_rows(0, 1).unwrap().origin(), None);

        let mut edited = t;
        edited.as_mut_slice()[0] = 1.0;
        assert_eq!(edited.origin(), None);
    }

    #[test]
    fn test_argmax_and_sums() {
        let t = Tensor::new(vec![0.1, 0.7, 0.2, 0.5, 0.25, 0.25], 2, 3).unwrap();
        assert_eq!(t.argmax_rows(), vec![1, 0]);
        let sums = t.row_sums();
        assert!((sums[0] - 1.0).abs() < 1e-6);
        assert!((sums[1] - 1.0).abs() < 1e-6);
    }
}
