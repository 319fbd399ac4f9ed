//! Data helpers for building training batches.

use crate::error::{ModelError, Result};
use crate::tensor::Tensor;
use crate::utils::rng::SimpleRng;

/// One-hot encode integer class labels.
///
/// # Example
///
/// ```
/// use custom_models::utils::to_categorical;
///
/// let y = to_categorical(&[0, 2, 1], 3).unwrap();
/// assert_eq!(y.row(1), &[0.0, 0.0, 1.0]);
/// ```
pub fn to_categorical(labels: &[usize], num_classes: usize) -> Result<Tensor> {
    if num_classes == 0 {
        return Err(ModelError::InvalidArgument(
            "num_classes must be greater than 0".to_string(),
        ));
    }
    let mut data = vec![0.0f32; labels.len() * num_classes];
    for (i, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(ModelError::InvalidArgument(format!(
                "label {} at index {} is out of range for {} classes",
                label, i, num_classes
            )));
        }
        data[i * num_classes + label] = 1.0;
    }
    Tensor::new(data, labels.len(), num_classes)
}

/// `rows × cols` tensor of standard normal samples.
pub fn random_normal(rows: usize, cols: usize, rng: &mut SimpleRng) -> Tensor {
    let mut t = Tensor::zeros(rows, cols);
    for value in t.as_mut_slice() {
        *value = rng.next_normal();
    }
    t
}

/// `count` labels drawn uniformly from `0..num_classes`.
pub fn random_labels(count: usize, num_classes: usize, rng: &mut SimpleRng) -> Vec<usize> {
    (0..count).map(|_| rng.gen_usize(num_classes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_categorical_rows_are_one_hot() {
        let y = to_categorical(&[1, 0, 3], 4).unwrap();
        assert_eq!(y.shape(), (3, 4));
        for row in y.iter_rows() {
            assert_eq!(row.iter().sum::<f32>(), 1.0);
        }
        assert_eq!(y.argmax_rows(), vec![1, 0, 3]);
    }

    #[test]
    fn test_to_categorical_out_of_range() {
        assert!(to_categorical(&[0, 5], 3).is_err());
        assert!(to_categorical(&[0], 0).is_err());
    }

    #[test]
    fn test_random_labels_in_range() {
        let mut rng = SimpleRng::new(3);
        let labels = random_labels(500, 10, &mut rng);
        assert!(labels.iter().all(|&l| l < 10));
    }
}
