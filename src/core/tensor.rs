use ndarray::{Array1, ArrayD, ArrayViewD, Axis, IxDyn};

/// Returns a view of a vector reshaped to `rank` dimensions where
/// the vector occupies axis `axis` and every other axis has unit length.
/// The returned view broadcasts against any tensor whose `axis`-th
/// dimension equals the vector length.
#[inline]
pub(crate) fn align_to_axis(vector: &Array1<f64>, axis: usize, rank: usize) -> ArrayViewD<'_, f64> {
    let mut aligned = vector.view().into_dyn();
    for _ in 0..axis {
        aligned = aligned.insert_axis(Axis(0));
    }
    for _ in (axis + 1)..rank {
        let last = aligned.ndim();
        aligned = aligned.insert_axis(Axis(last));
    }
    aligned
}

/// Multiplies a tensor in place by a vector laid along one of its axes
///
/// # Arguments
///
/// * `tensor` - A tensor being updated
/// * `vector` - A vector whose length equals `tensor.shape()[axis]`
/// * `axis` - The axis the vector is aligned to
#[inline]
pub fn mul_along_axis(tensor: &mut ArrayD<f64>, vector: &Array1<f64>, axis: usize) {
    let rank = tensor.ndim();
    let aligned = align_to_axis(vector, axis, rank);
    *tensor *= &aligned;
}

/// Sums a tensor over every axis except `axis`
///
/// # Example
///
/// ```
/// use ndarray::{array, ArrayD};
/// use sumprod::core::tensor::sum_except_axis;
///
/// let tensor: ArrayD<f64> = array![[1., 2., 3.], [4., 5., 6.]].into_dyn();
/// assert_eq!(sum_except_axis(tensor.clone(), 0), array![6., 15.]);
/// assert_eq!(sum_except_axis(tensor, 1), array![5., 7., 9.]);
/// ```
pub fn sum_except_axis(tensor: ArrayD<f64>, axis: usize) -> Array1<f64> {
    let rank = tensor.ndim();
    let mut reduced = tensor;
    // descending order keeps the indices of not yet reduced axes valid
    for current in (0..rank).rev().filter(|current| *current != axis) {
        reduced = reduced.sum_axis(Axis(current));
    }
    reduced.iter().copied().collect()
}

/// Reorders tensor axes so that the new `i`-th axis is the old `order[i]`-th axis.
/// The result is stored in the standard (row-major) layout
///
/// # Notes
///
/// `order` must be a permutation of `0..tensor.ndim()`, otherwise the method panics
pub fn permute_axes(tensor: ArrayD<f64>, order: &[usize]) -> ArrayD<f64> {
    let permuted = tensor.permuted_axes(IxDyn(order));
    permuted.as_standard_layout().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    #[test]
    fn aligned_vector_shape() {
        let vector = array![1., 2., 3.];
        let aligned = align_to_axis(&vector, 1, 3);
        assert_eq!(aligned.shape(), &[1, 3, 1]);
        let aligned = align_to_axis(&vector, 0, 1);
        assert_eq!(aligned.shape(), &[3]);
    }

    #[test]
    fn broadcast_multiplication_along_middle_axis() {
        let mut tensor = Array::from_elem(IxDyn(&[2, 3, 2]), 1f64);
        mul_along_axis(&mut tensor, &array![1., 2., 3.], 1);
        for ((_, j, _), value) in tensor
            .into_dimensionality::<ndarray::Ix3>()
            .unwrap()
            .indexed_iter()
        {
            assert_eq!(*value, (j + 1) as f64);
        }
    }

    #[test]
    fn sum_over_other_axes_of_rank_three_tensor() {
        let tensor = Array::from_shape_fn(IxDyn(&[2, 3, 4]), |idx| {
            (100 * idx[0] + 10 * idx[1] + idx[2]) as f64
        });
        let middle = sum_except_axis(tensor.clone(), 1);
        assert_eq!(middle, array![412., 492., 572.]);
        let last = sum_except_axis(tensor, 2);
        assert_eq!(last.len(), 4);
        assert_eq!(last[1] - last[0], 6.);
    }

    #[test]
    fn permutation_moves_axes() {
        let tensor = Array::from_shape_fn(IxDyn(&[2, 3, 4]), |idx| {
            (100 * idx[0] + 10 * idx[1] + idx[2]) as f64
        });
        let permuted = permute_axes(tensor, &[2, 0, 1]);
        assert_eq!(permuted.shape(), &[4, 2, 3]);
        assert_eq!(permuted[IxDyn(&[3, 1, 2])], 123.);
    }
}
