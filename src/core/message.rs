use ndarray::Array1;
use std::fmt::Debug;

/// A trait providing message's methods
pub trait Message: Debug + Clone + 'static {
    /// Creates an all-ones (unnormalized uniform) message over `dim` states
    fn uniform(dim: usize) -> Self;

    /// Creates a message concentrated on a single state
    ///
    /// # Arguments
    ///
    /// * `dim` - Number of states
    /// * `index` - The state carrying all the mass
    fn one_hot(dim: usize, index: usize) -> Self;

    /// Evaluates a distance between messages
    ///
    /// # Arguments
    ///
    /// * `other` - A second message
    ///
    /// # Notes
    ///
    /// This method is used in message passing in order to
    /// define a stopping criterion: when discrepancy is smaller
    /// than some threshold, message passing stops
    fn discrepancy(&self, other: &Self) -> f64;

    /// Rescales a message so that its entries sum to one.
    /// A message with zero total mass is left as is
    fn normalize(&mut self);

    /// Copy message to dst
    ///
    /// # Arguments
    ///
    /// * `dst` - A destination where to copy a message
    ///
    /// # Notes
    ///
    /// It might be useful to reimplement this method in order to avoid
    /// reallocation of memory
    #[inline(always)]
    fn memcpy(&self, dst: &mut Self) {
        *dst = self.clone();
    }
}

/// Maximum of two numbers where NaN wins, unlike `f64::max`
#[inline(always)]
pub(crate) fn nan_max(lhs: f64, rhs: f64) -> f64 {
    if lhs.is_nan() || rhs.is_nan() {
        f64::NAN
    } else {
        lhs.max(rhs)
    }
}

impl Message for Array1<f64> {
    #[inline(always)]
    fn uniform(dim: usize) -> Self {
        Array1::ones(dim)
    }

    #[inline(always)]
    fn one_hot(dim: usize, index: usize) -> Self {
        let mut message = Array1::zeros(dim);
        message[index] = 1f64;
        message
    }

    #[inline(always)]
    fn discrepancy(&self, other: &Self) -> f64 {
        self.iter()
            .zip(other)
            .map(|(lhs, rhs)| (lhs - rhs).abs())
            .fold(0f64, nan_max)
    }

    #[inline(always)]
    fn normalize(&mut self) {
        let total = self.sum();
        if total > 0f64 {
            *self /= total;
        }
    }

    #[inline(always)]
    fn memcpy(&self, dst: &mut Self) {
        if dst.len() == self.len() {
            dst.assign(self);
        } else {
            *dst = self.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Message;
    use ndarray::{array, Array1};

    #[test]
    fn one_hot_and_uniform() {
        let hot = Array1::<f64>::one_hot(4, 2);
        assert_eq!(hot, array![0., 0., 1., 0.]);
        assert_eq!(Array1::<f64>::uniform(3), array![1., 1., 1.]);
    }

    #[test]
    fn discrepancy_is_max_abs_difference() {
        let lhs = array![0.1, 0.5, 0.4];
        let rhs = array![0.2, 0.2, 0.6];
        assert!((lhs.discrepancy(&rhs) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn nan_entries_give_nan_discrepancy() {
        let lhs = array![0.5, f64::NAN, 0.5];
        let rhs = array![0.5, 0.2, 0.3];
        assert!(lhs.discrepancy(&rhs).is_nan());
        assert!(rhs.discrepancy(&lhs).is_nan());
        assert!(!(lhs.discrepancy(&rhs) < 1e-4));
    }

    #[test]
    fn zero_mass_message_is_not_normalized() {
        let mut message = array![0., 0.];
        message.normalize();
        assert_eq!(message, array![0., 0.]);
        let mut message = array![1., 3.];
        message.normalize();
        assert_eq!(message, array![0.25, 0.75]);
    }
}
