/// A mixed radix counter. Enumerates every tuple of digits with the `i`-th digit
/// in `0..radices[i]`, the last digit running fastest (row-major order)
#[derive(Debug, Clone)]
pub struct Odometer {
    radices: Vec<usize>,
    digits: Vec<usize>,
    exhausted: bool,
}

impl Odometer {
    /// Creates a counter set to all zeros
    ///
    /// # Arguments
    ///
    /// * `radices` - Number of values of each digit
    #[inline]
    pub fn new(radices: Vec<usize>) -> Self {
        let exhausted = radices.iter().any(|radix| *radix == 0);
        Odometer {
            digits: vec![0; radices.len()],
            radices,
            exhausted,
        }
    }

    /// Current digits
    #[inline(always)]
    pub fn digits(&self) -> &[usize] {
        &self.digits
    }

    /// Returns true once the counter has wrapped around, or if some radix is zero
    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of distinct digit tuples
    #[inline]
    pub fn configurations_number(&self) -> usize {
        self.radices.iter().product()
    }

    /// Moves to the next digit tuple. Returns false if the counter has wrapped
    /// around, all digits are zero again in that case
    pub fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        for (digit, radix) in self.digits.iter_mut().zip(&self.radices).rev() {
            *digit += 1;
            if *digit < *radix {
                return true;
            }
            *digit = 0;
        }
        self.exhausted = true;
        false
    }
}
