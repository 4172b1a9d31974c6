use num_traits::Float;

/// Incrementally updated arithmetic mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningAvg<T> {
    value: T,
    count: u32,
}

impl<T: Float> RunningAvg<T> {
    /// Starts the mean at its first sample.
    pub fn new(sample: T) -> Self {
        Self {
            value: sample,
            count: 1,
        }
    }

    /// Folds one more sample in, using the number of samples seen so far as weight.
    pub fn push(&mut self, sample: T) -> T {
        self.count += 1;
        let n = T::from(self.count).unwrap_or_else(T::one);

        self.fold(sample, n)
    }

    /// Folds a sample in with an externally supplied denominator `n`:
    /// `avg = (avg * (n - 1) + sample) / n`.
    pub fn push_over(&mut self, sample: T, n: usize) -> T {
        self.count += 1;
        let n = T::from(n.max(1)).unwrap_or_else(T::one);

        self.fold(sample, n)
    }

    #[inline(always)]
    fn fold(&mut self, sample: T, n: T) -> T {
        self.value = (self.value * (n - T::one()) + sample) / n;
        self.value
    }

    #[inline]
    pub fn value(&self) -> T {
        self.value
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }
}
