use crate::error::AnalysisError;

/// Odd-length symmetric weighting window.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Vec<f64>,
    total: f64,
}

impl Kernel {
    /// Triangular window: `w[i] = (n - |i - centre|) / n²`, peaking at the centre.
    pub fn triangular(length: i64) -> Result<Self, AnalysisError> {
        let n = validate_length(length)?;
        let centre = (n - 1) / 2;
        let n_f = n as f64;

        let weights: Vec<f64> = (0..n)
            .map(|i| (n_f - i.abs_diff(centre) as f64) / (n_f * n_f))
            .collect();

        Ok(Self::with_weights(weights))
    }

    /// Box window with every weight equal to 1.
    pub fn uniform(length: i64) -> Result<Self, AnalysisError> {
        let n = validate_length(length)?;
        Ok(Self::with_weights(vec![1.0; n]))
    }

    fn with_weights(weights: Vec<f64>) -> Self {
        let total = weights.iter().sum();
        Self { weights, total }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of all weights, unnormalized.
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn centre(&self) -> usize {
        (self.weights.len() - 1) / 2
    }

    /// Number of samples on each side of the centre.
    pub fn half_width(&self) -> usize {
        self.centre()
    }
}

fn validate_length(length: i64) -> Result<usize, AnalysisError> {
    if length <= 0 || length % 2 == 0 {
        return Err(AnalysisError::invalid_argument(format!(
            "kernel length must be odd and positive, got {}",
            length
        )));
    }
    Ok(length as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangular_shape() {
        for n in [1i64, 3, 5, 15, 31, 101] {
            let kernel = Kernel::triangular(n).unwrap();
            let w = kernel.weights();
            let len = n as usize;
            assert_eq!(w.len(), len);

            for i in 0..len {
                assert_eq!(w[i], w[len - 1 - i], "asymmetric at {} for n={}", i, n);
            }

            let centre = kernel.centre();
            for i in 0..centre {
                assert!(
                    w[i] < w[i + 1],
                    "weights must rise toward the centre (n={}, i={})",
                    n,
                    i
                );
            }

            let max = w.iter().cloned().fold(f64::MIN, f64::max);
            let min = w.iter().cloned().fold(f64::MAX, f64::min);
            assert_eq!(w[centre], max);
            assert_eq!(w[0], min);
            if n > 1 {
                assert!(w[1..len - 1].iter().all(|&x| x > min));
            }
        }
    }

    #[test]
    fn test_triangular_values() {
        let kernel = Kernel::triangular(3).unwrap();
        assert_eq!(kernel.weights(), &[2.0 / 9.0, 3.0 / 9.0, 2.0 / 9.0]);
        assert!((kernel.total() - 7.0 / 9.0).abs() < 1e-12);
        assert_eq!(kernel.half_width(), 1);
    }

    #[test]
    fn test_unit_kernel() {
        let kernel = Kernel::triangular(1).unwrap();
        assert_eq!(kernel.weights(), &[1.0]);
        assert_eq!(kernel.total(), 1.0);
        assert_eq!(kernel.half_width(), 0);
    }

    #[test]
    fn test_invalid_lengths() {
        for n in [0i64, 2, 4, -1, -3] {
            assert!(
                matches!(
                    Kernel::triangular(n),
                    Err(AnalysisError::InvalidArgument { .. })
                ),
                "length {} should be rejected",
                n
            );
            assert!(Kernel::uniform(n).is_err());
        }
    }

    #[test]
    fn test_uniform() {
        let kernel = Kernel::uniform(5).unwrap();
        assert_eq!(kernel.weights(), &[1.0; 5]);
        assert_eq!(kernel.total(), 5.0);
    }
}
