/// Quadratic (squared-error) loss.
pub struct QuadraticLoss;

impl QuadraticLoss {
    /// Scalar loss for one example: ½·Σ(predicted − expected)².
    ///
    /// The ½ makes the gradient exactly `predicted − expected`; datasets
    /// report the mean of this over their examples.
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        0.5 * predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
    }

    /// Per-output gradient: predicted - expected
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| a - b)
            .collect()
    }
}
