/// Categorical cross-entropy loss for use with a SoftMax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// Computes the scalar cross-entropy loss:
    ///   L = -sum(expected[i] * log(predicted[i] + eps))
    pub fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum()
    }

    /// ∂L/∂predicted, for outputs that are not softmax probabilities.
    pub fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| -e / (p + EPS))
            .collect()
    }

    /// Gradient of the combined Softmax + cross-entropy w.r.t. the
    /// pre-softmax logits:
    ///   ∂L/∂z_i = predicted[i] - expected[i]
    ///
    /// Only valid when `expected` sums to one and the output layer is a
    /// SoftMax layer; the trainer hands it to that layer as a pre-activation
    /// error so the Jacobian is not applied twice.
    pub fn softmax_delta(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| p - e)
            .collect()
    }
}
