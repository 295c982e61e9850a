/// Multiplies an activation-space error by the softmax Jacobian:
/// `∂L/∂z_i = a_i (∂L/∂a_i − Σ_j ∂L/∂a_j a_j)`.
///
/// Used whenever a softmax layer is not paired with cross-entropy, where the
/// combined gradient `a − y` would be wrong.
pub fn jacobian_product(activations: &[f64], delta: &[f64]) -> Vec<f64> {
    let weighted: f64 = activations.iter().zip(delta).map(|(a, d)| a * d).sum();
    activations
        .iter()
        .zip(delta)
        .map(|(a, d)| a * (d - weighted))
        .collect()
}
