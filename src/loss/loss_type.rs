use serde::{Serialize, Deserialize};

use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::quadratic::QuadraticLoss;

/// Selects which loss function the network is trained against.
///
/// - `Quadratic`: squared error; pair with Sigmoid/Identity outputs.
/// - `CrossEntropy`: categorical cross-entropy; pair with a SoftMax output,
///   where the trainer uses the combined gradient `predicted - expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Quadratic,
    CrossEntropy,
}

impl LossType {
    /// Scalar loss for one example.
    pub fn loss(self, predicted: &[f64], expected: &[f64]) -> f64 {
        match self {
            LossType::Quadratic => QuadraticLoss::loss(predicted, expected),
            LossType::CrossEntropy => CrossEntropyLoss::loss(predicted, expected),
        }
    }

    /// ∂L/∂output for one example.
    pub fn derivative(self, predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        match self {
            LossType::Quadratic => QuadraticLoss::derivative(predicted, expected),
            LossType::CrossEntropy => CrossEntropyLoss::derivative(predicted, expected),
        }
    }

    /// Identifier used by the binary save format.
    pub fn tag(self) -> u8 {
        match self {
            LossType::Quadratic => 0,
            LossType::CrossEntropy => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<LossType> {
        match tag {
            0 => Some(LossType::Quadratic),
            1 => Some(LossType::CrossEntropy),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_derivative_is_difference() {
        let p = [0.2, 0.9];
        let y = [0.0, 1.0];
        assert_relative_eq!(LossType::Quadratic.loss(&p, &y), 0.5 * (0.04 + 0.01), epsilon = 1e-12);
        assert_eq!(LossType::Quadratic.derivative(&p, &y), vec![0.2, 0.9 - 1.0]);
    }

    #[test]
    fn cross_entropy_of_perfect_prediction_is_zero() {
        let loss = LossType::CrossEntropy.loss(&[0.0, 1.0, 0.0], &[0.0, 1.0, 0.0]);
        assert_relative_eq!(loss, 0.0, epsilon = 1e-9);
        let loss = LossType::CrossEntropy.loss(&[0.5, 0.5], &[1.0, 0.0]);
        assert_relative_eq!(loss, 2f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn tags_round_trip() {
        for loss in [LossType::Quadratic, LossType::CrossEntropy] {
            assert_eq!(LossType::from_tag(loss.tag()), Some(loss));
        }
        assert_eq!(LossType::from_tag(9), None);
    }
}
