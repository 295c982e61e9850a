use log::info;
use serde::{Deserialize, Serialize};

use crate::data::dataset::{Dataset, Example, Sample};
use crate::error::{NetworkError, Result};
use crate::loss::loss_type::LossType;
use crate::math::vector::argmax;
use crate::network::network::Network;

/// Outcome of a forward-only pass over a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    /// Input/target pairs evaluated (sequence steps count individually).
    pub examples: usize,
    pub correct: usize,
    /// `correct / examples`, or 0 for an empty dataset.
    pub accuracy: f64,
    pub mean_loss: f64,
}

/// A prediction is correct when its largest output matches the target's;
/// single-output networks must land within 0.5 of the target.
pub fn is_correct(output: &[f64], target: &[f64]) -> bool {
    match (output, target) {
        ([a], [y]) => (a - y).abs() < 0.5,
        _ => argmax(output) == argmax(target),
    }
}

/// Running loss and accuracy totals.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Tally {
    pub loss: f64,
    pub correct: usize,
    pub examples: usize,
}

impl Tally {
    pub fn record(&mut self, loss: LossType, output: &[f64], target: &[f64]) {
        self.loss += loss.loss(output, target);
        self.correct += usize::from(is_correct(output, target));
        self.examples += 1;
    }

    pub fn mean_loss(&self) -> f64 {
        if self.examples == 0 { 0.0 } else { self.loss / self.examples as f64 }
    }

    pub fn accuracy(&self) -> f64 {
        if self.examples == 0 { 0.0 } else { self.correct as f64 / self.examples as f64 }
    }

    pub fn report(&self) -> TestReport {
        TestReport {
            examples: self.examples,
            correct: self.correct,
            accuracy: self.accuracy(),
            mean_loss: self.mean_loss(),
        }
    }
}

/// Checks that `data` is laid out the way `network` reads it.
pub(crate) fn check_dataset(network: &Network, data: &Dataset) -> Result<()> {
    if data.input_size() != network.input_element_size() {
        return Err(NetworkError::InputSize {
            expected: network.input_element_size(),
            actual: data.input_size(),
        });
    }
    if data.target_size() != network.target_element_size() {
        return Err(NetworkError::InputSize {
            expected: network.target_element_size(),
            actual: data.target_size(),
        });
    }
    if !data.is_empty() && data.is_sequential() != network.is_recurrent() {
        return Err(NetworkError::MalformedSequence(if network.is_recurrent() {
            "recurrent networks take sequence records".into()
        } else {
            "sequence records need a recurrent network".into()
        }));
    }
    Ok(())
}

/// Expands one raw example into the full-width vectors the network runs on.
pub(crate) fn encode(network: &Network, example: &Example) -> Result<(Vec<f64>, Vec<f64>)> {
    Ok((network.encode_input(&example.input)?, network.encode_target(&example.target)?))
}

/// Forward-only pass over `data`; updates activations and recurrent state
/// but never weights.
pub(crate) fn evaluate(network: &mut Network, data: &Dataset) -> Result<Tally> {
    let mut tally = Tally::default();
    for sample in data.samples() {
        match sample {
            Sample::Single(example) => {
                let (input, target) = encode(network, example)?;
                let output = network.feedforward(&input)?;
                tally.record(network.loss, &output, &target);
            }
            Sample::Sequence(steps) => {
                network.reset_state();
                for example in steps {
                    let (input, target) = encode(network, example)?;
                    let output = network.feedforward(&input)?;
                    tally.record(network.loss, &output, &target);
                }
            }
        }
    }
    Ok(tally)
}

/// Evaluates `network` on `data` without touching it: the pass runs on a
/// scratch copy.
pub fn test(network: &Network, data: &Dataset) -> Result<TestReport> {
    network.verify()?;
    check_dataset(network, data)?;
    let mut scratch = network.clone();
    scratch.reset_state();
    let report = evaluate(&mut scratch, data)?.report();
    info!(
        "{}: {}/{} correct ({:.2}%), mean loss {:.6}",
        network.name,
        report.correct,
        report.examples,
        report.accuracy * 100.0,
        report.mean_loss
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::layer::LayerKind;

    #[test]
    fn correctness_rules() {
        assert!(is_correct(&[0.1, 0.8, 0.1], &[0.0, 1.0, 0.0]));
        assert!(!is_correct(&[0.6, 0.3, 0.1], &[0.0, 1.0, 0.0]));
        assert!(is_correct(&[0.7], &[1.0]));
        assert!(!is_correct(&[0.4], &[1.0]));
    }

    #[test]
    fn test_leaves_network_untouched() {
        let mut net = Network::with_seed("n", 2);
        net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
        net.add_layer(LayerKind::FullyConnected, 1, None).unwrap();
        let before = net.layers.clone();
        let data = Dataset::new(&[0.0, 1.0, 1.0, 1.0, 0.0, 1.0], 2, 1).unwrap();
        let report = test(&net, &data).unwrap();
        assert_eq!(report.examples, 2);
        assert_eq!(net.layers, before);
    }

    #[test]
    fn mismatched_dataset_is_rejected() {
        let mut net = Network::with_seed("n", 2);
        net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
        net.add_layer(LayerKind::FullyConnected, 1, None).unwrap();
        let data = Dataset::new(&[0.0; 6], 1, 2).unwrap();
        assert!(matches!(test(&net, &data), Err(NetworkError::InputSize { .. })));
    }
}
