use log::warn;

use crate::error::{NetworkError, Result};
use crate::network::network::Network;

/// One input/target pair as stored in the dataset buffer. With one-hot
/// encoding either side may be a single class index.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input: Vec<f64>,
    pub target: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Single(Example),
    /// Timesteps of one sequence, fed in order after a state reset.
    Sequence(Vec<Example>),
}

impl Sample {
    /// Number of input/target pairs the sample contributes.
    pub fn steps(&self) -> usize {
        match self {
            Sample::Single(_) => 1,
            Sample::Sequence(steps) => steps.len(),
        }
    }
}

/// Training, validation or test data decoded from a flat `f64` buffer.
///
/// Flat data is a run of elements, each `input_size` values followed by
/// `target_size` values. Sequence data (for recurrent networks) is laid out
/// as `[count, (T, x_1..x_T, y_1..y_T) * count]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    input_size: usize,
    target_size: usize,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Decodes a flat buffer; its length must be a multiple of
    /// `input_size + target_size`.
    pub fn new(values: &[f64], input_size: usize, target_size: usize) -> Result<Dataset> {
        let element_size = input_size + target_size;
        if element_size == 0 || values.len() % element_size != 0 {
            return Err(NetworkError::DatasetLength { len: values.len(), element_size });
        }
        let samples = values
            .chunks_exact(element_size)
            .map(|chunk| {
                let (input, target) = chunk.split_at(input_size);
                Sample::Single(Example { input: input.to_vec(), target: target.to_vec() })
            })
            .collect();
        Ok(Dataset { input_size, target_size, samples })
    }

    /// Decodes a sequence buffer `[count, (T, x_1..x_T, y_1..y_T) * count]`.
    pub fn sequences(values: &[f64], input_size: usize, target_size: usize) -> Result<Dataset> {
        let Some((&count, mut rest)) = values.split_first() else {
            return Err(NetworkError::MalformedSequence("empty buffer".into()));
        };
        let count = whole_number(count, "sequence count")?;
        let mut samples = Vec::with_capacity(count.min(rest.len()));
        for s in 0..count {
            let Some((&steps, tail)) = rest.split_first() else {
                return Err(NetworkError::MalformedSequence(format!(
                    "buffer ends before sequence {s} of {count}"
                )));
            };
            let steps = whole_number(steps, "sequence length")?;
            if steps == 0 {
                return Err(NetworkError::MalformedSequence(format!("sequence {s} is empty")));
            }
            let lengths = steps
                .checked_mul(input_size)
                .zip(steps.checked_mul(target_size))
                .and_then(|(x, y)| Some((x, x.checked_add(y)?)));
            let Some((inputs_len, needed)) = lengths.filter(|(_, needed)| *needed <= tail.len()) else {
                return Err(NetworkError::MalformedSequence(format!(
                    "sequence {s} of {steps} steps does not fit in the {} values left",
                    tail.len()
                )));
            };
            let (inputs, targets) = tail[..needed].split_at(inputs_len);
            let sequence = inputs
                .chunks_exact(input_size.max(1))
                .zip(targets.chunks_exact(target_size.max(1)))
                .map(|(x, y)| Example { input: x.to_vec(), target: y.to_vec() })
                .collect();
            samples.push(Sample::Sequence(sequence));
            rest = &tail[needed..];
        }
        if !rest.is_empty() {
            return Err(NetworkError::MalformedSequence(format!(
                "{} trailing values after {count} sequences",
                rest.len()
            )));
        }
        Ok(Dataset { input_size, target_size, samples })
    }

    /// Decodes `values` with the element sizes `network` expects: one value
    /// per one-hot side, sequence records for recurrent networks.
    pub fn for_network(values: &[f64], network: &Network) -> Result<Dataset> {
        let (input_size, target_size) = (network.input_element_size(), network.target_element_size());
        if network.is_recurrent() {
            Dataset::sequences(values, input_size, target_size)
        } else {
            Dataset::new(values, input_size, target_size)
        }
    }

    pub fn from_samples(input_size: usize, target_size: usize, samples: Vec<Sample>) -> Dataset {
        Dataset { input_size, target_size, samples }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn element_size(&self) -> usize {
        self.input_size + self.target_size
    }

    /// Number of samples (elements, or sequences).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_sequential(&self) -> bool {
        self.samples.iter().any(|s| matches!(s, Sample::Sequence(_)))
    }

    /// Splits off the first `train_len` samples for training and the next
    /// `validation_len` for validation. Asking for more validation samples
    /// than remain is not an error: the length is clamped and a warning
    /// logged.
    pub fn split(&self, train_len: usize, validation_len: usize) -> Result<(Dataset, Dataset)> {
        if self.len() < train_len {
            return Err(NetworkError::DatasetTooShort { available: self.len(), requested: train_len });
        }
        let remaining = self.len() - train_len;
        let validation_len = if validation_len > remaining {
            warn!("validation length {validation_len} clamped to {remaining}");
            remaining
        } else {
            validation_len
        };
        let part = |range: std::ops::Range<usize>| Dataset {
            input_size: self.input_size,
            target_size: self.target_size,
            samples: self.samples[range].to_vec(),
        };
        Ok((part(0..train_len), part(train_len..train_len + validation_len)))
    }
}

fn whole_number(value: f64, what: &str) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(NetworkError::MalformedSequence(format!("{what} {value} is not a whole number")));
    }
    Ok(value as usize)
}
