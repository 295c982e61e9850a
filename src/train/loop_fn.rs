use std::time::Instant;

use log::{debug, info, warn};
use rand::seq::SliceRandom;

use crate::data::dataset::{Dataset, Sample};
use crate::error::{NetworkError, Result};
use crate::network::network::{Network, NetworkStatus};
use crate::optim::sgd::Sgd;
use crate::train::backprop::{accumulate_example, accumulate_sequence};
use crate::train::epoch_stats::EpochStats;
use crate::train::evaluate::{check_dataset, encode, evaluate, Tally};
use crate::train::gradient;
use crate::train::train_config::TrainConfig;

/// Learning rates are multiplied by this when `adjust_rate` is on and an
/// epoch fails to improve the monitored loss.
pub const RATE_DECAY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `network` with mini-batch SGD and returns one [`EpochStats`] per
/// completed epoch.
///
/// # Arguments
/// - `network`: mutable reference to the network; modified in place
/// - `data`: training set, laid out for this network
/// - `validation`: optional set evaluated (forward only) after every epoch
/// - `config`: hyperparameters and [`TrainingFlags`]
///
/// The network is `Training` while this runs, `Trained` afterwards, and
/// `Error` if the network, data or configuration turn out to be invalid.
///
/// [`TrainingFlags`]: crate::train::train_config::TrainingFlags
pub fn train_loop(
    network: &mut Network,
    data: &Dataset,
    validation: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<Vec<EpochStats>> {
    let checked = network
        .verify()
        .and_then(|_| config.validate())
        .and_then(|_| check_dataset(network, data))
        .and_then(|_| {
            if data.is_empty() {
                Err(NetworkError::DatasetTooShort { available: 0, requested: 1 })
            } else {
                Ok(())
            }
        })
        .and_then(|_| validation.map_or(Ok(()), |v| check_dataset(network, v)));
    if let Err(e) = checked {
        network.set_status(NetworkStatus::Error);
        return Err(e);
    }

    network.set_status(NetworkStatus::Training);
    info!(
        "{}: training on {} samples for {} epochs (rate {}, batch {})",
        network.name,
        data.len(),
        config.epochs,
        config.learning_rate,
        config.batch_size
    );
    match run_epochs(network, data, validation, config) {
        Ok(stats) => {
            network.reset_state();
            network.set_status(NetworkStatus::Trained);
            Ok(stats)
        }
        Err(e) => {
            network.set_status(NetworkStatus::Error);
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn run_epochs(
    network: &mut Network,
    data: &Dataset,
    validation: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<Vec<EpochStats>> {
    let mut optimizer = Sgd::new(config.learning_rate);
    let mut order: Vec<usize> = (0..data.len()).collect();
    let mut best = f64::INFINITY;
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        network.current_epoch = epoch;
        let started = Instant::now();

        // Shuffle sample order each epoch.
        if !config.flags.no_shuffle {
            order.shuffle(&mut network.rng);
        }

        let train = run_one_epoch(network, data, &order, &optimizer, config.batch_size)?;

        let val = match validation {
            Some(v) => Some(evaluate(network, v)?),
            None => None,
        };

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss: train.mean_loss(),
            train_accuracy: train.accuracy(),
            val_loss: val.map(|t| t.mean_loss()),
            val_accuracy: val.map(|t| t.accuracy()),
            learning_rate: optimizer.learning_rate,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "{}: epoch {}/{} loss {:.6} accuracy {:.2}%{}",
            network.name,
            epoch,
            config.epochs,
            stats.train_loss,
            stats.train_accuracy * 100.0,
            match (stats.val_loss, stats.val_accuracy) {
                (Some(l), Some(a)) => format!(", validation loss {l:.6} accuracy {:.2}%", a * 100.0),
                _ => String::new(),
            }
        );

        // ── Learning-rate annealing ──────────────────────────────────────
        let monitored = stats.val_loss.unwrap_or(stats.train_loss);
        if monitored < best {
            best = monitored;
        } else if config.flags.adjust_rate {
            let reduced = optimizer.learning_rate * RATE_DECAY;
            warn!(
                "{}: loss {monitored:.6} did not improve on {best:.6}, learning rate {} -> {reduced}",
                network.name, optimizer.learning_rate
            );
            optimizer.learning_rate = reduced;
        }
        history.push(stats);
    }
    Ok(history)
}

/// Runs one full epoch of mini-batch SGD in the given sample order.
fn run_one_epoch(
    network: &mut Network,
    data: &Dataset,
    order: &[usize],
    optimizer: &Sgd,
    batch_size: usize,
) -> Result<Tally> {
    let mut tally = Tally::default();
    let samples = data.samples();

    for (batch, indices) in order.chunks(batch_size).enumerate() {
        network.current_batch = batch + 1;
        let mut grads = gradient::zeroed(network);

        for &idx in indices {
            match &samples[idx] {
                Sample::Single(example) => {
                    let (input, target) = encode(network, example)?;
                    let output = accumulate_example(network, &input, &target, &mut grads)?;
                    tally.record(network.loss, &output, &target);
                }
                Sample::Sequence(steps) => {
                    let encoded = steps
                        .iter()
                        .map(|example| encode(network, example))
                        .collect::<Result<Vec<_>>>()?;
                    let outputs = accumulate_sequence(network, &encoded, &mut grads)?;
                    for (output, (_, target)) in outputs.iter().zip(&encoded) {
                        tally.record(network.loss, output, target);
                    }
                }
            }
        }

        // Average and apply.
        let inv_batch = 1.0 / indices.len() as f64;
        for (layer, grad) in network.layers.iter_mut().zip(grads.iter_mut()) {
            grad.scale(inv_batch);
            optimizer.step(layer, grad);
        }
        debug!("{}: batch {} ({} samples) applied", network.name, batch + 1, indices.len());
    }
    Ok(tally)
}
