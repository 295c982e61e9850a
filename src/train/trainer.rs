use crate::data::dataset::Dataset;
use crate::error::Result;
use crate::network::network::Network;
use crate::train::epoch_stats::EpochStats;
use crate::train::loop_fn::train_loop;
use crate::train::train_config::TrainConfig;

/// Trains `network` on `data`, optionally reporting on `validation` after
/// every epoch. See [`train_loop`] for the full contract.
pub fn train(
    network: &mut Network,
    data: &Dataset,
    config: &TrainConfig,
    validation: Option<&Dataset>,
) -> Result<Vec<EpochStats>> {
    train_loop(network, data, validation, config)
}

/// Decodes `values` for `network` and trains with default flags, returning
/// the mean training loss of the last epoch.
pub fn train_network(
    network: &mut Network,
    values: &[f64],
    epochs: usize,
    learning_rate: f64,
    batch_size: usize,
) -> Result<f64> {
    let data = Dataset::for_network(values, network)?;
    let config = TrainConfig::new(epochs, learning_rate, batch_size);
    let stats = train_loop(network, &data, None, &config)?;
    Ok(stats.last().map_or(0.0, |s| s.train_loss))
}
