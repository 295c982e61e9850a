use psyche_nn::{train, Dataset, LayerKind, Network, TrainConfig, TrainingFlags};

fn main() -> psyche_nn::Result<()> {
    let mut network = Network::with_seed("xor", 7);
    network.add_layer(LayerKind::FullyConnected, 2, None)?;
    network.add_layer(LayerKind::FullyConnected, 4, None)?;
    network.add_layer(LayerKind::FullyConnected, 1, None)?;

    // Each element is two inputs followed by the expected output.
    let values = [
        1.0, 0.0, 1.0,
        1.0, 1.0, 0.0,
        0.0, 1.0, 1.0,
        0.0, 0.0, 0.0,
    ];
    let data = Dataset::for_network(&values, &network)?;

    let config = TrainConfig::new(4000, 2.0, 4).with_flags(TrainingFlags {
        no_shuffle: true,
        adjust_rate: false,
    });
    let stats = train(&mut network, &data, &config, None)?;
    for s in stats.iter().step_by(500) {
        println!("Epoch {}: loss = {:.6}", s.epoch, s.train_loss);
    }

    for element in values.chunks(3) {
        let output = network.feedforward(&element[..2])?;
        println!("Input: {:?} -> Output: {:.4}", &element[..2], output[0]);
    }
    Ok(())
}
