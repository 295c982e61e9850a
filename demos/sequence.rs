//! Teaches a recurrent network to predict the next symbol of a repeating
//! pattern, with symbols one-hot encoded on both sides.

use psyche_nn::{test, train, Dataset, LayerKind, Network, TrainConfig};

const SYMBOLS: usize = 4;

fn main() -> psyche_nn::Result<()> {
    let mut network = Network::with_seed("sequence", 11);
    network.add_layer(LayerKind::FullyConnected, SYMBOLS, None)?;
    network.add_layer(LayerKind::Recurrent, 8, None)?;
    network.add_layer(LayerKind::SoftMax, SYMBOLS, None)?;
    network.set_onehot_input(true);
    network.set_onehot_output(true);

    // [count, (T, x_1..x_T, y_1..y_T)*]: every sequence walks 0 -> 1 -> 2 -> 3
    // -> 0 from a different starting symbol.
    let mut values = vec![SYMBOLS as f64];
    for start in 0..SYMBOLS {
        let steps = 5;
        values.push(steps as f64);
        values.extend((0..steps).map(|t| ((start + t) % SYMBOLS) as f64));
        values.extend((0..steps).map(|t| ((start + t + 1) % SYMBOLS) as f64));
    }
    let data = Dataset::for_network(&values, &network)?;

    let stats = train(&mut network, &data, &TrainConfig::new(300, 0.5, 1), None)?;
    if let Some(last) = stats.last() {
        println!("final loss {:.6}, accuracy {:.1}%", last.train_loss, last.train_accuracy * 100.0);
    }

    let report = test(&network, &data)?;
    println!("{}/{} steps predicted correctly", report.correct, report.examples);
    Ok(())
}
