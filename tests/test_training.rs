// Tests for the mini-batch trainer: batch averaging, convergence,
// reproducibility, learning-rate annealing and status transitions.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use psyche_nn::train::gradient;
use psyche_nn::train::accumulate_example;
use psyche_nn::{
    test, train, Dataset, LayerKind, Network, NetworkError, NetworkStatus, TrainConfig,
    TrainingFlags,
};

const ORDERED: TrainingFlags = TrainingFlags { no_shuffle: true, adjust_rate: false };

// Three well separated clusters, one-hot class labels stored as indices.
fn clusters(count: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(count * 3);
    for i in 0..count {
        let class = i % 3;
        let angle = class as f64 * 2.0 * std::f64::consts::PI / 3.0;
        values.push(2.0 * angle.cos() + rng.gen_range(-0.5..0.5));
        values.push(2.0 * angle.sin() + rng.gen_range(-0.5..0.5));
        values.push(class as f64);
    }
    values
}

fn classifier(seed: u64) -> Network {
    let mut net = Network::with_seed("clusters", seed);
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 3, None).unwrap();
    net.set_onehot_output(true);
    net
}

#[test]
fn fully_connected_softmax_converges() {
    let mut net = classifier(1);
    let data = Dataset::for_network(&clusters(300, 2), &net).unwrap();
    let (training, validation) = data.split(240, 60).unwrap();
    let stats = train(&mut net, &training, &TrainConfig::new(30, 0.5, 10), Some(&validation)).unwrap();

    assert_eq!(stats.len(), 30);
    assert_eq!(net.status(), NetworkStatus::Trained);
    assert_eq!(net.current_epoch(), 30);
    assert_eq!(net.current_batch(), 24);
    assert!(stats[29].train_loss < stats[0].train_loss);
    assert!(stats[29].val_accuracy.unwrap() >= 0.95);

    let report = test(&net, &validation).unwrap();
    assert_eq!(report.examples, 60);
    assert!(report.accuracy >= 0.95, "accuracy {}", report.accuracy);
}

#[test]
fn training_is_reproducible_with_a_seed() {
    let values = clusters(60, 3);
    for flags in [ORDERED, TrainingFlags::default()] {
        let mut a = classifier(9);
        let mut b = classifier(9);
        let data = Dataset::for_network(&values, &a).unwrap();
        let config = TrainConfig::new(5, 0.5, 7).with_flags(flags);
        let sa = train(&mut a, &data, &config, None).unwrap();
        let sb = train(&mut b, &data, &config, None).unwrap();
        assert_eq!(a.layers, b.layers);
        assert_eq!(
            sa.iter().map(|s| s.train_loss).collect::<Vec<_>>(),
            sb.iter().map(|s| s.train_loss).collect::<Vec<_>>()
        );
    }
}

#[test]
fn batch_update_uses_the_mean_gradient() {
    let mut net = Network::with_seed("mean", 5);
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::FullyConnected, 1, None).unwrap();
    let values = [0.2, 0.9, 1.0, -0.4, 0.1, 0.0, 0.7, -0.7, 1.0];
    let data = Dataset::for_network(&values, &net).unwrap();

    // Per-example gradients, taken separately on the untouched network.
    let mut sum = gradient::zeroed(&net);
    for element in values.chunks(3) {
        let mut scratch = net.clone();
        let mut one = gradient::zeroed(&scratch);
        accumulate_example(&mut scratch, &element[..2], &element[2..], &mut one).unwrap();
        for (s, g) in sum.iter_mut().zip(&one) {
            s.add(g);
        }
    }

    let rate = 0.3;
    let mut expected = net.clone();
    for (layer, g) in expected.layers.iter_mut().zip(&sum) {
        for (n, ng) in layer.neurons.iter_mut().zip(&g.neurons) {
            n.bias -= rate * ng.bias / 3.0;
            for (w, gw) in n.weights.iter_mut().zip(&ng.weights) {
                *w -= rate * gw / 3.0;
            }
        }
    }

    train(&mut net, &data, &TrainConfig::new(1, rate, 3).with_flags(ORDERED), None).unwrap();
    for (got, want) in net.layers.iter().zip(&expected.layers) {
        for (a, b) in got.neurons.iter().zip(&want.neurons) {
            assert_relative_eq!(a.bias, b.bias, epsilon = 1e-12);
            for (x, y) in a.weights.iter().zip(&b.weights) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn learning_rate_halves_when_loss_stalls() {
    // A lone input layer has nothing to learn, so the loss never improves.
    let mut net = Network::with_seed("stall", 1);
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    let data = Dataset::new(&[0.0, 1.0, 1.0, 1.0], 2, 2).unwrap();
    let flags = TrainingFlags { no_shuffle: false, adjust_rate: true };
    let stats = train(&mut net, &data, &TrainConfig::new(4, 1.0, 1).with_flags(flags), None).unwrap();
    let rates: Vec<f64> = stats.iter().map(|s| s.learning_rate).collect();
    assert_eq!(rates, vec![1.0, 1.0, 0.5, 0.25]);
}

#[test]
fn learning_rate_never_grows() {
    let mut net = classifier(4);
    let data = Dataset::for_network(&clusters(90, 4), &net).unwrap();
    let flags = TrainingFlags { no_shuffle: false, adjust_rate: true };
    let stats = train(&mut net, &data, &TrainConfig::new(15, 4.0, 5).with_flags(flags), None).unwrap();
    assert_eq!(stats[0].learning_rate, 4.0);
    assert!(stats.windows(2).all(|w| w[1].learning_rate <= w[0].learning_rate));
}

#[test]
fn recurrent_network_learns_a_cycle() {
    let mut net = Network::with_seed("cycle", 11);
    net.add_layer(LayerKind::FullyConnected, 4, None).unwrap();
    net.add_layer(LayerKind::Recurrent, 8, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 4, None).unwrap();
    net.set_onehot_input(true);
    net.set_onehot_output(true);

    let mut values = vec![4.0];
    for start in 0..4 {
        values.push(5.0);
        values.extend((0..5).map(|t| ((start + t) % 4) as f64));
        values.extend((0..5).map(|t| ((start + t + 1) % 4) as f64));
    }
    let data = Dataset::for_network(&values, &net).unwrap();
    assert_eq!(data.len(), 4);

    train(&mut net, &data, &TrainConfig::new(200, 0.5, 1), None).unwrap();
    let report = test(&net, &data).unwrap();
    assert_eq!(report.examples, 20);
    assert!(report.accuracy >= 0.9, "accuracy {}", report.accuracy);
}

#[test]
fn lstm_network_trains_without_error() {
    let mut net = Network::with_seed("lstm", 12);
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::Lstm, 6, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 3, None).unwrap();
    net.set_onehot_input(true);
    net.set_onehot_output(true);
    let values = [2.0, 3.0, 0.0, 1.0, 2.0, 1.0, 2.0, 0.0, 2.0, 2.0, 1.0, 0.0, 1.0];
    let data = Dataset::for_network(&values, &net).unwrap();
    let stats = train(&mut net, &data, &TrainConfig::new(50, 0.3, 2), None).unwrap();
    assert!(stats[49].train_loss < stats[0].train_loss);
}

#[test]
fn invalid_inputs_set_error_status() {
    let mut net = classifier(2);
    // Two values per element where three are expected.
    let data = Dataset::new(&[0.0, 1.0, 2.0, 3.0], 2, 0).unwrap();
    let err = train(&mut net, &data, &TrainConfig::default(), None).unwrap_err();
    assert!(matches!(err, NetworkError::InputSize { .. }));
    assert_eq!(net.status(), NetworkStatus::Error);

    let mut net = classifier(2);
    let bad_label = Dataset::for_network(&[0.0, 0.0, 7.0], &net).unwrap();
    let err = train(&mut net, &bad_label, &TrainConfig::default(), None).unwrap_err();
    assert!(matches!(err, NetworkError::InvalidLabel { .. }));
    assert_eq!(net.status(), NetworkStatus::Error);

    let mut net = classifier(2);
    let ok = Dataset::for_network(&[0.0, 0.0, 1.0], &net).unwrap();
    let err = train(&mut net, &ok, &TrainConfig::new(1, 0.1, 0), None).unwrap_err();
    assert!(matches!(err, NetworkError::InvalidConfig(_)));
}

#[test]
fn empty_network_cannot_train() {
    let mut net = Network::new("empty");
    let data = Dataset::new(&[0.0, 1.0], 1, 1).unwrap();
    assert!(matches!(
        train(&mut net, &data, &TrainConfig::default(), None),
        Err(NetworkError::EmptyNetwork)
    ));
}
