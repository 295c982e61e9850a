// Numerical gradient checks for every trainable layer kind.
// Analytical gradients from the backward pass are compared against central
// finite differences of the loss.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use psyche_nn::layers::params::Param;
use psyche_nn::layers::BPTT_TRUNCATE;
use psyche_nn::train::gradient::{self, LayerGradients};
use psyche_nn::train::{accumulate_example, accumulate_sequence};
use psyche_nn::{LayerKind, LayerParameters, LossType, Network};

const H: f64 = 1e-5;

type Pair = (Vec<f64>, Vec<f64>);

// ============================================================================
// Helpers
// ============================================================================

// Addresses one trainable scalar in a network.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Bias(usize, usize),
    Weight(usize, usize, usize),
    SharedBias(usize, usize),
    SharedWeight(usize, usize, usize),
}

fn slot(net: &mut Network, s: Slot) -> &mut f64 {
    match s {
        Slot::Bias(l, u) => &mut net.layers[l].neurons[u].bias,
        Slot::Weight(l, u, k) => &mut net.layers[l].neurons[u].weights[k],
        Slot::SharedBias(l, u) => net.layers[l].shared_units_mut().into_iter().nth(u).unwrap().0,
        Slot::SharedWeight(l, u, k) => {
            let (_, weights) = net.layers[l].shared_units_mut().into_iter().nth(u).unwrap();
            &mut weights[k]
        }
    }
}

// Total loss over the examples; a sequence starts from a clean state.
fn total_loss(net: &Network, pairs: &[Pair]) -> f64 {
    let mut net = net.clone();
    net.reset_state();
    pairs
        .iter()
        .map(|(x, y)| {
            let out = net.feedforward(x).unwrap();
            net.loss.loss(&out, y)
        })
        .sum()
}

fn analytic(net: &Network, pairs: &[Pair], sequence: bool) -> Vec<LayerGradients> {
    let mut net = net.clone();
    let mut grads = gradient::zeroed(&net);
    if sequence {
        accumulate_sequence(&mut net, pairs, &mut grads).unwrap();
    } else {
        for (x, y) in pairs {
            accumulate_example(&mut net, x, y, &mut grads).unwrap();
        }
    }
    grads
}

fn numeric(net: &Network, pairs: &[Pair], s: Slot) -> f64 {
    let mut plus = net.clone();
    *slot(&mut plus, s) += H;
    let mut minus = net.clone();
    *slot(&mut minus, s) -= H;
    (total_loss(&plus, pairs) - total_loss(&minus, pairs)) / (2.0 * H)
}

// Differentiates each step's loss through that step and the BPTT_TRUNCATE
// steps before it only. The state entering that window is computed with the
// unperturbed weights and held fixed.
fn windowed_numeric(net: &Network, pairs: &[Pair], s: Slot) -> f64 {
    (0..pairs.len())
        .map(|t| {
            let start = t.saturating_sub(BPTT_TRUNCATE);
            let mut warm = net.clone();
            warm.reset_state();
            for (x, _) in &pairs[..start] {
                warm.feedforward(x).unwrap();
            }
            let step_loss = |delta: f64| {
                let mut run = warm.clone();
                *slot(&mut run, s) += delta;
                let mut out = Vec::new();
                for (x, _) in &pairs[start..=t] {
                    out = run.feedforward(x).unwrap();
                }
                run.loss.loss(&out, &pairs[t].1)
            };
            (step_loss(H) - step_loss(-H)) / (2.0 * H)
        })
        .sum()
}

// Checks every parameter of every layer; returns how many were compared.
fn check_gradients(net: &Network, pairs: &[Pair], sequence: bool) -> usize {
    check_against(net, pairs, sequence, numeric)
}

fn check_against(
    net: &Network,
    pairs: &[Pair],
    sequence: bool,
    reference: fn(&Network, &[Pair], Slot) -> f64,
) -> usize {
    let grads = analytic(net, pairs, sequence);
    let mut checked = 0;
    let mut compare = |expected: f64, s: Slot| {
        let approx = reference(net, pairs, s);
        assert_relative_eq!(expected, approx, epsilon = 1e-6, max_relative = 1e-4);
        checked += 1;
    };
    for (l, layer) in grads.iter().enumerate() {
        for (u, g) in layer.neurons.iter().enumerate() {
            compare(g.bias, Slot::Bias(l, u));
            for (k, &w) in g.weights.iter().enumerate() {
                compare(w, Slot::Weight(l, u, k));
            }
        }
        for (u, g) in layer.shared.iter().enumerate() {
            compare(g.bias, Slot::SharedBias(l, u));
            for (k, &w) in g.weights.iter().enumerate() {
                compare(w, Slot::SharedWeight(l, u, k));
            }
        }
    }
    checked
}

fn random_vec(rng: &mut StdRng, len: usize) -> Vec<f64> {
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn one_hot(class: usize, width: usize) -> Vec<f64> {
    let mut v = vec![0.0; width];
    v[class] = 1.0;
    v
}

// ============================================================================
// Dense and softmax
// ============================================================================

#[test]
fn fully_connected_quadratic() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut net = Network::with_seed("fc", 1);
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::FullyConnected, 4, None).unwrap();
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    let pairs = vec![
        (random_vec(&mut rng, 3), vec![0.0, 1.0]),
        (random_vec(&mut rng, 3), vec![1.0, 0.5]),
    ];
    assert_eq!(net.loss, LossType::Quadratic);
    assert_eq!(check_gradients(&net, &pairs, false), 4 * 4 + 2 * 5);
}

#[test]
fn softmax_with_cross_entropy() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut net = Network::with_seed("softmax", 2);
    net.add_layer(LayerKind::FullyConnected, 4, None).unwrap();
    net.add_layer(LayerKind::FullyConnected, 5, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 3, None).unwrap();
    assert_eq!(net.loss, LossType::CrossEntropy);
    let pairs = vec![(random_vec(&mut rng, 4), one_hot(2, 3)), (random_vec(&mut rng, 4), one_hot(0, 3))];
    check_gradients(&net, &pairs, false);
}

#[test]
fn softmax_with_quadratic_uses_full_jacobian() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut net = Network::with_seed("softmax-q", 3);
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 3, None).unwrap();
    net.loss = LossType::Quadratic;
    let pairs = vec![(random_vec(&mut rng, 3), vec![0.2, 0.3, 0.5])];
    check_gradients(&net, &pairs, false);
}

// ============================================================================
// Convolution and pooling
// ============================================================================

#[test]
fn convolution_then_pooling_then_softmax() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut net = Network::with_seed("conv", 4);
    net.add_layer(LayerKind::FullyConnected, 36, None).unwrap();
    net.add_convolutional_layer(LayerParameters::convolutional(2, 3, 1, 0, false)).unwrap();
    net.add_pooling_layer(LayerParameters::convolutional(0, 2, 0, 0, false)).unwrap();
    net.add_layer(LayerKind::SoftMax, 3, None).unwrap();
    assert_eq!(net.layers[1].size, 2 * 4 * 4);
    assert_eq!(net.layers[2].size, 2 * 2 * 2);
    let pairs = vec![(random_vec(&mut rng, 36), one_hot(1, 3))];
    check_gradients(&net, &pairs, false);
}

#[test]
fn strided_padded_convolution() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut net = Network::with_seed("padded", 5);
    net.add_layer(LayerKind::FullyConnected, 25, None).unwrap();
    net.add_convolutional_layer(LayerParameters::convolutional(2, 3, 2, 1, false)).unwrap();
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    assert_eq!(net.layers[1].size, 2 * 3 * 3);
    let pairs = vec![(random_vec(&mut rng, 25), vec![1.0, 0.0])];
    check_gradients(&net, &pairs, false);
}

#[test]
fn stacked_convolutions_span_channels() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut net = Network::with_seed("stacked", 6);
    net.add_layer(LayerKind::FullyConnected, 36, None).unwrap();
    net.add_convolutional_layer(LayerParameters::convolutional(2, 3, 1, 0, false)).unwrap();
    net.add_convolutional_layer(LayerParameters::convolutional(2, 2, 1, 0, false)).unwrap();
    net.add_layer(LayerKind::FullyConnected, 1, None).unwrap();
    assert_eq!(net.layers[2].size, 2 * 3 * 3);
    let pairs = vec![(random_vec(&mut rng, 36), vec![0.7])];
    check_gradients(&net, &pairs, false);
}

#[test]
fn max_and_average_pooling_pass_gradients_down() {
    for mode in [0.0, 1.0] {
        let mut rng = StdRng::seed_from_u64(7);
        let mut net = Network::with_seed("pool", 7);
        net.add_layer(LayerKind::FullyConnected, 4, None).unwrap();
        net.add_layer(LayerKind::FullyConnected, 16, None).unwrap();
        let mut params = LayerParameters::convolutional(0, 2, 0, 0, false);
        params.set(Param::PoolingMode, mode);
        net.add_pooling_layer(params).unwrap();
        net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
        assert_eq!(net.layers[2].size, 4);
        let pairs = vec![(random_vec(&mut rng, 4), vec![0.0, 1.0])];
        check_gradients(&net, &pairs, false);
    }
}

// ============================================================================
// Recurrent kinds (sequences no longer than the truncation window)
// ============================================================================

#[test]
fn recurrent_sequence() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut net = Network::with_seed("rnn", 8);
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::Recurrent, 4, None).unwrap();
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    let pairs: Vec<Pair> = (0..4)
        .map(|t| (random_vec(&mut rng, 3), vec![(t % 2) as f64, 0.5]))
        .collect();
    check_gradients(&net, &pairs, true);
}

#[test]
fn recurrent_sequence_at_window_limit() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut net = Network::with_seed("rnn5", 9);
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    net.add_layer(LayerKind::Recurrent, 3, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 2, None).unwrap();
    let pairs: Vec<Pair> = (0..5).map(|t| (random_vec(&mut rng, 2), one_hot(t % 2, 2))).collect();
    check_gradients(&net, &pairs, true);
}

#[test]
fn lstm_sequence() {
    let mut rng = StdRng::seed_from_u64(10);
    let mut net = Network::with_seed("lstm", 10);
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::Lstm, 3, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 2, None).unwrap();
    let pairs: Vec<Pair> = (0..4).map(|t| (random_vec(&mut rng, 3), one_hot((t + 1) % 2, 2))).collect();
    let checked = check_gradients(&net, &pairs, true);
    // Candidate units plus three gate banks, each 3 x (3 + 3 + 1).
    assert_eq!(checked, 4 * 3 * 7 + 2 * 4);
}

// ============================================================================
// Recurrent kinds over sequences longer than the truncation window
// ============================================================================

fn long_sequence(rng: &mut StdRng, width: usize, classes: usize) -> Vec<Pair> {
    (0..BPTT_TRUNCATE + 4)
        .map(|t| (random_vec(rng, width), one_hot(t % classes, classes)))
        .collect()
}

#[test]
fn recurrent_gradient_is_truncated_to_the_window() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut net = Network::with_seed("rnn-long", 11);
    net.add_layer(LayerKind::FullyConnected, 3, None).unwrap();
    net.add_layer(LayerKind::Recurrent, 4, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 2, None).unwrap();
    let pairs = long_sequence(&mut rng, 3, 2);
    assert_eq!(check_against(&net, &pairs, true, windowed_numeric), 4 * 8 + 2 * 5);

    // The untruncated gradient differs, so the window really cuts something off.
    let drift: f64 = (0..net.layers[1].neurons[0].weights.len())
        .map(|k| {
            let s = Slot::Weight(1, 0, k);
            (numeric(&net, &pairs, s) - windowed_numeric(&net, &pairs, s)).abs()
        })
        .sum();
    assert!(drift > 1e-8, "drift {drift}");
}

#[test]
fn lstm_gradient_is_truncated_to_the_window() {
    let mut rng = StdRng::seed_from_u64(12);
    let mut net = Network::with_seed("lstm-long", 12);
    net.add_layer(LayerKind::FullyConnected, 2, None).unwrap();
    net.add_layer(LayerKind::Lstm, 3, None).unwrap();
    net.add_layer(LayerKind::SoftMax, 2, None).unwrap();
    let pairs = long_sequence(&mut rng, 2, 2);
    check_against(&net, &pairs, true, windowed_numeric);
}
