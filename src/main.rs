// This binary is intentionally minimal.
// All neural network logic lives in the library (src/lib.rs and its modules).
// Run the demos with:
//   cargo run --example xor
//   cargo run --example sequence
use std::process::ExitCode;

use psyche_nn::{Network, VERSION};

fn main() -> ExitCode {
    println!("psyche-nn {VERSION}: a from-scratch neural network engine in Rust.");
    let Some(path) = std::env::args().nth(1) else {
        println!("Pass a saved network file to print its layout.");
        return ExitCode::SUCCESS;
    };
    match Network::load(&path) {
        Ok(network) => {
            println!("{} ({:?}, {:?} loss)", network.name, network.status(), network.loss);
            for layer in &network.layers {
                println!(
                    "  {:>2}  {:<16} size {:>6}  parameters {}",
                    layer.index,
                    layer.kind.label(),
                    layer.size,
                    layer.parameter_count()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{path}: {e}");
            ExitCode::FAILURE
        }
    }
}
