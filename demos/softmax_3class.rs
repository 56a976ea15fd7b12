use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rust_backprop::{Activation, Dataset, FitConfig, LrSchedule, NetworkBuilder, SimpleDriver};

fn main() -> rust_backprop::Result<()> {
    // Three blobs in 2D, one per class.
    let mut rng = StdRng::seed_from_u64(0);

    let centers = [[-1.0, -1.0], [1.0, -1.0], [0.0, 1.0]];
    let n_per_class = 128;
    let mut xs = Vec::with_capacity(3 * n_per_class);
    let mut ys = Vec::with_capacity(3 * n_per_class);

    for (class, center) in centers.iter().enumerate() {
        for _ in 0..n_per_class {
            let x0 = center[0] + rng.gen_range(-0.3..0.3);
            let x1 = center[1] + rng.gen_range(-0.3..0.3);
            xs.push([x0, x1]);
            ys.push(class);
        }
    }

    let train = Dataset::from_rows(&xs, ys)?;

    // Identity output: the training loop applies the fused softmax + cross-entropy.
    let mut net = NetworkBuilder::new(2)?
        .add_layer(16, Activation::ReLU)?
        .add_layer(3, Activation::Identity)?
        .build_with_seed(SimpleDriver, 0)?;

    let report = net.fit(
        &train,
        &FitConfig {
            epochs: 200,
            lr: 0.5,
            lr_schedule: LrSchedule::InverseTime { decay: 0.01 },
            log_every: 50,
        },
    )?;

    if let Some(last) = report.last() {
        println!("epoch {}: loss={} accuracy={}", last.epoch, last.loss, last.accuracy);
    }

    let eval = net.evaluate(&train)?;
    println!("evaluate: loss={} accuracy={}", eval.loss, eval.accuracy);

    Ok(())
}
