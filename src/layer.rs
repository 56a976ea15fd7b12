//! Dense (fully connected) layer.
//!
//! A layer computes `y = activation(x W + b)` for a batch `x` of shape
//! `(batch, in_dim)`, with `W` of shape `(in_dim, out_dim)` and `b` of length `out_dim`.
//!
//! Training is a three-step cycle per batch:
//!
//! 1. [`DenseLayer::forward`] caches the input batch
//! 2. [`DenseLayer::backward`] computes and caches `dW`, `db`, `dX` and returns `dX`
//! 3. [`DenseLayer::update`] applies `W -= lr * dW`, `b -= lr * db`
//!
//! The cycle is an explicit phase machine (`Idle -> Forward -> Backward -> Idle`).
//! Calling `backward` or `update` out of order returns [`Error::Sequence`] instead of
//! computing with stale state. `forward` is legal from any phase and discards whatever
//! was cached before.

use rand::Rng;

use crate::driver::{Driver, SimpleDriver};
use crate::{Activation, Error, Matrix, Result, Vector};

#[derive(Debug, Clone, Copy, PartialEq)]
/// Weight initialization scheme.
///
/// All schemes sample uniformly from `[-limit, limit]`; biases always start at zero.
pub enum Init {
    /// `limit = sqrt(6 / (fan_in + fan_out))`.
    Xavier,
    /// `limit = sqrt(6 / fan_in)`.
    He,
    /// A fixed `limit`.
    Uniform { limit: f64 },
}

impl Init {
    /// Scheme suited to an activation: He for ReLU, Xavier otherwise.
    pub fn for_activation(activation: Activation) -> Self {
        match activation {
            Activation::ReLU => Init::He,
            Activation::Identity | Activation::Softmax => Init::Xavier,
        }
    }

    fn limit(self, fan_in: usize, fan_out: usize) -> Result<f64> {
        let limit = match self {
            Init::Xavier => (6.0 / (fan_in + fan_out) as f64).sqrt(),
            Init::He => (6.0 / fan_in as f64).sqrt(),
            Init::Uniform { limit } => limit,
        };
        if !(limit.is_finite() && limit >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "init limit must be finite and >= 0, got {limit}"
            )));
        }
        Ok(limit)
    }
}

/// Gradients produced by the most recent `backward`.
#[derive(Debug, Clone)]
struct Grads {
    d_weights: Matrix,
    d_biases: Vector,
    d_input: Matrix,
}

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Idle,
    Forward {
        input: Matrix,
    },
    Backward {
        grads: Grads,
    },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Forward { .. } => "forward",
            Phase::Backward { .. } => "backward",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DenseLayer<D: Driver = SimpleDriver> {
    driver: D,
    /// Shape `(in_dim, out_dim)`.
    weights: Matrix,
    biases: Vector,
    activation: Activation,
    phase: Phase,
}

impl<D: Driver> DenseLayer<D> {
    /// Allocate a new layer with randomly initialized weights and zero biases.
    pub fn new_with_rng<R: Rng + ?Sized>(
        driver: D,
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        init: Init,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }

        let limit = init.limit(in_dim, out_dim)?;
        let mut weights = driver.matrix(in_dim, out_dim)?;
        if limit > 0.0 {
            for w in weights.as_mut_slice() {
                *w = rng.gen_range(-limit..=limit);
            }
        }
        let biases = driver.vector(out_dim)?;

        log::debug!(
            "dense layer {in_dim}->{out_dim} ({activation:?}, {init:?}) on {} driver",
            driver.name()
        );

        Ok(Self {
            driver,
            weights,
            biases,
            activation,
            phase: Phase::Idle,
        })
    }

    /// Build a layer from existing parameters.
    ///
    /// `weights` has shape `(in_dim, out_dim)`; `biases.len()` must equal `out_dim`.
    pub fn load(driver: D, weights: Matrix, biases: Vector, activation: Activation) -> Result<Self> {
        if weights.cols() != biases.len() {
            return Err(Error::InvalidShape(format!(
                "weights width {} does not match biases len {}",
                weights.cols(),
                biases.len()
            )));
        }
        let biases = driver.vector_from(&biases)?;

        Ok(Self {
            driver,
            weights,
            biases,
            activation,
            phase: Phase::Idle,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.weights.rows()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.weights.cols()
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[inline]
    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// `in_dim * out_dim + out_dim`.
    pub fn parameter_count(&self) -> usize {
        self.weights.rows() * self.weights.cols() + self.biases.len()
    }

    /// `dL/dW` from the last `backward`, until the next `update` or `forward`.
    pub fn weight_gradient(&self) -> Option<&Matrix> {
        self.grads().map(|g| &g.d_weights)
    }

    /// `dL/db` from the last `backward`, until the next `update` or `forward`.
    pub fn bias_gradient(&self) -> Option<&[f64]> {
        self.grads().map(|g| g.d_biases.as_slice())
    }

    /// `dL/dX` from the last `backward`, until the next `update` or `forward`.
    pub fn input_gradient(&self) -> Option<&Matrix> {
        self.grads().map(|g| &g.d_input)
    }

    fn grads(&self) -> Option<&Grads> {
        match &self.phase {
            Phase::Backward { grads } => Some(grads),
            Phase::Idle | Phase::Forward { .. } => None,
        }
    }

    /// Forward pass without touching the cached training state.
    pub fn predict(&self, input: &Matrix) -> Result<Matrix> {
        if input.cols() != self.in_dim() {
            return Err(Error::InvalidShape(format!(
                "input width {} does not match layer in_dim {}",
                input.cols(),
                self.in_dim()
            )));
        }

        let z = self
            .driver
            .add_vector(&self.driver.matmul(input, &self.weights)?, &self.biases)?;
        Ok(self.activation.forward(&self.driver, z))
    }

    /// Forward pass for a batch, caching `input` for `backward`.
    pub fn forward(&mut self, input: &Matrix) -> Result<Matrix> {
        let output = self.predict(input)?;
        self.phase = Phase::Forward {
            input: input.clone(),
        };
        Ok(output)
    }

    /// Backward pass for the batch seen by the last `forward`.
    ///
    /// - `output`: what `forward` returned (post-activation)
    /// - `grad`: upstream gradient `dL/d(output)`
    ///
    /// Returns `dL/d(input)`.
    pub fn backward(&mut self, output: &Matrix, grad: &Matrix) -> Result<Matrix> {
        let input = match std::mem::take(&mut self.phase) {
            Phase::Forward { input } => input,
            other => {
                let msg = format!(
                    "backward requires a preceding forward (layer is {})",
                    other.name()
                );
                self.phase = other;
                return Err(Error::Sequence(msg));
            }
        };

        match self.gradients(&input, output, grad) {
            Ok(grads) => {
                let d_input = grads.d_input.clone();
                self.phase = Phase::Backward { grads };
                Ok(d_input)
            }
            Err(err) => {
                self.phase = Phase::Forward { input };
                Err(err)
            }
        }
    }

    fn gradients(&self, input: &Matrix, output: &Matrix, grad: &Matrix) -> Result<Grads> {
        let expected = (input.rows(), self.out_dim());
        if output.shape() != expected {
            return Err(Error::InvalidShape(format!(
                "output {}x{} does not match expected {}x{}",
                output.rows(),
                output.cols(),
                expected.0,
                expected.1
            )));
        }

        let d_z = self
            .activation
            .backward(&self.driver, output, self.driver.copy(grad))?;

        let d_weights = self.driver.matmul(&self.driver.transpose(input), &d_z)?;
        let d_biases = self.driver.sum_columns(&d_z);
        let d_input = self
            .driver
            .matmul(&d_z, &self.driver.transpose(&self.weights))?;

        Ok(Grads {
            d_weights,
            d_biases,
            d_input,
        })
    }

    /// Gradient-descent step using the gradients of the last `backward`.
    ///
    /// `lr == 0` leaves the parameters unchanged. The layer returns to the idle phase,
    /// so a second `update` needs a new `forward`/`backward` first.
    pub fn update(&mut self, lr: f64) -> Result<()> {
        if !(lr.is_finite() && lr >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and >= 0, got {lr}"
            )));
        }

        let grads = match &self.phase {
            Phase::Backward { grads } => grads,
            other => {
                return Err(Error::Sequence(format!(
                    "update requires a preceding backward (layer is {})",
                    other.name()
                )));
            }
        };

        let d_weights = grads.d_weights.as_slice();
        let weights = Matrix::from_fn(self.in_dim(), self.out_dim(), |i, j| {
            self.weights.get(i, j) - lr * d_weights[i * self.out_dim() + j]
        });
        let biases: Vector = self
            .biases
            .iter()
            .zip(&grads.d_biases)
            .map(|(b, db)| b - lr * db)
            .collect();

        log::trace!(
            "dense layer {}->{} update lr={lr}",
            self.in_dim(),
            self.out_dim()
        );

        self.weights = weights;
        self.biases = biases;
        self.phase = Phase::Idle;
        Ok(())
    }
}
