//! Network builder.
//!
//! `NetworkBuilder` is the recommended way to define a network.
//!
//! It makes the structure explicit (layer widths + activations) and picks a weight
//! initializer per activation unless one is given:
//!
//! - `identity` / `softmax`: Xavier/Glorot
//! - `relu`: He/Kaiming

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::driver::Driver;
use crate::{Activation, DenseLayer, Error, Init, Network, Result};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    out_dim: usize,
    activation: Activation,
    init: Init,
}

#[derive(Debug, Clone)]
/// Builder for a [`Network`].
///
/// Example:
///
/// ```rust
/// use rust_backprop::{Activation, NetworkBuilder, SimpleDriver};
///
/// # fn main() -> rust_backprop::Result<()> {
/// let net = NetworkBuilder::new(2)?
///     .add_layer(64, Activation::ReLU)?
///     .add_layer(3, Activation::Identity)?
///     .build_with_seed(SimpleDriver, 0)?;
/// assert_eq!(net.output_dim(), 3);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    input_dim: usize,
    layers: Vec<LayerSpec>,
}

impl NetworkBuilder {
    /// Start building a network that accepts batches with `input_dim` columns.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            layers: Vec::new(),
        })
    }

    /// Add a dense layer with `out_dim` neurons and the default initializer for
    /// `activation`.
    pub fn add_layer(self, out_dim: usize, activation: Activation) -> Result<Self> {
        self.add_layer_with_init(out_dim, activation, Init::for_activation(activation))
    }

    /// Add a dense layer with an explicit initializer.
    pub fn add_layer_with_init(
        mut self,
        out_dim: usize,
        activation: Activation,
        init: Init,
    ) -> Result<Self> {
        if out_dim == 0 {
            return Err(Error::InvalidConfig("layer out_dim must be > 0".to_owned()));
        }
        self.layers.push(LayerSpec {
            out_dim,
            activation,
            init,
        });
        Ok(self)
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed<D: Driver>(self, driver: D, seed: u64) -> Result<Network<D>> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(driver, &mut rng)
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<D: Driver, R: Rng + ?Sized>(
        self,
        driver: D,
        rng: &mut R,
    ) -> Result<Network<D>> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut in_dim = self.input_dim;
        for spec in self.layers {
            let layer = DenseLayer::new_with_rng(
                driver.clone(),
                in_dim,
                spec.out_dim,
                spec.activation,
                spec.init,
                rng,
            )?;
            layers.push(layer);
            in_dim = spec.out_dim;
        }

        let network = Network::from_layers(layers)?;
        log::debug!(
            "built network with {} layers ({} parameters) on {} driver",
            network.num_layers(),
            network.parameter_count(),
            driver.name()
        );
        Ok(network)
    }
}
