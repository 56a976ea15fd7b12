//! Stacks of dense layers.
//!
//! A [`Network`] runs the layer cycle for every layer at once. `forward` returns a
//! [`ForwardPass`] holding each layer's output; `backward` walks it in reverse.
//!
//! Every pass is stamped with a process-wide id. `backward` only accepts the pass
//! produced by the network's most recent `forward`, so gradients are never computed
//! from one batch's outputs and another batch's cached inputs.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::driver::{Driver, SimpleDriver};
use crate::{DenseLayer, Error, Matrix, Result};

static NEXT_PASS_ID: AtomicU64 = AtomicU64::new(0);

/// An ordered stack of dense layers.
///
/// `forward` chains the layers front to back, `backward` chains them back to front, and
/// `update` steps every layer. Each layer enforces its own phase order, so a network
/// step that skips a stage fails the same way a single layer would.
#[derive(Debug, Clone)]
pub struct Network<D: Driver = SimpleDriver> {
    layers: Vec<DenseLayer<D>>,
    /// Id of the pass returned by the latest successful `forward`.
    pass_id: Option<u64>,
}

/// Outputs of every layer from one `Network::forward` call.
///
/// `Network::backward` needs these: each layer's backward takes the output it produced.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    id: u64,
    outputs: Vec<Matrix>,
}

impl ForwardPass {
    /// Output of the last layer.
    #[inline]
    pub fn output(&self) -> &Matrix {
        self.outputs
            .last()
            .expect("forward pass must have at least one layer output")
    }

    /// Output of layer `idx`.
    #[inline]
    pub fn layer_output(&self, idx: usize) -> Option<&Matrix> {
        self.outputs.get(idx)
    }

    pub fn into_output(mut self) -> Matrix {
        self.outputs
            .pop()
            .expect("forward pass must have at least one layer output")
    }
}

impl<D: Driver> Network<D> {
    /// Build a network from layers, validating that adjacent widths agree.
    pub fn from_layers(layers: Vec<DenseLayer<D>>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig(
                "network must have at least one layer".to_owned(),
            ));
        }
        for (idx, pair) in layers.windows(2).enumerate() {
            if pair[0].out_dim() != pair[1].in_dim() {
                return Err(Error::InvalidShape(format!(
                    "layer {idx} out_dim {} does not match layer {} in_dim {}",
                    pair[0].out_dim(),
                    idx + 1,
                    pair[1].in_dim()
                )));
            }
        }
        Ok(Self {
            layers,
            pass_id: None,
        })
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[DenseLayer<D>] {
        &self.layers
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&DenseLayer<D>> {
        self.layers.get(idx)
    }

    #[inline]
    pub(crate) fn last_layer(&self) -> &DenseLayer<D> {
        &self.layers[self.layers.len() - 1]
    }

    /// Driver of the first layer (all layers are built with the same driver type).
    #[inline]
    pub fn driver(&self) -> &D {
        self.layers[0].driver()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(DenseLayer::parameter_count).sum()
    }

    /// Forward pass through every layer, caching inputs for `backward`.
    pub fn forward(&mut self, input: &Matrix) -> Result<ForwardPass> {
        self.pass_id = None;
        let mut outputs: Vec<Matrix> = Vec::with_capacity(self.layers.len());
        for layer in &mut self.layers {
            let out = match outputs.last() {
                Some(prev) => layer.forward(prev)?,
                None => layer.forward(input)?,
            };
            outputs.push(out);
        }

        let id = NEXT_PASS_ID.fetch_add(1, Ordering::Relaxed);
        self.pass_id = Some(id);
        Ok(ForwardPass { id, outputs })
    }

    /// Backward pass from `grad = dL/d(output)` down to the network input.
    ///
    /// `pass` must come from the most recent `forward` on this network; any other pass
    /// (an older one, or one from a different network) is an [`Error::Sequence`].
    /// Returns `dL/d(input)`.
    pub fn backward(&mut self, pass: &ForwardPass, grad: &Matrix) -> Result<Matrix> {
        if self.pass_id != Some(pass.id) {
            return Err(Error::Sequence(match self.pass_id {
                Some(_) => "forward pass is not the latest one run on this network".to_owned(),
                None => "backward requires a preceding forward".to_owned(),
            }));
        }

        let mut grad = grad.clone();
        for (layer, output) in self.layers.iter_mut().zip(&pass.outputs).rev() {
            grad = layer.backward(output, &grad)?;
        }
        Ok(grad)
    }

    /// Gradient-descent step on every layer.
    pub fn update(&mut self, lr: f64) -> Result<()> {
        for layer in &mut self.layers {
            layer.update(lr)?;
        }
        Ok(())
    }

    /// Inference without touching any cached training state.
    pub fn predict(&self, input: &Matrix) -> Result<Matrix> {
        let mut out = self.layers[0].predict(input)?;
        for layer in &self.layers[1..] {
            out = layer.predict(&out)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, NetworkBuilder, loss};

    fn assert_close(analytic: f64, numeric: f64, abs_tol: f64, rel_tol: f64) {
        let diff = (analytic - numeric).abs();
        let scale = analytic.abs().max(numeric.abs()).max(1.0);
        assert!(
            diff <= abs_tol || diff / scale <= rel_tol,
            "analytic={analytic} numeric={numeric} diff={diff}"
        );
    }

    fn mean_loss(net: &Network, input: &Matrix, labels: &[usize]) -> f64 {
        let logits = net.predict(input).unwrap();
        let fwd = loss::softmax_cross_entropy(labels, &logits).unwrap();
        loss::mean(&fwd.losses).unwrap()
    }

    fn perturbed(net: &Network, layer: usize, weight: Option<usize>, bias: Option<usize>, eps: f64) -> Network {
        let layers = net
            .layers()
            .iter()
            .enumerate()
            .map(|(idx, l)| {
                let mut w = l.weights().as_slice().to_vec();
                let mut b = l.biases().to_vec();
                if idx == layer {
                    if let Some(p) = weight {
                        w[p] += eps;
                    }
                    if let Some(p) = bias {
                        b[p] += eps;
                    }
                }
                let w = Matrix::from_flat(w, l.in_dim(), l.out_dim()).unwrap();
                DenseLayer::load(SimpleDriver, w, b, l.activation()).unwrap()
            })
            .collect();
        Network::from_layers(layers).unwrap()
    }

    #[test]
    fn from_layers_rejects_width_mismatch() {
        let a = DenseLayer::load(
            SimpleDriver,
            Matrix::with_shape(2, 3).unwrap(),
            vec![0.0; 3],
            Activation::ReLU,
        )
        .unwrap();
        let b = DenseLayer::load(
            SimpleDriver,
            Matrix::with_shape(4, 2).unwrap(),
            vec![0.0; 2],
            Activation::Identity,
        )
        .unwrap();
        assert!(matches!(
            Network::from_layers(vec![a, b]),
            Err(Error::InvalidShape(_))
        ));
        assert!(Network::<SimpleDriver>::from_layers(Vec::new()).is_err());
    }

    #[test]
    fn forward_matches_predict() {
        let mut net = NetworkBuilder::new(3)
            .unwrap()
            .add_layer(5, Activation::ReLU)
            .unwrap()
            .add_layer(2, Activation::Softmax)
            .unwrap()
            .build_with_seed(SimpleDriver, 1)
            .unwrap();

        let x = Matrix::from_rows(&[[0.1, -0.4, 0.9], [1.0, 0.0, -1.0]]).unwrap();
        let pass = net.forward(&x).unwrap();
        assert_eq!(pass.output(), &net.predict(&x).unwrap());
        assert_eq!(pass.layer_output(0).unwrap().shape(), (2, 5));
    }

    #[test]
    fn backward_matches_numeric_gradients() {
        let mut net = NetworkBuilder::new(2)
            .unwrap()
            .add_layer(4, Activation::ReLU)
            .unwrap()
            .add_layer(3, Activation::Identity)
            .unwrap()
            .build_with_seed(SimpleDriver, 3)
            .unwrap();

        let x = Matrix::from_rows(&[[0.3, -0.7], [0.9, 0.2], [-0.5, 0.5]]).unwrap();
        let labels = [0, 2, 1];

        let pass = net.forward(&x).unwrap();
        let fwd = loss::softmax_cross_entropy(&labels, pass.output()).unwrap();
        let d_logits = loss::softmax_cross_entropy_backward(&labels, &fwd.y_pred).unwrap();
        net.backward(&pass, &d_logits).unwrap();

        let eps = 1e-5;
        for layer_idx in 0..net.num_layers() {
            let layer = &net.layers()[layer_idx];
            let d_w = layer.weight_gradient().unwrap().as_slice().to_vec();
            let d_b = layer.bias_gradient().unwrap().to_vec();

            for (p, &analytic) in d_w.iter().enumerate() {
                let plus = mean_loss(&perturbed(&net, layer_idx, Some(p), None, eps), &x, &labels);
                let minus =
                    mean_loss(&perturbed(&net, layer_idx, Some(p), None, -eps), &x, &labels);
                assert_close(analytic, (plus - minus) / (2.0 * eps), 1e-6, 1e-4);
            }
            for (p, &analytic) in d_b.iter().enumerate() {
                let plus = mean_loss(&perturbed(&net, layer_idx, None, Some(p), eps), &x, &labels);
                let minus =
                    mean_loss(&perturbed(&net, layer_idx, None, Some(p), -eps), &x, &labels);
                assert_close(analytic, (plus - minus) / (2.0 * eps), 1e-6, 1e-4);
            }
        }
    }

    #[test]
    fn backward_rejects_pass_from_another_network() {
        let build = |sizes: &[usize]| {
            let mut b = NetworkBuilder::new(sizes[0]).unwrap();
            for &s in &sizes[1..] {
                b = b.add_layer(s, Activation::Identity).unwrap();
            }
            b.build_with_seed(SimpleDriver, 0).unwrap()
        };
        let mut small = build(&[2, 2]);
        let mut deep = build(&[2, 2, 2]);

        let x = Matrix::from_rows(&[[1.0, 1.0]]).unwrap();
        let pass = deep.forward(&x).unwrap();
        small.forward(&x).unwrap();
        assert!(matches!(
            small.backward(&pass, pass.output()),
            Err(Error::Sequence(_))
        ));
    }

    #[test]
    fn backward_rejects_a_superseded_pass() {
        let build = || {
            NetworkBuilder::new(2)
                .unwrap()
                .add_layer(4, Activation::ReLU)
                .unwrap()
                .add_layer(3, Activation::Identity)
                .unwrap()
                .build_with_seed(SimpleDriver, 0)
                .unwrap()
        };
        let mut net = build();
        let x1 = Matrix::from_rows(&[[1.0, -2.0], [0.5, 0.5]]).unwrap();
        let x2 = Matrix::from_rows(&[[-1.0, 2.0], [0.3, -0.8]]).unwrap();
        let g = Matrix::from_rows(&[[1.0, 0.0, -1.0], [0.5, 0.5, 0.0]]).unwrap();

        let stale = net.forward(&x1).unwrap();
        let fresh = net.forward(&x2).unwrap();
        assert!(matches!(net.backward(&stale, &g), Err(Error::Sequence(_))));
        assert!(net.layers()[0].weight_gradient().is_none());

        let expected = {
            let mut twin = build();
            let pass = twin.forward(&x2).unwrap();
            twin.backward(&pass, &g).unwrap();
            twin.layers()[0].weight_gradient().unwrap().clone()
        };
        net.backward(&fresh, &g).unwrap();
        assert_eq!(net.layers()[0].weight_gradient().unwrap(), &expected);
    }

    #[test]
    fn backward_before_forward_is_a_sequence_error() {
        let mut net = NetworkBuilder::new(2)
            .unwrap()
            .add_layer(2, Activation::Identity)
            .unwrap()
            .build_with_seed(SimpleDriver, 0)
            .unwrap();
        let x = Matrix::from_rows(&[[1.0, 1.0]]).unwrap();
        let pass = net.clone().forward(&x).unwrap();
        assert!(matches!(net.backward(&pass, pass.output()), Err(Error::Sequence(_))));
    }

    #[test]
    fn update_without_backward_fails() {
        let mut net = NetworkBuilder::new(2)
            .unwrap()
            .add_layer(2, Activation::Identity)
            .unwrap()
            .build_with_seed(SimpleDriver, 0)
            .unwrap();
        let x = Matrix::from_rows(&[[1.0, 1.0]]).unwrap();
        net.forward(&x).unwrap();
        assert!(matches!(net.update(0.1), Err(Error::Sequence(_))));
    }
}
