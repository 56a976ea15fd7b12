//! Dense feed-forward networks with hand-written backpropagation.
//!
//! `rust-backprop` trains fully connected networks with softmax + cross-entropy using
//! nothing but explicit matrix algebra: every forward pass, every gradient and every
//! update is a plain function you can read and check by hand. There is no autodiff.
//!
//! # Layers of the crate
//!
//! - [`Driver`]: the numeric backend. Matrix primitives (`matmul`, `transpose`,
//!   `add_vector`, `sum_columns`, `one_hot`), activation kernels (ReLU, softmax),
//!   cross-entropy and the fused softmax + cross-entropy gradient. All operations are
//!   pure. [`SimpleDriver`] is the reference implementation.
//! - [`DenseLayer`]: one weight matrix, one bias vector, an optional [`Activation`], and
//!   an explicit `forward -> backward -> update` cycle. Out-of-order calls return
//!   [`Error::Sequence`].
//! - [`Network`] / [`NetworkBuilder`]: layers chained front to back and back to front.
//! - [`Network::fit`]: a full-batch training loop reporting loss and accuracy per epoch.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - A [`Matrix`] is a non-empty, row-major batch: rows are samples, columns features.
//! - Layer weights have shape `(in_dim, out_dim)`; a layer computes `x W + b`.
//! - Labels are class indices (`&[usize]`), one per batch row.
//!
//! # Panics vs `Result`
//!
//! Every operation reachable with user data returns [`Result`]: shape mismatches are
//! [`Error::InvalidShape`], bad inputs are [`Error::InvalidData`] and bad settings are
//! [`Error::InvalidConfig`]. Indexing helpers like [`Matrix::get`] and [`Matrix::row`]
//! panic on out-of-bounds indices, like slice indexing.
//!
//! # Quick start
//!
//! ```rust
//! use rust_backprop::{Activation, Dataset, FitConfig, NetworkBuilder, SimpleDriver};
//!
//! # fn main() -> rust_backprop::Result<()> {
//! let train = Dataset::from_rows(
//!     &[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0], [0.1, 0.9]],
//!     vec![0, 0, 1, 1],
//! )?;
//!
//! let mut net = NetworkBuilder::new(2)?
//!     .add_layer(8, Activation::ReLU)?
//!     .add_layer(2, Activation::Identity)?
//!     .build_with_seed(SimpleDriver, 0)?;
//!
//! let report = net.fit(
//!     &train,
//!     &FitConfig {
//!         epochs: 50,
//!         lr: 0.5,
//!         ..FitConfig::default()
//!     },
//! )?;
//! assert_eq!(report.epochs.len(), 50);
//! # Ok(())
//! # }
//! ```
//!
//! # Driving a layer by hand
//!
//! ```rust
//! use rust_backprop::{Activation, DenseLayer, Driver, Matrix, SimpleDriver};
//!
//! # fn main() -> rust_backprop::Result<()> {
//! let driver = SimpleDriver;
//! let weights = Matrix::from_rows(&[[1.0, 0.0, -1.0], [0.5, 0.5, 0.5]])?;
//! let mut layer = DenseLayer::load(driver, weights, vec![0.0; 3], Activation::Identity)?;
//!
//! let x = Matrix::from_rows(&[[1.0, 2.0]])?;
//! let labels = [2];
//!
//! let logits = layer.forward(&x)?;
//! let out = driver.softmax_cross_entropy_forward(&labels, &logits)?;
//! let grad = driver.softmax_cross_entropy_backward(&labels, &out.y_pred)?;
//! let _d_input = layer.backward(&logits, &grad)?;
//! layer.update(0.1)?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod data;
pub mod driver;
pub mod error;
pub mod layer;
pub mod loss;
pub(crate) mod matmul;
pub mod matrix;
pub mod metrics;
pub mod network;
pub mod train;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use data::{Dataset, SpiralConfig, spiral};
#[cfg(feature = "matrixmultiply")]
pub use driver::GemmDriver;
pub use driver::{Driver, SimpleDriver};
pub use error::{Error, Result};
pub use layer::{DenseLayer, Init};
pub use loss::SoftmaxCrossEntropy;
pub use matrix::{Matrix, Vector};
pub use network::{ForwardPass, Network};
pub use train::{EpochReport, EvalReport, FitConfig, FitReport, LrSchedule};
