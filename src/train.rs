//! Full-batch training.
//!
//! [`Network::fit`] runs plain gradient descent on mean softmax cross-entropy, one
//! forward/backward/update cycle per epoch over the whole dataset, and records an
//! [`EpochReport`] for each epoch. [`Network::evaluate`] measures the same loss and
//! accuracy without training.
//!
//! The loss gradient reaches the network in one of two ways, picked from the output
//! layer's activation:
//! - `Identity` (logits): fused softmax + cross-entropy backward
//! - `Softmax`: cross-entropy backward, then the layer's own softmax backward

use crate::driver::Driver;
use crate::{Activation, Dataset, Error, Network, Result, metrics};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Learning-rate schedule evaluated once per epoch.
pub enum LrSchedule {
    #[default]
    Constant,
    /// `lr / (1 + decay * epoch)`.
    InverseTime { decay: f64 },
}

impl LrSchedule {
    pub fn validate(self) -> Result<()> {
        match self {
            LrSchedule::Constant => Ok(()),
            LrSchedule::InverseTime { decay } => {
                if !(decay.is_finite() && decay >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "lr decay must be finite and >= 0, got {decay}"
                    )));
                }
                Ok(())
            }
        }
    }

    #[inline]
    pub fn lr_at(self, base_lr: f64, epoch: usize) -> f64 {
        match self {
            LrSchedule::Constant => base_lr,
            LrSchedule::InverseTime { decay } => base_lr / (1.0 + decay * epoch as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub epochs: usize,
    pub lr: f64,
    pub lr_schedule: LrSchedule,
    /// Log progress every `log_every` epochs (0 disables progress logs).
    pub log_every: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            lr: 1.0,
            lr_schedule: LrSchedule::Constant,
            log_every: 100,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "lr must be finite and > 0, got {}",
                self.lr
            )));
        }
        self.lr_schedule.validate()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// Metrics for one epoch, measured on the forward pass that epoch trained on.
pub struct EpochReport {
    pub epoch: usize,
    pub accuracy: f64,
    /// Mean cross-entropy.
    pub loss: f64,
    /// Learning rate this epoch's update used.
    pub lr: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
}

impl FitReport {
    pub fn first(&self) -> Option<&EpochReport> {
        self.epochs.first()
    }

    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub loss: f64,
    pub accuracy: f64,
}

/// How the loss gradient reaches the last layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    /// Last layer emits logits: fused softmax + cross-entropy.
    Fused,
    /// Last layer applies softmax itself: plain cross-entropy, then the layer's
    /// softmax backward.
    Unfused,
}

impl<D: Driver> Network<D> {
    fn objective(&self) -> Result<Objective> {
        match self.last_layer().activation() {
            Activation::Identity => Ok(Objective::Fused),
            Activation::Softmax => Ok(Objective::Unfused),
            Activation::ReLU => Err(Error::InvalidConfig(
                "output layer must use Identity (logits) or Softmax activation".to_owned(),
            )),
        }
    }

    fn check_dataset(&self, data: &Dataset) -> Result<()> {
        if data.input_dim() != self.input_dim() {
            return Err(Error::InvalidData(format!(
                "dataset input_dim {} does not match network input_dim {}",
                data.input_dim(),
                self.input_dim()
            )));
        }
        if data.num_classes() > self.output_dim() {
            return Err(Error::InvalidData(format!(
                "dataset has {} classes, network output_dim is {}",
                data.num_classes(),
                self.output_dim()
            )));
        }
        Ok(())
    }

    /// Full-batch gradient descent on softmax cross-entropy.
    ///
    /// Each epoch runs one forward pass over the whole dataset, records mean loss and
    /// accuracy for it, then backpropagates and updates every layer.
    pub fn fit(&mut self, train: &Dataset, cfg: &FitConfig) -> Result<FitReport> {
        cfg.validate()?;
        self.check_dataset(train)?;
        let objective = self.objective()?;

        let driver = self.driver().clone();
        let x = train.features();
        let labels = train.labels();
        let mut epochs = Vec::with_capacity(cfg.epochs);

        log::info!(
            "fit: {} samples, {} epochs, lr={} ({:?}), {:?} objective on {} driver",
            train.len(),
            cfg.epochs,
            cfg.lr,
            cfg.lr_schedule,
            objective,
            driver.name()
        );

        for epoch in 0..cfg.epochs {
            let lr = cfg.lr_schedule.lr_at(cfg.lr, epoch);
            let pass = self.forward(x)?;

            let (losses, probs, grad) = match objective {
                Objective::Fused => {
                    let out = driver.softmax_cross_entropy_forward(labels, pass.output())?;
                    let grad = driver.softmax_cross_entropy_backward(labels, &out.y_pred)?;
                    (out.losses, out.y_pred, grad)
                }
                Objective::Unfused => {
                    let probs = pass.output();
                    let losses = driver.cross_entropy_forward(labels, probs)?;
                    let grad = driver.cross_entropy_backward(labels, probs)?;
                    (losses, driver.copy(probs), grad)
                }
            };

            let report = EpochReport {
                epoch,
                accuracy: metrics::accuracy(&probs, labels)?,
                loss: driver.mean(&losses)?,
                lr,
            };
            if cfg.log_every > 0 && epoch % cfg.log_every == 0 {
                log::info!(
                    "epoch {epoch}: loss={:.6} accuracy={:.4} lr={lr}",
                    report.loss,
                    report.accuracy
                );
            }
            epochs.push(report);

            self.backward(&pass, &grad)?;
            self.update(lr)?;
        }

        if let Some(last) = epochs.last() {
            log::info!(
                "fit done: loss={:.6} accuracy={:.4}",
                last.loss,
                last.accuracy
            );
        }
        Ok(FitReport { epochs })
    }

    /// Mean cross-entropy and accuracy over a dataset, without training.
    pub fn evaluate(&self, data: &Dataset) -> Result<EvalReport> {
        self.check_dataset(data)?;
        let objective = self.objective()?;
        let driver = self.driver();
        let labels = data.labels();

        let out = self.predict(data.features())?;
        let probs = match objective {
            Objective::Fused => driver.softmax_forward(&out),
            Objective::Unfused => out,
        };
        let losses = driver.cross_entropy_forward(labels, &probs)?;

        Ok(EvalReport {
            loss: driver.mean(&losses)?,
            accuracy: metrics::accuracy(&probs, labels)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Matrix, NetworkBuilder, SimpleDriver};

    fn tiny_data() -> Dataset {
        Dataset::from_rows(&[[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]], vec![0, 1, 2]).unwrap()
    }

    fn net(out_activation: Activation) -> Network {
        NetworkBuilder::new(2)
            .unwrap()
            .add_layer(3, out_activation)
            .unwrap()
            .build_with_seed(SimpleDriver, 0)
            .unwrap()
    }

    #[test]
    fn config_validation() {
        assert!(FitConfig::default().validate().is_ok());
        let bad = [
            FitConfig { epochs: 0, ..FitConfig::default() },
            FitConfig { lr: 0.0, ..FitConfig::default() },
            FitConfig { lr: f64::INFINITY, ..FitConfig::default() },
            FitConfig {
                lr_schedule: LrSchedule::InverseTime { decay: -1.0 },
                ..FitConfig::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn inverse_time_schedule_decays() {
        let s = LrSchedule::InverseTime { decay: 0.5 };
        assert_eq!(s.lr_at(1.0, 0), 1.0);
        assert_eq!(s.lr_at(1.0, 2), 0.5);
        assert_eq!(LrSchedule::Constant.lr_at(0.3, 100), 0.3);
    }

    #[test]
    fn epoch_reports_carry_the_scheduled_learning_rate() {
        let mut n = net(Activation::Identity);
        let cfg = FitConfig {
            epochs: 4,
            lr: 1.0,
            lr_schedule: LrSchedule::InverseTime { decay: 1.0 },
            log_every: 0,
        };
        let report = n.fit(&tiny_data(), &cfg).unwrap();
        let lrs: Vec<f64> = report.epochs.iter().map(|e| e.lr).collect();
        assert_eq!(lrs, vec![1.0, 0.5, 1.0 / 3.0, 0.25]);
    }

    #[test]
    fn relu_output_layer_is_rejected() {
        let mut n = net(Activation::ReLU);
        let cfg = FitConfig { epochs: 1, ..FitConfig::default() };
        assert!(matches!(
            n.fit(&tiny_data(), &cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn dataset_shape_is_checked() {
        let mut n = net(Activation::Identity);
        let wide = Dataset::new(Matrix::with_shape(3, 4).unwrap(), vec![0, 1, 2]).unwrap();
        assert!(n.fit(&wide, &FitConfig::default()).is_err());

        let many_classes = Dataset::from_rows(&[[0.0, 0.0]], vec![7]).unwrap();
        assert!(n.evaluate(&many_classes).is_err());
    }

    #[test]
    fn fused_and_unfused_objectives_take_the_same_first_step() {
        let cfg = FitConfig {
            epochs: 2,
            lr: 0.5,
            ..FitConfig::default()
        };
        let mut fused = net(Activation::Identity);
        let mut unfused = net(Activation::Softmax);

        let a = fused.fit(&tiny_data(), &cfg).unwrap();
        let b = unfused.fit(&tiny_data(), &cfg).unwrap();

        for (ea, eb) in a.epochs.iter().zip(&b.epochs) {
            assert!((ea.loss - eb.loss).abs() < 1e-9);
            assert_eq!(ea.accuracy, eb.accuracy);
        }
        for (wa, wb) in fused.layers()[0]
            .weights()
            .as_slice()
            .iter()
            .zip(unfused.layers()[0].weights().as_slice())
        {
            assert!((wa - wb).abs() < 1e-9);
        }
    }

    #[test]
    fn evaluate_matches_the_next_epoch_report() {
        let mut n = net(Activation::Identity);
        let cfg = FitConfig {
            epochs: 5,
            lr: 0.5,
            ..FitConfig::default()
        };
        n.fit(&tiny_data(), &cfg).unwrap();
        let eval = n.evaluate(&tiny_data()).unwrap();

        let report = n
            .fit(&tiny_data(), &FitConfig { epochs: 1, ..cfg })
            .unwrap();
        let first = report.first().unwrap();
        assert!((eval.loss - first.loss).abs() < 1e-12);
        assert_eq!(eval.accuracy, first.accuracy);
    }
}
