//! Labeled classification datasets.
//!
//! A [`Dataset`] pairs a feature matrix (one sample per row) with one class index per
//! row. The training loop feeds the whole feature matrix as a single batch.
//!
//! Sources:
//! - [`spiral`]: the classic interleaved-spirals toy problem (not linearly separable)
//! - [`Dataset::from_json_str`] / [`Dataset::from_json_path`] (feature `serde`): the
//!   `{"X": [[x0, x1], ...], "y": [label, ...]}` exchange format

use std::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{Error, Matrix, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Matrix,
    labels: Vec<usize>,
    num_classes: usize,
}

impl Dataset {
    /// Pair `features` with `labels`; the class count is `max(label) + 1`.
    pub fn new(features: Matrix, labels: Vec<usize>) -> Result<Self> {
        if labels.len() != features.rows() {
            return Err(Error::InvalidData(format!(
                "labels len {} does not match feature rows {}",
                labels.len(),
                features.rows()
            )));
        }
        let num_classes = labels.iter().max().map_or(0, |&max| max + 1);

        Ok(Self {
            features,
            labels,
            num_classes,
        })
    }

    /// Build a dataset from per-sample feature rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R], labels: Vec<usize>) -> Result<Self> {
        Self::new(Matrix::from_rows(rows)?, labels)
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    /// Always false: a dataset holds at least one sample.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    /// Returns the per-sample feature dimension.
    pub fn input_dim(&self) -> usize {
        self.features.cols()
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[inline]
    pub fn features(&self) -> &Matrix {
        &self.features
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct DatasetJson {
    #[serde(rename = "X")]
    x: Vec<Vec<f64>>,
    y: Vec<usize>,
}

#[cfg(feature = "serde")]
impl Dataset {
    /// Parse a `{"X": [[..], ..], "y": [..]}` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: DatasetJson = serde_json::from_str(json)
            .map_err(|e| Error::InvalidData(format!("malformed dataset json: {e}")))?;
        Self::from_rows(&raw.x, raw.y)
    }

    /// Read and parse a JSON dataset file.
    pub fn from_json_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Render as a `{"X": .., "y": ..}` document.
    pub fn to_json_string(&self) -> Result<String> {
        let raw = DatasetJson {
            x: self.features.to_rows(),
            y: self.labels.clone(),
        };
        serde_json::to_string(&raw)
            .map_err(|e| Error::InvalidData(format!("cannot encode dataset: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Parameters for [`spiral`].
pub struct SpiralConfig {
    /// Number of spiral arms (one class per arm).
    pub classes: usize,
    /// Points per arm.
    pub samples: usize,
    /// Extra rotation, in radians, accumulated from the center to the rim.
    pub twist: f64,
    /// Standard deviation of the angular noise.
    pub dispersion: f64,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            classes: 3,
            samples: 100,
            twist: 5.0,
            dispersion: 0.1,
        }
    }
}

impl SpiralConfig {
    pub fn validate(&self) -> Result<()> {
        if self.classes == 0 {
            return Err(Error::InvalidConfig("spiral classes must be > 0".to_owned()));
        }
        if self.samples == 0 {
            return Err(Error::InvalidConfig("spiral samples must be > 0".to_owned()));
        }
        if !self.twist.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "spiral twist must be finite, got {}",
                self.twist
            )));
        }
        if !(self.dispersion.is_finite() && self.dispersion >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "spiral dispersion must be finite and >= 0, got {}",
                self.dispersion
            )));
        }
        Ok(())
    }
}

/// Generate `classes` interleaved spiral arms in 2D.
///
/// Sample `i` of arm `c` sits at radius `r = i / (samples - 1)` and angle
/// `c * 2pi / classes + r * twist + noise`, so every arm starts at the origin and
/// winds outwards. Rows are grouped by class.
pub fn spiral<R: Rng + ?Sized>(cfg: &SpiralConfig, rng: &mut R) -> Result<Dataset> {
    cfg.validate()?;

    let noise = Normal::new(0.0, cfg.dispersion)
        .map_err(|e| Error::InvalidConfig(format!("spiral dispersion: {e}")))?;
    let steps = cfg.samples.saturating_sub(1).max(1) as f64;

    let len = cfg.classes * cfg.samples;
    let mut features = Vec::with_capacity(len * 2);
    let mut labels = Vec::with_capacity(len);

    for class in 0..cfg.classes {
        let offset = class as f64 * 2.0 * PI / cfg.classes as f64;
        for i in 0..cfg.samples {
            let r = i as f64 / steps;
            let theta = offset + r * cfg.twist + noise.sample(rng);
            features.push(r * theta.sin());
            features.push(r * theta.cos());
            labels.push(class);
        }
    }

    Dataset::new(Matrix::from_flat(features, len, 2)?, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn dataset_validates_label_count() {
        let ok = Dataset::from_rows(&[[0.0, 1.0], [2.0, 3.0]], vec![0, 2]);
        assert_eq!(ok.unwrap().num_classes(), 3);

        let err = Dataset::from_rows(&[[0.0, 1.0], [2.0, 3.0]], vec![0]);
        assert!(matches!(err, Err(Error::InvalidData(_))));
    }

    #[test]
    fn spiral_has_balanced_classes_inside_the_unit_disk() {
        let cfg = SpiralConfig {
            classes: 3,
            samples: 50,
            ..SpiralConfig::default()
        };
        let data = spiral(&cfg, &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(data.len(), 150);
        assert_eq!(data.input_dim(), 2);
        assert_eq!(data.num_classes(), 3);
        for class in 0..3 {
            assert_eq!(data.labels().iter().filter(|&&l| l == class).count(), 50);
        }
        for row in data.features().iter_rows() {
            assert!(row[0].hypot(row[1]) <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn spiral_is_deterministic_under_a_seed() {
        let cfg = SpiralConfig::default();
        let a = spiral(&cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = spiral(&cfg, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn spiral_rejects_bad_config() {
        let mut rng = StdRng::seed_from_u64(0);
        for cfg in [
            SpiralConfig { classes: 0, ..SpiralConfig::default() },
            SpiralConfig { samples: 0, ..SpiralConfig::default() },
            SpiralConfig { dispersion: -1.0, ..SpiralConfig::default() },
        ] {
            assert!(matches!(spiral(&cfg, &mut rng), Err(Error::InvalidConfig(_))));
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn parses_the_json_exchange_format() {
        let data = Dataset::from_json_str(r#"{"X": [[0.5, -0.5], [1.0, 2.0]], "y": [1, 0]}"#)
            .unwrap();
        assert_eq!(data.features().row(0), &[0.5, -0.5]);
        assert_eq!(data.labels(), &[1, 0]);

        let again = Dataset::from_json_str(&data.to_json_string().unwrap()).unwrap();
        assert_eq!(again, data);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Dataset::from_json_str(r#"{"X": [[1.0]], "y": [-1]}"#),
            Err(Error::InvalidData(_))
        ));
        assert!(Dataset::from_json_str(r#"{"X": [], "y": []}"#).is_err());
        assert!(matches!(
            Dataset::from_json_path("/definitely/not/here.json"),
            Err(Error::Io(_))
        ));
    }
}
