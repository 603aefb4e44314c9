//! Pretrained standard scaler for the linguistic feature columns

use authorscope_core::{Error, Result};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Mean/variance standardisation with fitted parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column mean
    pub mean: Vec<f64>,

    /// Per-column standard deviation
    pub scale: Vec<f64>,

    #[serde(default = "default_true")]
    pub with_mean: bool,

    #[serde(default = "default_true")]
    pub with_std: bool,
}

impl StandardScaler {
    /// Check that mean and scale describe the same number of columns
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(Error::load(format!(
                "Scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::load("Scaler scale values must be finite and non-negative"));
        }
        Ok(())
    }

    pub fn num_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardise one row in place.
    ///
    /// Columns with zero variance are only centred.
    pub fn transform_row(&self, row: &mut [f64]) -> Result<()> {
        if row.len() != self.num_features() {
            return Err(Error::inference(format!(
                "Scaler expects {} features, got {}",
                self.num_features(),
                row.len()
            )));
        }

        for ((value, mean), scale) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
            if self.with_mean {
                *value -= mean;
            }
            if self.with_std && *scale != 0.0 {
                *value /= scale;
            }
        }
        Ok(())
    }
}
