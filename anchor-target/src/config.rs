//! Target assignment configuration format.

use crate::{
    anchor::{AnchorConfigInit, GridGeometryInit},
    assign::ThresholdsInit,
    common::*,
    ground_truth::GroundTruthFilterInit,
};

/// The main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anchors: AnchorConfigInit,
    #[serde(default)]
    pub geometry: GridGeometryInit,
    #[serde(default)]
    pub filter: GroundTruthFilterInit,
    #[serde(default)]
    pub thresholds: ThresholdsInit,
    /// Number of labeled anchors drawn per image for training.
    #[serde(default = "default_minibatch_size")]
    pub minibatch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anchors: Default::default(),
            geometry: Default::default(),
            filter: Default::default(),
            thresholds: Default::default(),
            minibatch_size: default_minibatch_size(),
        }
    }
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = Self::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(json5::from_str(text)?)
    }
}

fn default_minibatch_size() -> usize {
    64
}
