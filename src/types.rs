use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Whether a classifier task trains a model or applies one.
///
/// Fixed when the task is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Train,
    Predict,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Predict => "predict",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "train" => Ok(Mode::Train),
            "predict" => Ok(Mode::Predict),
            other => Err(format!(
                "invalid mode: {other} (expected \"train\" or \"predict\")"
            )),
        }
    }
}

/// How `mask_fit` is matched when filtering classifier candidates.
///
/// - `FitName`: `mask_fit` must be a substring of the light-curve-fit task
///   name (ignored when the candidate carries no fit).
/// - `Legacy`: reproduces older pipelines, where setting `mask_fit` re-tests
///   the `mask_sim` value against the simulation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMatching {
    FitName,
    Legacy,
}

impl Default for MaskMatching {
    fn default() -> Self {
        MaskMatching::FitName
    }
}

/// Pipeline stage; determines the numbered output sub-directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DataPrep,
    Simulation,
    LightCurveFit,
    Classification,
}

impl Stage {
    pub fn number(&self) -> u32 {
        match self {
            Stage::DataPrep => 0,
            Stage::Simulation => 1,
            Stage::LightCurveFit => 2,
            Stage::Classification => 3,
        }
    }

    /// Directory label, e.g. `3_CLAS`.
    pub fn dir_label(&self) -> String {
        let suffix = match self {
            Stage::DataPrep => "DATAPREP",
            Stage::Simulation => "SIM",
            Stage::LightCurveFit => "LCFIT",
            Stage::Classification => "CLAS",
        };
        format!("{}_{}", self.number(), suffix)
    }
}
