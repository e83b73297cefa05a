use serde::{Deserialize, Serialize};

use crate::config::BandSpec;

/// Whether a degree reaches the expectation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Meets,
    Below,
}

impl Expectation {
    pub fn label(self) -> &'static str {
        match self {
            Expectation::Meets => "达到期望",
            Expectation::Below => "未达期望",
        }
    }
}

/// Meets iff `degree >= threshold`; equality counts as meeting.
pub fn expectation(degree: f64, threshold: f64) -> Expectation {
    if degree >= threshold {
        Expectation::Meets
    } else {
        Expectation::Below
    }
}

/// Index of the first band the degree clears. The last band takes anything
/// left over, so this is `None` only for an empty band list.
pub fn band(degree: f64, bands: &[BandSpec]) -> Option<usize> {
    bands
        .iter()
        .position(|b| b.admits(degree))
        .or_else(|| bands.len().checked_sub(1))
}
