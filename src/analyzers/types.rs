//! Data types produced by the computation and aggregation stages.

use serde::{Deserialize, Serialize};

use crate::config::OBJECTIVE_COUNT;

/// What a degree or a distribution refers to: one objective, or the course
/// as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Objective1,
    Objective2,
    Objective3,
    Overall,
}

impl Target {
    pub const ALL: [Target; OBJECTIVE_COUNT + 1] = [
        Target::Objective1,
        Target::Objective2,
        Target::Objective3,
        Target::Overall,
    ];

    pub const OBJECTIVES: [Target; OBJECTIVE_COUNT] =
        [Target::Objective1, Target::Objective2, Target::Objective3];

    /// Objective index, `None` for [`Target::Overall`].
    pub fn index(self) -> Option<usize> {
        match self {
            Target::Objective1 => Some(0),
            Target::Objective2 => Some(1),
            Target::Objective3 => Some(2),
            Target::Overall => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Target::Objective1 => "目标1",
            Target::Objective2 => "目标2",
            Target::Objective3 => "目标3",
            Target::Overall => "总达成度",
        }
    }
}

/// Achievement of one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub student_id: String,
    pub blended_score: f64,
    /// Degrees in [0, 1], one per objective.
    pub per_objective: [f64; OBJECTIVE_COUNT],
    /// Weighted sum of `per_objective`, in [0, 1].
    pub aggregate: f64,
}

impl AchievementRecord {
    pub fn degree(&self, target: Target) -> f64 {
        match target.index() {
            Some(i) => self.per_objective[i],
            None => self.aggregate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: usize,
    /// Share of classified students, 0–100.
    pub percentage: f64,
}

/// Descriptive statistics of a set of degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Classification of every achievement record for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSet {
    pub target: Target,
    pub classified: usize,
    /// `[达到期望, 未达期望]`.
    pub expectation: Vec<DistributionBucket>,
    /// One bucket per configured band, in band order.
    pub bands: Vec<DistributionBucket>,
    pub summary: Option<Summary>,
}

/// One [`DistributionSet`] per objective, then the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub sets: Vec<DistributionSet>,
}

impl Distribution {
    pub fn set(&self, target: Target) -> Option<&DistributionSet> {
        self.sets.iter().find(|s| s.target == target)
    }
}
