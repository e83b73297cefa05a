//! Per-student achievement degrees.

use crate::analyzers::types::AchievementRecord;
use crate::analyzers::utility::{apportion_points, clamp_unit};
use crate::config::{Apportion, OBJECTIVE_COUNT, WeightConfig};
use crate::error::ComputationError;
use crate::parser::StudentRecord;

/// Computes the achievement of one student.
///
/// Returns `Ok(None)` for students that are excluded from computation:
/// a special status, or a missing usual or final score.
///
/// With per-objective sub-scores, objective `i`'s degree is its blended
/// sub-score over the points the objective is worth. Otherwise the blended
/// total is split according to [`Apportion`]. Every degree is clamped to
/// [0, 1]; the aggregate is the weight-averaged degree.
///
/// # Errors
///
/// [`ComputationError`] when an objective worth zero points would be used as
/// a divisor, or when a degree is not finite.
pub fn compute(
    record: &StudentRecord,
    config: &WeightConfig,
) -> Result<Option<AchievementRecord>, ComputationError> {
    if !record.status.is_normal() {
        return Ok(None);
    }
    let (Some(usual), Some(final_exam)) = (record.usual_score, record.final_score) else {
        return Ok(None);
    };

    let wu = config.component_weights.usual;
    let wf = config.component_weights.final_exam;
    let blended_score = usual * wu + final_exam * wf;

    let objective_points = |objective: usize| -> Result<f64, ComputationError> {
        let full_mark = config.objective_full_mark(objective);
        if full_mark > 0.0 {
            Ok(full_mark)
        } else {
            Err(ComputationError::NonPositiveFullMark {
                student_id: record.id.clone(),
                objective,
                full_mark,
            })
        }
    };

    let mut per_objective = [0.0; OBJECTIVE_COUNT];
    for (objective, degree) in per_objective.iter_mut().enumerate() {
        let raw = match (&record.objective_scores, config.apportion) {
            (Some(scores), _) => {
                let score = &scores[objective];
                (score.usual * wu + score.final_exam * wf) / objective_points(objective)?
            }
            (None, Apportion::Uniform) => blended_score / config.full_mark,
            (None, Apportion::RoundedPoints) => {
                let points = objective_points(objective)?;
                let weight = config.objective_weights[objective];
                let usual_part = apportion_points(usual, weight) / points;
                let final_part = apportion_points(final_exam, weight) / points;
                usual_part * wu + final_part * wf
            }
        };
        *degree = finite(record, raw).map(clamp_unit)?;
    }

    let aggregate = per_objective
        .iter()
        .zip(config.objective_weights)
        .map(|(degree, weight)| degree * weight)
        .sum::<f64>();
    let aggregate = finite(record, aggregate).map(clamp_unit)?;

    Ok(Some(AchievementRecord {
        student_id: record.id.clone(),
        blended_score,
        per_objective,
        aggregate,
    }))
}

fn finite(record: &StudentRecord, value: f64) -> Result<f64, ComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError::NonFiniteDegree {
            student_id: record.id.clone(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ObjectiveScore, Status};

    fn record(usual: Option<f64>, final_exam: Option<f64>) -> StudentRecord {
        StudentRecord {
            sheet: "s".to_string(),
            row: 1,
            id: "2021001".to_string(),
            name: "张三".to_string(),
            class_name: "音乐2212".to_string(),
            usual_score: usual,
            final_score: final_exam,
            total_score: None,
            objective_scores: None,
            status: Status::Normal,
            status_note: None,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_uniform_apportion() {
        let config = WeightConfig::default();
        let result = compute(&record(Some(80.0), Some(90.0)), &config)
            .unwrap()
            .unwrap();
        assert!(close(result.blended_score, 87.0));
        for degree in result.per_objective {
            assert!(close(degree, 0.87));
        }
        assert!(close(result.aggregate, 0.87));
    }

    #[test]
    fn test_rounded_points_apportion() {
        let config = WeightConfig {
            apportion: Apportion::RoundedPoints,
            ..WeightConfig::default()
        };
        let result = compute(&record(Some(85.0), Some(77.0)), &config)
            .unwrap()
            .unwrap();
        // Objective 3 is worth 20 points: usual 17/20, final 15/20.
        assert!(close(result.per_objective[2], 0.78));
        // Objective 1 is worth 50 points: usual 43/50 (42.5 rounds up), final 39/50.
        assert!(close(result.per_objective[0], 0.3 * 0.86 + 0.7 * 0.78));

        let uniform = compute(&record(Some(85.0), Some(77.0)), &WeightConfig::default())
            .unwrap()
            .unwrap();
        assert!(close(uniform.per_objective[2], 0.794));
    }

    #[test]
    fn test_rounded_points_halfway_rounds_up() {
        let config = WeightConfig {
            objective_weights: [0.35, 0.35, 0.30],
            apportion: Apportion::RoundedPoints,
            ..WeightConfig::default()
        };
        let result = compute(&record(Some(90.0), Some(90.0)), &config)
            .unwrap()
            .unwrap();
        // 90 × 35% = 31.5 whole points, which rounds to 32.
        assert!(close(result.per_objective[0], 32.0 / 35.0));
        assert!(close(result.per_objective[1], 32.0 / 35.0));
        assert!(close(result.per_objective[2], 0.9));
    }

    #[test]
    fn test_sub_scores_take_precedence() {
        let mut student = record(Some(80.0), Some(90.0));
        student.objective_scores = Some([
            ObjectiveScore { usual: 50.0, final_exam: 40.0 },
            ObjectiveScore { usual: 30.0, final_exam: 30.0 },
            ObjectiveScore { usual: 10.0, final_exam: 10.0 },
        ]);
        let result = compute(&student, &WeightConfig::default()).unwrap().unwrap();
        assert!(close(result.per_objective[0], (15.0 + 28.0) / 50.0));
        assert!(close(result.per_objective[1], 1.0));
        assert!(close(result.per_objective[2], 0.5));
        assert!(close(result.aggregate, 0.5 * 0.86 + 0.3 + 0.1));
    }

    #[test]
    fn test_degrees_are_clamped() {
        let result = compute(&record(Some(120.0), Some(110.0)), &WeightConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(result.per_objective, [1.0; 3]);
        assert_eq!(result.aggregate, 1.0);

        let result = compute(&record(Some(-5.0), Some(-1.0)), &WeightConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(result.aggregate, 0.0);
    }

    #[test]
    fn test_excluded_students() {
        let config = WeightConfig::default();
        assert_eq!(compute(&record(None, Some(90.0)), &config), Ok(None));

        let mut absent = record(Some(80.0), Some(90.0));
        absent.status = Status::Absent;
        assert_eq!(compute(&absent, &config), Ok(None));
    }

    #[test]
    fn test_zero_weight_objective_as_divisor() {
        let config = WeightConfig {
            objective_weights: [0.6, 0.4, 0.0],
            apportion: Apportion::RoundedPoints,
            ..WeightConfig::default()
        };
        assert_eq!(
            compute(&record(Some(80.0), Some(90.0)), &config),
            Err(ComputationError::NonPositiveFullMark {
                student_id: "2021001".to_string(),
                objective: 2,
                full_mark: 0.0,
            })
        );

        let uniform = WeightConfig {
            apportion: Apportion::Uniform,
            ..config
        };
        assert!(compute(&record(Some(80.0), Some(90.0)), &uniform).unwrap().is_some());
    }
}
