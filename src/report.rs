//! Assembly of the final report model from computed results.
//!
//! The model mirrors the two worksheets of the exported report: a calculation
//! sheet with one row per student and a line series per objective, and a
//! statistics sheet with the distribution tables and bar series. Building it
//! does no arithmetic beyond ordering and lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzers::analyzer::SkippedRow;
use crate::analyzers::types::{AchievementRecord, Distribution, DistributionSet, Target};
use crate::analyzers::utility::apportion_points;
use crate::config::{OBJECTIVE_COUNT, StudentOrder, WeightConfig};
use crate::parser::{Status, StudentRecord};

pub const CALC_SHEET: &str = "课程目标达成度计算";
pub const STAT_SHEET: &str = "达成度统计";

/// A normalized student together with its achievement, if computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub record: StudentRecord,
    pub achievement: Option<AchievementRecord>,
}

pub struct ReportInput {
    pub title: String,
    pub config: WeightConfig,
    /// Students in source order.
    pub students: Vec<StudentResult>,
    pub distribution: Distribution,
    pub skipped_rows: Vec<SkippedRow>,
}

/// Why a student has no achievement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exclusion {
    SpecialStatus {
        status: Status,
        note: Option<String>,
    },
    IncompleteScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRow {
    /// 1-based position in the table.
    pub seq: usize,
    pub record: StudentRecord,
    /// Total score split across objectives by weight, rounded to whole points.
    pub objective_points: Option<[f64; OBJECTIVE_COUNT]>,
    pub achievement: Option<AchievementRecord>,
    pub exclusion: Option<Exclusion>,
}

/// Degrees of every student for one target, aligned with the student table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSeries {
    pub target: Target,
    pub title: String,
    /// `None` where the student was excluded; never interpolated.
    pub values: Vec<Option<f64>>,
    pub average: Option<f64>,
    pub expectation: f64,
    pub x_labels: Vec<usize>,
}

/// Band percentages of one objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub target: Target,
    pub title: String,
    pub categories: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationSheet {
    pub name: String,
    pub student_table: Vec<StudentRow>,
    pub line_series: Vec<LineSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSheet {
    pub name: String,
    pub distribution_table: Vec<DistributionSet>,
    pub bar_series: Vec<BarSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub title: String,
    pub config: WeightConfig,
    pub calculation: CalculationSheet,
    pub statistics: StatisticsSheet,
    /// Students per class, excluded students included.
    pub class_counts: BTreeMap<String, usize>,
    pub skipped_rows: Vec<SkippedRow>,
}

fn series_title(target: Target) -> String {
    match target {
        Target::Overall => target.label().to_string(),
        _ => format!("课程{}达成度", target.label()),
    }
}

fn exclusion(result: &StudentResult) -> Option<Exclusion> {
    if result.achievement.is_some() {
        return None;
    }
    let record = &result.record;
    Some(if record.status.is_normal() {
        Exclusion::IncompleteScores
    } else {
        Exclusion::SpecialStatus {
            status: record.status,
            note: record.status_note.clone(),
        }
    })
}

/// Assembles the report. Pure; no I/O.
pub fn build(input: ReportInput) -> ReportModel {
    let ReportInput {
        title,
        config,
        mut students,
        distribution,
        skipped_rows,
    } = input;

    if config.order == StudentOrder::ClassThenId {
        students.sort_by(|a, b| {
            (&a.record.class_name, &a.record.id).cmp(&(&b.record.class_name, &b.record.id))
        });
    }

    let mut class_counts = BTreeMap::new();
    for student in &students {
        *class_counts
            .entry(student.record.class_name.clone())
            .or_insert(0) += 1;
    }

    let student_table: Vec<StudentRow> = students
        .into_iter()
        .enumerate()
        .map(|(i, result)| StudentRow {
            seq: i + 1,
            objective_points: result
                .record
                .total_score
                .map(|total| config.objective_weights.map(|w| apportion_points(total, w))),
            exclusion: exclusion(&result),
            achievement: result.achievement,
            record: result.record,
        })
        .collect();

    let x_labels: Vec<usize> = student_table.iter().map(|row| row.seq).collect();
    let line_series = Target::ALL
        .into_iter()
        .map(|target| LineSeries {
            target,
            title: series_title(target),
            values: student_table
                .iter()
                .map(|row| row.achievement.as_ref().map(|a| a.degree(target)))
                .collect(),
            average: distribution
                .set(target)
                .and_then(|set| set.summary)
                .map(|s| s.mean),
            expectation: config.expectation_threshold,
            x_labels: x_labels.clone(),
        })
        .collect();

    let bar_series = Target::OBJECTIVES
        .into_iter()
        .filter_map(|target| distribution.set(target))
        .map(|set| BarSeries {
            target: set.target,
            title: format!("{}达成情况分布", set.target.label()),
            categories: set.bands.iter().map(|b| b.label.clone()).collect(),
            values: set.bands.iter().map(|b| b.percentage).collect(),
        })
        .collect();

    ReportModel {
        title,
        config,
        calculation: CalculationSheet {
            name: CALC_SHEET.to_string(),
            student_table,
            line_series,
        },
        statistics: StatisticsSheet {
            name: STAT_SHEET.to_string(),
            distribution_table: distribution.sets,
            bar_series,
        },
        class_counts,
        skipped_rows,
    }
}
