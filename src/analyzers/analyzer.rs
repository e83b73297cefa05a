use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzers::achievement::compute;
use crate::analyzers::aggregate::aggregate;
use crate::config::{WeightConfig, validate};
use crate::error::{AnalysisError, ConfigError, SheetError};
use crate::grid::{Sheet, Workbook, cell_at};
use crate::parser::{RowContext, infer, normalize};
use crate::report::{self, ReportInput, ReportModel, StudentResult};

/// Default sheet name of a fresh workbook; ignored when real sheets exist.
const PLACEHOLDER_SHEET: &str = "Sheet1";

/// Why a row inside the student range did not become a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BlankId,
    /// Not shaped like a student id (too short, decimal, mostly non-digits).
    MalformedId,
    /// Id already admitted earlier in the workbook.
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub sheet: String,
    pub row: usize,
    pub student_id: String,
    pub reason: SkipReason,
}

/// Students and skipped rows of one sheet, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetAnalysis {
    pub sheet: String,
    pub students: Vec<StudentResult>,
    pub skipped: Vec<SkippedRow>,
}

/// Report of one workbook plus the sheets that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookAnalysis {
    pub report: ReportModel,
    pub sheet_errors: Vec<SheetError>,
}

/// Student-id shape: at least five characters, no decimal point, and at
/// least 80% ASCII digits.
pub fn looks_like_student_id(id: &str) -> bool {
    let len = id.chars().count();
    if len < 5 || id.contains('.') {
        return false;
    }
    let digits = id.chars().filter(char::is_ascii_digit).count();
    digits * 5 >= len * 4
}

/// Runs structure inference, normalization and computation over one sheet.
///
/// `config` must already be validated.
pub fn analyze_sheet(sheet: &Sheet, config: &WeightConfig) -> Result<SheetAnalysis, SheetError> {
    analyze_sheet_with(sheet, config, &HashSet::new())
}

#[tracing::instrument(skip_all, fields(sheet = %sheet.name))]
fn analyze_sheet_with(
    sheet: &Sheet,
    config: &WeightConfig,
    admitted: &HashSet<String>,
) -> Result<SheetAnalysis, SheetError> {
    let layout = infer(sheet)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut students = Vec::new();
    let mut skipped = Vec::new();

    for map in &layout.groups {
        for row_index in layout.rows.clone() {
            let row = sheet.grid.row(row_index);
            if map.columns_in(row.len()).all(|col| cell_at(row, col).is_blank()) {
                continue;
            }

            let ctx = RowContext {
                sheet: &sheet.name,
                row: row_index,
                class_label: &layout.class_label,
            };
            let record = normalize(row, map, &ctx);

            let reason = if record.id.is_empty() {
                Some(SkipReason::BlankId)
            } else if !looks_like_student_id(&record.id) {
                Some(SkipReason::MalformedId)
            } else if admitted.contains(&record.id) || seen.contains(&record.id) {
                Some(SkipReason::DuplicateId)
            } else {
                None
            };
            if let Some(reason) = reason {
                debug!(row = row_index, id = %record.id, ?reason, "Row skipped");
                skipped.push(SkippedRow {
                    sheet: sheet.name.clone(),
                    row: row_index,
                    student_id: record.id,
                    reason,
                });
                continue;
            }

            let achievement =
                compute(&record, config).map_err(|source| SheetError::Computation {
                    sheet: sheet.name.clone(),
                    row: row_index,
                    source,
                })?;
            seen.insert(record.id.clone());
            students.push(StudentResult {
                record,
                achievement,
            });
        }
    }

    debug!(
        students = students.len(),
        skipped = skipped.len(),
        groups = layout.groups.len(),
        "Sheet analyzed"
    );

    Ok(SheetAnalysis {
        sheet: sheet.name.clone(),
        students,
        skipped,
    })
}

/// Analyzes every sheet of a workbook and merges them into one report.
///
/// A sheet that fails is recorded in [`WorkbookAnalysis::sheet_errors`] and
/// the remaining sheets still contribute. `config` must already be
/// validated.
///
/// # Errors
///
/// [`AnalysisError::NoStudents`] when no sheet yields a single student.
#[tracing::instrument(skip_all, fields(workbook = %workbook.name, sheets = workbook.sheets.len()))]
pub fn analyze_workbook(
    workbook: &Workbook,
    config: &WeightConfig,
) -> Result<WorkbookAnalysis, AnalysisError> {
    let mut admitted: HashSet<String> = HashSet::new();
    let mut students = Vec::new();
    let mut skipped_rows = Vec::new();
    let mut sheet_errors = Vec::new();

    let has_several = workbook.sheets.len() > 1;
    for sheet in &workbook.sheets {
        if has_several && sheet.name == PLACEHOLDER_SHEET {
            debug!(sheet = %sheet.name, "Placeholder sheet ignored");
            continue;
        }
        match analyze_sheet_with(sheet, config, &admitted) {
            Ok(analysis) => {
                admitted.extend(analysis.students.iter().map(|s| s.record.id.clone()));
                students.extend(analysis.students);
                skipped_rows.extend(analysis.skipped);
            }
            Err(e) => {
                warn!(sheet = %e.sheet(), error = %e, "Sheet could not be analyzed");
                sheet_errors.push(e);
            }
        }
    }

    if students.is_empty() {
        return Err(AnalysisError::NoStudents {
            workbook: workbook.name.clone(),
            errors: sheet_errors,
        });
    }

    let achievements: Vec<_> = students
        .iter()
        .filter_map(|s| s.achievement.clone())
        .collect();
    let distribution = aggregate(&achievements, config);

    info!(
        students = students.len(),
        computed = achievements.len(),
        skipped = skipped_rows.len(),
        failed_sheets = sheet_errors.len(),
        "Workbook analyzed"
    );

    let report = report::build(ReportInput {
        title: workbook.name.clone(),
        config: config.clone(),
        students,
        distribution,
        skipped_rows,
    });

    Ok(WorkbookAnalysis {
        report,
        sheet_errors,
    })
}

/// Validates `config` once, then analyzes each workbook independently.
/// One workbook's failure does not affect the others.
///
/// # Errors
///
/// [`ConfigError`] before any workbook is touched.
pub fn analyze_batch(
    workbooks: &[Workbook],
    config: WeightConfig,
) -> Result<Vec<Result<WorkbookAnalysis, AnalysisError>>, ConfigError> {
    let config = validate(config)?;
    Ok(workbooks
        .iter()
        .map(|workbook| analyze_workbook(workbook, &config))
        .collect())
}
