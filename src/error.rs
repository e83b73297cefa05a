//! Typed errors raised by the analysis pipeline.
//!
//! Structure and computation errors are scoped to one sheet; configuration
//! errors are scoped to a whole run.

use thiserror::Error;

use crate::grid::column_name;
use crate::parser::Field;

/// The sheet's table structure could not be inferred.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureError {
    #[error("sheet '{sheet}': no header row with a student id column")]
    HeaderNotFound { sheet: String },

    #[error("sheet '{sheet}': header row {} has no '{field}' column", .row + 1)]
    MissingColumn {
        sheet: String,
        row: usize,
        field: Field,
    },

    #[error(
        "sheet '{sheet}': header row {} matches '{field}' in several columns ({})",
        .row + 1,
        column_list(.columns)
    )]
    AmbiguousColumn {
        sheet: String,
        row: usize,
        field: Field,
        columns: Vec<usize>,
    },
}

fn column_list(columns: &[usize]) -> String {
    columns
        .iter()
        .map(|&c| column_name(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The weighting configuration is inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("objective {} weight is {value}, expected a fraction in [0, 1]", .index + 1)]
    ObjectiveWeightOutOfRange { index: usize, value: f64 },

    #[error("objective weights {weights:?} sum to {sum}, expected 1")]
    ObjectiveWeightSum { weights: [f64; 3], sum: f64 },

    #[error("{component} score weight is {value}, expected a fraction in [0, 1]")]
    ComponentWeightOutOfRange { component: &'static str, value: f64 },

    #[error("score weights (usual {usual}, final {final_exam}) sum to {sum}, expected 1")]
    ComponentWeightSum {
        usual: f64,
        final_exam: f64,
        sum: f64,
    },

    #[error("expectation threshold is {value}, expected a fraction in [0, 1]")]
    ThresholdOutOfRange { value: f64 },

    #[error("full mark is {value}, expected a positive number")]
    FullMark { value: f64 },

    #[error("no classification bands configured")]
    NoBands,

    #[error("band {} has an empty label", .index + 1)]
    BandLabel { index: usize },

    #[error("band {} ({label}) has lower bound {lower}, expected a fraction in [0, 1]", .index + 1)]
    BandOutOfRange {
        index: usize,
        label: String,
        lower: f64,
    },

    #[error(
        "band {} ({label}) has lower bound {lower}, expected less than the previous band's {previous}",
        .index + 1
    )]
    BandOrder {
        index: usize,
        label: String,
        lower: f64,
        previous: f64,
    },
}

/// An internal invariant broke while computing achievement degrees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("student {student_id}: objective {} full mark is {full_mark}", .objective + 1)]
    NonPositiveFullMark {
        student_id: String,
        objective: usize,
        full_mark: f64,
    },

    #[error("student {student_id}: achievement degree is not a finite number ({value})")]
    NonFiniteDegree { student_id: String, value: f64 },
}

/// Failure of a single sheet. Other sheets of the same workbook are unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SheetError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("sheet '{sheet}', row {}: {source}", .row + 1)]
    Computation {
        sheet: String,
        row: usize,
        source: ComputationError,
    },
}

impl SheetError {
    pub fn sheet(&self) -> &str {
        match self {
            SheetError::Structure(
                StructureError::HeaderNotFound { sheet }
                | StructureError::MissingColumn { sheet, .. }
                | StructureError::AmbiguousColumn { sheet, .. },
            ) => sheet,
            SheetError::Computation { sheet, .. } => sheet,
        }
    }
}

/// Failure of a whole workbook.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("workbook '{workbook}': no student rows found ({} sheet errors)", .errors.len())]
    NoStudents {
        workbook: String,
        errors: Vec<SheetError>,
    },
}
