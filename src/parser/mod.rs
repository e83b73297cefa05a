//! Grade-sheet interpretation: where the table is, and what each row says.

pub mod row;
pub mod structure;

pub use row::{ObjectiveScore, RowContext, Status, StudentRecord, normalize};
pub use structure::{ColumnMap, Component, Field, SheetLayout, infer};
