//! Achievement computation and distribution statistics.
//!
//! This module turns normalized student records into per-objective
//! achievement degrees, classifies them against the expectation threshold
//! and the configured bands, and orchestrates whole sheets, workbooks and
//! batches.

pub mod achievement;
pub mod aggregate;
pub mod analyzer;
pub mod grade;
pub mod types;
pub mod utility;
