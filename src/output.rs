//! Output formatting and persistence for achievement reports.
//!
//! Supports log summaries, a JSON report (optionally gzip-compressed), and
//! flat CSV tables of students and distributions.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::Target;
use crate::parser::Status;
use crate::report::ReportModel;

/// Suffix of the JSON report file name.
pub const REPORT_SUFFIX: &str = "_达成度报告";

/// A report as written to disk.
#[derive(Debug, Serialize)]
pub struct ReportEnvelope<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    /// Sheets that failed, as display strings.
    pub warnings: Vec<String>,
    pub report: &'a ReportModel,
}

/// Logs the report using Rust's debug pretty-print format.
pub fn print_pretty(report: &ReportModel) {
    debug!("{:#?}", report);
}

/// Logs one line per distribution set.
pub fn log_summary(report: &ReportModel) {
    for set in &report.statistics.distribution_table {
        let meets = set.expectation.first().map(|b| b.percentage).unwrap_or(0.0);
        info!(
            report = %report.title,
            target = set.target.label(),
            classified = set.classified,
            mean = set.summary.map(|s| s.mean),
            meets_expectation_pct = meets,
            "Achievement summary"
        );
    }
}

/// Output files for one workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub report: PathBuf,
    pub students: PathBuf,
    pub distribution: PathBuf,
}

impl ReportPaths {
    /// Paths under `dir` named after `stem`. Unless `overwrite` is set,
    /// existing files are left alone and a `_1`, `_2`, ... suffix is used.
    pub fn new(dir: &Path, stem: &str, gzip: bool, overwrite: bool) -> Self {
        let ext = if gzip { "json.gz" } else { "json" };
        let pick = |name: String| {
            let path = dir.join(name);
            if overwrite { path } else { unique_path(&path) }
        };
        Self {
            report: pick(format!("{stem}{REPORT_SUFFIX}.{ext}")),
            students: pick(format!("{stem}_students.csv")),
            distribution: pick(format!("{stem}_distribution.csv")),
        }
    }
}

/// `path` if free, else the first free `name_N.ext` for N = 1, 2, ...
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Split at the first dot so `x.json.gz` becomes `x_1.json.gz`.
    let (base, ext) = match file_name.split_once('.') {
        Some((base, ext)) => (base.to_string(), format!(".{ext}")),
        None => (file_name.clone(), String::new()),
    };
    (1..)
        .map(|n| path.with_file_name(format!("{base}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Writes the envelope as pretty JSON, gzip-compressed when `gzip` is set.
pub fn write_report_json(path: &Path, envelope: &ReportEnvelope<'_>, gzip: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(envelope)?;
    let file =
        File::create(path).with_context(|| format!("creating report {}", path.display()))?;

    if gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(json.as_bytes())?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
    }

    debug!(path = %path.display(), bytes = json.len(), gzip, "Report written");
    Ok(())
}

#[derive(Serialize)]
struct StudentCsvRow<'a> {
    #[serde(rename = "序号")]
    seq: usize,
    #[serde(rename = "学号")]
    id: &'a str,
    #[serde(rename = "姓名")]
    name: &'a str,
    #[serde(rename = "班级")]
    class_name: &'a str,
    #[serde(rename = "平时成绩")]
    usual: Option<f64>,
    #[serde(rename = "期末成绩")]
    final_exam: Option<f64>,
    #[serde(rename = "总评成绩")]
    total: Option<f64>,
    #[serde(rename = "目标1")]
    objective1: Option<f64>,
    #[serde(rename = "目标2")]
    objective2: Option<f64>,
    #[serde(rename = "目标3")]
    objective3: Option<f64>,
    #[serde(rename = "总达成度")]
    overall: Option<f64>,
    #[serde(rename = "备注")]
    note: String,
}

fn status_note(status: Status, note: Option<&str>) -> String {
    match (status, note) {
        (Status::Normal, _) => String::new(),
        (_, Some(note)) => note.to_string(),
        (status, None) => format!("{status:?}"),
    }
}

/// Writes the student table, one row per student, degrees rounded to four
/// decimals.
pub fn write_student_csv(path: &Path, report: &ReportModel) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let round4 = |v: f64| (v * 10_000.0).round() / 10_000.0;
    for row in &report.calculation.student_table {
        let record = &row.record;
        let degree = |target: Target| row.achievement.as_ref().map(|a| round4(a.degree(target)));
        let note = match (&row.achievement, record.status) {
            (None, Status::Normal) => "成绩为空".to_string(),
            _ => status_note(record.status, record.status_note.as_deref()),
        };
        writer.serialize(StudentCsvRow {
            seq: row.seq,
            id: &record.id,
            name: &record.name,
            class_name: &record.class_name,
            usual: record.usual_score,
            final_exam: record.final_score,
            total: record.total_score,
            objective1: degree(Target::Objective1),
            objective2: degree(Target::Objective2),
            objective3: degree(Target::Objective3),
            overall: degree(Target::Overall),
            note,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct DistributionCsvRow<'a> {
    target: &'a str,
    kind: &'a str,
    label: &'a str,
    count: usize,
    percentage: f64,
}

/// Writes every expectation and band bucket as one CSV row.
pub fn write_distribution_csv(path: &Path, report: &ReportModel) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    for set in &report.statistics.distribution_table {
        let kinds = [("expectation", &set.expectation), ("band", &set.bands)];
        for (kind, buckets) in kinds {
            for bucket in buckets {
                writer.serialize(DistributionCsvRow {
                    target: set.target.label(),
                    kind,
                    label: &bucket.label,
                    count: bucket.count,
                    percentage: (bucket.percentage * 100.0).round() / 100.0,
                })?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::analyzer::analyze_workbook;
    use crate::config::WeightConfig;
    use crate::grid::{Cell, RawGrid, Sheet, Workbook};
    use flate2::read::GzDecoder;
    use std::env;
    use std::fs;
    use std::io::Read;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn report() -> ReportModel {
        let rows = [
            vec!["学号", "姓名", "平时", "期末", "总评"],
            vec!["2021001", "张三", "80", "90", "87"],
            vec!["2021002", "李四", "缺考", "", ""],
        ]
        .iter()
        .map(|r| r.iter().map(|c| Cell::from(*c)).collect())
        .collect();
        let workbook = Workbook {
            name: "课程".to_string(),
            sheets: vec![Sheet::new("s", RawGrid::new(rows))],
        };
        analyze_workbook(&workbook, &WeightConfig::default())
            .unwrap()
            .report
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        let report = report();
        print_pretty(&report);
        log_summary(&report);
    }

    #[test]
    fn test_unique_path_appends_counter() {
        let path = temp_path("achievement_rater_test_unique.json.gz");
        let first = path.with_file_name("achievement_rater_test_unique_1.json.gz");
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(&first);

        assert_eq!(unique_path(&path), path);
        fs::write(&path, b"x").unwrap();
        assert_eq!(unique_path(&path), first);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_report_json_gzip() {
        let path = temp_path("achievement_rater_test_report.json.gz");
        let _ = fs::remove_file(&path);

        let report = report();
        let envelope = ReportEnvelope {
            generated_at: Utc::now(),
            source: "课程.csv".to_string(),
            warnings: vec![],
            report: &report,
        };
        write_report_json(&path, &envelope, true).unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["report"]["title"], "课程");
        assert_eq!(
            value["report"]["calculation"]["name"],
            "课程目标达成度计算"
        );

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_student_csv() {
        let path = temp_path("achievement_rater_test_students.csv");
        let _ = fs::remove_file(&path);

        write_student_csv(&path, &report()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("序号,学号,姓名"));
        assert!(lines[1].contains("0.87"));
        assert!(lines[2].ends_with("缺考"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_distribution_csv() {
        let path = temp_path("achievement_rater_test_distribution.csv");
        let _ = fs::remove_file(&path);

        write_distribution_csv(&path, &report()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // 1 header + 4 targets × (2 expectation + 5 band) rows
        assert_eq!(content.lines().count(), 1 + 4 * 7);

        fs::remove_file(&path).unwrap();
    }
}
