//! Conversion of one raw student row into a typed [`StudentRecord`].

use serde::{Deserialize, Serialize};

use crate::config::OBJECTIVE_COUNT;
use crate::grid::{Cell, cell_at};
use crate::parser::structure::ColumnMap;

/// Outcome recorded for a student instead of (or alongside) scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Normal,
    Absent,
    Deferred,
    Misconduct,
    OtherSpecial,
}

impl Status {
    pub fn is_normal(self) -> bool {
        self == Status::Normal
    }
}

/// Status vocabulary. Tokens are checked in this order against every cell of
/// the row; the first token found anywhere decides the status.
static STATUS_TOKENS: &[(&str, Status)] = &[
    ("作弊", Status::Misconduct),
    ("违纪", Status::Misconduct),
    ("cheat", Status::Misconduct),
    ("misconduct", Status::Misconduct),
    ("缺考", Status::Absent),
    ("旷考", Status::Absent),
    ("absent", Status::Absent),
    ("缓考", Status::Deferred),
    ("deferred", Status::Deferred),
    ("取消", Status::OtherSpecial),
    ("免修", Status::OtherSpecial),
    ("exempt", Status::OtherSpecial),
    ("cancel", Status::OtherSpecial),
];

/// One objective's sub-scores as read from the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveScore {
    pub usual: f64,
    #[serde(rename = "final")]
    pub final_exam: f64,
}

/// A student row after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub sheet: String,
    /// 0-based row index in the source grid.
    pub row: usize,
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub usual_score: Option<f64>,
    pub final_score: Option<f64>,
    pub total_score: Option<f64>,
    pub objective_scores: Option<[ObjectiveScore; OBJECTIVE_COUNT]>,
    pub status: Status,
    /// Cell text that triggered a special status, e.g. `"缺考"`.
    pub status_note: Option<String>,
}

impl StudentRecord {
    /// Whether the record takes part in achievement computation.
    pub fn is_scorable(&self) -> bool {
        self.status.is_normal() && self.usual_score.is_some() && self.final_score.is_some()
    }
}

/// Where a row came from; used to label the record.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub sheet: &'a str,
    pub row: usize,
    /// Sheet-wide class label, used when the group has no class column.
    pub class_label: &'a str,
}

/// Normalizes one row under the given column map. Pure.
///
/// Blank or non-numeric score cells become `None`. A special status clears
/// every score.
pub fn normalize(row: &[Cell], map: &ColumnMap, ctx: &RowContext<'_>) -> StudentRecord {
    let cell = |col: usize| cell_at(row, col);
    let (status, status_note) = detect_status(row, map);

    let class_name = map
        .class_name
        .map(|col| cell(col).to_text())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| ctx.class_label.to_string());

    let score = |col: usize| {
        if status.is_normal() {
            cell(col).as_number()
        } else {
            None
        }
    };

    let objective_scores = map.objectives.and_then(|columns| {
        let mut scores = [ObjectiveScore {
            usual: 0.0,
            final_exam: 0.0,
        }; OBJECTIVE_COUNT];
        for (slot, cols) in scores.iter_mut().zip(columns) {
            *slot = ObjectiveScore {
                usual: score(cols.usual)?,
                final_exam: score(cols.final_exam)?,
            };
        }
        Some(scores)
    });

    StudentRecord {
        sheet: ctx.sheet.to_string(),
        row: ctx.row,
        id: cell(map.student_id).to_text(),
        name: cell(map.student_name).to_text(),
        class_name,
        usual_score: score(map.usual_score),
        final_score: score(map.final_score),
        total_score: score(map.total_score),
        objective_scores,
        status,
        status_note,
    }
}

fn detect_status(row: &[Cell], map: &ColumnMap) -> (Status, Option<String>) {
    let texts: Vec<String> = map
        .columns_in(row.len())
        .filter_map(|col| match cell_at(row, col) {
            Cell::Text(text) => Some(text.trim().to_string()),
            _ => None,
        })
        .collect();
    let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();

    for (token, status) in STATUS_TOKENS {
        if let Some(i) = lowered.iter().position(|t| t.contains(token)) {
            return (*status, Some(texts[i].clone()));
        }
    }
    (Status::Normal, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::structure::ObjectiveColumns;

    fn map() -> ColumnMap {
        ColumnMap {
            student_id: 0,
            student_name: 1,
            usual_score: 2,
            final_score: 3,
            total_score: 4,
            class_name: None,
            objectives: None,
            span: 0..usize::MAX,
        }
    }

    fn ctx() -> RowContext<'static> {
        RowContext {
            sheet: "s",
            row: 3,
            class_label: "音乐2212",
        }
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    #[test]
    fn test_normal_row() {
        let record = normalize(&row(&["2021001", "张三", "80", "90", "87"]), &map(), &ctx());
        assert_eq!(record.id, "2021001");
        assert_eq!(record.name, "张三");
        assert_eq!(record.class_name, "音乐2212");
        assert_eq!(record.usual_score, Some(80.0));
        assert_eq!(record.final_score, Some(90.0));
        assert_eq!(record.total_score, Some(87.0));
        assert_eq!(record.status, Status::Normal);
        assert_eq!(record.row, 3);
        assert!(record.is_scorable());
    }

    #[test]
    fn test_absent_anywhere_in_row() {
        let record = normalize(
            &row(&["2021002", "李四", "70", "", "", "缺考"]),
            &map(),
            &ctx(),
        );
        assert_eq!(record.status, Status::Absent);
        assert_eq!(record.status_note.as_deref(), Some("缺考"));
        assert_eq!(record.usual_score, None);
        assert!(!record.is_scorable());
    }

    #[test]
    fn test_first_token_in_list_order_wins() {
        // "作弊" precedes "缺考" in the vocabulary even though it appears later in the row.
        let record = normalize(
            &row(&["2021003", "王五", "缺考", "作弊", ""]),
            &map(),
            &ctx(),
        );
        assert_eq!(record.status, Status::Misconduct);
        assert_eq!(record.status_note.as_deref(), Some("作弊"));
    }

    #[test]
    fn test_status_is_case_insensitive() {
        let record = normalize(&row(&["2021004", "Ann", "ABSENT", "", ""]), &map(), &ctx());
        assert_eq!(record.status, Status::Absent);
        assert_eq!(record.status_note.as_deref(), Some("ABSENT"));
    }

    #[test]
    fn test_status_in_unlabelled_trailing_column() {
        // Header is five wide; the remark sits in a sixth, unlabelled column.
        let record = normalize(
            &row(&["2021002", "李四", "70", "20", "35", "缺考"]),
            &map(),
            &ctx(),
        );
        assert_eq!(record.status, Status::Absent);
        assert_eq!(record.total_score, None);
        assert!(!record.is_scorable());
    }

    #[test]
    fn test_status_scan_stays_inside_span() {
        let mut m = map();
        m.span = 0..5;
        let record = normalize(
            &row(&["2021005", "赵六", "80", "90", "87", "缺考"]),
            &m,
            &ctx(),
        );
        assert_eq!(record.status, Status::Normal);
    }

    #[test]
    fn test_non_numeric_score_is_null() {
        let record = normalize(&row(&["2021006", "钱七", "良好", "", "87"]), &map(), &ctx());
        assert_eq!(record.status, Status::Normal);
        assert_eq!(record.usual_score, None);
        assert_eq!(record.final_score, None);
        assert_eq!(record.total_score, Some(87.0));
        assert!(!record.is_scorable());
    }

    #[test]
    fn test_class_column_overrides_label() {
        let mut m = map();
        m.class_name = Some(5);
        let record = normalize(
            &row(&["2021007", "孙八", "80", "90", "87", "计算机2301"]),
            &m,
            &ctx(),
        );
        assert_eq!(record.class_name, "计算机2301");

        let blank = normalize(&row(&["2021007", "孙八", "80", "90", "87", ""]), &m, &ctx());
        assert_eq!(blank.class_name, "音乐2212");
    }

    #[test]
    fn test_objective_sub_scores() {
        let mut m = map();
        m.span = 0..11;
        m.objectives = Some([
            ObjectiveColumns { usual: 5, final_exam: 6 },
            ObjectiveColumns { usual: 7, final_exam: 8 },
            ObjectiveColumns { usual: 9, final_exam: 10 },
        ]);
        let cells = row(&[
            "2021008", "周九", "80", "90", "87", "40", "45", "24", "27", "16", "18",
        ]);
        let record = normalize(&cells, &m, &ctx());
        let scores = record.objective_scores.unwrap();
        assert_eq!(scores[0], ObjectiveScore { usual: 40.0, final_exam: 45.0 });
        assert_eq!(scores[2], ObjectiveScore { usual: 16.0, final_exam: 18.0 });

        let mut gap = cells.clone();
        gap[8] = Cell::Empty;
        assert_eq!(normalize(&gap, &m, &ctx()).objective_scores, None);
    }
}
