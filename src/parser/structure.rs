//! Header-row discovery and column mapping for loosely-structured grade sheets.
//!
//! Grade sheets exported by different registrars share no schema: the header
//! row can sit anywhere, column titles vary (`平时`, `平时分`, `平时成绩`), and
//! some exports place two class lists side by side on one sheet. [`infer`]
//! resolves all of that into a [`SheetLayout`].

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::OBJECTIVE_COUNT;
use crate::error::StructureError;
use crate::grid::{Cell, RawGrid, Sheet};

/// Canonical column meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StudentId,
    StudentName,
    UsualScore,
    FinalScore,
    TotalScore,
    ClassName,
    /// Per-objective sub-score column (`目标1平时`, `目标2期末`, ...).
    ObjectiveScore {
        objective: usize,
        component: Component,
    },
}

impl Field {
    /// Fields every header row must resolve.
    pub const REQUIRED: [Field; 5] = [
        Field::StudentId,
        Field::StudentName,
        Field::UsualScore,
        Field::FinalScore,
        Field::TotalScore,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::StudentId => f.write_str("student_id"),
            Field::StudentName => f.write_str("student_name"),
            Field::UsualScore => f.write_str("usual_score"),
            Field::FinalScore => f.write_str("final_score"),
            Field::TotalScore => f.write_str("total_score"),
            Field::ClassName => f.write_str("class_name"),
            Field::ObjectiveScore {
                objective,
                component,
            } => write!(f, "objective_{}_{}", objective + 1, component),
        }
    }
}

/// Score component: continuous assessment or final exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Usual,
    Final,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Usual => f.write_str("usual"),
            Component::Final => f.write_str("final"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Alias {
    Contains(&'static str),
    Exact(&'static str),
}

impl Alias {
    fn matches(self, normalized: &str) -> bool {
        match self {
            Alias::Contains(token) => normalized.contains(token),
            Alias::Exact(token) => normalized == token,
        }
    }
}

/// Accepted header aliases, checked in this order. `TotalScore` precedes the
/// component scores so that `总评(平时30%+期末70%)` lands on the total.
static SYNONYMS: &[(Field, &[Alias])] = &[
    (
        Field::StudentId,
        &[Alias::Contains("学号"), Alias::Contains("studentid"), Alias::Exact("id")],
    ),
    (
        Field::StudentName,
        &[Alias::Contains("姓名"), Alias::Contains("studentname"), Alias::Exact("name")],
    ),
    (
        Field::TotalScore,
        &[
            Alias::Contains("总成绩"),
            Alias::Contains("总评"),
            Alias::Contains("总分"),
            Alias::Exact("成绩"),
            Alias::Contains("total"),
        ],
    ),
    (
        Field::UsualScore,
        &[Alias::Contains("平时"), Alias::Contains("usual"), Alias::Contains("regular")],
    ),
    (
        Field::FinalScore,
        &[Alias::Contains("期末"), Alias::Contains("final"), Alias::Contains("exam")],
    ),
    (
        Field::ClassName,
        &[Alias::Exact("班级"), Alias::Exact("行政班"), Alias::Exact("class")],
    ),
];

static OBJECTIVE_MARKERS: [&[&str]; OBJECTIVE_COUNT] = [
    &["目标1", "目标一", "objective1"],
    &["目标2", "目标二", "objective2"],
    &["目标3", "目标三", "objective3"],
];

static CLASS_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:行政班|班级)[：:\s]\s*([^\s(（]+)").expect("class marker pattern is valid")
});

/// Sheet-name suffixes containing these are report titles, not class names.
const NON_CLASS_KEYWORDS: &[&str] = &["达成度", "成绩", "总评", "期末", "平时", "报告", "统计"];

/// Lowercases and strips whitespace, underscores and hyphens so that
/// `"Student_ID"`, `"student id"` and `"总评\n成绩"` compare by content.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps a header label to the field it names, if any. A label names at most
/// one field; objective sub-score columns win over the plain score fields.
pub fn match_field(label: &str) -> Option<Field> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }
    if OBJECTIVE_MARKERS
        .iter()
        .any(|markers| markers.iter().any(|m| normalized.contains(m)))
    {
        return match_objective(&normalized);
    }
    SYNONYMS
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|a| a.matches(&normalized)))
        .map(|(field, _)| *field)
}

fn match_objective(normalized: &str) -> Option<Field> {
    let objective = OBJECTIVE_MARKERS
        .iter()
        .position(|markers| markers.iter().any(|m| normalized.contains(m)))?;
    let component = [
        (Field::UsualScore, Component::Usual),
        (Field::FinalScore, Component::Final),
    ]
    .into_iter()
    .find(|(field, _)| {
        SYNONYMS
            .iter()
            .filter(|(f, _)| f == field)
            .flat_map(|(_, aliases)| aliases.iter())
            .any(|a| a.matches(normalized))
    })
    .map(|(_, component)| component)?;
    Some(Field::ObjectiveScore {
        objective,
        component,
    })
}

/// Column indices of one objective's sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectiveColumns {
    pub usual: usize,
    pub final_exam: usize,
}

/// Canonical field → column index for one group of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub student_id: usize,
    pub student_name: usize,
    pub usual_score: usize,
    pub final_score: usize,
    pub total_score: usize,
    pub class_name: Option<usize>,
    /// Present only when all six sub-score columns resolve.
    pub objectives: Option<[ObjectiveColumns; OBJECTIVE_COUNT]>,
    /// Columns owned by this group; status scanning stays inside it. The
    /// rightmost group's span is open-ended so that unlabelled remark
    /// columns past the header belong to it.
    pub span: Range<usize>,
}

impl ColumnMap {
    /// This group's columns within a row of `width` cells.
    pub fn columns_in(&self, width: usize) -> Range<usize> {
        self.span.start.min(width)..self.span.end.min(width)
    }
}

/// Everything [`infer`] learns about a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub header_row: usize,
    /// One map per side-by-side student list, left to right.
    pub groups: Vec<ColumnMap>,
    pub class_label: String,
    /// Candidate student rows: header+1 through the last row with an id.
    pub rows: Range<usize>,
}

/// Infers header row, column groups, class label and student-row range.
///
/// # Errors
///
/// Returns [`StructureError`] when no header row exists or when a required
/// field resolves to zero or several columns within a group.
pub fn infer(sheet: &Sheet) -> Result<SheetLayout, StructureError> {
    let grid = &sheet.grid;
    let class_label = find_class_label(grid)
        .or_else(|| class_from_sheet_name(&sheet.name))
        .unwrap_or_default();

    let mut partial: Option<(usize, Field)> = None;

    for (index, row) in grid.rows().iter().enumerate() {
        let fields: Vec<Option<Field>> = row.iter().map(header_field).collect();
        if !fields.contains(&Some(Field::StudentId)) {
            continue;
        }
        let missing = Field::REQUIRED
            .iter()
            .find(|field| !fields.contains(&Some(**field)));
        match missing {
            None => {
                let groups = resolve_groups(&sheet.name, index, &fields)?;
                let rows = student_rows(grid, index, &groups);
                debug!(
                    sheet = %sheet.name,
                    header_row = index,
                    groups = groups.len(),
                    rows = rows.len(),
                    class_label = %class_label,
                    "Sheet structure inferred"
                );
                return Ok(SheetLayout {
                    header_row: index,
                    groups,
                    class_label,
                    rows,
                });
            }
            Some(field) if partial.is_none() => partial = Some((index, *field)),
            Some(_) => {}
        }
    }

    Err(match partial {
        Some((row, field)) => StructureError::MissingColumn {
            sheet: sheet.name.clone(),
            row,
            field,
        },
        None => StructureError::HeaderNotFound {
            sheet: sheet.name.clone(),
        },
    })
}

fn header_field(cell: &Cell) -> Option<Field> {
    match cell {
        Cell::Text(label) => match_field(label),
        _ => None,
    }
}

/// First free-text cell (row-major) carrying a `行政班：`/`班级：` marker.
pub fn find_class_label(grid: &RawGrid) -> Option<String> {
    grid.rows().iter().flatten().find_map(|cell| match cell {
        Cell::Text(text) => CLASS_MARKER
            .captures(text)
            .map(|caps| caps[1].trim().to_string()),
        _ => None,
    })
}

/// Class name embedded in a sheet name such as `9007851-0001_音乐2212`: the
/// text after the last `_`, at least two characters, not starting with a digit.
pub fn class_from_sheet_name(name: &str) -> Option<String> {
    let (_, suffix) = name.rsplit_once('_')?;
    let suffix = suffix.trim();
    let first = suffix.chars().next()?;
    if suffix.chars().count() < 2
        || first.is_ascii_digit()
        || NON_CLASS_KEYWORDS.iter().any(|kw| suffix.contains(kw))
    {
        return None;
    }
    Some(suffix.to_string())
}

/// Splits the header row into side-by-side groups, one per student id
/// column. When the first list has its class column before the id column,
/// class columns mark group boundaries; otherwise a group ends right after
/// its last labelled column, so a leading `序号` goes to the next list. The
/// last group extends past the header to the end of every row.
fn resolve_groups(
    sheet: &str,
    row: usize,
    fields: &[Option<Field>],
) -> Result<Vec<ColumnMap>, StructureError> {
    let columns_of = |wanted: Field| -> Vec<usize> {
        fields
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == Some(wanted))
            .map(|(i, _)| i)
            .collect()
    };
    let id_columns = columns_of(Field::StudentId);
    let class_columns = columns_of(Field::ClassName);
    let class_leads = matches!(
        (class_columns.first(), id_columns.first()),
        (Some(class), Some(id)) if class < id
    );

    let boundary = |prev: usize, next: usize| -> usize {
        let between = prev + 1..next;
        if class_leads {
            class_columns
                .iter()
                .copied()
                .filter(|c| between.contains(c))
                .last()
                .unwrap_or(next)
        } else {
            between
                .rev()
                .find(|&c| fields[c].is_some())
                .map_or(prev + 1, |c| c + 1)
        }
    };

    let mut groups = Vec::with_capacity(id_columns.len());
    for (k, &id_column) in id_columns.iter().enumerate() {
        let start = match k {
            0 => 0,
            _ => boundary(id_columns[k - 1], id_column),
        };
        let end = id_columns
            .get(k + 1)
            .map(|&next| boundary(id_column, next))
            .unwrap_or(usize::MAX);
        groups.push(resolve_group(sheet, row, fields, start..end)?);
    }
    Ok(groups)
}

fn resolve_group(
    sheet: &str,
    row: usize,
    fields: &[Option<Field>],
    span: Range<usize>,
) -> Result<ColumnMap, StructureError> {
    let labelled = span.start..span.end.min(fields.len());
    let matches = |wanted: Field| -> Vec<usize> {
        labelled
            .clone()
            .filter(|&i| fields[i] == Some(wanted))
            .collect()
    };
    let ambiguous = |field: Field, columns: Vec<usize>| StructureError::AmbiguousColumn {
        sheet: sheet.to_string(),
        row,
        field,
        columns,
    };
    let required = |field: Field| -> Result<usize, StructureError> {
        let columns = matches(field);
        match columns.as_slice() {
            [only] => Ok(*only),
            [] => Err(StructureError::MissingColumn {
                sheet: sheet.to_string(),
                row,
                field,
            }),
            _ => Err(ambiguous(field, columns)),
        }
    };
    let optional = |field: Field| -> Result<Option<usize>, StructureError> {
        let columns = matches(field);
        match columns.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => Err(ambiguous(field, columns)),
        }
    };

    let mut objectives = [ObjectiveColumns {
        usual: 0,
        final_exam: 0,
    }; OBJECTIVE_COUNT];
    let mut complete = true;
    for (objective, slot) in objectives.iter_mut().enumerate() {
        let usual = optional(Field::ObjectiveScore {
            objective,
            component: Component::Usual,
        })?;
        let final_exam = optional(Field::ObjectiveScore {
            objective,
            component: Component::Final,
        })?;
        match (usual, final_exam) {
            (Some(usual), Some(final_exam)) => *slot = ObjectiveColumns { usual, final_exam },
            _ => complete = false,
        }
    }

    let student_id = required(Field::StudentId)?;
    let student_name = required(Field::StudentName)?;
    let usual_score = required(Field::UsualScore)?;
    let final_score = required(Field::FinalScore)?;
    let total_score = required(Field::TotalScore)?;
    let class_name = optional(Field::ClassName)?;

    Ok(ColumnMap {
        student_id,
        student_name,
        usual_score,
        final_score,
        total_score,
        class_name,
        objectives: complete.then_some(objectives),
        span: span.clone(),
    })
}

fn student_rows(grid: &RawGrid, header_row: usize, groups: &[ColumnMap]) -> Range<usize> {
    let first = header_row + 1;
    let last = (first..grid.len())
        .rev()
        .find(|&r| groups.iter().any(|g| !grid.cell(r, g.student_id).is_blank()));
    match last {
        Some(last) => first..last + 1,
        None => first..first,
    }
}
