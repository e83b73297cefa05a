//! Loading workbooks from disk.
//!
//! A `.csv` file is a single sheet named after the file stem. A `.json` file
//! holds a whole [`Workbook`]:
//!
//! ```json
//! {"name": "课程", "sheets": [{"name": "音乐2212", "rows": [["学号", "姓名", 87, null]]}]}
//! ```

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use tracing::debug;

use crate::grid::{Cell, RawGrid, Sheet, Workbook};

const EXTENSIONS: &[&str] = &["csv", "json"];

/// File stem used as workbook and sheet name.
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reads CSV text into a grid. No header handling; rows may be ragged.
pub fn read_csv_grid<R: Read>(reader: R) -> Result<RawGrid> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::parse).collect());
    }
    Ok(RawGrid::new(rows))
}

/// Loads a `.csv` or `.json` workbook.
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    let name = stem(path);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let mut workbook = match ext.as_deref() {
        Some("csv") => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let grid = read_csv_grid(file).with_context(|| format!("reading {}", path.display()))?;
            Workbook {
                name: name.clone(),
                sheets: vec![Sheet::new(name.clone(), grid)],
            }
        }
        Some("json") => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("opening {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        _ => bail!("unsupported input {}: expected .csv or .json", path.display()),
    };

    if workbook.name.is_empty() {
        workbook.name = name;
    }
    debug!(path = %path.display(), sheets = workbook.sheets.len(), "Workbook loaded");
    Ok(workbook)
}

fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.starts_with("~$") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expands directories into their `.csv`/`.json` files (sorted, not
/// recursive). Explicit file arguments are kept as given.
pub fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            for entry in fs::read_dir(input).with_context(|| format!("listing {}", input.display()))? {
                let path = entry?.path();
                if path.is_file() && is_candidate(&path) {
                    entries.push(path);
                }
            }
            entries.sort();
            found.extend(entries);
        } else {
            found.push(input.clone());
        }
    }
    Ok(found)
}
