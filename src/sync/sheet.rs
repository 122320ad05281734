use crate::error::SyncError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const PLACEHOLDER_NAME: &str = "nan";

/// One data row of a spreadsheet export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based line in the source file (the header is line 1).
    pub line: u64,
    cells: Vec<String>,
}

impl SheetRow {
    pub fn new(line: u64, cells: Vec<String>) -> Self {
        Self { line, cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Trimmed cell text; missing cells read as empty.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.trim()).unwrap_or("")
    }

    pub fn cell_at(&self, index: Option<usize>) -> &str {
        index.map(|i| self.cell(i)).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Indexes of every column whose header starts with `prefix`, in column order.
    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with(prefix))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Trimmed entity name, or `None` for blank and placeholder names.
pub fn entity_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name == PLACEHOLDER_NAME {
        return None;
    }
    Some(name.to_string())
}

pub fn read_sheet<R: Read>(reader: R, source: &str) -> Result<Sheet> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|err| SyncError::InvalidSheet(format!("{source}: {err}")))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|err| SyncError::InvalidSheet(format!("{source}: {err}")))?;
        let line = record
            .position()
            .map(|pos| pos.line())
            .unwrap_or(idx as u64 + 2);
        rows.push(SheetRow::new(
            line,
            record.iter().map(ToOwned::to_owned).collect(),
        ));
    }

    Ok(Sheet { headers, rows })
}

/// Load a sheet export; a missing file is fatal for the run.
pub fn load_sheet(path: &Path) -> Result<Sheet> {
    if !path.is_file() {
        return Err(SyncError::MissingInput(path.display().to_string()).into());
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_sheet(file, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{entity_name, load_sheet, read_sheet};
    use crate::error::SyncError;
    use tempfile::tempdir;

    #[test]
    fn rows_keep_order_and_ragged_widths() {
        let raw = "name,a,b\nGameA,1\nGameB,1,2,3\n";
        let sheet = read_sheet(raw.as_bytes(), "inline").expect("read sheet");
        assert_eq!(sheet.headers, vec!["name", "a", "b"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].cell(0), "GameA");
        assert_eq!(sheet.rows[0].cell(2), "");
        assert_eq!(sheet.rows[1].len(), 4);
        assert_eq!(sheet.rows[1].line, 3);
    }

    #[test]
    fn cells_are_trimmed_and_bom_is_dropped() {
        let raw = "\u{feff}遊戲名稱,介紹\n  原神  , 開放世界 \n";
        let sheet = read_sheet(raw.as_bytes(), "inline").expect("read sheet");
        assert_eq!(sheet.column("遊戲名稱"), Some(0));
        assert_eq!(sheet.rows[0].cell(0), "原神");
        assert_eq!(sheet.rows[0].cell(1), "開放世界");
    }

    #[test]
    fn prefix_columns_follow_header_order() {
        let raw = "兌換方式2,x,兌換方式1\n";
        let sheet = read_sheet(raw.as_bytes(), "inline").expect("read sheet");
        assert_eq!(sheet.columns_with_prefix("兌換方式"), vec![0, 2]);
    }

    #[test]
    fn entity_name_skips_blank_and_placeholder() {
        assert_eq!(entity_name("  GameA "), Some("GameA".to_string()));
        assert_eq!(entity_name("   "), None);
        assert_eq!(entity_name("nan"), None);
    }

    #[test]
    fn missing_sheet_is_reported_as_missing_input() {
        let tmp = tempdir().expect("tempdir");
        let err = load_sheet(&tmp.path().join("absent.csv")).expect_err("missing sheet");
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::MissingInput(_))
        ));
    }
}
