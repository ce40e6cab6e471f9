//! The row source: everything that talks to the spreadsheet backend.
//!
//! Reading a sheet is a two step affair. A `Connector` opens the document (authenticating and
//! listing its sheets), and the resulting `Document` must `load` a sheet before any of its cells
//! can be read. The cells are only reachable through the `LoadedSheet` handle that `load` returns,
//! so there is no way to read a sheet that has not been loaded.

mod google;
mod memory;
mod service_account;

use crate::model::{CellRange, CellRef};
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use google::GoogleConnector;
pub use memory::{MemoryConnector, MemorySheet};

/// Read-only access is all we need.
const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets.readonly"];

/// When this environment variable is set and non-empty, the app runs against seeded in-memory
/// data instead of Google Sheets.
pub const TEST_MODE_ENV: &str = "LUNCH_LEDGER_IN_TEST_MODE";

/// Whether we are reading from Google Sheets or from in-memory test data.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// Metadata for one sheet (tab) of the document.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    /// Position of the sheet in the document, starting at 0.
    pub index: usize,
    /// The sheet's internal id, the `gid` in its URL.
    pub sheet_id: i64,
    pub title: String,
}

/// What part of a sheet to load.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Load {
    /// Every populated row.
    All,
    /// A block of cells, as displayed.
    Range(CellRange),
    /// A block of cells with numbers as they are stored rather than as displayed, so that a total
    /// shown as `150.000 ₫` comes back as `150000`. Dates are still formatted.
    Values(CellRange),
}

/// A sheet whose cells have been loaded. Cell addresses are absolute regardless of how much of the
/// sheet was loaded.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LoadedSheet {
    info: SheetInfo,
    origin: CellRef,
    grid: Vec<Vec<String>>,
}

impl LoadedSheet {
    /// `origin` is the absolute address of `grid[0][0]`.
    pub fn new(info: SheetInfo, origin: CellRef, grid: Vec<Vec<String>>) -> Self {
        Self { info, origin, grid }
    }

    pub fn info(&self) -> &SheetInfo {
        &self.info
    }

    /// The loaded rows, top to bottom. Rows may be ragged: the backend leaves out trailing empty
    /// cells.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.grid
    }

    /// The first row of the sheet, or an empty slice if row 1 was not loaded.
    pub fn header(&self) -> &[String] {
        if self.origin.row() != 0 {
            return &[];
        }
        self.grid
            .first()
            .map(|row| row.as_slice())
            .unwrap_or_default()
    }

    /// The value of a single cell, `None` if it is empty or outside of what was loaded.
    pub fn cell(&self, cell: CellRef) -> Option<&str> {
        let row = cell.row().checked_sub(self.origin.row())?;
        let col = cell.col().checked_sub(self.origin.col())?;
        self.grid
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Opens the document. Each fetch cycle opens its own `Document`; nothing is shared or cached
/// between cycles.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Document + Send>>;
}

/// An opened document. Sheets must be loaded one at a time.
#[async_trait::async_trait]
pub trait Document {
    /// The sheets of the document, ordered by index.
    fn sheets(&self) -> &[SheetInfo];

    /// Loads the cells of `sheet`.
    async fn load(&mut self, sheet: &SheetInfo, load: Load) -> Result<LoadedSheet>;
}

/// Builds the connector for `mode`.
pub fn connector(config: &Config, mode: Mode) -> Result<Arc<dyn Connector>> {
    Ok(match mode {
        Mode::Google => Arc::new(GoogleConnector::new(config)?),
        Mode::Test => Arc::new(MemoryConnector::default()),
    })
}

/// Quotes a sheet title for use in an A1 range, e.g. `'04/03/2024'!A:ZZ`.
fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SheetInfo {
        SheetInfo {
            index: 3,
            sheet_id: 42,
            title: "04/03/2024".to_string(),
        }
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_cell_lookup_with_offset_origin() {
        // F1:H23 loaded, only the corners populated.
        let mut rows = vec![Vec::new(); 23];
        rows[0] = vec!["".to_string(), "".to_string(), "04/03/2024".to_string()];
        rows[22] = vec!["150,000".to_string()];
        let sheet = LoadedSheet::new(info(), CellRef::new(0, 5), rows);

        assert_eq!(sheet.cell("H1".parse().unwrap()), Some("04/03/2024"));
        assert_eq!(sheet.cell("F23".parse().unwrap()), Some("150,000"));
        assert_eq!(sheet.cell("G1".parse().unwrap()), None);
        assert_eq!(sheet.cell("A1".parse().unwrap()), None);
        assert_eq!(sheet.cell("F24".parse().unwrap()), None);
    }

    #[test]
    fn test_header() {
        let sheet = LoadedSheet::new(info(), CellRef::new(0, 0), grid(&[&["STT", "Tên"], &["1"]]));
        assert_eq!(sheet.header().to_vec(), vec!["STT", "Tên"]);

        let offset = LoadedSheet::new(info(), CellRef::new(1, 0), grid(&[&["1"]]));
        assert!(offset.header().is_empty());

        let empty = LoadedSheet::new(info(), CellRef::new(0, 0), Vec::new());
        assert!(empty.header().is_empty());
    }

    #[test]
    fn test_quote_title() {
        assert_eq!(quote_title("04/03/2024"), "'04/03/2024'");
        assert_eq!(quote_title("Bob's lunch"), "'Bob''s lunch'");
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Test.to_string(), "test");
        assert_eq!("google".parse::<Mode>().unwrap(), Mode::Google);
    }
}
