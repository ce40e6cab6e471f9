//! Implements the `Connector` and `Document` traits using in-memory data.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets. Set `LUNCH_LEDGER_IN_TEST_MODE` to use it.

use crate::api::{quote_title, Connector, Document, Load, LoadedSheet, SheetInfo};
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{CellRange, CellRef};
use crate::{Error, Result};
use anyhow::Context;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// One sheet of an in-memory workbook.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemorySheet {
    title: String,
    sheet_id: i64,
    rows: Vec<Vec<String>>,
}

impl MemorySheet {
    pub fn new<S, R>(
        title: impl Into<String>,
        sheet_id: i64,
        rows: impl IntoIterator<Item = R>,
    ) -> Self
    where
        S: Into<String>,
        R: IntoIterator<Item = S>,
    {
        Self {
            title: title.into(),
            sheet_id,
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Creates a sheet from CSV text. Rows may have different lengths.
    pub fn from_csv(title: impl Into<String>, sheet_id: i64, csv_data: &str) -> Res<Self> {
        Ok(Self {
            title: title.into(),
            sheet_id,
            rows: load_csv(csv_data)?,
        })
    }

    /// Sets a single cell, growing the grid as needed.
    pub fn with_cell(mut self, cell: CellRef, value: impl Into<String>) -> Self {
        if self.rows.len() <= cell.row() {
            self.rows.resize(cell.row() + 1, Vec::new());
        }
        let row = &mut self.rows[cell.row()];
        if row.len() <= cell.col() {
            row.resize(cell.col() + 1, String::new());
        }
        row[cell.col()] = value.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Cuts out a block the way the Sheets API returns it: trailing empty cells and trailing empty
    /// rows are left off.
    fn block(&self, range: CellRange) -> Vec<Vec<String>> {
        let (start, end) = (range.start(), range.end());
        let mut block: Vec<Vec<String>> = (start.row()..=end.row())
            .map(|r| {
                let row = self.rows.get(r).map(|r| r.as_slice()).unwrap_or_default();
                let mut cells: Vec<String> = (start.col()..=end.col())
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while block.last().is_some_and(|r| r.is_empty()) {
            block.pop();
        }
        block
    }
}

/// Switches that tests flip to simulate failures, plus a record of what was loaded.
#[derive(Debug, Default)]
struct MemoryState {
    unavailable: bool,
    failing_sheet: Option<String>,
    loads: Vec<String>,
}

/// A `Connector` holding a workbook in memory. By default, it is seeded with a small workbook of
/// lunch orders.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    sheets: Vec<MemorySheet>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    /// Sheets are indexed in the order given.
    pub fn new(sheets: Vec<MemorySheet>) -> Self {
        Self {
            sheets,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// While unavailable, `open` fails as if the backend could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Makes loading the sheet titled `title` fail.
    pub fn fail_loading(&self, title: impl Into<String>) {
        self.lock().failing_sheet = Some(title.into());
    }

    /// The ranges loaded so far, in order, e.g. `'04/03'!A:ZZ`.
    pub fn loads(&self) -> Vec<String> {
        self.lock().loads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryConnector {
    /// Loads seed data from this module.
    fn default() -> Self {
        // The seed data is a compile-time constant and covered by tests.
        Self::new(default_sheets().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn open(&self) -> Result<Box<dyn Document + Send>> {
        if self.lock().unavailable {
            return Err(Error::new(
                ErrorType::Source,
                anyhow::anyhow!("The spreadsheet backend is unreachable"),
            ));
        }
        let infos = self
            .sheets
            .iter()
            .enumerate()
            .map(|(index, s)| SheetInfo {
                index,
                sheet_id: s.sheet_id,
                title: s.title.clone(),
            })
            .collect();
        Ok(Box::new(MemoryDocument {
            infos,
            connector: self.clone(),
        }))
    }
}

struct MemoryDocument {
    infos: Vec<SheetInfo>,
    connector: MemoryConnector,
}

#[async_trait::async_trait]
impl Document for MemoryDocument {
    fn sheets(&self) -> &[SheetInfo] {
        &self.infos
    }

    async fn load(&mut self, sheet: &SheetInfo, load: Load) -> Result<LoadedSheet> {
        let range = match load {
            Load::All => format!("{}!A:ZZ", quote_title(&sheet.title)),
            Load::Range(r) | Load::Values(r) => format!("{}!{r}", quote_title(&sheet.title)),
        };
        trace!("load {range}");

        let mut state = self.connector.lock();
        if state.failing_sheet.as_deref() == Some(sheet.title.as_str()) {
            return Err(anyhow::anyhow!("Simulated failure"))
                .with_context(|| format!("Failed to fetch {range}"))
                .pub_result(ErrorType::Source);
        }
        state.loads.push(range);
        drop(state);

        let data = self
            .connector
            .sheets
            .iter()
            .find(|s| s.sheet_id == sheet.sheet_id)
            .with_context(|| format!("Sheet '{}' not found", sheet.title))
            .pub_result(ErrorType::Source)?;

        Ok(match load {
            Load::All => LoadedSheet::new(sheet.clone(), CellRef::new(0, 0), data.rows.clone()),
            // The cells are held as text, so both renderings are the same.
            Load::Range(r) | Load::Values(r) => {
                LoadedSheet::new(sheet.clone(), r.start(), data.block(r))
            }
        })
    }
}

/// Builds the seed workbook: three sheets of instructions and reference data followed by three
/// order days.
fn default_sheets() -> Res<Vec<MemorySheet>> {
    let total = CellRef::new(22, 5);
    Ok(vec![
        MemorySheet::from_csv("Hướng dẫn", 0, INSTRUCTIONS_DATA)?,
        MemorySheet::from_csv("Thành viên", 1_107_316_411, MEMBERS_DATA)?,
        MemorySheet::from_csv("Thực đơn", 1_512_004_913, MENU_DATA)?,
        MemorySheet::from_csv("04/03", 201_562_877, ORDERS_0403_DATA)?.with_cell(total, "75,000"),
        MemorySheet::from_csv("15/03", 870_340_221, ORDERS_1503_DATA)?.with_cell(total, "95,000"),
        MemorySheet::from_csv("02/04", 1_934_114_030, ORDERS_0204_DATA)?.with_cell(total, "80,000"),
    ])
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false) // Ensure headers are treated as part of the data
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result.context("Unable to parse CSV seed data")?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

const INSTRUCTIONS_DATA: &str = r##"Ghi món vào sheet của ngày đặt. Đánh dấu cột Hủy nếu không lấy món.
"##;

const MEMBERS_DATA: &str = r##"Tên,Nhóm
An,Backend
Bình,Frontend
Chi,QA
Dũng,Backend
"##;

const MENU_DATA: &str = r##"Món,Giá
Phở bò,35000
Bún chả,30000
Cơm tấm,45000
"##;

const ORDERS_0403_DATA: &str = r##"STT,Tên,Giá,SL,Ship,Thành tiền,Hủy,04/03/2024
STT,Tên,Giá,SL,Ship,Thành tiền,Hủy,Tên món
1,An,35000,1,5000,"40,000",FALSE,Phở bò
2,Bình,45000,1,5000,"50,000",TRUE,Cơm tấm
3,Chi,30000,1,5000,"35,000",FALSE,Bún chả
"##;

const ORDERS_1503_DATA: &str = r##"STT,Tên,Giá,SL,Ship,Thành tiền,Hủy,15/03/2024
STT,Tên,Giá,SL,Ship,Thành tiền,Hủy,Tên món
1,An,35000,1,5000,"40,000",FALSE,Bún bò
2,Dũng,50000,1,5000,"55,000",FALSE,Lẩu
3,,,,,,,
"##;

const ORDERS_0204_DATA: &str = r##"STT,Tên,Giá,SL,Ship,Thành tiền,Hủy,02/04/2024
STT,Tên,Giá,SL,Ship,Thành tiền,Hủy,Tên món
1,Bình,40000,1,5000,"45,000",FALSE,Cơm gà
2,Chi,30000,1,5000,"35,000",FALSE,Bún chả
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_data_parses() {
        let sheets = default_sheets().unwrap();
        let titles: Vec<&str> = sheets.iter().map(|s| s.title()).collect();
        assert_eq!(
            titles,
            ["Hướng dẫn", "Thành viên", "Thực đơn", "04/03", "15/03", "02/04"]
        );
        // Header, echo, three orders, then padding down to the totals row.
        assert_eq!(sheets[3].rows.len(), 23);
        assert_eq!(sheets[3].rows[2][7], "Phở bò");
        assert_eq!(sheets[3].rows[22][5], "75,000");
    }

    #[test]
    fn test_with_cell_grows_grid() {
        let sheet = MemorySheet::new("x", 1, [["a"]]).with_cell(CellRef::new(2, 3), "z");
        assert_eq!(sheet.rows.len(), 3);
        assert!(sheet.rows[1].is_empty());
        assert_eq!(sheet.rows[2], ["", "", "", "z"]);
    }

    #[test]
    fn test_block_trims_like_the_api() {
        let sheet = MemorySheet::new("x", 1, [vec!["a", "b", "c", ""], vec!["d"], vec![]]);
        let block = sheet.block("B1:D3".parse().unwrap());
        assert_eq!(block, vec![vec!["b".to_string(), "c".to_string()]]);
    }

    #[tokio::test]
    async fn test_open_and_load() {
        let connector = MemoryConnector::default();
        let mut doc = connector.open().await.unwrap();
        assert_eq!(doc.sheets().len(), 6);

        let info = doc.sheets()[3].clone();
        let all = doc.load(&info, Load::All).await.unwrap();
        assert_eq!(all.header()[7], "04/03/2024");

        let block = doc
            .load(&info, Load::Range("F1:H23".parse().unwrap()))
            .await
            .unwrap();
        assert_eq!(block.cell("H1".parse().unwrap()), Some("04/03/2024"));
        assert_eq!(block.cell("F23".parse().unwrap()), Some("75,000"));

        assert_eq!(connector.loads(), ["'04/03'!A:ZZ", "'04/03'!F1:H23"]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let connector = MemoryConnector::default();
        connector.set_unavailable(true);
        let err = connector.open().await.err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Source);

        connector.set_unavailable(false);
        assert!(connector.open().await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_loading() {
        let connector = MemoryConnector::default();
        connector.fail_loading("15/03");
        let mut doc = connector.open().await.unwrap();
        let info = doc.sheets()[4].clone();
        let err = doc.load(&info, Load::All).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Source);
        assert!(err.to_string().contains("'15/03'!A:ZZ"));
        assert!(connector.loads().is_empty());
    }
}
