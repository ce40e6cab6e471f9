//! Bill entries and the row normalizer.
//!
//! An order-day sheet looks like this (columns by zero-based offset):
//!
//! | row | 0     | 1    | ... | 5           | 6      | 7          |
//! |-----|-------|------|-----|-------------|--------|------------|
//! | 1   | STT   | Tên  |     | Thành tiền  | Hủy    | 04/03/2024 |
//! | 2   | STT   | Tên  |     | Thành tiền  | Hủy    | Tên món    |
//! | 3.. | 1     | An   |     | 35,000      | FALSE  | Phở bò     |
//!
//! Row 1 is the header and carries the order date in its last cell. Row 2 repeats the column
//! labels and is always dropped. Every row after that is a candidate bill entry.

use crate::api::{LoadedSheet, SheetInfo};
use crate::model::Amount;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub(crate) const INDEX_COL: usize = 0;
pub(crate) const NAME_COL: usize = 1;
pub(crate) const AMOUNT_COL: usize = 5;
pub(crate) const VOIDED_COL: usize = 6;
pub(crate) const DISH_COL: usize = 7;

/// The header cell that holds the order date for the whole sheet.
pub(crate) const DATE_HEADER_COL: usize = 7;

/// A row is voided when its voided column holds exactly this text.
pub(crate) const VOIDED_FLAG: &str = "TRUE";

/// One non-voided line item: what a person owes for a dish on a given day.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillEntry {
    /// The row number as typed into the sheet's first column. Not necessarily contiguous.
    pub index: String,
    pub name: String,
    /// Zero when the amount cell does not hold a number.
    pub total_amount: Amount,
    pub dish_name: Option<String>,
    pub sheet_name: String,
    pub sheet_url: String,
    /// `DD/MM/YYYY`, shared by every entry of the sheet.
    pub date: String,
}

/// A raw row mapped onto the columns we care about. `None` means the cell was not there at all,
/// which happens when the backend trims trailing empty cells or the layout has shifted.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BillRow {
    pub index: Option<String>,
    pub name: Option<String>,
    pub amount: Option<String>,
    pub voided: Option<String>,
    pub dish: Option<String>,
}

impl BillRow {
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Self {
        let get = |ix: usize| cells.get(ix).map(|s| s.as_ref().to_string());
        Self {
            index: get(INDEX_COL),
            name: get(NAME_COL),
            amount: get(AMOUNT_COL),
            voided: get(VOIDED_COL),
            dish: get(DISH_COL),
        }
    }
}

/// Everything about a sheet that is the same for all of its entries.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SheetContext {
    title: String,
    url: String,
    date: String,
}

impl SheetContext {
    /// `document_id` is the spreadsheet id used in links; `header` is the sheet's first row.
    pub fn new<S: AsRef<str>>(info: &SheetInfo, document_id: &str, header: &[S]) -> Self {
        Self {
            title: info.title.clone(),
            url: sheet_url(document_id, info.sheet_id),
            date: header
                .get(DATE_HEADER_COL)
                .map(|s| s.as_ref().trim().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn date(&self) -> &str {
        &self.date
    }
}

/// Why a row did not become a `BillEntry`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Blank rows, totals rows and other layout artifacts have no name.
    MissingName,
    Voided,
}

serde_plain::derive_display_from_serialize!(SkipReason);

/// The outcome of normalizing one row.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Normalized {
    Entry(BillEntry),
    Skip(SkipReason),
}

/// Turns one row into a `BillEntry`, or says why it should be skipped. The name check comes first,
/// then the voided check. Names are trimmed, so a name of only whitespace counts as missing.
pub fn normalize(row: BillRow, context: &SheetContext) -> Normalized {
    let name = match row.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Normalized::Skip(SkipReason::MissingName),
    };

    if row.voided.as_deref() == Some(VOIDED_FLAG) {
        return Normalized::Skip(SkipReason::Voided);
    }

    let total_amount = row
        .amount
        .as_deref()
        .and_then(Amount::parse_lenient)
        .unwrap_or_default();

    let dish_name = row
        .dish
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Normalized::Entry(BillEntry {
        index: row.index.unwrap_or_default(),
        name,
        total_amount,
        dish_name,
        sheet_name: context.title().to_string(),
        sheet_url: context.url().to_string(),
        date: context.date().to_string(),
    })
}

/// Normalizes every row of a fully loaded sheet.
///
/// The first row is the header and the second is the header echo; both are dropped no matter what
/// they contain. The remaining rows go through `normalize`.
pub fn normalize_sheet(sheet: &LoadedSheet, document_id: &str) -> Vec<BillEntry> {
    let context = SheetContext::new(sheet.info(), document_id, sheet.header());
    sheet
        .rows()
        .iter()
        .enumerate()
        .skip(2)
        .filter_map(
            |(ix, cells)| match normalize(BillRow::from_cells(cells), &context) {
                Normalized::Entry(entry) => Some(entry),
                Normalized::Skip(reason) => {
                    trace!("Skipping row {} of '{}': {reason}", ix + 1, context.title());
                    None
                }
            },
        )
        .collect()
}

/// The link to a sheet within a spreadsheet.
pub fn sheet_url(document_id: &str, sheet_id: i64) -> String {
    format!("https://docs.google.com/spreadsheets/d/{document_id}/edit?gid={sheet_id}")
}
