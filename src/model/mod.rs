//! Types that represent the data model, such as `BillEntry` and `PeriodSums`, along with the
//! functions that derive them from loaded sheets.
mod amount;
mod bill;
mod cell;
mod summary;

pub use amount::{Amount, AmountError};
pub use bill::{
    normalize, normalize_sheet, sheet_url, BillEntry, BillRow, Normalized, SheetContext,
    SkipReason,
};
pub use cell::{CellRange, CellRef};
pub use summary::{month_key, regroup_by_month, FinanceSummary, MonthlyAggregate, PeriodSums};
