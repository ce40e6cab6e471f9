//! The fetch cycles. Each call opens the document, loads the sheets it needs one at a time, and
//! derives its result from them. A failure loading any sheet fails the whole call.

use crate::api::{Connector, Load};
use crate::commands::Out;
use crate::model::{
    normalize_sheet, regroup_by_month, BillEntry, CellRange, FinanceSummary, MonthlyAggregate,
    PeriodSums,
};
use crate::{Config, Result};
use tracing::{debug, info};

/// Collects the bill entries of every order sheet, in sheet order and row order.
pub async fn common(connector: &dyn Connector, config: &Config) -> Result<Out<Vec<BillEntry>>> {
    let mut doc = connector.open().await?;
    let sheets: Vec<_> = doc
        .sheets()
        .iter()
        .filter(|s| s.index >= config.entry_sheet_offset())
        .cloned()
        .collect();

    let mut entries = Vec::new();
    for info in &sheets {
        let sheet = doc.load(info, Load::All).await?;
        let normalized = normalize_sheet(&sheet, config.link_document_id());
        debug!("Sheet '{}' has {} entries", info.title, normalized.len());
        entries.extend(normalized);
    }

    info!("Fetched {} entries from {} sheets", entries.len(), sheets.len());
    Ok(Out::new(
        format!("Found {} entries in {} sheets", entries.len(), sheets.len()),
        entries,
    ))
}

/// Reads the finance summary of every summary sheet. Sheets without a label or a numeric total are
/// left out.
pub async fn summaries(connector: &dyn Connector, config: &Config) -> Result<Vec<FinanceSummary>> {
    let total_cell = config.summary_total_cell();
    let label_cell = config.summary_label_cell();
    let block = CellRange::new(total_cell, label_cell);

    let mut doc = connector.open().await?;
    let sheets: Vec<_> = doc
        .sheets()
        .iter()
        .filter(|s| s.index >= config.summary_sheet_offset())
        .cloned()
        .collect();

    let mut summaries = Vec::with_capacity(sheets.len());
    for info in &sheets {
        let sheet = doc.load(info, Load::Values(block)).await?;
        if let Some(summary) = FinanceSummary::from_sheet(&sheet, total_cell, label_cell) {
            summaries.push(summary);
        }
    }

    info!(
        "Read {} summaries from {} sheets",
        summaries.len(),
        sheets.len()
    );
    Ok(summaries)
}

/// Sums the summary totals per period label.
pub async fn sum(connector: &dyn Connector, config: &Config) -> Result<Out<PeriodSums>> {
    let summaries = summaries(connector, config).await?;
    let sums: PeriodSums = summaries.iter().collect();
    Ok(Out::new(format!("Summed {} periods", sums.len()), sums))
}

/// Sums the summary totals per calendar month.
pub async fn monthly(
    connector: &dyn Connector,
    config: &Config,
) -> Result<Out<Vec<MonthlyAggregate>>> {
    let summaries = summaries(connector, config).await?;
    let months = regroup_by_month(&summaries);
    Ok(Out::new(format!("Summed {} months", months.len()), months))
}
