//! Period totals: the per-sheet finance summary, the sum per period label, and the regrouping by
//! calendar month used by the spending chart.

use crate::api::LoadedSheet;
use crate::model::{Amount, CellRef};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use tracing::debug;

/// The running total of one sheet and the label of the period it belongs to.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    pub date: String,
    pub total_amount: Amount,
}

impl FinanceSummary {
    pub fn new(date: impl Into<String>, total_amount: Amount) -> Self {
        Self {
            date: date.into(),
            total_amount,
        }
    }

    /// Reads the summary cells of a loaded sheet. Returns `None`, rather than an error, when the
    /// label is blank or the total is not a number, so that one untidy sheet does not spoil the
    /// whole sum.
    pub fn from_sheet(
        sheet: &LoadedSheet,
        total_cell: CellRef,
        label_cell: CellRef,
    ) -> Option<Self> {
        let title = &sheet.info().title;
        let Some(label) = sheet.cell(label_cell) else {
            debug!("Sheet '{title}' has no period label in {label_cell}, skipping");
            return None;
        };
        let Some(total) = sheet.cell(total_cell).and_then(Amount::parse_lenient) else {
            debug!("Sheet '{title}' has no numeric total in {total_cell}, skipping");
            return None;
        };
        Some(Self::new(label.trim(), total))
    }
}

/// Totals keyed by period label, in the order each label was first seen. Serializes as a JSON
/// object.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PeriodSums {
    sums: Vec<(String, Amount)>,
}

impl PeriodSums {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the running total for `label`.
    pub fn add(&mut self, label: &str, amount: Amount) {
        match self.sums.iter_mut().find(|(l, _)| l == label) {
            Some((_, sum)) => *sum += amount,
            None => self.sums.push((label.to_string(), amount)),
        }
    }

    pub fn get(&self, label: &str) -> Option<Amount> {
        self.sums
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, amount)| *amount)
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.sums.iter().map(|(l, a)| (l.as_str(), *a))
    }
}

impl<'a> FromIterator<&'a FinanceSummary> for PeriodSums {
    fn from_iter<T: IntoIterator<Item = &'a FinanceSummary>>(iter: T) -> Self {
        let mut sums = PeriodSums::new();
        for summary in iter {
            sums.add(&summary.date, summary.total_amount);
        }
        sums
    }
}

impl Serialize for PeriodSums {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.sums.len()))?;
        for (label, amount) in &self.sums {
            map.serialize_entry(label, amount)?;
        }
        map.end()
    }
}

/// The total for one calendar month.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAggregate {
    /// `MM/YYYY`
    pub month: String,
    pub total_amount: Amount,
}

/// Extracts the `MM/YYYY` part of a `DD/MM/YYYY` date. Only the shape is checked, not whether the
/// day exists, so `29/02/2023` still belongs to `02/2023`. A one-digit day or month is accepted and
/// the month is padded.
pub fn month_key(date: &str) -> Option<String> {
    let mut parts = date.trim().split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    let digits = |s: &str, len: std::ops::RangeInclusive<usize>| {
        len.contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
    };
    let shaped = parts.next().is_none()
        && digits(day, 1..=2)
        && digits(month, 1..=2)
        && digits(year, 4..=4);
    if !shaped {
        return None;
    }
    Some(format!("{month:0>2}/{year}"))
}

/// Groups summaries by calendar month and sums each group.
///
/// The output is ordered by first occurrence of each month in `entries`, not chronologically.
/// Entries whose date does not have the `DD/MM/YYYY` shape are left out; see `month_key`.
pub fn regroup_by_month(entries: &[FinanceSummary]) -> Vec<MonthlyAggregate> {
    let mut months: Vec<MonthlyAggregate> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let Some(month) = month_key(&entry.date) else {
            debug!("'{}' is not a DD/MM/YYYY date, leaving it out", entry.date);
            continue;
        };
        match positions.get(&month) {
            Some(&ix) => months[ix].total_amount += entry.total_amount,
            None => {
                positions.insert(month.clone(), months.len());
                months.push(MonthlyAggregate {
                    month,
                    total_amount: entry.total_amount,
                });
            }
        }
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SheetInfo;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn summary(date: &str, total: &str) -> FinanceSummary {
        FinanceSummary::new(date, amount(total))
    }

    /// An `F1:H23` block with `label` in H1 and `total` in F23.
    fn block(label: &str, total: &str) -> LoadedSheet {
        let mut rows = vec![Vec::new(); 23];
        rows[0] = vec![String::new(), String::new(), label.to_string()];
        rows[22] = vec![total.to_string()];
        let info = SheetInfo {
            index: 1,
            sheet_id: 9,
            title: "Tháng 3".to_string(),
        };
        LoadedSheet::new(info, CellRef::new(0, 5), rows)
    }

    fn cells() -> (CellRef, CellRef) {
        ("F23".parse().unwrap(), "H1".parse().unwrap())
    }

    #[test]
    fn test_from_sheet() {
        let (total, label) = cells();
        let s = FinanceSummary::from_sheet(&block("03/2024", "150,000 đ"), total, label).unwrap();
        assert_eq!(s, summary("03/2024", "150000"));
    }

    #[test]
    fn test_from_sheet_malformed_cells_are_skipped() {
        let (total, label) = cells();
        assert!(FinanceSummary::from_sheet(&block("03/2024", ""), total, label).is_none());
        assert!(FinanceSummary::from_sheet(&block("03/2024", "tổng"), total, label).is_none());
        assert!(FinanceSummary::from_sheet(&block("", "150,000"), total, label).is_none());
    }

    #[test]
    fn test_period_sums_accumulate_shared_labels() {
        let sums: PeriodSums = [summary("03/2024", "100000"), summary("03/2024", "50000")]
            .iter()
            .collect();
        assert_eq!(sums.len(), 1);
        assert_eq!(
            serde_json::to_value(&sums).unwrap(),
            serde_json::json!({ "03/2024": 150000 })
        );
    }

    #[test]
    fn test_period_sums_keep_first_seen_order() {
        let mut sums = PeriodSums::new();
        sums.add("04/2024", amount("1"));
        sums.add("03/2024", amount("2"));
        sums.add("04/2024", amount("3"));
        let labels: Vec<&str> = sums.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, ["04/2024", "03/2024"]);
        assert_eq!(sums.get("04/2024"), Some(amount("4")));
        assert_eq!(sums.get("05/2024"), None);
        assert_eq!(
            serde_json::to_string(&sums).unwrap(),
            r#"{"04/2024":4,"03/2024":2}"#
        );
    }

    #[test]
    fn test_month_key() {
        assert_eq!(month_key("04/03/2024").as_deref(), Some("03/2024"));
        assert_eq!(month_key(" 31/12/2023 ").as_deref(), Some("12/2023"));
        assert_eq!(month_key("03/2024"), None);
        assert_eq!(month_key("2024-03-04"), None);
        assert_eq!(month_key(""), None);
        assert_eq!(month_key("04/03/2024/1"), None);
        assert_eq!(month_key("aa/03/2024"), None);
    }

    #[test]
    fn test_month_key_takes_the_month_without_validating_the_day() {
        assert_eq!(month_key("29/02/2023").as_deref(), Some("02/2023"));
        assert_eq!(month_key("31/04/2024").as_deref(), Some("04/2024"));
        assert_eq!(month_key("4/3/2024").as_deref(), Some("03/2024"));

        let months = regroup_by_month(&[summary("29/02/2023", "10"), summary("01/02/2023", "5")]);
        assert_eq!(
            months,
            vec![MonthlyAggregate {
                month: "02/2023".to_string(),
                total_amount: amount("15"),
            }]
        );
    }

    #[test]
    fn test_regroup_by_month() {
        let entries = [
            summary("04/03/2024", "100000"),
            summary("02/04/2024", "20000"),
            summary("15/03/2024", "50000"),
            summary("not a date", "999"),
        ];
        let months = regroup_by_month(&entries);
        assert_eq!(
            months,
            vec![
                MonthlyAggregate {
                    month: "03/2024".to_string(),
                    total_amount: amount("150000"),
                },
                MonthlyAggregate {
                    month: "04/2024".to_string(),
                    total_amount: amount("20000"),
                },
            ]
        );
    }

    #[test]
    fn test_regroup_order_is_first_occurrence_not_chronological() {
        let entries = [summary("01/05/2024", "1"), summary("01/01/2024", "2")];
        let months: Vec<String> = regroup_by_month(&entries)
            .into_iter()
            .map(|m| m.month)
            .collect();
        assert_eq!(months, ["05/2024", "01/2024"]);
    }

    #[test]
    fn test_regroup_totals_do_not_depend_on_input_order() {
        let mut entries = vec![
            summary("04/03/2024", "100000"),
            summary("02/04/2024", "20000.5"),
            summary("15/03/2024", "50000"),
            summary("30/04/2024", "1"),
        ];
        let total_of = |months: &[MonthlyAggregate], month: &str| {
            months
                .iter()
                .find(|m| m.month == month)
                .map(|m| m.total_amount)
        };

        let forward = regroup_by_month(&entries);
        entries.reverse();
        let backward = regroup_by_month(&entries);

        for month in ["03/2024", "04/2024"] {
            assert_eq!(total_of(&forward, month), total_of(&backward, month));
        }

        // Grouping then summing equals summing everything.
        let grouped: Amount = forward.iter().map(|m| m.total_amount).sum();
        let flat: Amount = entries.iter().map(|e| e.total_amount).sum();
        assert_eq!(grouped, flat);
    }

    #[test]
    fn test_monthly_aggregate_json() {
        let months = regroup_by_month(&[summary("04/03/2024", "150000")]);
        assert_eq!(
            serde_json::to_value(&months).unwrap(),
            serde_json::json!([{ "month": "03/2024", "totalAmount": 150000 }])
        );
    }
}
