//! Binning table
//!
//! The per-bin statistics a fitted binning reports: counts, event rates, WoE
//! and IV for every final bin plus the special and missing pseudo-bins, with
//! a terminal rendering used by the verbose report.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::binning::config::VariableDtype;
use crate::binning::stats::{woe_iv, ClassTotals};

/// One row of the binning table.
#[derive(Debug, Clone, Serialize)]
pub struct Bin {
    /// Human-readable bin label.
    pub label: String,
    /// Weighted sample count.
    pub count: f64,
    /// Share of the weighted total.
    pub count_fraction: f64,
    /// Weighted non-events.
    pub n_nonevent: f64,
    /// Weighted events.
    pub n_event: f64,
    /// Event rate within the bin.
    pub event_rate: f64,
    /// Weight of Evidence against the fit totals.
    pub woe: f64,
    /// Information-value contribution.
    pub iv: f64,
}

/// Statistics of a fitted binning, including the special and missing
/// pseudo-bins.
#[derive(Debug, Clone, Serialize)]
pub struct BinningTable {
    /// Variable name.
    pub name: String,
    /// Variable kind.
    pub dtype: VariableDtype,
    /// Final bins, in split order.
    pub bins: Vec<Bin>,
    /// Pseudo-bin for special-coded samples.
    pub special: Bin,
    /// Pseudo-bin for missing samples.
    pub missing: Bin,
    /// Total information value, pseudo-bins included.
    pub iv: f64,
    /// Weighted sample total.
    pub n_records: f64,
}

impl BinningTable {
    pub(crate) fn build(
        name: String,
        dtype: VariableDtype,
        labels: Vec<String>,
        cells: &[ClassTotals],
        special: ClassTotals,
        missing: ClassTotals,
    ) -> Self {
        debug_assert_eq!(labels.len(), cells.len());
        let total_event: f64 = cells.iter().map(|c| c.n_event).sum::<f64>()
            + special.n_event
            + missing.n_event;
        let total_nonevent: f64 = cells.iter().map(|c| c.n_nonevent).sum::<f64>()
            + special.n_nonevent
            + missing.n_nonevent;
        let n_records = total_event + total_nonevent;

        let bins: Vec<Bin> = labels
            .into_iter()
            .zip(cells)
            .map(|(label, &cell)| make_bin(label, cell, total_event, total_nonevent, n_records))
            .collect();
        let special = make_bin(
            "Special".to_string(),
            special,
            total_event,
            total_nonevent,
            n_records,
        );
        let missing = make_bin(
            "Missing".to_string(),
            missing,
            total_event,
            total_nonevent,
            n_records,
        );
        let iv = bins.iter().map(|b| b.iv).sum::<f64>() + special.iv + missing.iv;

        BinningTable {
            name,
            dtype,
            bins,
            special,
            missing,
            iv,
            n_records,
        }
    }

    /// Number of final bins, pseudo-bins excluded.
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    /// Event rates of the final bins, in split order.
    pub fn event_rates(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.event_rate).collect()
    }

    /// Render as a terminal table with a totals row.
    pub fn render(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Bin",
                "Count",
                "Count (%)",
                "Non-event",
                "Event",
                "Event rate",
                "WoE",
                "IV",
            ]);
        for bin in self.bins.iter().chain([&self.special, &self.missing]) {
            table.add_row(stat_row(bin));
        }
        table.add_row(vec![
            Cell::new("Totals"),
            right(fmt_count(self.n_records)),
            right("100.00%".to_string()),
            right(fmt_count(
                self.bins.iter().map(|b| b.n_nonevent).sum::<f64>()
                    + self.special.n_nonevent
                    + self.missing.n_nonevent,
            )),
            right(fmt_count(
                self.bins.iter().map(|b| b.n_event).sum::<f64>()
                    + self.special.n_event
                    + self.missing.n_event,
            )),
            right(String::new()),
            right(String::new()),
            right(format!("{:.5}", self.iv)),
        ]);
        table
    }
}

fn make_bin(
    label: String,
    cell: ClassTotals,
    total_event: f64,
    total_nonevent: f64,
    n_records: f64,
) -> Bin {
    let count = cell.count();
    // An empty cell carries no evidence; give it neutral statistics rather
    // than the nonzero WoE smoothing alone would produce.
    let (event_rate, woe, iv) = if count > 0.0 {
        let (woe, iv) = woe_iv(cell.n_event, cell.n_nonevent, total_event, total_nonevent);
        (cell.n_event / count, woe, iv)
    } else {
        (0.0, 0.0, 0.0)
    };
    Bin {
        label,
        count,
        count_fraction: if n_records > 0.0 { count / n_records } else { 0.0 },
        n_nonevent: cell.n_nonevent,
        n_event: cell.n_event,
        event_rate,
        woe,
        iv,
    }
}

/// Interval labels for ascending splits, outer bins unbounded.
pub(crate) fn interval_labels(splits: &[f64]) -> Vec<String> {
    let Some(&first) = splits.first() else {
        return vec!["(-inf, inf)".to_string()];
    };
    let mut labels = Vec::with_capacity(splits.len() + 1);
    labels.push(format!("(-inf, {first:.2})"));
    for window in splits.windows(2) {
        labels.push(format!("[{:.2}, {:.2})", window[0], window[1]));
    }
    let last = splits[splits.len() - 1];
    labels.push(format!("[{last:.2}, inf)"));
    labels
}

/// Group labels for categorical bins.
pub(crate) fn group_labels(groups: &[Vec<String>]) -> Vec<String> {
    groups
        .iter()
        .map(|group| format!("[{}]", group.join(", ")))
        .collect()
}

fn stat_row(bin: &Bin) -> Vec<Cell> {
    vec![
        Cell::new(&bin.label),
        right(fmt_count(bin.count)),
        right(format!("{:.2}%", bin.count_fraction * 100.0)),
        right(fmt_count(bin.n_nonevent)),
        right(fmt_count(bin.n_event)),
        right(format!("{:.5}", bin.event_rate)),
        right(format!("{:.5}", bin.woe)),
        right(format!("{:.5}", bin.iv)),
    ]
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// Counts are integers unless class weights made them fractional.
fn fmt_count(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
