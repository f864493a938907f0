//! Bounded view of the workbook that every analyzer reads from.

use sheetscout_common::ValueKind;
use sheetscout_model::{CellModel, SheetModel, WorkbookModel};

use crate::findings::{Finding, FindingKind};
use crate::policy::AnalysisLimits;

#[derive(Debug)]
pub(crate) struct SheetScan<'a> {
    pub sheet: &'a SheetModel,
    /// Prefix of the sheet's cells that fit within the cell budget.
    pub cells: &'a [CellModel],
    pub populated: usize,
    /// `(max_row, max_col)` over populated scanned cells.
    pub extent: (u32, u32),
}

impl<'a> SheetScan<'a> {
    fn new(sheet: &'a SheetModel, cells: &'a [CellModel]) -> Self {
        let mut populated = 0;
        let mut extent = (0, 0);
        for cell in cells.iter().filter(|c| c.is_populated()) {
            populated += 1;
            extent = (extent.0.max(cell.row()), extent.1.max(cell.col()));
        }
        Self {
            sheet,
            cells,
            populated,
            extent,
        }
    }

    pub fn name(&self) -> &'a str {
        &self.sheet.name
    }

    pub fn formula_cells(&self) -> impl Iterator<Item = &'a CellModel> {
        self.cells.iter().filter(|c| c.formula().is_some())
    }

    /// Header cells: explicit `is_header` hints when the reader supplied
    /// any, otherwise the first populated row when it is mostly text.
    pub fn header_cells(&self) -> Vec<&'a CellModel> {
        let hinted: Vec<&CellModel> = self
            .cells
            .iter()
            .filter(|c| c.style.is_header == Some(true) && c.is_populated())
            .collect();
        if !hinted.is_empty() {
            return hinted;
        }

        let Some(first_row) = self
            .cells
            .iter()
            .filter(|c| c.is_populated() && c.style.is_header != Some(false))
            .map(CellModel::row)
            .min()
        else {
            return Vec::new();
        };
        let mut row: Vec<&CellModel> = self
            .cells
            .iter()
            .filter(|c| c.row() == first_row && c.is_populated())
            .collect();
        row.sort_by_key(|c| c.col());
        let labels = row
            .iter()
            .filter(|c| matches!(c.value.kind(), ValueKind::Text | ValueKind::Date))
            .count();
        if labels * 2 >= row.len() {
            row
        } else {
            Vec::new()
        }
    }

    /// Header texts, trimmed, lower-cased and whitespace-collapsed.
    pub fn header_texts(&self) -> Vec<String> {
        self.header_cells()
            .iter()
            .filter_map(|c| c.value.as_text())
            .map(normalize_label)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

pub(crate) fn normalize_label(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug)]
pub(crate) struct WorkbookScan<'a> {
    pub model: &'a WorkbookModel,
    pub sheets: Vec<SheetScan<'a>>,
}

impl<'a> WorkbookScan<'a> {
    /// Take sheets and cells in workbook order until a limit is reached.
    pub fn new(model: &'a WorkbookModel, limits: &AnalysisLimits, findings: &mut Vec<Finding>) -> Self {
        let total_sheets = model.sheets.len();
        if total_sheets > limits.max_sheets {
            findings.push(Finding::new(
                FindingKind::Truncated,
                format!(
                    "workbook has {total_sheets} sheets; only the first {} were analyzed",
                    limits.max_sheets
                ),
            ));
        }

        let mut budget = limits.max_cells;
        let mut skipped_cells = 0usize;
        let mut sheets = Vec::with_capacity(total_sheets.min(limits.max_sheets));
        for sheet in model.sheets.iter().take(limits.max_sheets) {
            let take = sheet.cells.len().min(budget);
            budget -= take;
            skipped_cells += sheet.cells.len() - take;
            sheets.push(SheetScan::new(sheet, &sheet.cells[..take]));
        }

        if skipped_cells > 0 {
            findings.push(Finding::new(
                FindingKind::Truncated,
                format!(
                    "cell limit of {} reached; {skipped_cells} cells were not analyzed",
                    limits.max_cells
                ),
            ));
        }

        Self { model, sheets }
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn populated_cells(&self) -> usize {
        self.sheets.iter().map(|s| s.populated).sum()
    }
}
