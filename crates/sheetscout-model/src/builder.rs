use std::collections::BTreeMap;

use sheetscout_common::{CellRange, CellValue};

use crate::model::{
    CellModel, FileMetadata, FormatVariant, NamedRange, SheetModel, SheetVisibility,
    WorkbookModel,
};

/// Builds a [`SheetModel`] cell by cell. Writing the same coordinate twice
/// keeps the last write; cells come out in row-major order.
#[derive(Debug, Clone)]
pub struct SheetBuilder {
    sheet: SheetModel,
    cells: BTreeMap<(u32, u32), CellModel>,
}

impl SheetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            sheet: SheetModel::new(name),
            cells: BTreeMap::new(),
        }
    }

    pub fn visibility(mut self, visibility: SheetVisibility) -> Self {
        self.sheet.visibility = visibility;
        self
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.sheet.is_protected = protected;
        self
    }

    pub fn dimensions(mut self, rows: u32, cols: u32) -> Self {
        self.sheet.dimensions = Some((rows, cols));
        self
    }

    pub fn value(mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Self {
        self.cells
            .insert((row, col), CellModel::new(row, col, value));
        self
    }

    pub fn formula(mut self, row: u32, col: u32, formula: impl Into<String>) -> Self {
        self.cells
            .entry((row, col))
            .or_insert_with(|| CellModel::new(row, col, CellValue::Empty))
            .formula = Some(formula.into());
        self
    }

    /// Write `labels` left to right from column 1 and mark them as headers.
    pub fn header_row(mut self, row: u32, labels: &[&str]) -> Self {
        for (i, label) in labels.iter().enumerate() {
            let col = i as u32 + 1;
            let mut cell = CellModel::new(row, col, *label);
            cell.style.is_header = Some(true);
            self.cells.insert((row, col), cell);
        }
        self
    }

    /// Fill `values` row by row starting at `(row, 1)`.
    pub fn rows<V, R>(mut self, row: u32, values: impl IntoIterator<Item = R>) -> Self
    where
        V: Into<CellValue>,
        R: IntoIterator<Item = V>,
    {
        for (r, line) in values.into_iter().enumerate() {
            for (c, v) in line.into_iter().enumerate() {
                let (rr, cc) = (row + r as u32, c as u32 + 1);
                self.cells.insert((rr, cc), CellModel::new(rr, cc, v));
            }
        }
        self
    }

    pub fn merge(mut self, range: CellRange) -> Self {
        self.sheet.merged_ranges.push(range);
        self
    }

    pub fn named_range(mut self, name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        let scope = Some(self.sheet.name.clone());
        self.sheet.named_ranges.push(NamedRange {
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
        });
        self
    }

    pub fn build(mut self) -> SheetModel {
        self.sheet.cells = self.cells.into_values().collect();
        self.sheet
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookBuilder {
    model: WorkbookModel,
}

impl WorkbookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, sheet: SheetModel) -> Self {
        self.model.sheets.push(sheet);
        self
    }

    pub fn macros(mut self, present: bool) -> Self {
        self.model.has_macros = present;
        self
    }

    pub fn password_protected(mut self, protected: bool) -> Self {
        self.model.is_password_protected = protected;
        self
    }

    pub fn external_links(mut self, present: bool) -> Self {
        self.model.has_external_links = present;
        self
    }

    pub fn named_range(mut self, name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        self.model.named_ranges.push(NamedRange {
            name: name.into(),
            scope: None,
            refers_to: refers_to.into(),
        });
        self
    }

    pub fn metadata(mut self, file_name: impl Into<String>, size_bytes: u64, format: FormatVariant) -> Self {
        self.model.metadata = FileMetadata {
            file_name: Some(file_name.into()),
            size_bytes,
            format,
        };
        self
    }

    pub fn build(self) -> WorkbookModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_over_existing_value_keeps_value() {
        let sheet = SheetBuilder::new("Calc")
            .value(1, 1, 10)
            .formula(1, 1, "=5+5")
            .formula(2, 1, "=A1*2")
            .build();
        assert_eq!(sheet.cells.len(), 2);
        assert_eq!(sheet.cells[0].value, CellValue::Int(10));
        assert_eq!(sheet.cells[0].formula(), Some("=5+5"));
        assert_eq!(sheet.cells[1].value, CellValue::Empty);
    }

    #[test]
    fn rows_fill_row_major() {
        let sheet = SheetBuilder::new("Data")
            .header_row(1, &["Region", "Q1"])
            .rows(2, [["North", "10"], ["South", "12"]])
            .build();
        assert_eq!(sheet.used_extent(), (3, 2));
        assert_eq!(sheet.cells[0].style.is_header, Some(true));
        assert_eq!(sheet.cells[2].style.is_header, None);
    }
}
