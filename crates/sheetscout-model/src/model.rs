use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sheetscout_common::{CellCoord, CellRange, CellValue};

/// Container variant the workbook was read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVariant {
    Xlsx,
    Xlsm,
    Xls,
    Xlsb,
    Ods,
    Json,
    #[default]
    Unknown,
}

impl FormatVariant {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" => FormatVariant::Xlsx,
            "xlsm" => FormatVariant::Xlsm,
            "xls" => FormatVariant::Xls,
            "xlsb" => FormatVariant::Xlsb,
            "ods" => FormatVariant::Ods,
            "json" => FormatVariant::Json,
            _ => FormatVariant::Unknown,
        }
    }

    /// Zip-based Office Open XML package.
    pub fn is_ooxml(&self) -> bool {
        matches!(
            self,
            FormatVariant::Xlsx | FormatVariant::Xlsm | FormatVariant::Xlsb
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVariant::Xlsx => "xlsx",
            FormatVariant::Xlsm => "xlsm",
            FormatVariant::Xls => "xls",
            FormatVariant::Xlsb => "xlsb",
            FormatVariant::Ods => "ods",
            FormatVariant::Json => "json",
            FormatVariant::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub format: FormatVariant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// Optional layout hints. `None` means the reader had no information and
/// consumers infer the role from content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_total: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellModel {
    pub coord: CellCoord,
    pub value: CellValue,
    pub formula: Option<String>,
    #[serde(default)]
    pub style: CellStyle,
}

impl CellModel {
    pub fn new(row: u32, col: u32, value: impl Into<CellValue>) -> Self {
        Self {
            coord: CellCoord::new(row, col),
            value: value.into(),
            formula: None,
            style: CellStyle::default(),
        }
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn row(&self) -> u32 {
        self.coord.row
    }

    pub fn col(&self) -> u32 {
        self.coord.col
    }

    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref().filter(|f| !f.is_empty())
    }

    /// A cell counts as populated when it carries a formula or a non-blank value.
    pub fn is_populated(&self) -> bool {
        self.formula().is_some() || !self.value.is_blank()
    }
}

/// A defined name. `scope` is the owning sheet for sheet-scoped names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRange {
    pub name: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refers_to: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetModel {
    pub name: String,
    #[serde(default)]
    pub visibility: SheetVisibility,
    /// Declared extent `(rows, cols)`, as recorded by the container.
    #[serde(default)]
    pub dimensions: Option<(u32, u32)>,
    #[serde(default)]
    pub is_protected: bool,
    #[serde(default)]
    pub cells: Vec<CellModel>,
    #[serde(default)]
    pub merged_ranges: Vec<CellRange>,
    #[serde(default)]
    pub named_ranges: Vec<NamedRange>,
}

impl SheetModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility != SheetVisibility::Visible
    }

    pub fn populated_cells(&self) -> impl Iterator<Item = &CellModel> {
        self.cells.iter().filter(|c| c.is_populated())
    }

    pub fn populated_count(&self) -> usize {
        self.populated_cells().count()
    }

    pub fn formula_cells(&self) -> impl Iterator<Item = &CellModel> {
        self.cells.iter().filter(|c| c.formula().is_some())
    }

    /// `(max_row, max_col)` over populated cells; `(0, 0)` for an empty sheet.
    pub fn used_extent(&self) -> (u32, u32) {
        self.populated_cells()
            .fold((0, 0), |(r, c), cell| (r.max(cell.row()), c.max(cell.col())))
    }

    /// Populated cells of the first row that has any, in column order.
    pub fn first_populated_row(&self) -> Vec<&CellModel> {
        let Some(row) = self.populated_cells().map(CellModel::row).min() else {
            return Vec::new();
        };
        let mut cells: Vec<&CellModel> = self
            .populated_cells()
            .filter(|c| c.row() == row)
            .collect();
        cells.sort_by_key(|c| c.col());
        cells
    }
}

/// Read-only view of one workbook, built once per analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookModel {
    #[serde(default)]
    pub sheets: Vec<SheetModel>,
    #[serde(default)]
    pub has_macros: bool,
    #[serde(default)]
    pub is_password_protected: bool,
    #[serde(default)]
    pub has_external_links: bool,
    /// Workbook-scoped names.
    #[serde(default)]
    pub named_ranges: Vec<NamedRange>,
    #[serde(default)]
    pub metadata: FileMetadata,
}

impl WorkbookModel {
    pub fn sheet(&self, name: &str) -> Option<&SheetModel> {
        self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Position of each sheet keyed by upper-cased name; sheet names are
    /// case-insensitive in Excel.
    pub fn sheet_positions(&self) -> FxHashMap<String, usize> {
        self.sheets
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.to_uppercase(), i))
            .collect()
    }

    pub fn formula_count(&self) -> usize {
        self.sheets.iter().map(|s| s.formula_cells().count()).sum()
    }

    pub fn named_range_count(&self) -> usize {
        self.named_ranges.len() + self.sheets.iter().map(|s| s.named_ranges.len()).sum::<usize>()
    }

    /// A VBA project was found, or the file is saved as macro-enabled `.xlsm`.
    pub fn is_macro_enabled(&self) -> bool {
        self.has_macros || self.metadata.format == FormatVariant::Xlsm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_and_header_row_ignore_blank_cells() {
        let mut sheet = SheetModel::new("Data");
        sheet.cells.push(CellModel::new(2, 3, "Amount"));
        sheet.cells.push(CellModel::new(2, 1, "Region"));
        sheet.cells.push(CellModel::new(1, 5, "   "));
        sheet.cells.push(CellModel::new(9, 2, CellValue::Empty).with_formula("=SUM(B3:B8)"));

        assert_eq!(sheet.populated_count(), 3);
        assert_eq!(sheet.used_extent(), (9, 3));
        let header: Vec<u32> = sheet.first_populated_row().iter().map(|c| c.col()).collect();
        assert_eq!(header, vec![1, 3]);
        assert_eq!(sheet.formula_cells().count(), 1);
    }

    #[test]
    fn sheet_lookup_is_case_insensitive() {
        let wb = WorkbookModel {
            sheets: vec![SheetModel::new("Summary"), SheetModel::new("Jan")],
            ..Default::default()
        };
        assert!(wb.sheet("summary").is_some());
        assert_eq!(wb.sheet_positions().get("JAN"), Some(&1));
        assert_eq!(FormatVariant::from_extension("XLSM"), FormatVariant::Xlsm);
        assert!(FormatVariant::Xlsm.is_ooxml());
    }

    #[test]
    fn xlsm_extension_marks_macros() {
        let mut wb = WorkbookModel::default();
        assert!(!wb.is_macro_enabled());
        wb.metadata.format = FormatVariant::Xlsm;
        assert!(wb.is_macro_enabled());
        wb.metadata.format = FormatVariant::Xlsx;
        wb.has_macros = true;
        assert!(wb.is_macro_enabled());
    }
}
