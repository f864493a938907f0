use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, SheetType, SheetVisible, Sheets, open_workbook_auto};
use sheetscout_common::{CellCoord, CellValue, DateSystem};

use super::package::{PackageScan, SheetPart};
use crate::error::ModelError;
use crate::model::{
    CellModel, CellStyle, FileMetadata, FormatVariant, NamedRange, SheetModel, SheetVisibility,
    WorkbookModel,
};
use crate::reader::WorkbookReader;

/// Reads xlsx/xlsm/xlsb/xls/ods through calamine. For zip packages the
/// workbook and sheet parts are also scanned for macros, external links,
/// protection and merged cells.
pub struct CalamineReader {
    workbook: Sheets<BufReader<File>>,
    path: PathBuf,
    metadata: FileMetadata,
}

impl CalamineReader {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let size_bytes = std::fs::metadata(path)
            .map_err(|e| ModelError::io(path, e))?
            .len();
        let format = FormatVariant::from_extension(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default(),
        );
        let workbook = open_workbook_auto(path)?;
        Ok(Self {
            workbook,
            path: path.to_path_buf(),
            metadata: FileMetadata {
                file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
                size_bytes,
                format,
            },
        })
    }

    fn scan_package(&self) -> Result<PackageScan, ModelError> {
        if !self.metadata.format.is_ooxml() {
            return Ok(PackageScan::default());
        }
        let file = File::open(&self.path).map_err(|e| ModelError::io(&self.path, e))?;
        PackageScan::read(BufReader::new(file))
    }

    fn convert_value(data: &Data, date_system: DateSystem) -> CellValue {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Int(*i),
            Data::Bool(b) => CellValue::Boolean(*b),
            Data::Error(e) => CellValue::Error(e.to_string()),
            Data::DateTime(dt) => CellValue::from_serial_number_in(dt.as_f64(), date_system),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        }
    }

    fn collect_cells(
        values: &Range<Data>,
        formulas: Option<&Range<String>>,
        date_system: DateSystem,
    ) -> BTreeMap<(u32, u32), CellModel> {
        let mut cells = BTreeMap::new();

        let (row0, col0) = values.start().unwrap_or_default();
        for (row, col, data) in values.used_cells() {
            if matches!(data, Data::String(s) if s.is_empty()) {
                continue;
            }
            let coord = CellCoord::new(row0 + row as u32 + 1, col0 + col as u32 + 1);
            cells.insert(
                (coord.row, coord.col),
                CellModel {
                    coord,
                    value: Self::convert_value(data, date_system),
                    formula: None,
                    style: CellStyle::default(),
                },
            );
        }

        if let Some(formulas) = formulas {
            let (row0, col0) = formulas.start().unwrap_or_default();
            for (row, col, text) in formulas.used_cells() {
                if text.is_empty() {
                    continue;
                }
                let coord = CellCoord::new(row0 + row as u32 + 1, col0 + col as u32 + 1);
                let text = if text.starts_with('=') {
                    text.clone()
                } else {
                    format!("={text}")
                };
                cells
                    .entry((coord.row, coord.col))
                    .or_insert_with(|| CellModel {
                        coord,
                        value: CellValue::Empty,
                        formula: None,
                        style: CellStyle::default(),
                    })
                    .formula = Some(text);
            }
        }

        cells
    }

    fn read_sheet(
        &mut self,
        name: &str,
        visible: SheetVisible,
        part: Option<&SheetPart>,
        date_system: DateSystem,
    ) -> Result<SheetModel, ModelError> {
        let values = self.workbook.worksheet_range(name)?;
        // Formula extraction is unsupported for some containers; values still count.
        let formulas = self.workbook.worksheet_formula(name).ok();
        let cells = Self::collect_cells(&values, formulas.as_ref(), date_system);

        let dimensions = part
            .and_then(|p| p.dimension)
            .map(|d| (d.normalized().end_row, d.normalized().end_col))
            .or_else(|| values.end().map(|(r, c)| (r + 1, c + 1)));

        Ok(SheetModel {
            name: name.to_string(),
            visibility: match visible {
                SheetVisible::Visible => SheetVisibility::Visible,
                SheetVisible::Hidden => SheetVisibility::Hidden,
                SheetVisible::VeryHidden => SheetVisibility::VeryHidden,
            },
            dimensions,
            is_protected: part.is_some_and(|p| p.is_protected),
            cells: cells.into_values().collect(),
            merged_ranges: part.map(|p| p.merged_ranges.clone()).unwrap_or_default(),
            named_ranges: Vec::new(),
        })
    }
}

impl WorkbookReader for CalamineReader {
    fn format(&self) -> FormatVariant {
        self.metadata.format
    }

    fn read_workbook(&mut self) -> Result<WorkbookModel, ModelError> {
        let scan = self.scan_package()?;
        let metas: Vec<(String, SheetVisible)> = self
            .workbook
            .sheets_metadata()
            .iter()
            .filter(|s| matches!(s.typ, SheetType::WorkSheet))
            .map(|s| (s.name.clone(), s.visible))
            .collect();

        let mut sheets = Vec::with_capacity(metas.len());
        for (name, visible) in metas {
            #[cfg(feature = "tracing")]
            tracing::debug!(sheet = %name, "reading sheet");
            let sheet =
                self.read_sheet(&name, visible, scan.sheets.get(&name), scan.date_system)?;
            sheets.push(sheet);
        }

        let mut named_ranges = Vec::new();
        for (name, refers_to) in self.workbook.defined_names() {
            let refers_to = refers_to.trim_start_matches('=').to_string();
            // `_xlnm.` names are print areas and filters Excel manages itself.
            if name.starts_with("_xlnm.") {
                continue;
            }
            named_ranges.push(NamedRange {
                name: name.clone(),
                scope: None,
                refers_to,
            });
        }

        Ok(WorkbookModel {
            sheets,
            has_macros: scan.has_macros,
            is_password_protected: scan.workbook_protected,
            has_external_links: scan.has_external_links,
            named_ranges,
            metadata: self.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};

    #[test]
    fn date_cells_follow_the_workbook_date_system() {
        let dt = Data::DateTime(ExcelDateTime::new(1.5, ExcelDateTimeType::DateTime, true));
        assert_eq!(
            CalamineReader::convert_value(&dt, DateSystem::V1904),
            CellValue::from_serial_number(1463.5)
        );
        assert_ne!(
            CalamineReader::convert_value(&dt, DateSystem::V1900),
            CalamineReader::convert_value(&dt, DateSystem::V1904)
        );
    }
}
