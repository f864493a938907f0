use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use sheetscout_common::{CellCoord, CellRange, CellValue};

use crate::error::ModelError;
use crate::model::{
    CellModel, CellStyle, FileMetadata, FormatVariant, NamedRange, SheetModel, SheetVisibility,
    WorkbookModel,
};
use crate::reader::WorkbookReader;

#[derive(Deserialize, Debug, Default)]
struct JsonWorkbook {
    #[serde(default = "default_version")]
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    has_macros: bool,
    #[serde(default)]
    is_password_protected: bool,
    #[serde(default)]
    has_external_links: bool,
    #[serde(default)]
    named_ranges: Vec<NamedRange>,
    #[serde(default)]
    sheets: Vec<JsonSheet>,
}

fn default_version() -> u32 {
    1
}

#[derive(Deserialize, Debug)]
struct JsonSheet {
    name: String,
    #[serde(default)]
    visibility: SheetVisibility,
    #[serde(default)]
    dimensions: Option<(u32, u32)>,
    #[serde(default)]
    protected: bool,
    /// A1 ranges such as `"A1:C1"`.
    #[serde(default)]
    merged_cells: Vec<String>,
    #[serde(default)]
    named_ranges: Vec<NamedRange>,
    #[serde(default)]
    cells: Vec<JsonCell>,
}

#[derive(Deserialize, Debug)]
struct JsonCell {
    row: u32,
    col: u32,
    #[serde(default)]
    value: CellValue,
    #[serde(default)]
    formula: Option<String>,
    #[serde(default)]
    is_header: Option<bool>,
    #[serde(default)]
    is_total: Option<bool>,
}

/// Reads the JSON interchange format:
///
/// ```json
/// {
///   "has_macros": false,
///   "sheets": [
///     { "name": "Jan", "merged_cells": ["A1:C1"],
///       "cells": [ { "row": 1, "col": 1, "value": { "type": "Text", "value": "Region" } },
///                  { "row": 2, "col": 2, "formula": "=SUM(B3:B9)" } ] }
///   ]
/// }
/// ```
pub struct JsonReader {
    data: JsonWorkbook,
    metadata: FileMetadata,
}

impl JsonReader {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ModelError::io(path, e))?;
        let size_bytes = file.metadata().map_err(|e| ModelError::io(path, e))?.len();
        let mut reader = Self::from_reader(BufReader::new(file))?;
        reader.metadata = FileMetadata {
            file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            size_bytes,
            format: FormatVariant::Json,
        };
        Ok(reader)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ModelError> {
        let data: JsonWorkbook = serde_json::from_reader(reader)?;
        Ok(Self::from_data(data))
    }

    pub fn from_json_str(text: &str) -> Result<Self, ModelError> {
        let data: JsonWorkbook = serde_json::from_str(text)?;
        Ok(Self::from_data(data))
    }

    fn from_data(data: JsonWorkbook) -> Self {
        Self {
            data,
            metadata: FileMetadata {
                format: FormatVariant::Json,
                ..Default::default()
            },
        }
    }

    fn convert_sheet(sheet: JsonSheet) -> Result<SheetModel, ModelError> {
        let merged_ranges = sheet
            .merged_cells
            .iter()
            .map(|r| {
                CellRange::parse_a1(r).map_err(|e| {
                    ModelError::Invalid(format!("sheet `{}` merged range `{r}`: {e}", sheet.name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut cells = Vec::with_capacity(sheet.cells.len());
        for cell in sheet.cells {
            if cell.row == 0 || cell.col == 0 {
                return Err(ModelError::Invalid(format!(
                    "sheet `{}` has a cell at ({}, {}); coordinates are 1-based",
                    sheet.name, cell.row, cell.col
                )));
            }
            cells.push(CellModel {
                coord: CellCoord::new(cell.row, cell.col),
                value: cell.value,
                formula: cell.formula,
                style: CellStyle {
                    is_header: cell.is_header,
                    is_total: cell.is_total,
                },
            });
        }
        cells.sort_by_key(|c| c.coord);

        Ok(SheetModel {
            name: sheet.name,
            visibility: sheet.visibility,
            dimensions: sheet.dimensions,
            is_protected: sheet.protected,
            cells,
            merged_ranges,
            named_ranges: sheet.named_ranges,
        })
    }
}

impl WorkbookReader for JsonReader {
    fn format(&self) -> FormatVariant {
        FormatVariant::Json
    }

    fn read_workbook(&mut self) -> Result<WorkbookModel, ModelError> {
        let data = std::mem::take(&mut self.data);
        let sheets = data
            .sheets
            .into_iter()
            .map(Self::convert_sheet)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WorkbookModel {
            sheets,
            has_macros: data.has_macros,
            is_password_protected: data.is_password_protected,
            has_external_links: data.has_external_links,
            named_ranges: data.named_ranges,
            metadata: self.metadata.clone(),
        })
    }
}
