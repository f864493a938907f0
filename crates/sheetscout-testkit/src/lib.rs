//! Workbook fixtures shared by SheetScout's test suites.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use sheetscout_model::{
    FormatVariant, SheetBuilder, SheetModel, SheetVisibility, WorkbookBuilder, WorkbookModel,
};
use tempfile::NamedTempFile;

/// One visible sheet of plain values: no formulas, macros or protection.
pub fn plain_single_sheet() -> WorkbookModel {
    WorkbookBuilder::new()
        .sheet(
            SheetBuilder::new("Data")
                .header_row(1, &["Region", "Units", "Revenue"])
                .rows(2, [["North", "12", "340"], ["South", "9", "270"]])
                .build(),
        )
        .metadata("plain.xlsx", 8 * 1024, FormatVariant::Xlsx)
        .build()
}

/// `sheets` stores with identical header rows, in a macro-enabled workbook.
pub fn templated_with_macros(sheets: usize) -> WorkbookModel {
    let mut wb = WorkbookBuilder::new()
        .macros(true)
        .metadata("stores.xlsm", 64 * 1024, FormatVariant::Xlsm);
    for i in 0..sheets {
        wb = wb.sheet(store_sheet(&format!("Store {}", store_letter(i))));
    }
    wb.build()
}

fn store_letter(i: usize) -> char {
    char::from(b'A' + (i % 26) as u8)
}

fn store_sheet(name: &str) -> SheetModel {
    SheetBuilder::new(name)
        .header_row(1, &["Product", "Units", "Price", "Total"])
        .rows(2, [[1, 2, 3], [4, 5, 6]])
        .formula(2, 4, "=B2*C2")
        .formula(3, 4, "=B3*C3")
        .build()
}

/// Four regional sheets rolled up by a summary sheet.
pub fn consolidation() -> WorkbookModel {
    let mut wb = WorkbookBuilder::new().metadata("regions.xlsx", 32 * 1024, FormatVariant::Xlsx);
    for region in ["North", "South", "East", "West"] {
        wb = wb.sheet(
            SheetBuilder::new(region)
                .header_row(1, &["Item", "Amount"])
                .rows(2, [["Widgets", "10"]])
                .build(),
        );
    }
    wb.sheet(
        SheetBuilder::new("Summary")
            .header_row(1, &["Item", "Amount"])
            .value(2, 1, "Widgets")
            .formula(2, 2, "=North!B2+South!B2+East!B2+West!B2")
            .formula(3, 2, "=SUM(North:West!B2)")
            .build(),
    )
    .build()
}

/// Monthly budget sheets named after the month.
pub fn periodic_months() -> WorkbookModel {
    let mut wb = WorkbookBuilder::new().metadata("budget.xlsx", 16 * 1024, FormatVariant::Xlsx);
    for month in ["Jan 2024", "Feb 2024", "Mar 2024"] {
        wb = wb.sheet(
            SheetBuilder::new(month)
                .header_row(1, &["Account", "Budget", "Actual", "Variance"])
                .rows(2, [[100, 90], [50, 65]])
                .formula(2, 4, "=C2-B2")
                .formula(3, 4, "=C3-B3")
                .build(),
        );
    }
    wb.build()
}

/// Every non-macro risk at once: password, protected and very hidden sheets,
/// volatile formulas and links to another workbook.
pub fn risky() -> WorkbookModel {
    WorkbookBuilder::new()
        .password_protected(true)
        .external_links(true)
        .sheet(
            SheetBuilder::new("Model")
                .protected(true)
                .formula(1, 1, "=NOW()")
                .formula(2, 1, "=OFFSET(A1,1,0)")
                .formula(3, 1, "=[Rates.xlsx]Fx!$B$2*A2")
                .build(),
        )
        .sheet(
            SheetBuilder::new("Lists")
                .visibility(SheetVisibility::VeryHidden)
                .value(1, 1, "x")
                .build(),
        )
        .build()
}

/// The JSON interchange document `JsonReader` reads back into `model`.
pub fn to_json(model: &WorkbookModel) -> Value {
    let sheets: Vec<Value> = model
        .sheets
        .iter()
        .map(|sheet| {
            let cells: Vec<Value> = sheet
                .cells
                .iter()
                .map(|cell| {
                    json!({
                        "row": cell.row(),
                        "col": cell.col(),
                        "value": cell.value,
                        "formula": cell.formula,
                        "is_header": cell.style.is_header,
                        "is_total": cell.style.is_total,
                    })
                })
                .collect();
            json!({
                "name": sheet.name,
                "visibility": sheet.visibility,
                "dimensions": sheet.dimensions,
                "protected": sheet.is_protected,
                "merged_cells": sheet.merged_ranges.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "named_ranges": sheet.named_ranges,
                "cells": cells,
            })
        })
        .collect();
    json!({
        "version": 1,
        "has_macros": model.has_macros,
        "is_password_protected": model.is_password_protected,
        "has_external_links": model.has_external_links,
        "named_ranges": model.named_ranges,
        "sheets": sheets,
    })
}

/// Write `model` as `<dir>/<name>` in the JSON interchange format.
pub fn write_json(model: &WorkbookModel, dir: &Path, name: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    let text = serde_json::to_string_pretty(&to_json(model))?;
    std::fs::write(&path, text)?;
    Ok(path)
}

/// Temporary `.json` file holding `model`; removed when dropped.
pub fn json_tempfile(model: &WorkbookModel) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
    serde_json::to_writer_pretty(&mut file, &to_json(model))?;
    file.flush()?;
    Ok(file)
}
