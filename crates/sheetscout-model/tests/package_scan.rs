// Reads a hand-assembled xlsm package; run with `--features calamine`.

use std::io::Write;
use std::path::Path;

use sheetscout_model::{CellRange, CellValue, SheetVisibility, load_workbook};
use zip::write::FileOptions;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.ms-excel.sheet.macroEnabled.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookProtection lockStructure="1"/>
<sheets>
<sheet name="Inputs" sheetId="1" r:id="rId1"/>
<sheet name="Calc" sheetId="2" state="hidden" r:id="rId2"/>
</sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
</Relationships>"#;

const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:B2"/>
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>Rate</t></is></c><c r="B1"><v>3</v></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>Qty</t></is></c><c r="B2"><v>4</v></c></row>
</sheetData>
<sheetProtection sheet="1" objects="1"/>
<mergeCells count="1"><mergeCell ref="A1:A2"/></mergeCells>
</worksheet>"#;

const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1"/>
<sheetData>
<row r="1"><c r="A1"><f>Inputs!B1*Inputs!B2</f><v>12</v></c></row>
</sheetData>
</worksheet>"#;

fn write_package(path: &Path) {
    write_package_with(path, WORKBOOK);
}

fn write_package_with(path: &Path, workbook: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default();
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/worksheets/sheet1.xml", SHEET1.as_bytes()),
        ("xl/worksheets/sheet2.xml", SHEET2.as_bytes()),
        ("xl/vbaProject.bin", b"not a real project".as_slice()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn xlsm_package_flags_and_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planning.xlsm");
    write_package(&path);

    let model = load_workbook(&path).unwrap();
    assert!(model.has_macros);
    assert!(model.is_password_protected);
    assert!(!model.has_external_links);
    assert_eq!(model.metadata.file_name.as_deref(), Some("planning.xlsm"));
    assert!(model.metadata.size_bytes > 0);

    let inputs = model.sheet("Inputs").unwrap();
    assert!(inputs.is_protected);
    assert_eq!(inputs.merged_ranges, vec![CellRange::new(1, 1, 2, 1)]);
    assert_eq!(inputs.dimensions, Some((2, 2)));
    assert_eq!(inputs.populated_count(), 4);
    assert_eq!(inputs.cells[0].value, CellValue::Text("Rate".into()));

    let calc = model.sheet("Calc").unwrap();
    assert_eq!(calc.visibility, SheetVisibility::Hidden);
    assert_eq!(
        calc.cells[0].formula(),
        Some("=Inputs!B1*Inputs!B2")
    );
}

#[test]
fn escaped_sheet_names_keep_their_part_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.xlsm");
    let workbook = WORKBOOK.replace(r#"name="Inputs""#, r#"name='P&amp;L'"#);
    write_package_with(&path, &workbook);

    let model = load_workbook(&path).unwrap();
    let ledger = model.sheet("P&L").unwrap();
    assert!(ledger.is_protected);
    assert_eq!(ledger.merged_ranges, vec![CellRange::new(1, 1, 2, 1)]);
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();
    assert!(matches!(
        load_workbook(&path),
        Err(sheetscout_model::ModelError::UnsupportedFormat(_))
    ));
}
