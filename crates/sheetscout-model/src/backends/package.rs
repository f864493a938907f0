//! Flags calamine does not expose, read straight from the OOXML zip parts.

use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use rustc_hash::FxHashMap;
use sheetscout_common::{CellRange, DateSystem};
use zip::ZipArchive;

use crate::error::ModelError;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SheetPart {
    pub is_protected: bool,
    pub merged_ranges: Vec<CellRange>,
    pub dimension: Option<CellRange>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PackageScan {
    pub has_macros: bool,
    pub has_external_links: bool,
    pub workbook_protected: bool,
    pub date_system: DateSystem,
    /// Keyed by sheet name as written in `workbook.xml`.
    pub sheets: FxHashMap<String, SheetPart>,
}

/// What `xl/workbook.xml` declares.
#[derive(Debug, Default, PartialEq)]
struct WorkbookPart {
    protected: bool,
    date_system: DateSystem,
    /// `(name, relationship id)` in workbook order.
    sheets: Vec<(String, String)>,
}

impl PackageScan {
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self, ModelError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut scan = PackageScan::default();

        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        scan.has_macros = names
            .iter()
            .any(|n| n.eq_ignore_ascii_case("xl/vbaProject.bin"));
        scan.has_external_links = names.iter().any(|n| n.starts_with("xl/externalLinks/"));

        let Some(workbook_xml) = read_part(&mut archive, "xl/workbook.xml")? else {
            return Ok(scan);
        };
        let workbook = scan_workbook(&workbook_xml)?;
        scan.workbook_protected = workbook.protected;
        scan.date_system = workbook.date_system;

        let rels = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();
        let targets = scan_relationships(&rels)?;

        for (name, rid) in workbook.sheets {
            let Some(target) = targets.get(&rid) else {
                continue;
            };
            let part = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{target}"),
            };
            if let Some(xml) = read_part(&mut archive, &part)? {
                scan.sheets.insert(name, scan_sheet(&xml)?);
            }
        }

        Ok(scan)
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ModelError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| ModelError::io(name, e))?;
    Ok(Some(text))
}

/// Unescaped value of the first attribute whose key satisfies `wanted`.
fn find_attr(
    reader: &Reader<&[u8]>,
    tag: &BytesStart<'_>,
    wanted: impl Fn(QName<'_>) -> bool,
) -> Result<Option<String>, ModelError> {
    for attribute in tag.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if wanted(attribute.key) {
            let value = attribute.decode_and_unescape_value(reader.decoder())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr(
    reader: &Reader<&[u8]>,
    tag: &BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, ModelError> {
    find_attr(reader, tag, |key| key.as_ref() == name.as_bytes())
}

/// `r:id`, whatever prefix the package binds the relationships namespace to.
fn relationship_id(
    reader: &Reader<&[u8]>,
    tag: &BytesStart<'_>,
) -> Result<Option<String>, ModelError> {
    find_attr(reader, tag, |key| {
        key.prefix().is_some() && key.local_name().as_ref() == b"id"
    })
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true"))
}

fn scan_workbook(xml: &str) -> Result<WorkbookPart, ModelError> {
    let mut reader = Reader::from_str(xml);
    let mut part = WorkbookPart::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookProtection" => part.protected = true,
                b"fileSharing" => {
                    if attr(&reader, &e, "reservationPassword")?.is_some() {
                        part.protected = true;
                    }
                }
                b"workbookPr" => {
                    if is_true(attr(&reader, &e, "date1904")?.as_deref()) {
                        part.date_system = DateSystem::V1904;
                    }
                }
                b"sheet" => {
                    let name = attr(&reader, &e, "name")?;
                    let rid = relationship_id(&reader, &e)?;
                    if let (Some(name), Some(rid)) = (name, rid) {
                        part.sheets.push((name, rid));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(part)
}

/// Relationship id to target path.
fn scan_relationships(xml: &str) -> Result<FxHashMap<String, String>, ModelError> {
    let mut targets = FxHashMap::default();
    if xml.is_empty() {
        return Ok(targets);
    }
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attr(&reader, &e, "Id")?, attr(&reader, &e, "Target")?)
                {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(targets)
}

fn scan_sheet(xml: &str) -> Result<SheetPart, ModelError> {
    let mut reader = Reader::from_str(xml);
    let mut part = SheetPart::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheetProtection" => {
                    part.is_protected = is_true(attr(&reader, &e, "sheet")?.as_deref());
                }
                b"mergeCell" => {
                    if let Some(range) = attr(&reader, &e, "ref")?
                        .and_then(|r| CellRange::parse_a1(&r).ok())
                    {
                        part.merged_ranges.push(range);
                    }
                }
                b"dimension" => {
                    part.dimension = attr(&reader, &e, "ref")?
                        .and_then(|r| CellRange::parse_a1(&r).ok());
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_part_flags() {
        let xml = r#"<worksheet><dimension ref="A1:D12"/><sheetData/>
            <sheetProtection password="CC1A" sheet="1" objects="1"/>
            <mergeCells count="2"><mergeCell ref="A1:D1"/><mergeCell ref="B5:C6"/></mergeCells>
            </worksheet>"#;
        let part = scan_sheet(xml).unwrap();
        assert!(part.is_protected);
        assert_eq!(part.merged_ranges.len(), 2);
        assert_eq!(part.dimension, Some(CellRange::new(1, 1, 12, 4)));
    }

    #[test]
    fn single_quoted_attributes() {
        let xml = "<worksheet><dimension ref='A1:B2'/>\
                   <sheetProtection sheet='1'/>\
                   <mergeCells count='1'><mergeCell ref='A1:B2'/></mergeCells></worksheet>";
        let part = scan_sheet(xml).unwrap();
        assert!(part.is_protected);
        assert_eq!(part.merged_ranges, vec![CellRange::new(1, 1, 2, 2)]);
        assert_eq!(part.dimension, Some(CellRange::new(1, 1, 2, 2)));
    }

    #[test]
    fn unprotected_sheet_flag() {
        let part = scan_sheet(r#"<worksheet><sheetProtection sheet="0"/></worksheet>"#).unwrap();
        assert!(!part.is_protected);
    }

    #[test]
    fn workbook_names_are_unescaped() {
        let xml = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
            <workbookPr date1904="1"/>
            <workbookProtection lockStructure="1"/>
            <sheets>
              <sheet name="P&amp;L" sheetId="1" r:id="rId1"/>
              <sheet name='R&#233;sum&#233;' sheetId='2' r:id='rId2'/>
              <sheet name="Q&#x31;" sheetId="3" rel:id="rId3"/>
            </sheets></workbook>"#;
        let part = scan_workbook(xml).unwrap();
        assert!(part.protected);
        assert_eq!(part.date_system, DateSystem::V1904);
        assert_eq!(
            part.sheets,
            vec![
                ("P&L".to_string(), "rId1".to_string()),
                ("Résumé".to_string(), "rId2".to_string()),
                ("Q1".to_string(), "rId3".to_string()),
            ]
        );
    }

    #[test]
    fn shared_workbook_password_counts_as_protection() {
        let xml = r#"<workbook><fileSharing reservationPassword="ABCD"/><sheets/></workbook>"#;
        let part = scan_workbook(xml).unwrap();
        assert!(part.protected);
        assert_eq!(part.date_system, DateSystem::V1900);
    }

    #[test]
    fn relationship_targets() {
        let xml = r#"<Relationships>
            <Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>
            <Relationship Id='rId2' Type='worksheet' Target='/xl/worksheets/sheet2.xml'/>
            </Relationships>"#;
        let targets = scan_relationships(xml).unwrap();
        assert_eq!(targets.get("rId1").map(String::as_str), Some("worksheets/sheet1.xml"));
        assert_eq!(
            targets.get("rId2").map(String::as_str),
            Some("/xl/worksheets/sheet2.xml")
        );
    }
}
